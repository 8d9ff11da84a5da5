//! The push interface the [`crate::broadcaster::StateBroadcaster`] delivers serialised
//! state through. This is the only seam external transports (a websocket server, a relay
//! uplink) touch — their accept loops, HTTP upgrades, and auth handshakes are out of
//! scope here.

use crossbeam_channel::Sender;
use std::fmt;
use std::net::TcpStream;
use std::sync::Mutex;
use tungstenite::{Message, WebSocket};

#[derive(Debug)]
pub struct SinkError(pub String);

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink error: {}", self.0)
    }
}

impl std::error::Error for SinkError {}

/// A destination the broadcaster can push an already-serialised JSON payload to.
pub trait Sink: Send + Sync {
    fn send(&self, payload: &str) -> Result<(), SinkError>;
}

/// Forwards payloads over an unbounded channel. Used in tests, and by anything handing
/// messages off to an external uplink task without pulling that task's networking code
/// into the core.
pub struct ChannelSink {
    tx: Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: Sender<String>) -> Self {
        Self { tx }
    }
}

impl Sink for ChannelSink {
    fn send(&self, payload: &str) -> Result<(), SinkError> {
        self.tx
            .send(payload.to_string())
            .map_err(|e| SinkError(e.to_string()))
    }
}

/// Wraps a single already-accepted websocket connection. The TCP accept loop and HTTP
/// upgrade handshake that produce the socket live outside the core; this wrapper is the
/// write-side adapter that turns "send this JSON string" into the `Sink` contract.
pub struct WebSocketSink {
    ws: Mutex<WebSocket<TcpStream>>,
}

impl WebSocketSink {
    pub fn new(ws: WebSocket<TcpStream>) -> Self {
        Self { ws: Mutex::new(ws) }
    }
}

impl Sink for WebSocketSink {
    fn send(&self, payload: &str) -> Result<(), SinkError> {
        self.ws
            .lock()
            .unwrap()
            .send(Message::Text(payload.to_string()))
            .map_err(|e| SinkError(e.to_string()))
    }
}

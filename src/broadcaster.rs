//! Dirty-driven, lower-rate publisher of merged state to observer sinks.

use crate::merge_buffer::MergeBuffer;
use crate::sink::Sink;
use crate::util::BarrierFlag;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_BROADCAST_HZ: f64 = 15.0;

#[derive(Serialize)]
#[serde(tag = "type", rename = "dmx_state")]
struct DmxStateMessage<'a> {
    universe: u16,
    channels: &'a [u8],
}

#[derive(Serialize)]
#[serde(tag = "type", rename = "universes")]
struct UniverseCountMessage {
    count: u16,
}

struct Registry {
    connections: Vec<Arc<dyn Sink>>,
    observers: Vec<Arc<dyn Sink>>,
}

/// Publishes only universes whose dirty flag is set, at `hz` (default 15). Two kinds of
/// sinks are registered through distinct entry points because attach-time behaviour
/// differs: a new connection gets a full per-universe snapshot, a new observer gets only
/// the universe-count message. Both then receive the same dirty-delta stream.
pub struct StateBroadcaster {
    merge_buffer: Arc<MergeBuffer>,
    registry: Arc<Mutex<Registry>>,
    running: Arc<BarrierFlag>,
    hz: f64,
    thread: Option<thread::JoinHandle<()>>,
}

impl StateBroadcaster {
    pub fn new(merge_buffer: Arc<MergeBuffer>, hz: f64) -> Self {
        Self {
            merge_buffer,
            registry: Arc::new(Mutex::new(Registry {
                connections: Vec::new(),
                observers: Vec::new(),
            })),
            running: Arc::new(BarrierFlag::default()),
            hz,
            thread: None,
        }
    }

    /// Registers a connection sink and synchronously sends it the full snapshot: the
    /// universe-count message, then one `dmx_state` message per universe regardless of
    /// dirty status.
    pub fn add_connection(&self, sink: Arc<dyn Sink>) {
        send_universe_count(sink.as_ref(), self.merge_buffer.universe_count());
        for u in 0..self.merge_buffer.universe_count() {
            send_dmx_state(sink.as_ref(), u, &self.merge_buffer.get_output(u));
        }
        self.registry.lock().unwrap().connections.push(sink);
    }

    pub fn remove_connection(&self, sink: &Arc<dyn Sink>) {
        let mut guard = self.registry.lock().unwrap();
        guard.connections.retain(|s| !Arc::ptr_eq(s, sink));
    }

    /// Registers an observer sink and synchronously sends it only the universe-count
    /// message.
    pub fn add_observer(&self, sink: Arc<dyn Sink>) {
        send_universe_count(sink.as_ref(), self.merge_buffer.universe_count());
        self.registry.lock().unwrap().observers.push(sink);
    }

    pub fn remove_observer(&self, sink: &Arc<dyn Sink>) {
        let mut guard = self.registry.lock().unwrap();
        guard.observers.retain(|s| !Arc::ptr_eq(s, sink));
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.running.swap_raise() {
            return Ok(());
        }
        let merge_buffer = self.merge_buffer.clone();
        let registry = self.registry.clone();
        let running = self.running.clone();
        let hz = self.hz;
        self.thread = Some(
            thread::Builder::new()
                .name("state-broadcaster".into())
                .spawn(move || run(&merge_buffer, &registry, &running, hz))?,
        );
        log::info!("state broadcaster started at {hz:.0} Hz");
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.running.is_raised() {
            return;
        }
        self.running.lower();
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
        log::info!("state broadcaster stopped");
    }
}

impl Drop for StateBroadcaster {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(merge_buffer: &MergeBuffer, registry: &Mutex<Registry>, running: &BarrierFlag, hz: f64) {
    let interval = Duration::from_secs_f64(1.0 / hz);
    let mut next_tick = Instant::now();

    while running.is_raised() {
        next_tick += interval;

        let guard = registry.lock().unwrap();
        if !guard.connections.is_empty() || !guard.observers.is_empty() {
            for u in 0..merge_buffer.universe_count() {
                if !merge_buffer.is_dirty(u) {
                    continue;
                }
                merge_buffer.clear_dirty(u);
                let output = merge_buffer.get_output(u);
                for sink in guard.connections.iter().chain(guard.observers.iter()) {
                    if let Err(e) = send_dmx_state(sink.as_ref(), u, &output) {
                        log::debug!("sink dispatch failed for universe {u}: {e}");
                    }
                }
            }
        }
        drop(guard);

        let now = Instant::now();
        if next_tick > now {
            thread::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
    }
}

fn send_universe_count(sink: &dyn Sink, count: u16) {
    let msg = UniverseCountMessage { count };
    if let Ok(payload) = serde_json::to_string(&msg) {
        let _ = sink.send(&payload);
    }
}

fn send_dmx_state(sink: &dyn Sink, universe: u16, channels: &[u8]) -> Result<(), crate::sink::SinkError> {
    let msg = DmxStateMessage { universe, channels };
    match serde_json::to_string(&msg) {
        Ok(payload) => sink.send(&payload),
        Err(e) => Err(crate::sink::SinkError(e.to_string())),
    }
}

//! Art-Net (`OpDmx`) UDP transmission.

use crate::device::OutputDevice;
use crate::universe::NUM_CHANNELS;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

pub const ARTNET_PORT: u16 = 6454;
const PACKET_LEN: usize = 18 + NUM_CHANNELS;
const ART_NET_ID: &[u8; 8] = b"Art-Net\0";

/// UDP `OutputDevice` that encodes merged frames as Art-Net `OpDmx` packets and sends
/// them to a configured IPv4 target (broadcast by default).
pub struct ArtNetSender {
    target: SocketAddr,
    socket: Mutex<Option<UdpSocket>>,
    sequence: AtomicU8,
    description: String,
}

impl ArtNetSender {
    pub fn new(target_ip: &str, port: u16) -> anyhow::Result<Self> {
        let target: SocketAddr = format!("{target_ip}:{port}").parse()?;
        Ok(Self {
            target,
            socket: Mutex::new(None),
            sequence: AtomicU8::new(1),
            description: format!("Art-Net to {target_ip}:{port}"),
        })
    }

    fn build_packet(&self, universe: u16, data: &[u8; NUM_CHANNELS]) -> [u8; PACKET_LEN] {
        let mut packet = [0u8; PACKET_LEN];
        packet[0..8].copy_from_slice(ART_NET_ID);
        // OpDmx (0x5000), little-endian.
        packet[8] = 0x00;
        packet[9] = 0x50;
        // Protocol version 14, big-endian.
        packet[10] = 0x00;
        packet[11] = 14;
        packet[12] = self.next_sequence();
        packet[13] = 0; // physical port
        packet[14] = (universe & 0xFF) as u8;
        packet[15] = ((universe >> 8) & 0x7F) as u8;
        // Length 512, big-endian.
        packet[16] = 0x02;
        packet[17] = 0x00;
        packet[18..18 + NUM_CHANNELS].copy_from_slice(data);
        packet
    }

    /// Sequence starts at 1, wraps 255 -> 1. Never emits 0 (reserved by the protocol).
    fn next_sequence(&self) -> u8 {
        self.sequence
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                Some(if s == 255 { 1 } else { s + 1 })
            })
            .unwrap()
    }
}

impl OutputDevice for ArtNetSender {
    fn open(&self) -> bool {
        let mut guard = self.socket.lock().unwrap();
        if guard.is_some() {
            return true;
        }
        let sock = match Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Art-Net: failed to create UDP socket: {e}");
                return false;
            }
        };
        if let Err(e) = sock.set_broadcast(true) {
            log::warn!("Art-Net: SO_BROADCAST unavailable: {e}");
        }
        let bind_addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
        if let Err(e) = sock.bind(&bind_addr.into()) {
            log::error!("Art-Net: failed to bind UDP socket: {e}");
            return false;
        }
        let udp: UdpSocket = sock.into();
        log::info!("Art-Net: opened sender to {}", self.target);
        *guard = Some(udp);
        true
    }

    fn close(&self) {
        let mut guard = self.socket.lock().unwrap();
        if guard.take().is_some() {
            log::info!("Art-Net: sender closed");
        }
    }

    fn is_open(&self) -> bool {
        self.socket.lock().unwrap().is_some()
    }

    fn send(&self, universe: u16, data: &[u8; NUM_CHANNELS]) {
        let guard = self.socket.lock().unwrap();
        let Some(sock) = guard.as_ref() else {
            return;
        };
        let packet = self.build_packet(universe, data);
        // Fire-and-forget: Art-Net is lossy by design, a failed send is silently dropped.
        let _ = sock.send_to(&packet, self.target);
    }

    fn type_name(&self) -> &'static str {
        "Art-Net"
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

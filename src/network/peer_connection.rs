use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::message::NetworkMessage;
use crate::constants::peers::SAFE_SUBVERSION_CHARS;

pub type PeerId = u64;

/// Direction of the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirection {
    Inbound,  // Peer connected to us
    Outbound, // We connected to peer
}

impl ConnectionDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionDirection::Inbound => "inbound",
            ConnectionDirection::Outbound => "outbound",
        }
    }

    pub fn is_inbound(&self) -> bool {
        matches!(self, ConnectionDirection::Inbound)
    }
}

/// Observable state of one live connection.
///
/// The registry owns these; callers only ever see copies.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerStats {
    pub id: PeerId,
    /// Remote endpoint
    pub addr: SocketAddr,
    /// Name the connection was opened under (host:port as dialed, or the remote endpoint)
    pub addr_name: String,
    /// Our side of the socket, once the transport knows it
    pub addr_local: Option<SocketAddr>,
    pub direction: ConnectionDirection,
    /// Service bits advertised in the peer's version message
    pub services: u64,
    pub version: i32,
    /// Sanitized subversion string
    pub sub_version: String,
    pub starting_height: i32,
    /// Seconds since epoch
    pub conn_time: i64,
    pub last_send: i64,
    pub last_recv: i64,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    /// Last measured ping round trip
    pub ping_time: Option<Duration>,
    /// Set while a ping is outstanding
    pub ping_started: Option<Instant>,
    /// Ask the transport to send a ping on its next pass
    pub ping_queued: bool,
    pub sync_node: bool,
}

impl PeerStats {
    pub fn new(id: PeerId, addr: SocketAddr, direction: ConnectionDirection, now: i64) -> Self {
        Self {
            id,
            addr,
            addr_name: addr.to_string(),
            addr_local: None,
            direction,
            services: 0,
            version: 0,
            sub_version: String::new(),
            starting_height: -1,
            conn_time: now,
            last_send: 0,
            last_recv: 0,
            bytes_sent: 0,
            bytes_recv: 0,
            ping_time: None,
            ping_started: None,
            ping_queued: false,
            sync_node: false,
        }
    }

    /// Time the outstanding ping has been waiting, if one is in flight
    pub fn ping_wait(&self, now: Instant) -> Option<Duration> {
        self.ping_started
            .map(|started| now.saturating_duration_since(started))
            .filter(|wait| !wait.is_zero())
    }
}

/// Strip anything a remote peer could use to corrupt RPC output or logs.
pub fn sanitize_subversion(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || SAFE_SUBVERSION_CHARS.contains(*c))
        .collect()
}

/// Capability to push a message towards one peer. The transport owns the
/// socket; a send only queues the message.
pub trait PeerSender: Send + Sync {
    fn send(&self, message: &NetworkMessage) -> Result<(), String>;
}

/// Sender backed by the per-connection writer task's channel
pub struct ChannelSender {
    tx: mpsc::UnboundedSender<NetworkMessage>,
}

impl ChannelSender {
    pub fn new(tx: mpsc::UnboundedSender<NetworkMessage>) -> Self {
        Self { tx }
    }
}

impl PeerSender for ChannelSender {
    fn send(&self, message: &NetworkMessage) -> Result<(), String> {
        self.tx
            .send(message.clone())
            .map_err(|e| format!("Failed to send message: {}", e))
    }
}

use super::message::NetworkMessage;
use super::peer_connection::{ConnectionDirection, PeerId, PeerSender, PeerStats};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

struct LivePeer {
    stats: PeerStats,
    sender: Arc<dyn PeerSender>,
}

/// Sending side of one live connection, detached from the registry lock
#[derive(Clone)]
pub struct PeerHandle {
    pub id: PeerId,
    pub addr: SocketAddr,
    sender: Arc<dyn PeerSender>,
}

impl PeerHandle {
    pub fn send(&self, message: &NetworkMessage) -> Result<(), String> {
        self.sender.send(message)
    }
}

/// Registry of established peer connections and their statistics.
///
/// Every read copies out under the lock; nothing handed to callers borrows
/// registry internals. Process-wide byte totals live outside the live set so
/// they keep counting after a peer disconnects.
pub struct PeerConnectionRegistry {
    /// Live connections in registration order
    peers: Mutex<Vec<LivePeer>>,
    next_id: AtomicU64,
    total_bytes_sent: AtomicU64,
    total_bytes_recv: AtomicU64,
}

impl PeerConnectionRegistry {
    pub fn new() -> Self {
        Self {
            peers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            total_bytes_sent: AtomicU64::new(0),
            total_bytes_recv: AtomicU64::new(0),
        }
    }

    /// Register a connection that completed its handshake
    pub fn register_peer(
        &self,
        addr: SocketAddr,
        direction: ConnectionDirection,
        sender: Arc<dyn PeerSender>,
    ) -> PeerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let stats = PeerStats::new(id, addr, direction, chrono::Utc::now().timestamp());
        self.peers.lock().push(LivePeer { stats, sender });
        debug!("✅ Registered peer connection: {} ({})", addr, direction.as_str());
        id
    }

    /// Drop a connection. Returns false when it was already gone.
    pub fn unregister_peer(&self, id: PeerId) -> bool {
        let mut peers = self.peers.lock();
        let before = peers.len();
        peers.retain(|p| p.stats.id != id);
        let removed = peers.len() != before;
        if removed {
            debug!("🔌 Unregistered peer connection: {}", id);
        }
        removed
    }

    /// Mutate one connection's stats in place. Returns false for unknown ids.
    pub fn update_peer<F>(&self, id: PeerId, f: F) -> bool
    where
        F: FnOnce(&mut PeerStats),
    {
        let mut peers = self.peers.lock();
        match peers.iter_mut().find(|p| p.stats.id == id) {
            Some(peer) => {
                f(&mut peer.stats);
                true
            }
            None => false,
        }
    }

    /// Apply `f` to every live connection inside one critical section
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&mut PeerStats),
    {
        let mut peers = self.peers.lock();
        for peer in peers.iter_mut() {
            f(&mut peer.stats);
        }
    }

    /// Copy of every live connection's stats, in registration order
    pub fn snapshot(&self) -> Vec<PeerStats> {
        let peers = self.peers.lock();
        peers.iter().map(|p| p.stats.clone()).collect()
    }

    /// Sender handles for fan-out; sending happens after the lock is released
    pub fn handles(&self) -> Vec<PeerHandle> {
        let peers = self.peers.lock();
        peers
            .iter()
            .map(|p| PeerHandle {
                id: p.stats.id,
                addr: p.stats.addr,
                sender: p.sender.clone(),
            })
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Flag every connection to send a ping on the transport's next pass
    pub fn queue_ping_all(&self) {
        self.for_each(|stats| stats.ping_queued = true);
    }

    pub fn record_bytes_sent(&self, id: PeerId, bytes: u64) {
        self.total_bytes_sent.fetch_add(bytes, Ordering::Relaxed);
        let now = chrono::Utc::now().timestamp();
        self.update_peer(id, |stats| {
            stats.bytes_sent += bytes;
            stats.last_send = now;
        });
    }

    pub fn record_bytes_recv(&self, id: PeerId, bytes: u64) {
        self.total_bytes_recv.fetch_add(bytes, Ordering::Relaxed);
        let now = chrono::Utc::now().timestamp();
        self.update_peer(id, |stats| {
            stats.bytes_recv += bytes;
            stats.last_recv = now;
        });
    }

    /// A ping went out; clears the queued flag
    pub fn record_ping_sent(&self, id: PeerId) {
        self.update_peer(id, |stats| {
            stats.ping_queued = false;
            stats.ping_started = Some(Instant::now());
        });
    }

    /// Matching pong arrived
    pub fn record_pong(&self, id: PeerId) {
        self.update_peer(id, |stats| {
            if let Some(started) = stats.ping_started.take() {
                stats.ping_time = Some(started.elapsed());
            }
        });
    }

    pub fn total_bytes_sent(&self) -> u64 {
        self.total_bytes_sent.load(Ordering::Relaxed)
    }

    pub fn total_bytes_recv(&self) -> u64 {
        self.total_bytes_recv.load(Ordering::Relaxed)
    }
}

impl Default for PeerConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

//! Misbehavior scores for connected peers.
//!
//! The message handlers report protocol violations here; the directory only
//! reads the current score.

use super::peer_connection::PeerId;
use crate::constants::peers::DEFAULT_BAN_SCORE;
use dashmap::DashMap;
use tracing::warn;

/// Read access to per-peer misbehavior. `None` means the peer has no
/// tracked state (yet, or anymore).
pub trait MisbehaviorLookup: Send + Sync {
    fn misbehavior(&self, peer: PeerId) -> Option<i32>;
}

pub struct MisbehaviorTracker {
    scores: DashMap<PeerId, i32>,
    ban_threshold: i32,
}

impl MisbehaviorTracker {
    pub fn new(ban_threshold: i32) -> Self {
        Self {
            scores: DashMap::new(),
            ban_threshold,
        }
    }

    /// Start tracking a freshly connected peer
    pub fn track(&self, peer: PeerId) {
        self.scores.entry(peer).or_insert(0);
    }

    pub fn forget(&self, peer: PeerId) {
        self.scores.remove(&peer);
    }

    /// Add `howmuch` to the peer's score.
    /// Returns true when the peer just crossed the ban threshold.
    pub fn misbehaving(&self, peer: PeerId, howmuch: i32) -> bool {
        let mut score = self.scores.entry(peer).or_insert(0);
        let before = *score;
        *score = score.saturating_add(howmuch);
        let crossed = before < self.ban_threshold && *score >= self.ban_threshold;
        if crossed {
            warn!(
                "🚫 Peer {} misbehaving ({} -> {}), ban threshold reached",
                peer, before, *score
            );
        }
        crossed
    }
}

impl Default for MisbehaviorTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BAN_SCORE)
    }
}

impl MisbehaviorLookup for MisbehaviorTracker {
    fn misbehavior(&self, peer: PeerId) -> Option<i32> {
        self.scores.get(&peer).map(|s| *s)
    }
}

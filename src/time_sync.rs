//! Network-adjusted time.
//!
//! Every peer reports its wall clock during the handshake. The node keeps
//! one offset sample per peer and shifts its own clock by the median of
//! those samples, so alert validity windows agree across the network even
//! when the local clock drifts.

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

const MAX_TIME_SAMPLES: usize = 200;
const MIN_TIME_SAMPLES: usize = 5;
const MAX_ADJUSTMENT_SECONDS: i64 = 70 * 60; // 70 minutes

/// Source of the node's notion of "now" in seconds since the epoch.
pub trait Clock: Send + Sync {
    /// Local wall clock shifted by the current network offset.
    fn adjusted_now(&self) -> i64;

    /// Offset in seconds applied on top of the local clock.
    fn time_offset(&self) -> i64;
}

pub struct NetworkClock {
    samples: Mutex<ClockSamples>,
}

struct ClockSamples {
    by_peer: HashMap<u64, i64>,
    order: Vec<u64>,
    offset: i64,
}

impl NetworkClock {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(ClockSamples {
                by_peer: HashMap::new(),
                order: Vec::new(),
                offset: 0,
            }),
        }
    }

    /// Record the clock reported by `peer_id`. Only the first sample per
    /// peer counts; the oldest sample is evicted once the window is full.
    pub fn add_time_sample(&self, peer_id: u64, peer_time: i64) {
        let sample = peer_time - Utc::now().timestamp();
        let mut samples = self.samples.lock();

        if samples.by_peer.contains_key(&peer_id) {
            return;
        }
        if samples.order.len() >= MAX_TIME_SAMPLES {
            let evicted = samples.order.remove(0);
            samples.by_peer.remove(&evicted);
        }
        samples.by_peer.insert(peer_id, sample);
        samples.order.push(peer_id);

        if samples.by_peer.len() < MIN_TIME_SAMPLES {
            return;
        }

        let mut offsets: Vec<i64> = samples.by_peer.values().copied().collect();
        offsets.sort_unstable();
        let median = offsets[offsets.len() / 2];

        if median.abs() <= MAX_ADJUSTMENT_SECONDS {
            samples.offset = median;
            debug!("⏰ Adjusted network time offset to {}s", median);
        } else {
            samples.offset = 0;
            warn!(
                "⚠️  Peer clocks disagree with ours by {}s, ignoring; please check your system clock",
                median
            );
        }
    }
}

impl Clock for NetworkClock {
    fn adjusted_now(&self) -> i64 {
        Utc::now().timestamp() + self.time_offset()
    }

    fn time_offset(&self) -> i64 {
        self.samples.lock().offset
    }
}

impl Default for NetworkClock {
    fn default() -> Self {
        Self::new()
    }
}

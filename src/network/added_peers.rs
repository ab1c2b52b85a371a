//! Operator-maintained list of peers the node should keep trying to reach.
//!
//! Membership says nothing about whether a connection currently exists;
//! the directory service cross-references the live registry on demand.

use crate::error::DirectoryError;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Capability to start a single outbound dial. Implementations must return
/// immediately; the outcome is reported by the transport.
pub trait Connector: Send + Sync {
    fn connect_once(&self, addr: &str);
}

/// Connector that hands dial requests to the transport's dial loop
pub struct DialQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl DialQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Connector for DialQueue {
    fn connect_once(&self, addr: &str) {
        if self.tx.send(addr.to_string()).is_err() {
            warn!("Dial loop stopped, dropping one-shot connect to {}", addr);
        }
    }
}

/// Canonical form used for membership checks
pub fn normalize_address(addr: &str) -> String {
    addr.trim().to_string()
}

pub struct AddedPeerList {
    entries: Mutex<Vec<String>>,
}

impl AddedPeerList {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Seed from configuration, skipping duplicates
    pub fn with_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list = Self::new();
        for entry in entries {
            if let Err(e) = list.add(entry.as_ref()) {
                debug!("Skipping configured added node: {}", e);
            }
        }
        list
    }

    pub fn add(&self, addr: &str) -> Result<(), DirectoryError> {
        let addr = normalize_address(addr);
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| *e == addr) {
            return Err(DirectoryError::AlreadyPresent(addr));
        }
        info!("➕ Added node {}", addr);
        entries.push(addr);
        Ok(())
    }

    pub fn remove(&self, addr: &str) -> Result<(), DirectoryError> {
        let addr = normalize_address(addr);
        let mut entries = self.entries.lock();
        match entries.iter().position(|e| *e == addr) {
            Some(pos) => {
                entries.remove(pos);
                info!("➖ Removed added node {}", addr);
                Ok(())
            }
            None => Err(DirectoryError::NotPresent(addr)),
        }
    }

    /// Snapshot of the list in insertion order
    pub fn list(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn find(&self, addr: &str) -> Option<String> {
        let addr = normalize_address(addr);
        self.entries.lock().iter().find(|e| **e == addr).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Try `addr` once without remembering it. Never holds the list lock.
    pub fn connect_once(&self, addr: &str, connector: &dyn Connector) {
        let addr = normalize_address(addr);
        debug!("📞 One-shot connect requested for {}", addr);
        connector.connect_once(&addr);
    }
}

impl Default for AddedPeerList {
    fn default() -> Self {
        Self::new()
    }
}

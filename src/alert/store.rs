//! Alerts this node currently holds.
//!
//! The store is the acceptance gate for every alert, whether built locally
//! or received from a peer: signature against the network authority first,
//! then freshness, duplicates and cancellation.

use super::codec::{Alert, UnsignedAlert};
use super::signing::VerificationCapability;
use crate::error::AlertError;
use crate::time_sync::Clock;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Decides whether an alert may be stored and relayed
pub trait AlertAcceptor: Send + Sync {
    fn accept(&self, alert: &Alert) -> Result<(), AlertError>;
}

pub struct AlertStore {
    authority: Vec<u8>,
    verifier: Arc<dyn VerificationCapability>,
    clock: Arc<dyn Clock>,
    alerts: RwLock<HashMap<[u8; 32], Alert>>,
}

impl AlertStore {
    pub fn new(
        authority: Vec<u8>,
        verifier: Arc<dyn VerificationCapability>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authority,
            verifier,
            clock,
            alerts: RwLock::new(HashMap::new()),
        }
    }

    /// Unexpired alerts, ordered by id
    pub fn active(&self) -> Vec<UnsignedAlert> {
        let now = self.clock.adjusted_now();
        let alerts = self.alerts.read();
        let mut active: Vec<UnsignedAlert> = alerts
            .values()
            .filter(|a| a.fields().is_in_effect(now))
            .map(|a| a.fields().clone())
            .collect();
        active.sort_by_key(|a| a.id);
        active
    }

    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }

    /// Drop expired alerts; returns how many were removed
    pub fn prune_expired(&self) -> usize {
        let now = self.clock.adjusted_now();
        let mut alerts = self.alerts.write();
        let before = alerts.len();
        alerts.retain(|_, a| a.fields().is_in_effect(now));
        before - alerts.len()
    }
}

impl AlertAcceptor for AlertStore {
    fn accept(&self, alert: &Alert) -> Result<(), AlertError> {
        let digest = alert.digest();
        if !self
            .verifier
            .verify(&digest, alert.signature(), &self.authority)
        {
            warn!("❌ Alert {} failed signature verification", alert.fields().id);
            return Err(AlertError::AlertRejected(
                "signature does not match the alert authority key".to_string(),
            ));
        }

        let now = self.clock.adjusted_now();
        let fields = alert.fields();
        if !fields.is_in_effect(now) {
            return Err(AlertError::AlertRejected(format!(
                "alert {} expired at {}",
                fields.id, fields.expiration
            )));
        }

        let mut alerts = self.alerts.write();
        if alerts.contains_key(&digest) {
            return Err(AlertError::AlertRejected(format!(
                "alert {} is already known",
                fields.id
            )));
        }
        if let Some(canceller) = alerts
            .values()
            .find(|held| held.fields().is_in_effect(now) && held.fields().cancels(fields))
        {
            return Err(AlertError::AlertRejected(format!(
                "alert {} was cancelled by alert {}",
                fields.id,
                canceller.fields().id
            )));
        }

        alerts.retain(|_, held| {
            let cancelled = fields.cancels(held.fields());
            if cancelled {
                debug!("Alert {} cancels alert {}", fields.id, held.fields().id);
            }
            !cancelled
        });
        alerts.insert(digest, alert.clone());
        info!(
            "📣 Accepted alert {} (priority {}): {}",
            fields.id, fields.priority, fields.status_bar
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::codec::encode_unsigned;
    use crate::alert::matcher::SubversionTargets;
    use crate::alert::signing::{Ed25519Signer, SigningCapability};
    use ed25519_dalek::SigningKey;
    use std::collections::BTreeSet;

    const SECRET: [u8; 32] = [5u8; 32];

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn adjusted_now(&self) -> i64 {
            self.0
        }
        fn time_offset(&self) -> i64 {
            0
        }
    }

    fn store() -> AlertStore {
        let authority = SigningKey::from_bytes(&SECRET).verifying_key().to_bytes().to_vec();
        AlertStore::new(authority, Arc::new(Ed25519Signer), Arc::new(FixedClock(1_000)))
    }

    fn alert(id: i32, cancel: i32, expiration: i64, key: &[u8]) -> Alert {
        let fields = UnsignedAlert {
            version: 70010,
            relay_until: expiration,
            expiration,
            id,
            cancel,
            set_cancel: BTreeSet::new(),
            min_ver: 0,
            max_ver: 99999,
            sub_versions: SubversionTargets::Universal,
            priority: 1,
            comment: String::new(),
            status_bar: format!("alert {}", id),
            reserved: String::new(),
        };
        let payload = encode_unsigned(&fields).unwrap();
        let sig = Ed25519Signer
            .sign(&crate::alert::codec::alert_digest(&payload), key)
            .unwrap();
        Alert::from_parts(fields, payload, sig)
    }

    #[test]
    fn test_accepts_valid_and_rejects_duplicate() {
        let store = store();
        let a = alert(1, 0, 5_000, &SECRET);
        store.accept(&a).unwrap();
        assert!(matches!(store.accept(&a), Err(AlertError::AlertRejected(_))));
        assert_eq!(store.active().len(), 1);
    }

    #[test]
    fn test_rejects_foreign_signature() {
        let store = store();
        let a = alert(1, 0, 5_000, &[6u8; 32]);
        assert!(matches!(store.accept(&a), Err(AlertError::AlertRejected(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_rejects_expired() {
        let store = store();
        assert!(store.accept(&alert(1, 0, 999, &SECRET)).is_err());
    }

    #[test]
    fn test_cancellation() {
        let store = store();
        store.accept(&alert(1, 0, 5_000, &SECRET)).unwrap();
        store.accept(&alert(2, 0, 5_000, &SECRET)).unwrap();
        store.accept(&alert(3, 2, 5_000, &SECRET)).unwrap();

        let ids: Vec<i32> = store.active().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![3]);

        // Anything at or below the cancel mark stays out
        assert!(store.accept(&alert(2, 0, 6_000, &SECRET)).is_err());
        store.accept(&alert(4, 0, 5_000, &SECRET)).unwrap();
        assert_eq!(store.len(), 2);
    }
}

use super::codec::{alert_digest, encode_unsigned, Alert, UnsignedAlert};
use super::matcher::SubversionTargets;
use super::signing::{decode_key_hex, SigningCapability};
use super::store::AlertAcceptor;
use super::AlertSummary;
use crate::constants::alert::{DEFAULT_EXPIRE_DAYS, DEFAULT_RELAY_DAYS, SECONDS_PER_DAY};
use crate::error::AlertError;
use crate::network::message::NetworkMessage;
use crate::network::peer_connection_registry::PeerConnectionRegistry;
use crate::time_sync::Clock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What an operator asks to broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub status_bar: String,
    pub min_ver: i32,
    pub max_ver: i32,
    /// Operator syntax, see [`SubversionTargets::parse`]
    pub sub_versions: String,
    pub priority: i32,
    pub id: i32,
    pub relay_days: i64,
    pub expire_days: i64,
    pub cancel: i32,
}

impl AlertRequest {
    pub fn new(
        status_bar: impl Into<String>,
        min_ver: i32,
        max_ver: i32,
        sub_versions: impl Into<String>,
        priority: i32,
        id: i32,
    ) -> Self {
        Self {
            status_bar: status_bar.into(),
            min_ver,
            max_ver,
            sub_versions: sub_versions.into(),
            priority,
            id,
            relay_days: DEFAULT_RELAY_DAYS,
            expire_days: DEFAULT_EXPIRE_DAYS,
            cancel: 0,
        }
    }

    pub fn relay_days(mut self, days: i64) -> Self {
        self.relay_days = days;
        self
    }

    pub fn expire_days(mut self, days: i64) -> Self {
        self.expire_days = days;
        self
    }

    pub fn cancel_up_to(mut self, cancel: i32) -> Self {
        self.cancel = cancel;
        self
    }
}

/// `now` shifted by a whole number of days, refusing timestamps out of range
fn days_from(now: i64, days: i64, what: &str) -> Result<i64, AlertError> {
    days.checked_mul(SECONDS_PER_DAY)
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| AlertError::InvalidWindow(format!("{} days out of range: {}", what, days)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Stored and pushed to every connection live at submit time
    Accepted { relayed: usize, failed: usize },
    /// The acceptance step refused it; nothing was sent
    Rejected(String),
}

pub struct AlertBroadcaster {
    registry: Arc<PeerConnectionRegistry>,
    acceptor: Arc<dyn AlertAcceptor>,
    signer: Arc<dyn SigningCapability>,
    clock: Arc<dyn Clock>,
    protocol_version: i32,
}

impl AlertBroadcaster {
    pub fn new(
        registry: Arc<PeerConnectionRegistry>,
        acceptor: Arc<dyn AlertAcceptor>,
        signer: Arc<dyn SigningCapability>,
        clock: Arc<dyn Clock>,
        protocol_version: i32,
    ) -> Self {
        Self {
            registry,
            acceptor,
            signer,
            clock,
            protocol_version,
        }
    }

    /// Build the unsigned alert. Relay and expiry windows are counted from
    /// the network-adjusted clock; their relative order is not checked.
    pub fn construct(&self, request: &AlertRequest) -> Result<UnsignedAlert, AlertError> {
        let sub_versions = SubversionTargets::parse(&request.sub_versions)?;
        let now = self.clock.adjusted_now();

        Ok(UnsignedAlert {
            version: self.protocol_version,
            relay_until: days_from(now, request.relay_days, "relay")?,
            expiration: days_from(now, request.expire_days, "expire")?,
            id: request.id,
            cancel: request.cancel,
            set_cancel: BTreeSet::new(),
            min_ver: request.min_ver,
            max_ver: request.max_ver,
            sub_versions,
            priority: request.priority,
            comment: String::new(),
            status_bar: request.status_bar.clone(),
            reserved: String::new(),
        })
    }

    pub fn sign(&self, unsigned: UnsignedAlert, key: &[u8]) -> Result<Alert, AlertError> {
        let payload = encode_unsigned(&unsigned)?;
        let signature = self.signer.sign(&alert_digest(&payload), key)?;
        Ok(Alert::from_parts(unsigned, payload, signature))
    }

    /// Run the alert through acceptance, then flood it to every connection
    /// in one registry snapshot. A failed send only affects that peer.
    pub fn submit_and_relay(&self, alert: &Alert) -> RelayOutcome {
        if let Err(e) = self.acceptor.accept(alert) {
            warn!("❌ Alert {} not relayed: {}", alert.fields().id, e);
            return RelayOutcome::Rejected(e.to_string());
        }

        let message = NetworkMessage::Alert(alert.to_wire());
        let mut relayed = 0;
        let mut failed = 0;
        for peer in self.registry.handles() {
            match peer.send(&message) {
                Ok(()) => relayed += 1,
                Err(e) => {
                    debug!("{} relay to {} failed: {}", message.command(), peer.addr, e);
                    failed += 1;
                }
            }
        }

        info!(
            "📡 Relayed alert {} to {} peer(s) ({} failed)",
            alert.fields().id,
            relayed,
            failed
        );
        RelayOutcome::Accepted { relayed, failed }
    }

    /// Construct, sign with the hex-encoded key, accept and relay
    pub fn send_alert(
        &self,
        request: &AlertRequest,
        key_hex: &str,
    ) -> Result<AlertSummary, AlertError> {
        let unsigned = self.construct(request)?;
        let key = decode_key_hex(key_hex)?;
        let alert = self.sign(unsigned, &key)?;

        match self.submit_and_relay(&alert) {
            RelayOutcome::Accepted { .. } => Ok(AlertSummary::for_broadcast(alert.fields())),
            RelayOutcome::Rejected(reason) => Err(AlertError::AlertRejected(reason)),
        }
    }
}

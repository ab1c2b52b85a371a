//! Wire form of alerts.
//!
//! The signature covers the bincode encoding of [`UnsignedAlert`]. That
//! encoding travels with the alert as opaque `payload` bytes, and receivers
//! decode the fields from those exact bytes, so the signed form never depends
//! on re-serializing.

use crate::error::AlertError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use super::matcher::SubversionTargets;

/// The signable fields of an alert, in canonical order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnsignedAlert {
    /// Protocol version of the node that built the alert
    pub version: i32,
    /// Relay to other nodes until this time (seconds since epoch)
    pub relay_until: i64,
    /// Stop treating the alert as valid after this time
    pub expiration: i64,
    pub id: i32,
    /// Cancels every alert with id <= this (0 = none)
    pub cancel: i32,
    /// Additional individual ids to cancel
    pub set_cancel: BTreeSet<i32>,
    /// Inclusive protocol version range the alert applies to
    pub min_ver: i32,
    pub max_ver: i32,
    pub sub_versions: SubversionTargets,
    pub priority: i32,
    /// Not shown to users
    pub comment: String,
    /// Text shown in status bars and RPC output
    pub status_bar: String,
    pub reserved: String,
}

impl UnsignedAlert {
    pub fn is_in_effect(&self, now: i64) -> bool {
        now < self.expiration
    }

    /// True if this alert supersedes `other`
    pub fn cancels(&self, other: &UnsignedAlert) -> bool {
        self.id != other.id && (other.id <= self.cancel || self.set_cancel.contains(&other.id))
    }
}

/// Signed alert as it travels between peers
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedAlert {
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A signed alert together with its decoded fields. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    fields: UnsignedAlert,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

impl Alert {
    pub(crate) fn from_parts(fields: UnsignedAlert, payload: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            fields,
            payload,
            signature,
        }
    }

    pub fn fields(&self) -> &UnsignedAlert {
        &self.fields
    }

    /// Canonical bytes the signature covers
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Digest of the payload; doubles as the alert's identity hash
    pub fn digest(&self) -> [u8; 32] {
        alert_digest(&self.payload)
    }

    pub fn to_wire(&self) -> SignedAlert {
        SignedAlert {
            payload: self.payload.clone(),
            signature: self.signature.clone(),
        }
    }

    pub fn from_wire(wire: SignedAlert) -> Result<Self, AlertError> {
        let fields = decode_unsigned(&wire.payload)?;
        Ok(Self::from_parts(fields, wire.payload, wire.signature))
    }
}

pub fn encode_unsigned(alert: &UnsignedAlert) -> Result<Vec<u8>, AlertError> {
    Ok(bincode::serialize(alert)?)
}

pub fn decode_unsigned(bytes: &[u8]) -> Result<UnsignedAlert, AlertError> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn encode_signed(alert: &Alert) -> Result<Vec<u8>, AlertError> {
    Ok(bincode::serialize(&alert.to_wire())?)
}

pub fn decode_signed(bytes: &[u8]) -> Result<Alert, AlertError> {
    let wire: SignedAlert = bincode::deserialize(bytes)?;
    Alert::from_wire(wire)
}

/// Double SHA-256
pub fn alert_digest(payload: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(payload);
    Sha256::digest(first).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UnsignedAlert {
        UnsignedAlert {
            version: 70010,
            relay_until: 1_700_000_000,
            expiration: 1_700_086_400,
            id: 42,
            cancel: 0,
            set_cancel: BTreeSet::new(),
            min_ver: 70000,
            max_ver: 70010,
            sub_versions: SubversionTargets::parse("/node:1.0.0/").unwrap(),
            priority: 5000,
            comment: String::new(),
            status_bar: "Upgrade required".to_string(),
            reserved: String::new(),
        }
    }

    #[test]
    fn test_encoding_is_stable() {
        let a = encode_unsigned(&sample()).unwrap();
        let b = encode_unsigned(&sample().clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(alert_digest(&a), alert_digest(&b));

        let mut changed = sample();
        changed.priority += 1;
        assert_ne!(alert_digest(&encode_unsigned(&changed).unwrap()), alert_digest(&a));
    }

    #[test]
    fn test_signed_decode_uses_embedded_payload() {
        let fields = sample();
        let payload = encode_unsigned(&fields).unwrap();
        let alert = Alert::from_parts(fields.clone(), payload.clone(), vec![7u8; 64]);

        let bytes = encode_signed(&alert).unwrap();
        let decoded = decode_signed(&bytes).unwrap();
        assert_eq!(decoded.fields(), &fields);
        assert_eq!(decoded.payload(), payload.as_slice());
        assert_eq!(decoded.signature(), &[7u8; 64][..]);
        assert_eq!(decoded.digest(), alert.digest());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(decode_signed(&[1, 2, 3]), Err(AlertError::Codec(_))));
    }

    #[test]
    fn test_cancels() {
        let mut old = sample();
        old.id = 10;
        let mut newer = sample();
        newer.id = 11;
        newer.cancel = 10;
        assert!(newer.cancels(&old));
        assert!(!old.cancels(&newer));

        let mut other = sample();
        other.id = 30;
        assert!(!newer.cancels(&other));
        newer.set_cancel.insert(30);
        assert!(newer.cancels(&other));
        assert!(!newer.cancels(&newer.clone()));
    }
}

//! Signed network-wide alerts: construction, signing, acceptance and flood relay.

pub mod broadcaster;
pub mod codec;
pub mod matcher;
pub mod signing;
pub mod store;

use serde::Serialize;

use codec::UnsignedAlert;

/// Operator-facing view of an alert, as listed by `getnetworkinfo` and
/// echoed by `sendalert`
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AlertSummary {
    #[serde(rename = "alertid")]
    pub id: i32,
    pub priority: i32,
    #[serde(rename = "minver")]
    pub min_ver: i32,
    #[serde(rename = "maxver")]
    pub max_ver: i32,
    #[serde(rename = "subver")]
    pub sub_versions: String,
    #[serde(rename = "relayuntil")]
    pub relay_until: i64,
    pub expiration: i64,
    #[serde(rename = "statusbar")]
    pub status_bar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel: Option<i32>,
}

impl AlertSummary {
    pub fn from_alert(alert: &UnsignedAlert) -> Self {
        Self {
            id: alert.id,
            priority: alert.priority,
            min_ver: alert.min_ver,
            max_ver: alert.max_ver,
            sub_versions: alert.sub_versions.render(),
            relay_until: alert.relay_until,
            expiration: alert.expiration,
            status_bar: alert.status_bar.clone(),
            version: None,
            cancel: None,
        }
    }

    /// Summary returned to the operator who just broadcast the alert
    pub fn for_broadcast(alert: &UnsignedAlert) -> Self {
        Self {
            version: Some(alert.version),
            cancel: (alert.cancel > 0).then_some(alert.cancel),
            ..Self::from_alert(alert)
        }
    }
}

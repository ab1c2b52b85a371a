use crate::alert::codec::SignedAlert;
use serde::{Deserialize, Serialize};

/// Messages this subsystem hands to the transport for delivery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum NetworkMessage {
    /// Signed network alert, relayed verbatim so every hop can verify it
    Alert(SignedAlert),
}

impl NetworkMessage {
    /// Short command name used in logs
    pub fn command(&self) -> &'static str {
        match self {
            NetworkMessage::Alert(_) => "alert",
        }
    }
}

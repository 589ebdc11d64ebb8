//! Inbound check-in payload and the response handed back to the transport layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A liveness report from a keeper, already signature-verified by the transport.
///
/// `keeper_address` is carried as received; the engine normalizes it before lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub keeper_address: String,
    pub consensus_address: String,
    pub consensus_public_key: String,
    pub version: String,
    pub peer_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_imua: bool,
}

/// What the transport layer returns to the keeper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub accepted: bool,
    /// Sealed configuration bundle, if the keeper's version receives one.
    pub payload: Option<Vec<u8>>,
    pub message: String,
}

impl CheckInResponse {
    pub fn accepted(payload: Option<Vec<u8>>, message: impl Into<String>) -> Self {
        Self {
            accepted: true,
            payload,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            payload: None,
            message: message.into(),
        }
    }
}

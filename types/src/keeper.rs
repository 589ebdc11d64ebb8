//! Per-keeper liveness record and the status update pushed to the durable store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CheckIn, KeeperAddress};

/// Everything the engine knows about one verified keeper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperRecord {
    pub address: KeeperAddress,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub consensus_address: String,
    #[serde(default)]
    pub operator_id: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub peer_id: String,
    /// Whether the keeper is currently considered to be serving traffic.
    #[serde(default)]
    pub is_active: bool,
    /// Time of the last accepted check-in. `None` until the first one.
    #[serde(default)]
    pub last_checked_in: Option<DateTime<Utc>>,
    /// Cumulative uptime as maintained by the uptime cache.
    #[serde(default)]
    pub uptime_seconds: u64,
    #[serde(default)]
    pub is_imua: bool,
}

impl KeeperRecord {
    /// A fresh, inactive record with empty metadata.
    pub fn new(address: KeeperAddress) -> Self {
        Self {
            address,
            name: String::new(),
            consensus_address: String::new(),
            operator_id: String::new(),
            version: String::new(),
            peer_id: String::new(),
            is_active: false,
            last_checked_in: None,
            uptime_seconds: 0,
            is_imua: false,
        }
    }

    /// Apply an accepted check-in: overwrite the reported metadata, stamp
    /// `last_checked_in` and mark the keeper active.
    pub fn apply_check_in(&mut self, check_in: &CheckIn, now: DateTime<Utc>) {
        self.consensus_address = check_in.consensus_address.clone();
        self.version = check_in.version.clone();
        self.peer_id = check_in.peer_id.clone();
        self.is_imua = check_in.is_imua;
        self.last_checked_in = Some(now);
        self.is_active = true;
    }

    /// Seconds since the last check-in, or `None` if the keeper never checked in.
    pub fn seconds_since_check_in(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_checked_in.map(|t| (now - t).num_seconds())
    }

    /// Whether an active keeper has been silent for strictly longer than `threshold_secs`.
    pub fn has_timed_out(&self, now: DateTime<Utc>, threshold_secs: u64) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_checked_in {
            Some(t) => match i64::try_from(threshold_secs)
                .ok()
                .and_then(|secs| secs.checked_mul(1000))
            {
                Some(threshold_ms) => (now - t).num_milliseconds() > threshold_ms,
                // A threshold beyond the representable range is never reached.
                None => false,
            },
            // Active without a check-in time can only come from a bad load; treat as stale.
            None => true,
        }
    }

    /// Build the durable-store update reflecting this record's current state.
    pub fn status_update(&self, timestamp: DateTime<Utc>) -> KeeperStatusUpdate {
        KeeperStatusUpdate {
            address: self.address.clone(),
            consensus_address: self.consensus_address.clone(),
            version: self.version.clone(),
            uptime_seconds: self.uptime_seconds,
            timestamp,
            is_active: self.is_active,
        }
    }
}

/// A single-keeper write to the durable store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperStatusUpdate {
    pub address: KeeperAddress,
    pub consensus_address: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
    pub is_active: bool,
}

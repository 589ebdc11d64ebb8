//! Version compatibility table and the configuration bundle a keeper gets
//! back with an accepted check-in.
//!
//! Lookup is by exact version string. Anything not listed, including
//! versions newer than the current set, receives only an upgrade notice.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use keeper_types::{CheckIn, CheckInResponse, KeeperRecord};

use crate::config::{EngineConfig, NetworkConfig};
use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionSupport {
    /// Receives the full configuration bundle.
    Current,
    /// Receives the reduced legacy bundle and an upgrade hint.
    Legacy,
    Unsupported,
}

#[derive(Clone, Debug)]
pub struct VersionTable {
    current: HashSet<String>,
    legacy: HashSet<String>,
    /// Sorted, for the upgrade notice.
    current_listing: Vec<String>,
}

impl VersionTable {
    pub fn new<I, J, S>(current: I, legacy: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let current: HashSet<String> = current.into_iter().map(Into::into).collect();
        let legacy = legacy
            .into_iter()
            .map(Into::into)
            .filter(|v| !current.contains(v))
            .collect();
        let mut current_listing: Vec<String> = current.iter().cloned().collect();
        current_listing.sort();
        Self {
            current,
            legacy,
            current_listing,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.current_versions.iter().cloned(),
            config.legacy_versions.iter().cloned(),
        )
    }

    pub fn classify(&self, version: &str) -> VersionSupport {
        if self.current.contains(version) {
            VersionSupport::Current
        } else if self.legacy.contains(version) {
            VersionSupport::Legacy
        } else {
            VersionSupport::Unsupported
        }
    }

    pub fn current_versions(&self) -> &[String] {
        &self.current_listing
    }
}

/// Chain endpoint handed to the keeper. Exactly one variant per bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "network", rename_all = "lowercase")]
pub enum NetworkEndpoint {
    Imua { rpc_url: String },
    Standard { rpc_url: String },
}

impl NetworkEndpoint {
    pub fn select(network: &NetworkConfig, is_imua: bool) -> Self {
        if is_imua {
            Self::Imua {
                rpc_url: network.imua_rpc_url.clone(),
            }
        } else {
            Self::Standard {
                rpc_url: network.rpc_url.clone(),
            }
        }
    }

    pub fn rpc_url(&self) -> &str {
        match self {
            Self::Imua { rpc_url } | Self::Standard { rpc_url } => rpc_url,
        }
    }
}

/// Full bundle for keepers on a current version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub keeper_address: String,
    pub aggregator_url: String,
    pub endpoint: NetworkEndpoint,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

/// Reduced bundle for keepers on a legacy version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyConfigBundle {
    pub aggregator_url: String,
    pub rpc_url: String,
}

/// Encrypts a serialized bundle for one keeper.
pub trait PayloadSealer: Send + Sync {
    fn seal(&self, public_key: &str, plaintext: &[u8]) -> Result<Vec<u8>, EngineError>;
}

/// Returns the plaintext unchanged. Development and tests only.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughSealer;

impl PayloadSealer for PassthroughSealer {
    fn seal(&self, _public_key: &str, plaintext: &[u8]) -> Result<Vec<u8>, EngineError> {
        Ok(plaintext.to_vec())
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Vec<u8>, EngineError> {
    serde_json::to_vec(value).map_err(|e| EngineError::Seal(e.to_string()))
}

/// Build the response for a check-in the registry has accepted.
pub fn build_response(
    versions: &VersionTable,
    record: &KeeperRecord,
    check_in: &CheckIn,
    network: &NetworkConfig,
    sealer: &dyn PayloadSealer,
) -> Result<CheckInResponse, EngineError> {
    let endpoint = NetworkEndpoint::select(network, check_in.is_imua);

    match versions.classify(&check_in.version) {
        VersionSupport::Current => {
            let bundle = ConfigBundle {
                keeper_address: record.address.to_string(),
                aggregator_url: network.aggregator_url.clone(),
                endpoint,
                extra: network.extra.clone(),
            };
            let payload = sealer.seal(&check_in.consensus_public_key, &to_json(&bundle)?)?;
            Ok(CheckInResponse::accepted(Some(payload), "check-in accepted"))
        }
        VersionSupport::Legacy => {
            let bundle = LegacyConfigBundle {
                aggregator_url: network.aggregator_url.clone(),
                rpc_url: endpoint.rpc_url().to_string(),
            };
            let payload = sealer.seal(&check_in.consensus_public_key, &to_json(&bundle)?)?;
            Ok(CheckInResponse::accepted(
                Some(payload),
                format!(
                    "check-in accepted; version {} is deprecated, please upgrade",
                    check_in.version
                ),
            ))
        }
        VersionSupport::Unsupported => Ok(CheckInResponse::accepted(
            None,
            format!(
                "version {} is no longer supported; upgrade to one of: {}",
                check_in.version,
                versions.current_versions().join(", ")
            ),
        )),
    }
}

//! Engine configuration with TOML file support.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use keeper_types::KeeperAddress;

use crate::EngineError;

/// Configuration for the keeper engine.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cadence of the inactivity sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// A keeper silent for strictly longer than this is demoted.
    #[serde(default = "default_inactivity_threshold_secs")]
    pub inactivity_threshold_secs: u64,

    /// Attempts per store write-through.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Daily distribution time-of-day (UTC).
    #[serde(default = "default_distribution_hour")]
    pub distribution_hour_utc: u32,

    #[serde(default = "default_distribution_minute")]
    pub distribution_minute_utc: u32,

    /// Sleep after each distribution before scheduling the next one.
    #[serde(default = "default_distribution_guard_secs")]
    pub distribution_guard_secs: u64,

    /// Rewards health reports `overdue` past this age of the last distribution.
    #[serde(default = "default_overdue_after_secs")]
    pub overdue_after_secs: u64,

    /// Versions that receive the full configuration bundle.
    #[serde(default = "default_current_versions")]
    pub current_versions: Vec<String>,

    /// Versions that receive the reduced legacy bundle.
    #[serde(default = "default_legacy_versions")]
    pub legacy_versions: Vec<String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Serve the Prometheus registry at `GET /metrics` on `metrics_addr`.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: String,

    /// Verified keepers served by the in-memory dev store.
    #[serde(default)]
    pub seed_keepers: Vec<KeeperAddress>,

    /// Values delivered to keepers in their configuration bundle.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Offline alerting.
    #[serde(default)]
    pub alerts: AlertConfig,
}

/// Network endpoints handed out to keepers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Endpoint for keepers running the Imua network variant.
    #[serde(default = "default_imua_rpc_url")]
    pub imua_rpc_url: String,

    #[serde(default = "default_aggregator_url")]
    pub aggregator_url: String,

    /// Additional key/value pairs included in the full bundle only.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub chat_id: Option<String>,

    #[serde(default)]
    pub email_to: Option<String>,
}

/// Upper bound on `inactivity_threshold_secs`: one day.
pub const MAX_INACTIVITY_THRESHOLD_SECS: u64 = 86_400;

// ── Serde default helpers ──────────────────────────────────────────────

fn default_sweep_interval_secs() -> u64 {
    5
}

fn default_inactivity_threshold_secs() -> u64 {
    70
}

fn default_max_retries() -> u32 {
    3
}

fn default_distribution_hour() -> u32 {
    6
}

fn default_distribution_minute() -> u32 {
    30
}

fn default_distribution_guard_secs() -> u64 {
    60
}

fn default_overdue_after_secs() -> u64 {
    25 * 3600
}

fn default_current_versions() -> Vec<String> {
    vec!["0.1.6".to_string()]
}

fn default_legacy_versions() -> Vec<String> {
    vec!["0.1.5".to_string(), "0.1.4".to_string()]
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_addr() -> String {
    "127.0.0.1:9100".to_string()
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_imua_rpc_url() -> String {
    "http://127.0.0.1:8546".to_string()
}

fn default_aggregator_url() -> String {
    "http://127.0.0.1:9010".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self = toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("EngineConfig is always serializable to TOML")
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.sweep_interval_secs == 0 {
            return Err(EngineError::Config("sweep_interval_secs must be > 0".into()));
        }
        if self.inactivity_threshold_secs == 0 {
            return Err(EngineError::Config(
                "inactivity_threshold_secs must be > 0".into(),
            ));
        }
        if self.inactivity_threshold_secs > MAX_INACTIVITY_THRESHOLD_SECS {
            return Err(EngineError::Config(format!(
                "inactivity_threshold_secs must be <= {MAX_INACTIVITY_THRESHOLD_SECS}"
            )));
        }
        if self.enable_metrics {
            self.metrics_addr.parse::<SocketAddr>().map_err(|e| {
                EngineError::Config(format!("invalid metrics_addr {:?}: {e}", self.metrics_addr))
            })?;
        }
        self.distribution_time()?;
        Ok(())
    }

    /// The daily distribution time-of-day.
    pub fn distribution_time(&self) -> Result<NaiveTime, EngineError> {
        NaiveTime::from_hms_opt(self.distribution_hour_utc, self.distribution_minute_utc, 0)
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "invalid distribution time {:02}:{:02}",
                    self.distribution_hour_utc, self.distribution_minute_utc
                ))
            })
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn distribution_guard(&self) -> Duration {
        Duration::from_secs(self.distribution_guard_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
            max_retries: default_max_retries(),
            distribution_hour_utc: default_distribution_hour(),
            distribution_minute_utc: default_distribution_minute(),
            distribution_guard_secs: default_distribution_guard_secs(),
            overdue_after_secs: default_overdue_after_secs(),
            current_versions: default_current_versions(),
            legacy_versions: default_legacy_versions(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            metrics_addr: default_metrics_addr(),
            seed_keepers: Vec::new(),
            network: NetworkConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            imua_rpc_url: default_imua_rpc_url(),
            aggregator_url: default_aggregator_url(),
            extra: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = EngineConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = EngineConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.inactivity_threshold_secs, config.inactivity_threshold_secs);
        assert_eq!(parsed.current_versions, config.current_versions);
        assert_eq!(parsed.network, config.network);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.sweep_interval_secs, 5);
        assert_eq!(config.inactivity_threshold_secs, 70);
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.distribution_time().unwrap(),
            NaiveTime::from_hms_opt(6, 30, 0).unwrap()
        );
        assert_eq!(config.overdue_after_secs, 90_000);
        assert!(!config.alerts.enabled);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            inactivity_threshold_secs = 120
            seed_keepers = ["0xABC", "0xdef"]

            [alerts]
            enabled = true
            chat_id = "-100"
        "#;
        let config = EngineConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.inactivity_threshold_secs, 120);
        assert_eq!(config.seed_keepers[0].as_str(), "0xabc");
        assert!(config.alerts.enabled);
        assert_eq!(config.alerts.chat_id.as_deref(), Some("-100"));
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn invalid_distribution_time_is_rejected() {
        let err = EngineConfig::from_toml_str("distribution_hour_utc = 25").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn inactivity_threshold_is_bounded() {
        assert!(EngineConfig::from_toml_str("inactivity_threshold_secs = 86400").is_ok());
        let err = EngineConfig::from_toml_str("inactivity_threshold_secs = 86401").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn metrics_addr_is_checked_only_when_enabled() {
        assert!(EngineConfig::from_toml_str("metrics_addr = \"nope\"").is_ok());
        let err = EngineConfig::from_toml_str("enable_metrics = true\nmetrics_addr = \"nope\"")
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        let config = EngineConfig::from_toml_str("enable_metrics = true").unwrap();
        assert_eq!(config.metrics_addr, "127.0.0.1:9100");
    }

    #[test]
    fn zero_sweep_interval_is_rejected() {
        assert!(EngineConfig::from_toml_str("sweep_interval_secs = 0").is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_retries = 5").unwrap();
        let config = EngineConfig::from_toml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = EngineConfig::from_toml_file("/nonexistent/keeperd.toml");
        assert!(matches!(result.unwrap_err(), EngineError::Config(_)));
    }
}

//! Keeper liveness and rewards engine.
//!
//! The engine is the central coordinator that:
//! - Tracks which verified keepers are alive from their periodic check-ins
//! - Demotes keepers that stop checking in
//! - Accumulates daily uptime and converts it into reward points once a day
//! - Answers each check-in with a configuration bundle matched to the
//!   keeper's software version
//!
//! Durable storage, the uptime cache and notification delivery are reached
//! only through the traits in `keeper-store`.

pub mod alerts;
pub mod checkin;
pub mod config;
pub mod detector;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod metrics_server;
pub mod registry;
pub mod rewards;
pub mod shutdown;
pub mod tracing_spans;
pub mod version;

pub use alerts::OfflineAlerter;
pub use checkin::CheckInService;
pub use config::{AlertConfig, EngineConfig, NetworkConfig};
pub use detector::{InactivityDetector, SweepReport};
pub use error::EngineError;
pub use logging::{init_logging, LogFormat};
pub use metrics::EngineMetrics;
pub use metrics_server::spawn_metrics_server;
pub use registry::{DumpReport, KeeperCounts, KeeperRegistry};
pub use rewards::{
    calculate_reward_points, DistributionSchedule, DistributionSummary, RewardTier,
    RewardsEngine, RewardsHealth, RewardsStatus,
};
pub use shutdown::ShutdownController;
pub use version::{
    build_response, ConfigBundle, LegacyConfigBundle, NetworkEndpoint, PassthroughSealer,
    PayloadSealer, VersionSupport, VersionTable,
};

//! Prometheus metrics for the keeper engine.
//!
//! The [`EngineMetrics`] struct owns a dedicated [`Registry`]. It is encoded
//! into the Prometheus text exposition format by [`EngineMetrics::encode_text`]
//! and served by [`crate::metrics_server`] when metrics are enabled. The
//! engine only ever writes to these; nothing reads them back.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::EngineError;

pub struct EngineMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Check-ins accepted by the registry.
    pub checkins: IntCounter,
    /// Check-ins rejected because the keeper is not verified.
    pub checkins_rejected: IntCounter,
    /// Write-throughs that exhausted every retry.
    pub store_write_failures: IntCounter,
    /// Keepers demoted by the inactivity sweep.
    pub timeouts: IntCounter,
    pub reward_points_awarded: IntCounter,
    pub reward_distributions: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub keeper_count: IntGauge,
    pub active_keeper_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    pub distribution_duration_ms: Histogram,
}

impl EngineMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let checkins = register_int_counter_with_registry!(
            Opts::new("keeper_checkins_total", "Check-ins accepted"),
            registry
        )
        .expect("failed to register checkins counter");

        let checkins_rejected = register_int_counter_with_registry!(
            Opts::new(
                "keeper_checkins_rejected_total",
                "Check-ins rejected from unverified keepers"
            ),
            registry
        )
        .expect("failed to register checkins_rejected counter");

        let store_write_failures = register_int_counter_with_registry!(
            Opts::new(
                "keeper_store_write_failures_total",
                "Store write-throughs that exhausted all retries"
            ),
            registry
        )
        .expect("failed to register store_write_failures counter");

        let timeouts = register_int_counter_with_registry!(
            Opts::new(
                "keeper_timeouts_total",
                "Keepers marked inactive by the inactivity sweep"
            ),
            registry
        )
        .expect("failed to register timeouts counter");

        let reward_points_awarded = register_int_counter_with_registry!(
            Opts::new(
                "keeper_reward_points_awarded_total",
                "Reward points credited to keepers"
            ),
            registry
        )
        .expect("failed to register reward_points_awarded counter");

        let reward_distributions = register_int_counter_with_registry!(
            Opts::new(
                "keeper_reward_distributions_total",
                "Completed reward distributions"
            ),
            registry
        )
        .expect("failed to register reward_distributions counter");

        let keeper_count = register_int_gauge_with_registry!(
            Opts::new("keeper_count", "Verified keepers held in memory"),
            registry
        )
        .expect("failed to register keeper_count gauge");

        let active_keeper_count = register_int_gauge_with_registry!(
            Opts::new("keeper_active_count", "Keepers currently active"),
            registry
        )
        .expect("failed to register active_keeper_count gauge");

        // 1 ms → ~65 s.
        let distribution_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "keeper_distribution_duration_ms",
                "Reward distribution run time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 17).unwrap()),
            registry
        )
        .expect("failed to register distribution_duration_ms histogram");

        Self {
            registry,
            checkins,
            checkins_rejected,
            store_write_failures,
            timeouts,
            reward_points_awarded,
            reward_distributions,
            keeper_count,
            active_keeper_count,
            distribution_duration_ms,
        }
    }

    /// Encode every family in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, EngineError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| EngineError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| EngineError::Metrics(e.to_string()))
    }

    /// Refresh both keeper gauges from a `(total, active)` pair.
    pub fn set_keeper_counts(&self, total: usize, active: usize) {
        self.keeper_count.set(total as i64);
        self.active_keeper_count.set(active as i64);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

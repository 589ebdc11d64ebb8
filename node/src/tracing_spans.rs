//! Pre-built [`tracing::Span`] constructors for engine operations.
//!
//! Consistent span names and fields make it easy to correlate a keeper's
//! check-ins, timeouts and payouts across log lines.

use tracing::{info_span, Span};

/// Span covering one check-in from arrival to response.
pub fn check_in_span(keeper: &str, version: &str) -> Span {
    info_span!("check_in", keeper = %keeper, version = %version)
}

/// Span covering one pass of the inactivity sweep.
pub fn sweep_span() -> Span {
    info_span!("inactivity_sweep")
}

/// Span covering one reward distribution run.
pub fn distribution_span(period_start: &str) -> Span {
    info_span!("reward_distribution", period_start = %period_start)
}

/// Span covering the shutdown dump of registry state.
pub fn dump_span(active: usize) -> Span {
    info_span!("dump_state", active = %active)
}

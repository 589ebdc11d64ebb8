//! Daily uptime rewards.
//!
//! - [`tiers`] maps a keeper's daily uptime to points.
//! - [`schedule`] computes the fixed daily distribution instants.
//! - [`engine`] runs the scheduler loop, the distribution itself, startup
//!   catch-up and the health summary.

pub mod engine;
pub mod schedule;
pub mod tiers;

pub use engine::{DistributionSummary, RewardsEngine, RewardsHealth, RewardsStatus};
pub use schedule::DistributionSchedule;
pub use tiers::{calculate_reward_points, RewardTier};

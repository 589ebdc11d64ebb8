//! Uptime accumulator trait.
//!
//! The cache holds per-keeper daily uptime counters plus the two process-wide
//! rewards markers (current period start, last distribution) so that they
//! survive restarts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keeper_types::KeeperAddress;

use crate::StoreError;

#[async_trait]
pub trait UptimeCache: Send + Sync {
    async fn increment_daily_uptime(
        &self,
        address: &KeeperAddress,
        seconds: u64,
    ) -> Result<(), StoreError>;

    /// Uptime accrued in the current period; zero for unknown keepers.
    async fn get_daily_uptime(&self, address: &KeeperAddress) -> Result<u64, StoreError>;

    async fn get_all_daily_uptimes(&self) -> Result<HashMap<KeeperAddress, u64>, StoreError>;

    async fn reset_all_daily_uptimes(&self) -> Result<(), StoreError>;

    async fn get_last_rewards_distribution(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn set_last_rewards_distribution(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn get_current_period_start(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn set_current_period_start(&self, at: DateTime<Utc>) -> Result<(), StoreError>;
}

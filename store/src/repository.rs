//! Durable keeper store trait.

use async_trait::async_trait;
use keeper_types::{KeeperAddress, KeeperRecord, KeeperStatusUpdate};

use crate::StoreError;

/// Repository over the durable store holding keeper records and point balances.
#[async_trait]
pub trait KeeperRepository: Send + Sync {
    /// Every keeper that is registered and whitelisted.
    async fn get_verified_keepers(&self) -> Result<Vec<KeeperRecord>, StoreError>;

    /// Write one keeper's liveness status.
    async fn update_keeper_status(&self, update: &KeeperStatusUpdate) -> Result<(), StoreError>;

    /// Add reward points to a keeper's balance.
    async fn add_keeper_points(&self, address: &KeeperAddress, points: u64)
        -> Result<(), StoreError>;

    /// Bulk write of many records in one call.
    async fn update_all_keepers_status(&self, records: &[KeeperRecord]) -> Result<(), StoreError>;
}

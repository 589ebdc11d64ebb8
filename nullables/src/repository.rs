//! Nullable keeper repository — thread-safe in-memory durable store for testing.

use async_trait::async_trait;
use keeper_store::{KeeperRepository, StoreError};
use keeper_types::{KeeperAddress, KeeperRecord, KeeperStatusUpdate};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// An in-memory keeper store with programmable failures.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullKeeperRepository {
    verified: Mutex<Vec<KeeperRecord>>,
    status_writes: Mutex<Vec<KeeperStatusUpdate>>,
    bulk_writes: Mutex<Vec<Vec<KeeperRecord>>>,
    points: Mutex<HashMap<KeeperAddress, u64>>,
    failing_keepers: Mutex<HashSet<KeeperAddress>>,
    fail_reads: AtomicBool,
    /// Number of upcoming write calls that fail before writes succeed again.
    fail_next_writes: AtomicU32,
    write_attempts: AtomicU32,
}

impl NullKeeperRepository {
    pub fn new() -> Self {
        Self {
            verified: Mutex::new(Vec::new()),
            status_writes: Mutex::new(Vec::new()),
            bulk_writes: Mutex::new(Vec::new()),
            points: Mutex::new(HashMap::new()),
            failing_keepers: Mutex::new(HashSet::new()),
            fail_reads: AtomicBool::new(false),
            fail_next_writes: AtomicU32::new(0),
            write_attempts: AtomicU32::new(0),
        }
    }

    /// Create a store whose verified set is `records`.
    pub fn with_verified(records: Vec<KeeperRecord>) -> Self {
        let repo = Self::new();
        repo.set_verified(records);
        repo
    }

    /// Replace the verified set.
    pub fn set_verified(&self, records: Vec<KeeperRecord>) {
        *self.verified.lock().unwrap() = records;
    }

    /// Make `get_verified_keepers` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `n` write calls of any kind.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Fail every write from now on.
    pub fn fail_all_writes(&self) {
        self.fail_next_writes.store(u32::MAX, Ordering::SeqCst);
    }

    /// Always fail writes (status and points) that target `address`.
    pub fn fail_writes_for(&self, address: &KeeperAddress) {
        self.failing_keepers.lock().unwrap().insert(address.clone());
    }

    /// Every successful single-keeper status write, in order.
    pub fn status_writes(&self) -> Vec<KeeperStatusUpdate> {
        self.status_writes.lock().unwrap().clone()
    }

    /// The most recent successful status write for `address`.
    pub fn last_status(&self, address: &KeeperAddress) -> Option<KeeperStatusUpdate> {
        self.status_writes
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|u| &u.address == address)
            .cloned()
    }

    /// Every successful bulk write.
    pub fn bulk_writes(&self) -> Vec<Vec<KeeperRecord>> {
        self.bulk_writes.lock().unwrap().clone()
    }

    /// Point balance credited to `address`.
    pub fn points(&self, address: &KeeperAddress) -> u64 {
        self.points.lock().unwrap().get(address).copied().unwrap_or(0)
    }

    /// Number of keepers with a non-zero point balance.
    pub fn rewarded_count(&self) -> usize {
        self.points.lock().unwrap().values().filter(|p| **p > 0).count()
    }

    /// Total write calls made, including failed ones.
    pub fn write_attempts(&self) -> u32 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    fn check_write(&self, address: Option<&KeeperAddress>) -> Result<(), StoreError> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(address) = address {
            if self.failing_keepers.lock().unwrap().contains(address) {
                return Err(StoreError::Backend(format!("write rejected for {address}")));
            }
        }
        let remaining = self.fail_next_writes.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.fail_next_writes.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(StoreError::Backend("injected write failure".into()));
        }
        Ok(())
    }
}

impl Default for NullKeeperRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeeperRepository for NullKeeperRepository {
    async fn get_verified_keepers(&self) -> Result<Vec<KeeperRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected read failure".into()));
        }
        Ok(self.verified.lock().unwrap().clone())
    }

    async fn update_keeper_status(&self, update: &KeeperStatusUpdate) -> Result<(), StoreError> {
        self.check_write(Some(&update.address))?;
        self.status_writes.lock().unwrap().push(update.clone());
        Ok(())
    }

    async fn add_keeper_points(
        &self,
        address: &KeeperAddress,
        points: u64,
    ) -> Result<(), StoreError> {
        self.check_write(Some(address))?;
        *self.points.lock().unwrap().entry(address.clone()).or_insert(0) += points;
        Ok(())
    }

    async fn update_all_keepers_status(&self, records: &[KeeperRecord]) -> Result<(), StoreError> {
        self.check_write(None)?;
        self.bulk_writes.lock().unwrap().push(records.to_vec());
        Ok(())
    }
}

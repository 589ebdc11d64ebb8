//! Nullable uptime cache — in-memory counters and rewards markers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keeper_store::{StoreError, UptimeCache};
use keeper_types::KeeperAddress;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// An in-memory uptime cache for testing.
pub struct NullUptimeCache {
    uptimes: Mutex<HashMap<KeeperAddress, u64>>,
    last_distribution: Mutex<Option<DateTime<Utc>>>,
    period_start: Mutex<Option<DateTime<Utc>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reset_calls: AtomicU32,
}

impl NullUptimeCache {
    pub fn new() -> Self {
        Self {
            uptimes: Mutex::new(HashMap::new()),
            last_distribution: Mutex::new(None),
            period_start: Mutex::new(None),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reset_calls: AtomicU32::new(0),
        }
    }

    /// Seed a keeper's daily uptime directly.
    pub fn set_uptime(&self, address: &KeeperAddress, seconds: u64) {
        self.uptimes.lock().unwrap().insert(address.clone(), seconds);
    }

    /// Seed the last-distribution marker directly.
    pub fn set_last_distribution(&self, at: Option<DateTime<Utc>>) {
        *self.last_distribution.lock().unwrap() = at;
    }

    /// Seed the period-start marker directly.
    pub fn set_period_start(&self, at: Option<DateTime<Utc>>) {
        *self.period_start.lock().unwrap() = at;
    }

    /// Make every read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all counters.
    pub fn uptimes(&self) -> HashMap<KeeperAddress, u64> {
        self.uptimes.lock().unwrap().clone()
    }

    /// Number of times counters were reset.
    pub fn reset_calls(&self) -> u32 {
        self.reset_calls.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected cache read failure".into()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected cache write failure".into()));
        }
        Ok(())
    }
}

impl Default for NullUptimeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UptimeCache for NullUptimeCache {
    async fn increment_daily_uptime(
        &self,
        address: &KeeperAddress,
        seconds: u64,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        *self
            .uptimes
            .lock()
            .unwrap()
            .entry(address.clone())
            .or_insert(0) += seconds;
        Ok(())
    }

    async fn get_daily_uptime(&self, address: &KeeperAddress) -> Result<u64, StoreError> {
        self.check_read()?;
        Ok(self.uptimes.lock().unwrap().get(address).copied().unwrap_or(0))
    }

    async fn get_all_daily_uptimes(&self) -> Result<HashMap<KeeperAddress, u64>, StoreError> {
        self.check_read()?;
        Ok(self.uptimes.lock().unwrap().clone())
    }

    async fn reset_all_daily_uptimes(&self) -> Result<(), StoreError> {
        self.check_write()?;
        self.reset_calls.fetch_add(1, Ordering::SeqCst);
        for value in self.uptimes.lock().unwrap().values_mut() {
            *value = 0;
        }
        Ok(())
    }

    async fn get_last_rewards_distribution(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.check_read()?;
        Ok(*self.last_distribution.lock().unwrap())
    }

    async fn set_last_rewards_distribution(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_write()?;
        *self.last_distribution.lock().unwrap() = Some(at);
        Ok(())
    }

    async fn get_current_period_start(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.check_read()?;
        Ok(*self.period_start.lock().unwrap())
    }

    async fn set_current_period_start(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.check_write()?;
        *self.period_start.lock().unwrap() = Some(at);
        Ok(())
    }
}

//! Keeper registry — the authoritative in-memory view of keeper liveness.
//!
//! One `tokio::sync::RwLock` guards the whole map for the life of the
//! process. Readers take the shared lock; check-ins, the inactivity sweep,
//! loads and the shutdown dump take the exclusive lock. No lock is ever held
//! across a store call: every mutation is applied in memory first and then
//! written through with [`retry_with_backoff`] after the guard is dropped.
//! The in-memory state is never rolled back when a write-through fails.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::Instrument;

use keeper_store::KeeperRepository;
use keeper_types::{CheckIn, Clock, KeeperAddress, KeeperRecord};
use keeper_utils::retry_with_backoff;

use crate::metrics::EngineMetrics;
use crate::tracing_spans::dump_span;
use crate::EngineError;

/// `(total, active)` keeper counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeeperCounts {
    pub total: usize,
    pub active: usize,
}

/// A check-in applied in memory, with the keeper's state just before it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedCheckIn {
    pub record: KeeperRecord,
    pub was_active: bool,
    pub previous_check_in: Option<DateTime<Utc>>,
}

/// Outcome of [`KeeperRegistry::dump_state`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DumpReport {
    /// Keepers that were active and have been flipped inactive in memory.
    pub deactivated: usize,
    /// Keepers whose inactive status reached the store.
    pub persisted: usize,
    pub failed: Vec<KeeperAddress>,
}

pub struct KeeperRegistry {
    keepers: RwLock<HashMap<KeeperAddress, KeeperRecord>>,
    repository: Arc<dyn KeeperRepository>,
    clock: Arc<dyn Clock>,
    metrics: Arc<EngineMetrics>,
    max_retries: u32,
}

impl KeeperRegistry {
    /// Create an empty registry. Call [`load_verified_keepers`](Self::load_verified_keepers)
    /// before accepting check-ins.
    pub fn new(
        repository: Arc<dyn KeeperRepository>,
        clock: Arc<dyn Clock>,
        metrics: Arc<EngineMetrics>,
        max_retries: u32,
    ) -> Self {
        Self {
            keepers: RwLock::new(HashMap::new()),
            repository,
            clock,
            metrics,
            max_retries,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Replace the in-memory set with the store's verified keepers.
    ///
    /// This is a full resync: keepers missing from the store disappear and
    /// every loaded record starts inactive.
    pub async fn load_verified_keepers(&self) -> Result<usize, EngineError> {
        let records = self
            .repository
            .get_verified_keepers()
            .await
            .map_err(EngineError::StoreRead)?;

        let mut fresh = HashMap::with_capacity(records.len());
        for mut record in records {
            record.is_active = false;
            fresh.insert(record.address.clone(), record);
        }
        let count = fresh.len();

        *self.keepers.write().await = fresh;
        self.metrics.set_keeper_counts(count, 0);
        tracing::info!(count, "loaded verified keepers");
        Ok(count)
    }

    /// Record an accepted check-in and write it through to the store.
    ///
    /// The in-memory record is updated before the write-through, so on
    /// `Err(StoreWrite)` the keeper is nevertheless already active.
    pub async fn update_keeper_health(
        &self,
        check_in: &CheckIn,
    ) -> Result<KeeperRecord, EngineError> {
        let applied = self.apply_check_in(check_in).await?;
        self.persist_status(&applied.record).await?;
        Ok(applied.record)
    }

    /// Apply a check-in in memory only, returning the keeper's state from
    /// just before it. Both are read under the same exclusive lock, so
    /// concurrent check-ins from one keeper each see a distinct predecessor.
    pub async fn apply_check_in(&self, check_in: &CheckIn) -> Result<AppliedCheckIn, EngineError> {
        let address = KeeperAddress::parse(&check_in.keeper_address)?;
        let now = self.clock.now();

        let applied = {
            let mut keepers = self.keepers.write().await;
            let Some(record) = keepers.get_mut(&address) else {
                self.metrics.checkins_rejected.inc();
                tracing::warn!(keeper = %address, "check-in from unverified keeper");
                return Err(EngineError::KeeperNotVerified(address.to_string()));
            };
            let was_active = record.is_active;
            let previous_check_in = record.last_checked_in;
            if !was_active {
                self.metrics.active_keeper_count.inc();
                tracing::info!(
                    keeper = %address,
                    version = %check_in.version,
                    "keeper is now active"
                );
            }
            record.apply_check_in(check_in, now);
            AppliedCheckIn {
                record: record.clone(),
                was_active,
                previous_check_in,
            }
        };
        self.metrics.checkins.inc();
        Ok(applied)
    }

    /// Write one record's current status to the store with retry.
    pub async fn persist_status(&self, record: &KeeperRecord) -> Result<(), EngineError> {
        let update = record.status_update(self.clock.now());
        let repository = &self.repository;
        retry_with_backoff(self.max_retries, || repository.update_keeper_status(&update))
            .await
            .map_err(|e| {
                self.metrics.store_write_failures.inc();
                tracing::warn!(
                    keeper = %record.address,
                    is_active = record.is_active,
                    error = %e,
                    "status write-through failed"
                );
                EngineError::from(e)
            })
    }

    /// Unknown keepers are reported inactive.
    pub async fn is_keeper_active(&self, address: &KeeperAddress) -> bool {
        self.keepers
            .read()
            .await
            .get(address)
            .map(|r| r.is_active)
            .unwrap_or(false)
    }

    /// Addresses of every active keeper, sorted.
    pub async fn get_all_active_keepers(&self) -> Vec<KeeperAddress> {
        let mut active: Vec<KeeperAddress> = self
            .keepers
            .read()
            .await
            .values()
            .filter(|r| r.is_active)
            .map(|r| r.address.clone())
            .collect();
        active.sort();
        active
    }

    pub async fn get_keeper_count(&self) -> KeeperCounts {
        let keepers = self.keepers.read().await;
        KeeperCounts {
            total: keepers.len(),
            active: keepers.values().filter(|r| r.is_active).count(),
        }
    }

    /// Snapshot of every record, sorted by address.
    pub async fn get_detailed_keeper_info(&self) -> Vec<KeeperRecord> {
        let mut records: Vec<KeeperRecord> = self.keepers.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.address.cmp(&b.address));
        records
    }

    pub async fn get_keeper(&self, address: &KeeperAddress) -> Option<KeeperRecord> {
        self.keepers.read().await.get(address).cloned()
    }

    /// Flip every active keeper silent for longer than `threshold_secs` to
    /// inactive and return the demoted records. Pure in-memory work under
    /// the exclusive lock; the caller persists the result.
    pub async fn demote_stale(&self, threshold_secs: u64) -> Vec<KeeperRecord> {
        let now = self.clock.now();
        let mut demoted = Vec::new();
        {
            let mut keepers = self.keepers.write().await;
            for record in keepers.values_mut() {
                if record.has_timed_out(now, threshold_secs) {
                    record.is_active = false;
                    demoted.push(record.clone());
                }
            }
        }
        if !demoted.is_empty() {
            self.metrics.timeouts.inc_by(demoted.len() as u64);
            self.metrics.active_keeper_count.sub(demoted.len() as i64);
        }
        demoted
    }

    /// Shutdown path: mark every active keeper inactive in memory, then
    /// write each one through individually. Per-keeper failures are logged
    /// and skipped.
    pub async fn dump_state(&self) -> DumpReport {
        let deactivated: Vec<KeeperRecord> = {
            let mut keepers = self.keepers.write().await;
            keepers
                .values_mut()
                .filter(|r| r.is_active)
                .map(|r| {
                    r.is_active = false;
                    r.clone()
                })
                .collect()
        };
        self.metrics.active_keeper_count.set(0);

        let mut report = DumpReport {
            deactivated: deactivated.len(),
            ..DumpReport::default()
        };
        async {
            for record in &deactivated {
                match self.persist_status(record).await {
                    Ok(()) => report.persisted += 1,
                    Err(_) => report.failed.push(record.address.clone()),
                }
            }
        }
        .instrument(dump_span(deactivated.len()))
        .await;

        tracing::info!(
            deactivated = report.deactivated,
            persisted = report.persisted,
            failed = report.failed.len(),
            "registry state dumped"
        );
        report
    }

    /// Push a snapshot of every record to the store in one bulk call.
    pub async fn flush_snapshot(&self) -> Result<usize, EngineError> {
        let records = self.get_detailed_keeper_info().await;
        let repository = &self.repository;
        retry_with_backoff(self.max_retries, || {
            repository.update_all_keepers_status(&records)
        })
        .await
        .map_err(|e| {
            self.metrics.store_write_failures.inc();
            tracing::error!(count = records.len(), error = %e, "bulk snapshot flush failed");
            EngineError::from(e)
        })?;
        Ok(records.len())
    }
}

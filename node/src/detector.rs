//! Inactivity detector — periodic sweep that demotes silent keepers.
//!
//! Each tick runs in two phases: demote under the registry's exclusive lock
//! (in-memory only), then persist every demoted keeper with retry after the
//! lock is released.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use keeper_types::KeeperAddress;

use crate::alerts::OfflineAlerter;
use crate::config::EngineConfig;
use crate::registry::KeeperRegistry;
use crate::tracing_spans::sweep_span;

/// Result of one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub demoted: Vec<KeeperAddress>,
    pub persist_failures: usize,
}

pub struct InactivityDetector {
    registry: Arc<KeeperRegistry>,
    threshold_secs: u64,
    interval: Duration,
    alerter: Option<Arc<OfflineAlerter>>,
}

impl InactivityDetector {
    pub fn new(registry: Arc<KeeperRegistry>, threshold_secs: u64, interval: Duration) -> Self {
        Self {
            registry,
            threshold_secs,
            interval,
            alerter: None,
        }
    }

    pub fn from_config(registry: Arc<KeeperRegistry>, config: &EngineConfig) -> Self {
        Self::new(
            registry,
            config.inactivity_threshold_secs,
            config.sweep_interval(),
        )
    }

    /// Alert on every keeper this detector demotes.
    pub fn with_alerter(mut self, alerter: Arc<OfflineAlerter>) -> Self {
        self.alerter = Some(alerter);
        self
    }

    /// Run a single sweep.
    pub async fn sweep(&self) -> SweepReport {
        async {
            let demoted = self.registry.demote_stale(self.threshold_secs).await;
            let mut report = SweepReport::default();
            if demoted.is_empty() {
                return report;
            }

            for record in &demoted {
                tracing::info!(
                    keeper = %record.address,
                    last_checked_in = ?record.last_checked_in,
                    "keeper timed out, marking inactive"
                );
                if self.registry.persist_status(record).await.is_err() {
                    report.persist_failures += 1;
                }
                report.demoted.push(record.address.clone());
            }

            if let Some(alerter) = &self.alerter {
                alerter.notify_offline(&demoted, self.registry.clock().now());
            }
            report
        }
        .instrument(sweep_span())
        .await
    }

    /// Run sweeps on a fixed cadence until `shutdown` fires.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                interval_secs = self.interval.as_secs(),
                threshold_secs = self.threshold_secs,
                "inactivity detector started"
            );
            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        tracing::info!("inactivity detector stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }
        })
    }
}

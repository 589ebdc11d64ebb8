//! Rewards engine — daily scheduler, distribution, catch-up and health.
//!
//! Distribution order is fixed: read every counter, credit points, write
//! the period markers, and only then reset the counters. A failed read
//! aborts the run before anything is reset.
//!
//! Missed distributions found at startup are logged but never paid out:
//! per-keeper uptime for a closed period is not retained.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use keeper_store::{KeeperRepository, UptimeCache};
use keeper_types::{Clock, KeeperAddress};
use keeper_utils::{format_duration, retry_with_backoff, to_std_duration};

use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;
use crate::rewards::schedule::DistributionSchedule;
use crate::rewards::tiers::{calculate_reward_points, RewardTier};
use crate::tracing_spans::distribution_span;
use crate::EngineError;

/// Missed distributions are logged one by one up to this many.
const MAX_LOGGED_MISSES: usize = 30;

/// Result of one distribution run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DistributionSummary {
    pub distributed_at: DateTime<Utc>,
    pub period_start: DateTime<Utc>,
    pub keepers_seen: usize,
    pub keepers_rewarded: usize,
    pub total_points: u64,
    pub failed: Vec<KeeperAddress>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardsStatus {
    Running,
    /// The last-distribution marker could not be read.
    Degraded,
    /// The last distribution is older than the overdue threshold.
    Overdue,
}

impl RewardsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::Overdue => "overdue",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RewardsHealth {
    pub status: RewardsStatus,
    pub last_distribution: Option<DateTime<Utc>>,
    pub period_start: Option<DateTime<Utc>>,
    pub next_distribution: DateTime<Utc>,
    pub hours_since_last: Option<f64>,
}

pub struct RewardsEngine {
    repository: Arc<dyn KeeperRepository>,
    cache: Arc<dyn UptimeCache>,
    clock: Arc<dyn Clock>,
    metrics: Arc<EngineMetrics>,
    schedule: DistributionSchedule,
    guard: Duration,
    overdue_after: chrono::Duration,
    max_retries: u32,
}

impl RewardsEngine {
    pub fn new(
        repository: Arc<dyn KeeperRepository>,
        cache: Arc<dyn UptimeCache>,
        clock: Arc<dyn Clock>,
        metrics: Arc<EngineMetrics>,
        schedule: DistributionSchedule,
    ) -> Self {
        Self {
            repository,
            cache,
            clock,
            metrics,
            schedule,
            guard: Duration::from_secs(60),
            overdue_after: chrono::Duration::hours(25),
            max_retries: 3,
        }
    }

    pub fn from_config(
        repository: Arc<dyn KeeperRepository>,
        cache: Arc<dyn UptimeCache>,
        clock: Arc<dyn Clock>,
        metrics: Arc<EngineMetrics>,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        let schedule = DistributionSchedule::new(config.distribution_time()?);
        Ok(Self::new(repository, cache, clock, metrics, schedule)
            .with_guard(config.distribution_guard())
            .with_overdue_after(chrono::Duration::seconds(config.overdue_after_secs as i64))
            .with_max_retries(config.max_retries))
    }

    pub fn with_guard(mut self, guard: Duration) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_overdue_after(mut self, overdue_after: chrono::Duration) -> Self {
        self.overdue_after = overdue_after;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn schedule(&self) -> DistributionSchedule {
        self.schedule
    }

    /// Make sure a period start is recorded, initializing it to the most
    /// recent distribution instant if the cache has none.
    pub async fn initialize_period(&self) -> Result<DateTime<Utc>, EngineError> {
        if let Some(start) = self
            .cache
            .get_current_period_start()
            .await
            .map_err(EngineError::StoreRead)?
        {
            tracing::info!(period_start = %start, "resuming rewards period");
            return Ok(start);
        }

        let start = self.schedule.period_start_for(self.clock.now());
        let cache = &self.cache;
        retry_with_backoff(self.max_retries, || cache.set_current_period_start(start)).await?;
        tracing::info!(period_start = %start, "initialized rewards period");
        Ok(start)
    }

    /// Report distribution instants that elapsed since the last recorded
    /// distribution. Nothing is paid retroactively.
    pub async fn catch_up(&self) -> Result<Vec<DateTime<Utc>>, EngineError> {
        let Some(last) = self
            .cache
            .get_last_rewards_distribution()
            .await
            .map_err(EngineError::StoreRead)?
        else {
            tracing::info!("no previous rewards distribution recorded");
            return Ok(Vec::new());
        };

        let missed = self.schedule.missed_since(last, self.clock.now());
        for at in missed.iter().take(MAX_LOGGED_MISSES) {
            tracing::warn!(
                scheduled_for = %at,
                last_distribution = %last,
                "missed rewards distribution; uptime for that period is not recoverable"
            );
        }
        if missed.len() > MAX_LOGGED_MISSES {
            tracing::warn!(
                missed = missed.len(),
                "further missed distributions not listed individually"
            );
        }
        Ok(missed)
    }

    /// Pay out the current period and start the next one.
    ///
    /// A run up to one guard interval ahead of a distribution instant
    /// counts as that instant's run.
    pub async fn distribute_rewards(&self) -> Result<DistributionSummary, EngineError> {
        let lead =
            chrono::Duration::from_std(self.guard).unwrap_or_else(|_| chrono::Duration::zero());
        let scheduled = self.schedule.period_start_for(self.clock.now() + lead);
        self.distribute_for(scheduled).await
    }

    /// Pay out the period closed by the distribution instant `scheduled`.
    ///
    /// `scheduled` becomes the new period start and the last-distribution
    /// marker is never stamped earlier than it, so catch-up cannot report
    /// this run as missed.
    pub async fn distribute_for(
        &self,
        scheduled: DateTime<Utc>,
    ) -> Result<DistributionSummary, EngineError> {
        let started = Instant::now();
        let now = self.clock.now();
        let period_start = scheduled;
        let marker = now.max(scheduled);

        let summary = async {
            let mut uptimes: Vec<(KeeperAddress, u64)> = self
                .cache
                .get_all_daily_uptimes()
                .await
                .map_err(EngineError::StoreRead)?
                .into_iter()
                .collect();
            uptimes.sort();

            let mut summary = DistributionSummary {
                distributed_at: now,
                period_start,
                keepers_seen: uptimes.len(),
                keepers_rewarded: 0,
                total_points: 0,
                failed: Vec::new(),
            };

            for (address, uptime) in &uptimes {
                let points = calculate_reward_points(*uptime);
                if points == 0 {
                    continue;
                }
                // Single attempt: a timed-out add may have landed, and a
                // retry could credit the keeper twice.
                match self.repository.add_keeper_points(address, points).await {
                    Ok(()) => {
                        summary.keepers_rewarded += 1;
                        summary.total_points += points;
                        tracing::debug!(
                            keeper = %address,
                            uptime = %format_duration(*uptime),
                            tier = RewardTier::for_uptime(*uptime).as_str(),
                            points,
                            "reward points credited"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            keeper = %address,
                            points,
                            error = %e,
                            "failed to credit reward points"
                        );
                        summary.failed.push(address.clone());
                    }
                }
            }

            let cache = &self.cache;
            if let Err(e) =
                retry_with_backoff(self.max_retries, || cache.set_last_rewards_distribution(marker))
                    .await
            {
                tracing::error!(error = %e, "failed to record last distribution time");
            }
            if let Err(e) =
                retry_with_backoff(self.max_retries, || cache.set_current_period_start(period_start))
                    .await
            {
                tracing::error!(error = %e, "failed to advance rewards period");
            }
            retry_with_backoff(self.max_retries, || cache.reset_all_daily_uptimes()).await?;

            Ok::<_, EngineError>(summary)
        }
        .instrument(distribution_span(&period_start.to_rfc3339()))
        .await?;

        self.metrics.reward_distributions.inc();
        self.metrics.reward_points_awarded.inc_by(summary.total_points);
        self.metrics
            .distribution_duration_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            keepers = summary.keepers_seen,
            rewarded = summary.keepers_rewarded,
            total_points = summary.total_points,
            failed = summary.failed.len(),
            "rewards distributed"
        );
        Ok(summary)
    }

    /// Derived, read-only health of the rewards pipeline.
    pub async fn health(&self) -> RewardsHealth {
        let now = self.clock.now();
        let next_distribution = self.schedule.next_after(now);
        let period_start = self.cache.get_current_period_start().await.ok().flatten();

        match self.cache.get_last_rewards_distribution().await {
            Err(e) => {
                tracing::warn!(error = %e, "cannot read last rewards distribution");
                RewardsHealth {
                    status: RewardsStatus::Degraded,
                    last_distribution: None,
                    period_start,
                    next_distribution,
                    hours_since_last: None,
                }
            }
            Ok(last) => {
                let since = last.map(|t| now - t);
                let status = match since {
                    Some(since) if since > self.overdue_after => RewardsStatus::Overdue,
                    _ => RewardsStatus::Running,
                };
                RewardsHealth {
                    status,
                    last_distribution: last,
                    period_start,
                    next_distribution,
                    hours_since_last: since.map(|d| d.num_seconds() as f64 / 3600.0),
                }
            }
        }
    }

    /// Startup then the daily loop, until `shutdown` fires.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        if let Err(e) = self.initialize_period().await {
            tracing::warn!(error = %e, "could not initialize rewards period");
        }
        if let Err(e) = self.catch_up().await {
            tracing::warn!(error = %e, "rewards catch-up check failed");
        }

        'schedule: loop {
            let next = self.schedule.next_after(self.clock.now());
            tracing::info!(next_distribution = %next, "next rewards distribution scheduled");

            // The sleep runs on the monotonic clock; re-check the wall clock
            // on wake and sleep off any remainder.
            loop {
                let now = self.clock.now();
                if now >= next {
                    break;
                }
                let wait = to_std_duration((next - now).num_milliseconds());
                tracing::debug!(
                    wait = %format_duration(wait.as_secs()),
                    "sleeping until distribution"
                );
                tokio::select! {
                    _ = shutdown.recv() => break 'schedule,
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            if let Err(e) = self.distribute_for(next).await {
                tracing::error!(error = %e, "rewards distribution failed");
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.guard) => {}
            }
        }
        tracing::info!("rewards scheduler stopped");
    }

    pub fn spawn(self: Arc<Self>, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use keeper_nullables::{NullClock, NullKeeperRepository, NullUptimeCache};

    use crate::shutdown::ShutdownController;

    const HOUR: u64 = 3600;

    fn addr(s: &str) -> KeeperAddress {
        KeeperAddress::parse(s).unwrap()
    }

    fn utc(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, h, mi, 0).unwrap()
    }

    struct Fixture {
        repo: Arc<NullKeeperRepository>,
        cache: Arc<NullUptimeCache>,
        clock: Arc<NullClock>,
        engine: Arc<RewardsEngine>,
    }

    fn fixture(now: DateTime<Utc>) -> Fixture {
        let repo = Arc::new(NullKeeperRepository::new());
        let cache = Arc::new(NullUptimeCache::new());
        let clock = Arc::new(NullClock::new(now));
        let engine = Arc::new(RewardsEngine::new(
            repo.clone(),
            cache.clone(),
            clock.clone(),
            Arc::new(EngineMetrics::new()),
            DistributionSchedule::default(),
        ));
        Fixture {
            repo,
            cache,
            clock,
            engine,
        }
    }

    #[tokio::test]
    async fn initialize_period_before_time_of_day_uses_yesterday() {
        let f = fixture(utc(10, 5, 0));
        let start = f.engine.initialize_period().await.unwrap();
        assert_eq!(start, utc(9, 6, 30));
        assert_eq!(
            f.cache.get_current_period_start().await.unwrap(),
            Some(utc(9, 6, 30))
        );
    }

    #[tokio::test]
    async fn initialize_period_keeps_existing_value() {
        let f = fixture(utc(10, 12, 0));
        f.cache.set_period_start(Some(utc(8, 6, 30)));
        assert_eq!(f.engine.initialize_period().await.unwrap(), utc(8, 6, 30));
    }

    #[tokio::test]
    async fn catch_up_reports_missed_without_paying() {
        let f = fixture(utc(10, 12, 0));
        f.cache.set_last_distribution(Some(utc(7, 6, 30)));
        f.cache.set_uptime(&addr("0xa"), 20 * HOUR);

        let missed = f.engine.catch_up().await.unwrap();
        assert_eq!(missed, vec![utc(8, 6, 30), utc(9, 6, 30), utc(10, 6, 30)]);
        assert_eq!(f.repo.points(&addr("0xa")), 0);
        assert_eq!(f.cache.reset_calls(), 0);
    }

    #[tokio::test]
    async fn catch_up_without_history_is_empty() {
        let f = fixture(utc(10, 12, 0));
        assert!(f.engine.catch_up().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn catch_up_read_failure_is_non_fatal_error() {
        let f = fixture(utc(10, 12, 0));
        f.cache.fail_reads(true);
        assert!(matches!(
            f.engine.catch_up().await,
            Err(EngineError::StoreRead(_))
        ));
    }

    #[tokio::test]
    async fn distribution_credits_positive_tiers_and_resets() {
        let f = fixture(utc(10, 6, 30));
        f.cache.set_uptime(&addr("0xidle"), 2 * HOUR);
        f.cache.set_uptime(&addr("0xramp"), 8 * HOUR);
        f.cache.set_uptime(&addr("0xfull"), 23 * HOUR);

        let summary = f.engine.distribute_rewards().await.unwrap();
        assert_eq!(summary.keepers_seen, 3);
        assert_eq!(summary.keepers_rewarded, 2);
        assert_eq!(summary.total_points, 166 + 1000);
        assert_eq!(f.repo.points(&addr("0xramp")), 166);
        assert_eq!(f.repo.points(&addr("0xfull")), 1000);
        assert_eq!(f.repo.points(&addr("0xidle")), 0);
        assert_eq!(f.repo.rewarded_count(), 2);

        assert!(f.cache.uptimes().values().all(|v| *v == 0));
        assert_eq!(
            f.cache.get_last_rewards_distribution().await.unwrap(),
            Some(utc(10, 6, 30))
        );
        assert_eq!(
            f.cache.get_current_period_start().await.unwrap(),
            Some(utc(10, 6, 30))
        );
    }

    #[tokio::test]
    async fn per_keeper_credit_failure_is_isolated() {
        let f = fixture(utc(10, 6, 30));
        f.cache.set_uptime(&addr("0xa"), 12 * HOUR);
        f.cache.set_uptime(&addr("0xb"), 12 * HOUR);
        f.repo.fail_writes_for(&addr("0xa"));

        let summary = f.engine.distribute_rewards().await.unwrap();
        assert_eq!(summary.failed, vec![addr("0xa")]);
        assert_eq!(f.repo.points(&addr("0xb")), 333);
        assert_eq!(f.cache.reset_calls(), 1);
    }

    #[tokio::test]
    async fn read_failure_leaves_counters_untouched() {
        let f = fixture(utc(10, 6, 30));
        f.cache.set_uptime(&addr("0xa"), 12 * HOUR);
        f.cache.fail_reads(true);

        assert!(matches!(
            f.engine.distribute_rewards().await,
            Err(EngineError::StoreRead(_))
        ));
        assert_eq!(f.cache.reset_calls(), 0);
        assert_eq!(f.cache.uptimes()[&addr("0xa")], 12 * HOUR);
    }

    #[tokio::test]
    async fn health_is_running_after_recent_distribution() {
        let f = fixture(utc(10, 12, 0));
        f.cache.set_last_distribution(Some(utc(10, 6, 30)));
        let health = f.engine.health().await;
        assert_eq!(health.status, RewardsStatus::Running);
        assert_eq!(health.next_distribution, utc(11, 6, 30));
        assert_eq!(health.hours_since_last, Some(5.5));
    }

    #[tokio::test]
    async fn health_is_overdue_past_25_hours() {
        let f = fixture(utc(10, 12, 0));
        f.cache.set_last_distribution(Some(utc(9, 11, 0)));
        assert_eq!(f.engine.health().await.status, RewardsStatus::Running);
        f.clock.advance_secs(1);
        assert_eq!(f.engine.health().await.status, RewardsStatus::Overdue);
    }

    #[tokio::test]
    async fn health_is_degraded_when_marker_unreadable() {
        let f = fixture(utc(10, 12, 0));
        f.cache.fail_reads(true);
        let health = f.engine.health().await;
        assert_eq!(health.status, RewardsStatus::Degraded);
        assert_eq!(health.status.as_str(), "degraded");
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_stops_mid_sleep() {
        let f = fixture(utc(10, 7, 0));
        let shutdown = ShutdownController::new();
        let handle = f.engine.clone().spawn(shutdown.subscribe());

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(f.cache.reset_calls(), 0);
        shutdown.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn distribution_just_before_the_instant_closes_that_period() {
        let f = fixture(utc(10, 6, 29) + chrono::Duration::milliseconds(59_999));
        f.cache.set_uptime(&addr("0xa"), 12 * HOUR);

        let summary = f.engine.distribute_rewards().await.unwrap();
        assert_eq!(summary.period_start, utc(10, 6, 30));
        assert_eq!(
            f.cache.get_current_period_start().await.unwrap(),
            Some(utc(10, 6, 30))
        );
        assert_eq!(
            f.cache.get_last_rewards_distribution().await.unwrap(),
            Some(utc(10, 6, 30))
        );

        f.clock.advance_secs(30 * 60);
        assert!(f.engine.catch_up().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn distribute_for_uses_the_scheduled_instant() {
        let f = fixture(utc(10, 6, 20));
        let summary = f.engine.distribute_for(utc(10, 6, 30)).await.unwrap();
        assert_eq!(summary.period_start, utc(10, 6, 30));
        assert_eq!(summary.distributed_at, utc(10, 6, 20));
        assert_eq!(
            f.cache.get_last_rewards_distribution().await.unwrap(),
            Some(utc(10, 6, 30))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_distributes_when_the_instant_arrives() {
        let f = fixture(utc(10, 6, 29));
        f.cache.set_uptime(&addr("0xa"), 21 * HOUR);
        let shutdown = ShutdownController::new();
        let handle = f.engine.clone().spawn(shutdown.subscribe());

        tokio::time::sleep(Duration::from_secs(1)).await;
        f.clock.advance_secs(60);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(f.repo.points(&addr("0xa")), 1000);
        assert_eq!(f.cache.reset_calls(), 1);
        assert_eq!(
            f.cache.get_current_period_start().await.unwrap(),
            Some(utc(10, 6, 30))
        );

        shutdown.shutdown();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_sleeps_off_an_early_wake() {
        let f = fixture(utc(10, 6, 29));
        f.cache.set_uptime(&addr("0xa"), 21 * HOUR);
        let shutdown = ShutdownController::new();
        let handle = f.engine.clone().spawn(shutdown.subscribe());

        // Wall clock lags the monotonic sleep by a millisecond.
        tokio::time::sleep(Duration::from_secs(1)).await;
        f.clock.advance(chrono::Duration::milliseconds(59_999));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(f.cache.reset_calls(), 0);

        f.clock.advance(chrono::Duration::milliseconds(1));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(f.cache.reset_calls(), 1);
        assert_eq!(
            f.cache.get_current_period_start().await.unwrap(),
            Some(utc(10, 6, 30))
        );
        assert_eq!(
            f.cache.get_last_rewards_distribution().await.unwrap(),
            Some(utc(10, 6, 30))
        );

        shutdown.shutdown();
        handle.await.unwrap();
    }
}

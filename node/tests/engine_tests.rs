//! Integration tests wiring registry, check-in service, inactivity detector
//! and rewards engine together against the in-memory backends:
//! check-in → uptime credit → timeout → distribution → shutdown dump.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use keeper_node::{
    CheckInService, DistributionSchedule, EngineConfig, EngineError, EngineMetrics,
    InactivityDetector, KeeperRegistry, OfflineAlerter, PassthroughSealer, RewardsEngine,
    ShutdownController,
};
use keeper_nullables::{NullClock, NullKeeperRepository, NullNotifier, NullUptimeCache};
use keeper_types::{CheckIn, KeeperAddress, KeeperRecord};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Engine {
    repo: Arc<NullKeeperRepository>,
    cache: Arc<NullUptimeCache>,
    clock: Arc<NullClock>,
    registry: Arc<KeeperRegistry>,
    check_ins: Arc<CheckInService>,
    rewards: Arc<RewardsEngine>,
}

fn addr(s: &str) -> KeeperAddress {
    KeeperAddress::parse(s).unwrap()
}

fn keeper_name(i: usize) -> String {
    format!("0xkeeper{i:02}")
}

async fn engine(keepers: usize) -> Engine {
    let config = EngineConfig {
        max_retries: 1,
        ..EngineConfig::default()
    };
    let repo = Arc::new(NullKeeperRepository::with_verified(
        (0..keepers)
            .map(|i| KeeperRecord::new(addr(&keeper_name(i))))
            .collect(),
    ));
    let cache = Arc::new(NullUptimeCache::new());
    let clock = Arc::new(NullClock::new(
        Utc.with_ymd_and_hms(2026, 3, 10, 7, 0, 0).unwrap(),
    ));
    let metrics = Arc::new(EngineMetrics::new());
    let registry = Arc::new(KeeperRegistry::new(
        repo.clone(),
        clock.clone(),
        metrics.clone(),
        config.max_retries,
    ));
    registry.load_verified_keepers().await.unwrap();

    let check_ins = Arc::new(CheckInService::from_config(
        registry.clone(),
        cache.clone(),
        Arc::new(PassthroughSealer),
        &config,
    ));
    let rewards = Arc::new(
        RewardsEngine::from_config(repo.clone(), cache.clone(), clock.clone(), metrics, &config)
            .unwrap(),
    );
    Engine {
        repo,
        cache,
        clock,
        registry,
        check_ins,
        rewards,
    }
}

fn check_in(address: &str) -> CheckIn {
    CheckIn {
        keeper_address: address.to_uppercase().replacen("0X", "0x", 1),
        consensus_address: "0xcons".into(),
        consensus_public_key: "pk".into(),
        version: "0.1.6".into(),
        peer_id: "peer".into(),
        timestamp: Utc::now(),
        is_imua: false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_check_ins_sweeps_and_reads_keep_counts_consistent() {
    let e = engine(16).await;
    let detector = Arc::new(InactivityDetector::new(
        e.registry.clone(),
        70,
        Duration::from_secs(5),
    ));
    let done = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicUsize::new(0));
    let sweeps = Arc::new(AtomicUsize::new(0));

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let service = e.check_ins.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    service.handle(&check_in(&keeper_name(i))).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let sweeper = {
        let (detector, clock, done, sweeps) =
            (detector.clone(), e.clock.clone(), done.clone(), sweeps.clone());
        tokio::spawn(async move {
            loop {
                clock.advance_secs(10);
                detector.sweep().await;
                sweeps.fetch_add(1, Ordering::SeqCst);
                if done.load(Ordering::SeqCst) {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let (registry, done, reads) = (e.registry.clone(), done.clone(), reads.clone());
            tokio::spawn(async move {
                loop {
                    let counts = registry.get_keeper_count().await;
                    assert_eq!(counts.total, 16);
                    assert!(counts.active <= counts.total);
                    assert!(registry.get_all_active_keepers().await.len() <= 16);
                    reads.fetch_add(1, Ordering::SeqCst);
                    if done.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }
    done.store(true, Ordering::SeqCst);
    sweeper.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
    assert!(sweeps.load(Ordering::SeqCst) > 0);
    assert!(reads.load(Ordering::SeqCst) >= 4);

    for i in 0..16 {
        e.check_ins.handle(&check_in(&keeper_name(i))).await.unwrap();
    }
    let counts = e.registry.get_keeper_count().await;
    assert_eq!(counts.total, 16);
    assert_eq!(counts.active, 16);
    assert_eq!(e.registry.get_all_active_keepers().await.len(), 16);
}

#[tokio::test]
async fn unverified_check_in_is_rejected_without_side_effects() {
    let e = engine(2).await;
    let err = e.check_ins.handle(&check_in("0xstranger")).await.unwrap_err();
    assert!(matches!(err, EngineError::KeeperNotVerified(_)));
    assert_eq!(e.registry.get_keeper_count().await.total, 2);
    assert!(e.repo.status_writes().is_empty());
}

#[tokio::test]
async fn silent_keeper_is_demoted_and_alerted() {
    let e = engine(2).await;
    let notifier = Arc::new(NullNotifier::new());
    let alerter = OfflineAlerter::new(notifier.clone(), Some("ops".into()), None);
    let detector = InactivityDetector::new(e.registry.clone(), 70, Duration::from_secs(5))
        .with_alerter(Arc::new(alerter));

    e.check_ins.handle(&check_in(&keeper_name(0))).await.unwrap();
    e.check_ins.handle(&check_in(&keeper_name(1))).await.unwrap();

    e.clock.advance_secs(60);
    e.check_ins.handle(&check_in(&keeper_name(1))).await.unwrap();
    assert!(detector.sweep().await.demoted.is_empty());

    e.clock.advance_secs(11);
    let report = detector.sweep().await;
    assert_eq!(report.demoted, vec![addr(&keeper_name(0))]);
    assert!(!e.registry.is_keeper_active(&addr(&keeper_name(0))).await);
    assert!(e.registry.is_keeper_active(&addr(&keeper_name(1))).await);

    let status = e.repo.last_status(&addr(&keeper_name(0))).unwrap();
    assert!(!status.is_active);

    tokio::task::yield_now().await;
    for _ in 0..10 {
        if !notifier.chats().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(notifier.chats().len(), 1);
}

#[tokio::test]
async fn uptime_flows_into_distribution_and_resets() {
    let e = engine(1).await;
    let keeper = keeper_name(0);

    e.check_ins.handle(&check_in(&keeper)).await.unwrap();
    for _ in 0..(12 * 60) {
        e.clock.advance_secs(60);
        e.check_ins.handle(&check_in(&keeper)).await.unwrap();
    }
    assert_eq!(e.cache.uptimes()[&addr(&keeper)], 12 * 3600);

    let summary = e.rewards.distribute_rewards().await.unwrap();
    assert_eq!(summary.keepers_rewarded, 1);
    assert_eq!(e.repo.points(&addr(&keeper)), 333);
    assert_eq!(e.cache.uptimes()[&addr(&keeper)], 0);

    let health = e.rewards.health().await;
    assert_eq!(health.last_distribution, Some(e.clock_now()));
}

#[tokio::test]
async fn shutdown_dump_leaves_no_active_keepers() {
    let e = engine(4).await;
    for i in 0..4 {
        e.check_ins.handle(&check_in(&keeper_name(i))).await.unwrap();
    }
    assert_eq!(e.registry.get_all_active_keepers().await.len(), 4);

    let report = e.registry.dump_state().await;
    assert_eq!(report.deactivated, 4);
    assert_eq!(report.persisted, 4);
    assert!(e.registry.get_all_active_keepers().await.is_empty());

    assert_eq!(e.registry.flush_snapshot().await.unwrap(), 4);
    let bulk = e.repo.bulk_writes();
    assert_eq!(bulk.len(), 1);
    assert!(bulk[0].iter().all(|r| !r.is_active));
}

#[tokio::test(start_paused = true)]
async fn background_loops_stop_on_shutdown() {
    let e = engine(1).await;
    let shutdown = ShutdownController::new();

    let detector = InactivityDetector::new(e.registry.clone(), 70, Duration::from_secs(5));
    let detector_handle = detector.spawn(shutdown.subscribe());
    let rewards_handle = e.rewards.clone().spawn(shutdown.subscribe());

    tokio::time::sleep(Duration::from_secs(30)).await;
    shutdown.shutdown();

    detector_handle.await.unwrap();
    rewards_handle.await.unwrap();
    assert_eq!(e.cache.reset_calls(), 0);
}

#[test]
fn default_schedule_is_half_past_six() {
    let schedule = DistributionSchedule::default();
    assert_eq!(
        schedule.next_after(Utc.with_ymd_and_hms(2026, 3, 10, 7, 0, 0).unwrap()),
        Utc.with_ymd_and_hms(2026, 3, 11, 6, 30, 0).unwrap()
    );
}

impl Engine {
    fn clock_now(&self) -> chrono::DateTime<Utc> {
        use keeper_types::Clock;
        self.clock.now()
    }
}

// ==============================================
// SCHEDULED PRUNE TESTS (integration)
// ==============================================
//
// Caches wired to a scheduler through `CacheBuilder::prune_every`. The
// deterministic cases use `ManualScheduler` + `ManualClock`; two cases run
// on real worker threads, one of them the process-wide scheduler.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use stashkit::builder::{CacheBuilder, CachePolicy};
use stashkit::clock::ManualClock;
use stashkit::error::ScheduleError;
use stashkit::scheduler::{self, ManualScheduler, PruneScheduler, Scheduler};
use stashkit::traits::Cache;

fn manual_setup() -> (Arc<ManualScheduler>, Arc<ManualClock>, CacheBuilder) {
    let scheduler = Arc::new(ManualScheduler::new());
    let clock = Arc::new(ManualClock::new());
    let builder = CacheBuilder::new(0)
        .timeout(Duration::from_secs(5))
        .clock(clock.clone())
        .prune_every(Duration::from_secs(1))
        .scheduler(scheduler.clone());
    (scheduler, clock, builder)
}

#[test]
fn scheduled_prune_removes_expired_entries() {
    let (scheduler, clock, builder) = manual_setup();
    let cache = builder.timed::<&str, i32>();
    cache.put("a", 1);
    cache.put_with_ttl("b", 2, Duration::from_secs(30));

    clock.advance(Duration::from_secs(6));
    assert_eq!(cache.len(), 2);

    assert_eq!(scheduler.advance(Duration::from_secs(1)), 1);
    assert_eq!(cache.keys(), vec!["b"]);
    assert_eq!(cache.metrics().expirations, 1);
}

#[test]
fn every_policy_accepts_a_schedule() {
    let (scheduler, clock, builder) = manual_setup();
    let caches: Vec<_> = [
        CachePolicy::Fifo,
        CachePolicy::Lru,
        CachePolicy::Lfu,
        CachePolicy::Timed,
        CachePolicy::NoOp,
    ]
    .into_iter()
    .map(|policy| builder.build::<u32, u32>(policy))
    .collect();
    assert_eq!(scheduler.task_count(), caches.len());

    for cache in &caches {
        cache.put(1, 1);
    }
    clock.advance(Duration::from_secs(5));
    scheduler.advance(Duration::from_secs(1));

    for cache in &caches {
        let expected = usize::from(cache.policy() == CachePolicy::NoOp);
        assert_eq!(cache.len(), expected, "{:?}", cache.policy());
    }
}

#[test]
fn dropping_the_cache_cancels_its_task() {
    let (scheduler, _, builder) = manual_setup();
    let cache = builder.lru::<u32, u32>();
    assert_eq!(scheduler.task_count(), 1);

    drop(cache);
    assert_eq!(scheduler.task_count(), 0);
    assert_eq!(scheduler.advance(Duration::from_secs(10)), 0);
}

#[test]
fn cancel_then_reschedule_keeps_one_task() {
    let (scheduler, _, builder) = manual_setup();
    let cache = builder.fifo::<u32, u32>();
    assert!(cache.has_prune_schedule());

    assert!(cache.cancel_prune_schedule());
    assert!(!cache.has_prune_schedule());
    assert_eq!(scheduler.task_count(), 0);

    cache
        .schedule_prune(scheduler.as_ref(), Duration::from_secs(2))
        .unwrap();
    cache
        .schedule_prune(scheduler.as_ref(), Duration::from_secs(3))
        .unwrap();
    assert_eq!(scheduler.task_count(), 1);
}

#[test]
fn weak_cache_schedule_drops_dead_values() {
    let (scheduler, _, builder) = manual_setup();
    let cache = builder.weak::<&str, String>();
    let held = Arc::new("held".to_string());
    cache.put("held", Arc::clone(&held));
    cache.put("dropped", Arc::new("dropped".to_string()));
    assert_eq!(cache.len(), 2);

    scheduler.advance(Duration::from_secs(1));
    assert_eq!(cache.keys(), vec!["held"]);
}

#[test]
fn zero_period_is_a_config_error() {
    let result = CacheBuilder::new(4)
        .prune_every(Duration::ZERO)
        .scheduler(Arc::new(ManualScheduler::new()))
        .try_lru::<u32, u32>();
    assert!(result.is_err());
}

#[test]
fn stopped_scheduler_fails_fallible_build() {
    let scheduler = Arc::new(PruneScheduler::new());
    scheduler.shutdown();

    let result = CacheBuilder::new(4)
        .prune_every(Duration::from_secs(1))
        .scheduler(scheduler.clone())
        .try_fifo::<u32, u32>();
    assert!(result.is_err());

    // The infallible constructor still hands back a working cache.
    let cache = CacheBuilder::new(4)
        .prune_every(Duration::from_secs(1))
        .scheduler(scheduler.clone())
        .fifo::<u32, u32>();
    cache.put(1, 1);
    assert_eq!(cache.get(&1), Some(1));
    assert!(!cache.has_prune_schedule());
}

#[test]
fn prune_worker_shrinks_a_real_cache() {
    let scheduler = Arc::new(PruneScheduler::new());
    let cache = CacheBuilder::new(0)
        .timeout(Duration::from_millis(10))
        .prune_every(Duration::from_millis(5))
        .scheduler(scheduler.clone())
        .timed::<u32, u32>();
    for i in 0..100 {
        cache.put(i, i);
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while cache.len() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.metrics().expirations, 100);

    let pending = scheduler.shutdown_now();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].period, Duration::from_millis(5));
    assert_eq!(
        cache
            .schedule_prune(scheduler.as_ref(), Duration::from_millis(5))
            .unwrap_err(),
        ScheduleError::Shutdown
    );

    scheduler.init().unwrap();
    cache
        .schedule_prune(scheduler.as_ref(), Duration::from_millis(5))
        .unwrap();
    assert_eq!(scheduler.task_count(), 1);
    scheduler.shutdown();
}

// Only test in this binary that touches the process-wide scheduler.
#[test]
fn builder_without_a_scheduler_uses_the_global_one() {
    let before = scheduler::global().task_count();
    let cache = CacheBuilder::new(0)
        .timeout(Duration::from_millis(10))
        .prune_every(Duration::from_millis(5))
        .timed::<u32, u32>();
    assert!(cache.has_prune_schedule());
    assert_eq!(scheduler::global().task_count(), before + 1);

    for i in 0..20 {
        cache.put(i, i);
    }
    let deadline = Instant::now() + Duration::from_secs(5);
    while cache.len() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.metrics().expirations, 20);

    // A run in flight may hold the cache briefly; its drop then cancels.
    drop(cache);
    let deadline = Instant::now() + Duration::from_secs(5);
    while scheduler::global().task_count() > before && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(scheduler::global().task_count(), before);
    assert!(!scheduler::global().is_shutdown());
}

#[test]
fn manual_scheduler_runs_nothing_before_the_first_period() {
    let scheduler = ManualScheduler::new();
    let handle = scheduler
        .schedule(Arc::new(|| {}), Duration::from_secs(1))
        .unwrap();
    assert_eq!(scheduler.advance(Duration::from_millis(999)), 0);
    assert_eq!(scheduler.advance(Duration::from_millis(1)), 1);
    assert!(handle.cancel());
}

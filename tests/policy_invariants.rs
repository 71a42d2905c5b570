// ==============================================
// CROSS-POLICY INVARIANT TESTS (integration)
// ==============================================
//
// Behavior every cache built by `CacheBuilder` must share, plus the
// ordering rules that tell the policies apart.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use proptest::prelude::*;
use stashkit::builder::{CacheBuilder, CachePolicy};
use stashkit::clock::ManualClock;
use stashkit::traits::Cache;

const BOUNDED: [CachePolicy; 3] = [CachePolicy::Fifo, CachePolicy::Lru, CachePolicy::Lfu];

fn recording_listener(
    cache: &impl Cache<&'static str, i32>,
) -> Arc<Mutex<Vec<(&'static str, i32)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    cache.set_listener(Arc::new(move |k: &&'static str, v: &i32| {
        sink.lock().push((*k, *v));
    }));
    seen
}

// ==============================================
// Round trip
// ==============================================

#[test]
fn put_then_get_round_trips_for_every_policy() {
    for policy in [
        CachePolicy::Fifo,
        CachePolicy::Lru,
        CachePolicy::Lfu,
        CachePolicy::Timed,
        CachePolicy::NoOp,
    ] {
        let cache = CacheBuilder::new(0)
            .timeout(Duration::from_secs(60))
            .build::<u32, String>(policy);
        for i in 0..32 {
            cache.put(i, format!("v{i}"));
        }
        for i in 0..32 {
            assert_eq!(cache.get(&i), Some(format!("v{i}")), "{policy:?} lost key {i}");
        }
    }
}

// ==============================================
// Ordering
// ==============================================

#[test]
fn lru_evicts_the_entry_not_reaccessed() {
    let cache = CacheBuilder::new(2).lru::<&str, i32>();
    cache.put("A", 1);
    cache.put("B", 2);
    cache.get(&"A");
    cache.put("C", 3);

    assert!(cache.contains_key(&"A"));
    assert!(!cache.contains_key(&"B"));
    assert!(cache.contains_key(&"C"));
}

#[test]
fn lfu_evicts_the_least_read_entry() {
    let cache = CacheBuilder::new(2).lfu::<&str, i32>();
    cache.put("A", 1);
    cache.put("B", 2);
    for _ in 0..3 {
        cache.get(&"A");
    }
    cache.get(&"B");
    cache.put("C", 3);

    assert!(cache.contains_key(&"A"));
    assert!(!cache.contains_key(&"B"));
    assert!(cache.contains_key(&"C"));
}

#[test]
fn fifo_evicts_oldest_insert_regardless_of_reads() {
    let cache = CacheBuilder::new(2).fifo::<&str, i32>();
    cache.put("A", 1);
    cache.put("B", 2);
    for _ in 0..10 {
        cache.get(&"A");
    }
    cache.put("C", 3);

    assert!(!cache.contains_key(&"A"));
    assert!(cache.contains_key(&"B"));
    assert!(cache.contains_key(&"C"));
}

#[test]
fn lru_victim_is_first_inserted_when_nothing_was_reread() {
    let cache = CacheBuilder::new(3).lru::<&str, i32>();
    let seen = recording_listener(&*cache);
    for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
        cache.put(key, i as i32);
    }
    assert_eq!(*seen.lock(), vec![("a", 0)]);
}

// ==============================================
// NoOp
// ==============================================

#[test]
fn no_op_is_never_full_and_always_returns() {
    let cache = CacheBuilder::new(0).no_op::<u32, u32>();
    for i in 0..1_000 {
        cache.put(i, i * 2);
        assert_eq!(cache.get(&i), Some(i * 2));
        assert!(!cache.is_full());
    }
    assert_eq!(cache.capacity(), 0);
}

// ==============================================
// Expiry and prune
// ==============================================

#[test]
fn entries_expire_after_ttl() {
    let clock = Arc::new(ManualClock::new());
    for policy in [CachePolicy::Fifo, CachePolicy::Lru, CachePolicy::Lfu, CachePolicy::Timed] {
        let cache = CacheBuilder::new(0)
            .clock(clock.clone())
            .build::<&str, i32>(policy);
        cache.put_with_ttl("k", 1, Duration::from_millis(50));
        clock.advance(Duration::from_millis(49));
        assert_eq!(cache.get(&"k"), Some(1), "{policy:?}");
        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get(&"k"), None, "{policy:?}");
    }
}

#[test]
fn prune_twice_removes_nothing_the_second_time() {
    let clock = Arc::new(ManualClock::new());
    let cache = CacheBuilder::new(0)
        .timeout(Duration::from_secs(1))
        .clock(clock.clone())
        .timed::<u32, u32>();
    for i in 0..10 {
        cache.put(i, i);
    }
    clock.advance(Duration::from_secs(1));

    assert_eq!(cache.prune(), 10);
    assert_eq!(cache.prune(), 0);
}

#[test]
fn prune_notifies_each_expired_entry_once() {
    let clock = Arc::new(ManualClock::new());
    let cache = CacheBuilder::new(10)
        .timeout(Duration::from_secs(1))
        .clock(clock.clone())
        .fifo::<&str, i32>();
    let seen = recording_listener(&*cache);

    cache.put("a", 1);
    cache.put("b", 2);
    clock.advance(Duration::from_secs(1));
    cache.prune();
    cache.prune();

    let mut seen = seen.lock().clone();
    seen.sort_unstable();
    assert_eq!(seen, vec![("a", 1), ("b", 2)]);
}

// ==============================================
// Listener
// ==============================================

#[test]
fn listener_fires_once_per_eviction_and_removal() {
    for policy in BOUNDED {
        let cache = CacheBuilder::new(1).build::<&str, i32>(policy);
        let seen = recording_listener(&cache);

        cache.put("x", 1);
        cache.put("y", 2);
        cache.remove(&"y");
        cache.remove(&"y");

        assert_eq!(*seen.lock(), vec![("x", 1), ("y", 2)], "{policy:?}");
    }
}

#[test]
fn throwing_listener_does_not_block_removal() {
    let cache = CacheBuilder::new(1).lru::<&str, i32>();
    cache.set_listener(Arc::new(|_: &&str, _: &i32| panic!("listener failed")));

    cache.put("a", 1);
    cache.put("b", 2);
    assert_eq!(cache.remove(&"b"), Some(2));
    assert!(cache.is_empty());
}

#[test]
fn last_registered_listener_wins() {
    let cache = CacheBuilder::new(1).fifo::<&str, i32>();
    let first = recording_listener(&*cache);
    let second = recording_listener(&*cache);

    cache.put("a", 1);
    cache.put("b", 2);
    assert!(first.lock().is_empty());
    assert_eq!(second.lock().len(), 1);
}

// ==============================================
// Capacity bound (property)
// ==============================================

proptest! {
    /// Property: a bounded cache never holds more than its capacity, and
    /// exactly `capacity` once it has seen that many distinct keys.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_len_within_capacity(
        capacity in 1usize..16,
        ops in prop::collection::vec((0u8..3, 0u32..64), 1..200)
    ) {
        for policy in BOUNDED {
            let cache = CacheBuilder::new(capacity).build::<u32, u32>(policy);
            let mut distinct = std::collections::HashSet::new();
            for &(op, key) in &ops {
                match op {
                    0 | 1 => {
                        cache.put(key, key);
                        distinct.insert(key);
                    },
                    _ => {
                        cache.get(&key);
                    },
                }
                prop_assert!(cache.len() <= capacity);
            }
            prop_assert_eq!(cache.len(), distinct.len().min(capacity));
        }
    }

    /// Property: the most recent put is always readable immediately after.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_latest_put_survives(
        capacity in 1usize..8,
        keys in prop::collection::vec(0u32..32, 1..100)
    ) {
        for policy in BOUNDED {
            let cache = CacheBuilder::new(capacity).build::<u32, u32>(policy);
            for &key in &keys {
                cache.put(key, key + 1);
                prop_assert_eq!(cache.get_with(&key, false), Some(key + 1));
            }
        }
    }

    /// Property: a FIFO cache keeps exactly the last `capacity` distinct
    /// first-inserts when keys are never replaced.
    #[cfg_attr(miri, ignore)]
    #[test]
    fn prop_fifo_keeps_newest_inserts(
        capacity in 1usize..10,
        count in 1u32..50
    ) {
        let cache = CacheBuilder::new(capacity).fifo::<u32, u32>();
        for key in 0..count {
            cache.put(key, key);
        }
        let kept = (count as usize).min(capacity) as u32;
        for key in 0..count {
            prop_assert_eq!(cache.contains_key(&key), key >= count - kept);
        }
    }
}

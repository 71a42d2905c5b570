//! Example walking through every cache policy behind `CacheBuilder`.
//!
//! Run with: cargo run --example basic_policies

use std::sync::Arc;
use std::time::Duration;

use stashkit::builder::{CacheBuilder, CachePolicy};
use stashkit::clock::ManualClock;
use stashkit::scheduler::ManualScheduler;
use stashkit::traits::Cache;

fn main() {
    println!("=== Cache Policy Examples ===\n");

    // Example 1: LRU Cache
    println!("1. LRU Cache");
    let lru = CacheBuilder::new(3).build::<u64, String>(CachePolicy::Lru);

    lru.put(1, "one".to_string());
    lru.put(2, "two".to_string());
    lru.put(3, "three".to_string());

    // Access key 1 to make it most recent
    lru.get(&1);

    // Put key 4, evicts least recent (key 2)
    lru.put(4, "four".to_string());

    println!("   contains 1? {} (was accessed)", lru.contains_key(&1));
    println!("   contains 2? {} (evicted as LRU)", lru.contains_key(&2));
    println!("   contains 4? {} (just inserted)", lru.contains_key(&4));
    println!();

    // Example 2: FIFO Cache
    println!("2. FIFO Cache");
    let fifo = CacheBuilder::new(3).build::<u64, String>(CachePolicy::Fifo);

    fifo.put(1, "one".to_string());
    fifo.put(2, "two".to_string());
    fifo.put(3, "three".to_string());

    // Reads don't affect FIFO order
    fifo.get(&1);

    // Put key 4, evicts oldest (key 1)
    fifo.put(4, "four".to_string());

    println!("   contains 1? {} (evicted as oldest)", fifo.contains_key(&1));
    println!("   contains 2? {} (still present)", fifo.contains_key(&2));
    println!();

    // Example 3: LFU Cache
    println!("3. LFU Cache");
    let lfu = CacheBuilder::new(3).build::<u64, String>(CachePolicy::Lfu);

    lfu.put(1, "one".to_string());
    lfu.put(2, "two".to_string());
    lfu.put(3, "three".to_string());
    for _ in 0..3 {
        lfu.get(&1);
        lfu.get(&3);
    }
    lfu.get(&2);

    // Put key 4, evicts least read (key 2)
    lfu.put(4, "four".to_string());

    println!("   contains 1? {} (read 3 times)", lfu.contains_key(&1));
    println!("   contains 2? {} (read once, evicted)", lfu.contains_key(&2));
    println!();

    // Example 4: Timed Cache with a manual clock and scheduled pruning
    println!("4. Timed Cache");
    let clock = Arc::new(ManualClock::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let timed = CacheBuilder::new(0)
        .timeout(Duration::from_secs(30))
        .clock(clock.clone())
        .prune_every(Duration::from_secs(10))
        .scheduler(scheduler.clone())
        .timed::<&str, u32>();

    timed.put("short", 1);
    timed.put_with_ttl("long", 2, Duration::from_secs(120));
    timed.put_with_ttl("pinned", 3, Duration::ZERO);

    clock.advance(Duration::from_secs(45));
    scheduler.advance(Duration::from_secs(10));

    println!("   after 45s: {:?}", sorted(timed.keys()));
    println!("   expirations: {}", timed.metrics().expirations);
    println!();

    // Example 5: Removal listener
    println!("5. Removal listener");
    let cache = CacheBuilder::new(2).lru::<&str, u32>();
    cache.set_listener(Arc::new(|key: &&str, value: &u32| {
        println!("   removed {key} => {value}");
    }));
    cache.put("a", 1);
    cache.put("b", 2);
    cache.put("c", 3);
    cache.remove(&"b");
    println!();

    // Example 6: NoOp Cache
    println!("6. NoOp Cache");
    let noop = CacheBuilder::new(0).build::<u64, u64>(CachePolicy::NoOp);
    for i in 0..1_000 {
        noop.put(i, i);
    }
    println!("   len: {}, full? {}", noop.len(), noop.is_full());
    println!();

    let metrics = lru.metrics();
    println!(
        "LRU metrics: hits={} misses={} evictions={} hit_rate={:.2}",
        metrics.hits,
        metrics.misses,
        metrics.evictions,
        metrics.hit_rate()
    );
}

fn sorted<T: Ord>(mut keys: Vec<T>) -> Vec<T> {
    keys.sort();
    keys
}

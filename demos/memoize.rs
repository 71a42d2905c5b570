//! Example showing single-flight memoization with `SimpleCache`.
//!
//! Run with: cargo run --example memoize

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use stashkit::metrics::MetricsSnapshotProvider;
use stashkit::simple::SimpleCache;
use stashkit::store::ReferenceStore;

fn expensive_lookup(id: u32, calls: &AtomicUsize) -> String {
    calls.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    format!("record-{id}")
}

fn main() {
    println!("=== Memoization Examples ===\n");

    // Example 1: concurrent callers share one computation
    println!("1. Single flight");
    let cache: Arc<SimpleCache<u32, String>> = Arc::new(SimpleCache::new());
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            thread::spawn(move || cache.get_or_insert_with(42, || expensive_lookup(42, &calls)))
        })
        .collect();
    for handle in handles {
        if let Ok(value) = handle.join() {
            println!("   got {value}");
        }
    }
    println!("   supplier calls: {}", calls.load(Ordering::SeqCst));
    println!();

    // Example 2: failures are not cached
    println!("2. Fallible supplier");
    let ports: SimpleCache<&str, u16> = SimpleCache::new();
    match ports.get_or_try_insert_with("http", || "eighty".parse::<u16>()) {
        Ok(port) => println!("   port {port}"),
        Err(err) => println!("   error: {err}"),
    }
    if let Ok(port) = ports.get_or_try_insert_with("http", || "80".parse::<u16>()) {
        println!("   port {port} (retried and cached)");
    }
    println!();

    // Example 3: revalidation
    println!("3. Validity check");
    let tokens: SimpleCache<&str, (String, u32)> = SimpleCache::new();
    tokens.put("api", ("stale".to_string(), 1));
    let token = tokens.get_valid_or_insert_with("api", |(_, version)| *version >= 2, || {
        ("fresh".to_string(), 2)
    });
    println!("   token: {}", token.0);
    println!();

    // Example 4: weak backing lets values go when callers drop them
    println!("4. Weak backing");
    let weak: SimpleCache<u32, Vec<u8>> = SimpleCache::weak();
    let blob = weak.get_or_insert_with(1, || vec![0; 1024]);
    println!("   cached while held: {}", weak.get(&1).is_some());
    drop(blob);
    println!("   cached after drop: {}", weak.get(&1).is_some());
    println!();

    // Example 5: soft backing keeps the most recently used values
    println!("5. Soft backing");
    let Ok(store) = ReferenceStore::try_soft(2) else {
        return;
    };
    let soft: SimpleCache<u32, u32> = SimpleCache::with_store(store);
    soft.set_purge_listener(Arc::new(|key: &u32| println!("   reclaimed {key}")));
    for i in 0..4 {
        soft.get_or_insert_with(i, || i * 10);
    }
    println!("   retained: {}", soft.len());
    println!();

    let metrics = cache.metrics_snapshot();
    println!("Single-flight metrics: hits={} misses={} inserts={}", metrics.hits, metrics.misses, metrics.inserts);
}

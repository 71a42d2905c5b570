//! Micro-operation benchmarks for the cache policies and `SimpleCache`.
//!
//! Run with: `cargo bench --bench ops`
//!
//! Measures per-operation latency for reads, evicting inserts and a mixed
//! read-mostly workload, every policy under identical conditions.

use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use stashkit::builder::{AnyCache, CacheBuilder, CachePolicy};
use stashkit::simple::SimpleCache;
use stashkit::store::ReferenceStore;
use stashkit::traits::Cache;

const CAPACITY: usize = 4_096;
const OPS: u64 = 50_000;

const POLICIES: [(&str, CachePolicy); 4] = [
    ("fifo", CachePolicy::Fifo),
    ("lru", CachePolicy::Lru),
    ("lfu", CachePolicy::Lfu),
    ("timed", CachePolicy::Timed),
];

fn warm(policy: CachePolicy) -> AnyCache<u64, u64> {
    let cache = CacheBuilder::new(CAPACITY)
        .timeout(Duration::from_secs(3600))
        .build(policy);
    for i in 0..CAPACITY as u64 {
        cache.put(i, i);
    }
    cache
}

// ============================================================================
// Get Hit Latency
// ============================================================================

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit");
    group.throughput(Throughput::Elements(OPS));

    for (name, policy) in POLICIES {
        let cache = warm(policy);
        group.bench_function(name, |b| {
            b.iter(|| {
                for i in 0..OPS {
                    black_box(cache.get(&(i % CAPACITY as u64)));
                }
            })
        });
    }

    // Read without refreshing recency
    let cache = warm(CachePolicy::Lru);
    group.bench_function("lru_peek", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(cache.get_with(&(i % CAPACITY as u64), false));
            }
        })
    });

    group.finish();
}

// ============================================================================
// Insert With Eviction
// ============================================================================

fn bench_insert_evict(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_evict");
    group.throughput(Throughput::Elements(OPS));

    for (name, policy) in POLICIES.into_iter().filter(|(_, p)| p.has_capacity()) {
        group.bench_function(name, |b| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let cache = warm(policy);
                    let start = Instant::now();
                    for i in 0..OPS {
                        let key = CAPACITY as u64 + i;
                        cache.put(key, key);
                    }
                    total += start.elapsed();
                }
                total
            })
        });
    }

    group.finish();
}

// ============================================================================
// Mixed Workload (80% hits, 20% misses causing inserts)
// ============================================================================

fn bench_mixed(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(OPS));

    for (name, policy) in POLICIES {
        group.bench_function(name, |b| {
            b.iter_custom(|iters| {
                let mut total = Duration::ZERO;
                for _ in 0..iters {
                    let cache = warm(policy);
                    let start = Instant::now();
                    for i in 0..OPS {
                        let key = if i % 5 == 0 {
                            CAPACITY as u64 + i
                        } else {
                            i % CAPACITY as u64
                        };
                        if cache.get(&key).is_none() {
                            cache.put(key, key);
                        }
                    }
                    total += start.elapsed();
                }
                total
            })
        });
    }

    group.finish();
}

// ============================================================================
// SimpleCache memoization
// ============================================================================

fn bench_simple(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple");
    group.throughput(Throughput::Elements(OPS));

    let strong: SimpleCache<u64, u64> = SimpleCache::new();
    for i in 0..CAPACITY as u64 {
        strong.put(i, i);
    }
    group.bench_function("strong_get_or_insert_hit", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(strong.get_or_insert_with(i % CAPACITY as u64, || i));
            }
        })
    });

    group.bench_function("soft_get_or_insert", |b| {
        b.iter_custom(|iters| {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let Ok(store) = ReferenceStore::try_soft(CAPACITY) else {
                    return total;
                };
                let cache: SimpleCache<u64, u64> = SimpleCache::with_store(store);
                let start = Instant::now();
                for i in 0..OPS {
                    black_box(cache.get_or_insert_with(i % (2 * CAPACITY as u64), || i));
                }
                total += start.elapsed();
            }
            total
        })
    });

    // Weak backing: values stay alive only while the bench holds them
    let weak: SimpleCache<u64, u64> = SimpleCache::weak();
    let held: Vec<Arc<u64>> = (0..CAPACITY as u64)
        .map(|i| weak.get_or_insert_with(i, || i))
        .collect();
    group.bench_function("weak_get_hit", |b| {
        b.iter(|| {
            for i in 0..OPS {
                black_box(weak.get(&(i % CAPACITY as u64)));
            }
        })
    });
    drop(held);

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_insert_evict, bench_mixed, bench_simple);
criterion_main!(benches);

//! Weak-valued timed cache.
//!
//! [`WeakCache`] is a [`TimedCache`] that holds `Weak<T>` and hands out
//! `Arc<T>`. An entry disappears when its TTL elapses **or** when every
//! outside `Arc` to its value has been dropped, whichever comes first.
//!
//! ```text
//!   put(k, arc)    stores Arc::downgrade(&arc)
//!   get(k)         upgrade ── Some → hit
//!                          └─ None → miss, entry dropped (reclaimed)
//!   prune()        expired entries + dead entries
//! ```
//!
//! The listener only hears about entries whose value is still alive at
//! removal time; a value that is already gone has nothing to report.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::cache::TimedCache;
use crate::clock::SharedClock;
use crate::error::ScheduleError;
use crate::listener::CacheListener;
use crate::metrics::CacheMetricsSnapshot;
use crate::scheduler::Scheduler;
use crate::traits::{Cache, Entries};

/// Timed cache over weakly held values.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use stashkit::traits::Cache;
/// use stashkit::weak::WeakCache;
///
/// let cache: WeakCache<&str, Vec<u8>> = WeakCache::new(Duration::from_secs(60));
/// let blob = Arc::new(vec![1, 2, 3]);
/// cache.put("blob", Arc::clone(&blob));
/// assert!(cache.get(&"blob").is_some());
///
/// drop(blob);
/// assert!(cache.get(&"blob").is_none());
/// ```
pub struct WeakCache<K, T> {
    inner: Arc<TimedCache<K, Weak<T>>>,
}

impl<K, T> WeakCache<K, T>
where
    K: Eq + Hash + Clone,
{
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(TimedCache::new(timeout)),
        }
    }

    pub fn with_clock(timeout: Duration, clock: SharedClock) -> Self {
        Self {
            inner: Arc::new(TimedCache::new(timeout).with_clock(clock)),
        }
    }
}

impl<K, T> WeakCache<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Prunes this cache every `period` on `scheduler`.
    pub fn schedule_prune(&self, scheduler: &dyn Scheduler, period: Duration) -> Result<(), ScheduleError> {
        self.inner.schedule_with(scheduler, period, |inner| {
            prune_inner(inner);
        })
    }

    pub fn cancel_prune_schedule(&self) -> bool {
        self.inner.cancel_prune_schedule()
    }
}

impl<K, T> Cache<K, Arc<T>> for WeakCache<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    fn capacity(&self) -> usize {
        0
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    fn put(&self, key: K, value: Arc<T>) {
        self.inner.put(key, Arc::downgrade(&value));
    }

    fn put_with_ttl(&self, key: K, value: Arc<T>, ttl: Duration) {
        self.inner.put_with_ttl(key, Arc::downgrade(&value), ttl);
    }

    fn get_with(&self, key: &K, update_last_access: bool) -> Option<Arc<T>> {
        self.inner.read_resolved(key, update_last_access, Weak::upgrade)
    }

    fn prune(&self) -> usize {
        prune_inner(&self.inner)
    }

    fn remove(&self, key: &K) -> Option<Arc<T>> {
        self.inner.remove(key).and_then(|value| value.upgrade())
    }

    fn clear(&self) {
        self.inner.clear();
    }

    /// Stored entries, including dead ones not yet pruned.
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.inner
            .peek_with(key, |value| value.strong_count() > 0)
            .unwrap_or(false)
    }

    fn entries(&self) -> Entries<K, Arc<T>> {
        let live: Vec<_> = self
            .inner
            .entries()
            .filter_map(|entry| entry.filter_map_value(|value| value.upgrade()))
            .collect();
        live.into_iter()
    }

    fn set_listener(&self, listener: Arc<dyn CacheListener<K, Arc<T>>>) {
        self.inner.set_listener(Arc::new(move |key: &K, value: &Weak<T>| {
            if let Some(value) = value.upgrade() {
                listener.on_remove(key, &value);
            }
        }));
    }

    fn clear_listener(&self) {
        self.inner.clear_listener();
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.inner.metrics()
    }
}

/// Expired entries first, then entries whose value has been dropped.
fn prune_inner<K, T>(inner: &TimedCache<K, Weak<T>>) -> usize
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    inner.prune() + inner.purge_dead(|value| value.strong_count() > 0)
}

impl<K, T> fmt::Debug for WeakCache<K, T>
where
    K: Eq + Hash + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCache")
            .field("inner", &self.inner)
            .finish()
    }
}

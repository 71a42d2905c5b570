//! # Policy Cache
//!
//! [`PolicyCache`] is the one cache engine behind every eviction policy. The
//! policy only answers "who goes next"; storage, expiry, listener dispatch and
//! statistics live here.
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │ PolicyCache<K, V, P>                                                 │
//!   │                                                                      │
//!   │   inner: RwLock<Inner>                                               │
//!   │     ├── entries: FxHashMap<K, CacheEntry<K, V>>                      │
//!   │     ├── policy:  P                (victim order, see crate::policy)  │
//!   │     ├── seq:     u64              (monotonic insert/access stamp)    │
//!   │     └── custom_ttl: bool          (any entry with its own TTL?)      │
//!   │                                                                      │
//!   │   clock:     Arc<dyn Clock>                                          │
//!   │   listener:  RwLock<Option<Arc<dyn CacheListener>>>                  │
//!   │   counters:  CacheCounters        (atomics, no lock)                 │
//!   │   prune_schedule: Mutex<Option<ScheduleHandle>>                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operation flow
//!
//! ```text
//!   put(k, v)
//!     write lock
//!     ├─ k present?         replace (fresh entry, no listener call)
//!     └─ len >= capacity?   purge expired; still full → evict one victim
//!     insert, release lock
//!     notify listener for everything removed
//!
//!   get_with(k, update = false)            read lock only
//!   get_with(k, update = true)             write lock (touch + policy.on_access)
//!   either path meeting an expired entry   write lock, remove, notify, miss
//! ```
//!
//! Listener calls always happen after the lock is released, so a listener
//! may read or write the same cache.
//!
//! ## Capacity
//!
//! `capacity == 0` means unbounded. Timed and no-op policies are always
//! unbounded and report a capacity of 0.

use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::clock::{self, SharedClock};
use crate::entry::CacheEntry;
use crate::error::ScheduleError;
use crate::listener::{notify_all, CacheListener, RemovalCause, Removed, SharedListener};
use crate::metrics::{CacheCounters, CacheMetricsSnapshot, CoreMetricsRecorder, MetricsSnapshotProvider};
use crate::policy::{
    EvictionPolicy, FifoPolicy, LfuPolicy, LruPolicy, NoOpPolicy, PolicyKind, TimedPolicy,
};
use crate::scheduler::{PruneTask, ScheduleHandle, Scheduler};
use crate::traits::{Cache, Entries};

/// Evicts the entry inserted first.
pub type FifoCache<K, V> = PolicyCache<K, V, FifoPolicy<K>>;
/// Evicts the entry read or written longest ago.
pub type LruCache<K, V> = PolicyCache<K, V, LruPolicy<K>>;
/// Evicts the entry read least often.
pub type LfuCache<K, V> = PolicyCache<K, V, LfuPolicy<K>>;
/// Unbounded; entries leave only by expiring.
pub type TimedCache<K, V> = PolicyCache<K, V, TimedPolicy<K>>;
/// Unbounded and never stale.
pub type NoOpCache<K, V> = PolicyCache<K, V, NoOpPolicy<K>>;

struct Inner<K, V, P> {
    entries: FxHashMap<K, CacheEntry<K, V>>,
    policy: P,
    seq: u64,
    custom_ttl: bool,
}

impl<K, V, P> Inner<K, V, P>
where
    K: Eq + Hash + Clone,
    P: EvictionPolicy<K>,
{
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn take(&mut self, key: &K) -> Option<CacheEntry<K, V>> {
        let entry = self.entries.remove(key)?;
        self.policy.on_remove(key);
        Some(entry)
    }

    /// Nothing can be expired: the policy ignores TTLs, or no entry has its
    /// own TTL and there is no default.
    fn expiry_scan_unneeded(&self, timeout: Duration) -> bool {
        !self.policy.honors_ttl() || (timeout.is_zero() && !self.custom_ttl)
    }

    fn purge_expired(
        &mut self,
        now: std::time::Instant,
        timeout: Duration,
        out: &mut Vec<Removed<K, V>>,
    ) {
        if self.expiry_scan_unneeded(timeout) {
            return;
        }
        let expired: Vec<K> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now, timeout))
            .map(|entry| entry.key().clone())
            .collect();
        for key in expired {
            if let Some(entry) = self.take(&key) {
                let (key, value) = entry.into_parts();
                out.push(Removed::new(key, value, RemovalCause::Expired));
            }
        }
    }

    fn evict_one(&mut self, out: &mut Vec<Removed<K, V>>) -> bool {
        while let Some(victim) = self.policy.pop_victim() {
            if let Some(entry) = self.entries.remove(&victim) {
                let (key, value) = entry.into_parts();
                out.push(Removed::new(key, value, RemovalCause::Evicted));
                return true;
            }
        }
        false
    }
}

/// A thread-safe cache whose eviction order is decided by `P`.
///
/// Usually obtained through [`CacheBuilder`](crate::builder::CacheBuilder);
/// the aliases [`FifoCache`], [`LruCache`], [`LfuCache`], [`TimedCache`] and
/// [`NoOpCache`] also have direct constructors.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stashkit::cache::LfuCache;
/// use stashkit::traits::Cache;
///
/// let cache: LfuCache<&str, u32> = LfuCache::new(2, Duration::ZERO);
/// cache.put("a", 1);
/// cache.put("b", 2);
/// for _ in 0..3 {
///     cache.get(&"a");
/// }
/// cache.get(&"b");
///
/// cache.put("c", 3); // "b" was read less often
/// assert!(cache.contains_key(&"a"));
/// assert!(!cache.contains_key(&"b"));
/// ```
pub struct PolicyCache<K, V, P> {
    inner: RwLock<Inner<K, V, P>>,
    capacity: usize,
    timeout: Duration,
    clock: SharedClock,
    listener: RwLock<Option<SharedListener<K, V>>>,
    counters: CacheCounters,
    prune_schedule: Mutex<Option<ScheduleHandle>>,
}

impl<K, V, P> PolicyCache<K, V, P>
where
    K: Eq + Hash + Clone,
    P: EvictionPolicy<K>,
{
    /// Creates a cache around `policy`. Unbounded policies ignore `capacity`.
    pub fn with_policy(policy: P, capacity: usize, timeout: Duration) -> Self {
        let capacity = if policy.is_bounded() { capacity } else { 0 };
        Self {
            inner: RwLock::new(Inner {
                entries: FxHashMap::default(),
                policy,
                seq: 0,
                custom_ttl: false,
            }),
            capacity,
            timeout,
            clock: clock::system(),
            listener: RwLock::new(None),
            counters: CacheCounters::new(),
            prune_schedule: Mutex::new(None),
        }
    }

    /// Replaces the time source. Meant for construction time.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.inner.read().policy.kind()
    }

    fn bounded(&self) -> bool {
        self.capacity > 0
    }

    fn insert(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = self.clock.now();
        let mut removed = Vec::new();
        {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            if ttl.is_some() {
                inner.custom_ttl = true;
            }

            if inner.take(&key).is_none() && self.bounded() && inner.entries.len() >= self.capacity {
                inner.purge_expired(now, self.timeout, &mut removed);
                if inner.entries.len() >= self.capacity && inner.evict_one(&mut removed) {
                    tracing::debug!(policy = %inner.policy.kind(), capacity = self.capacity, "evicted entry to make room");
                }
            }

            let seq = inner.next_seq();
            let entry = CacheEntry::new(key.clone(), value, now, ttl, seq);
            inner.policy.on_insert(&entry);
            inner.entries.insert(key, entry);
        }
        self.counters.record_insert();
        self.dispatch(removed);
    }

    /// Records removal counters, then runs the listener with no lock held.
    fn dispatch(&self, removed: Vec<Removed<K, V>>) {
        if removed.is_empty() {
            return;
        }
        for entry in &removed {
            self.counters.record_removal(entry.cause);
        }
        let listener = self.listener.read().clone();
        notify_all(listener.as_ref(), removed);
    }

    /// Read path shared with wrappers whose values can die while cached.
    ///
    /// `resolve` turning a live entry into `None` counts as a miss and drops
    /// the entry as reclaimed. Expired entries are dropped as expired.
    pub(crate) fn read_resolved<R, F>(&self, key: &K, update_last_access: bool, resolve: F) -> Option<R>
    where
        F: Fn(&V) -> Option<R>,
    {
        let now = self.clock.now();

        if !update_last_access {
            let (present, resolved) = {
                let inner = self.inner.read();
                let outcome = match inner.entries.get(key) {
                    None => (false, None),
                    Some(entry) if !inner.policy.honors_ttl() || !entry.is_expired(now, self.timeout) => {
                        let resolved = resolve(entry.value());
                        if resolved.is_some() {
                            entry.record_read();
                        }
                        (true, resolved)
                    },
                    Some(_) => (true, None),
                };
                outcome
            };
            if !present {
                self.counters.record_miss();
                return None;
            }
            if resolved.is_some() {
                self.counters.record_hit();
                return resolved;
            }
            // expired or dead; re-checked under the write lock
        }

        let mut removed = Vec::new();
        let found = {
            let mut guard = self.inner.write();
            let inner = &mut *guard;
            let honors_ttl = inner.policy.honors_ttl();
            let expired = match inner.entries.get(key) {
                None => None,
                Some(entry) => Some(honors_ttl && entry.is_expired(now, self.timeout)),
            };
            let resolved = match expired {
                None | Some(true) => None,
                Some(false) => inner.entries.get(key).and_then(|entry| resolve(entry.value())),
            };

            match (expired, resolved) {
                (None, _) => None,
                (Some(expired), None) => {
                    let cause = if expired { RemovalCause::Expired } else { RemovalCause::Reclaimed };
                    if let Some(entry) = inner.take(key) {
                        let (key, value) = entry.into_parts();
                        removed.push(Removed::new(key, value, cause));
                    }
                    None
                },
                (Some(_), Some(resolved)) => {
                    if update_last_access {
                        let seq = inner.next_seq();
                        if let Some(entry) = inner.entries.get_mut(key) {
                            entry.touch(now, seq);
                            inner.policy.on_access(entry);
                        }
                    } else if let Some(entry) = inner.entries.get(key) {
                        entry.record_read();
                    }
                    Some(resolved)
                },
            }
        };

        if found.is_some() {
            self.counters.record_hit();
        } else {
            self.counters.record_miss();
        }
        self.dispatch(removed);
        found
    }

    /// Looks at a live entry without touching bookkeeping or counters.
    pub(crate) fn peek_with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let now = self.clock.now();
        let inner = self.inner.read();
        let entry = inner.entries.get(key)?;
        if inner.policy.honors_ttl() && entry.is_expired(now, self.timeout) {
            return None;
        }
        Some(f(entry.value()))
    }

    /// Drops every entry whose value fails `alive`, as reclaimed.
    pub(crate) fn purge_dead(&self, alive: impl Fn(&V) -> bool) -> usize {
        let mut removed = Vec::new();
        {
            let mut inner = self.inner.write();
            let dead: Vec<K> = inner
                .entries
                .values()
                .filter(|entry| !alive(entry.value()))
                .map(|entry| entry.key().clone())
                .collect();
            for key in dead {
                if let Some(entry) = inner.take(&key) {
                    let (key, value) = entry.into_parts();
                    removed.push(Removed::new(key, value, RemovalCause::Reclaimed));
                }
            }
        }
        let count = removed.len();
        self.dispatch(removed);
        count
    }

    /// Zeroes the hit/miss and removal counters.
    pub fn reset_metrics(&self) {
        self.counters.reset();
    }
}

impl<K, V, P> PolicyCache<K, V, P>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    P: EvictionPolicy<K> + 'static,
{
    /// Prunes this cache every `period` on `scheduler`.
    ///
    /// The task holds only a weak reference, so scheduling never keeps the
    /// cache alive; dropping the cache cancels the task. Scheduling again
    /// replaces the previous schedule.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::time::Duration;
    /// use stashkit::cache::TimedCache;
    /// use stashkit::clock::ManualClock;
    /// use stashkit::scheduler::ManualScheduler;
    /// use stashkit::traits::Cache;
    ///
    /// let clock = Arc::new(ManualClock::new());
    /// let scheduler = ManualScheduler::new();
    /// let cache = Arc::new(TimedCache::new(Duration::from_secs(5)).with_clock(clock.clone()));
    /// cache.schedule_prune(&scheduler, Duration::from_secs(1)).unwrap();
    ///
    /// cache.put("session", 42);
    /// clock.advance(Duration::from_secs(6));
    /// scheduler.advance(Duration::from_secs(1));
    /// assert_eq!(cache.len(), 0);
    /// ```
    pub fn schedule_prune(
        self: &Arc<Self>,
        scheduler: &dyn Scheduler,
        period: Duration,
    ) -> Result<(), ScheduleError> {
        self.schedule_with(scheduler, period, |cache| {
            cache.prune();
        })
    }

    /// Schedules `run` against this cache; the task is a no-op once the
    /// cache is gone.
    pub(crate) fn schedule_with<F>(
        self: &Arc<Self>,
        scheduler: &dyn Scheduler,
        period: Duration,
        run: F,
    ) -> Result<(), ScheduleError>
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        let cache: Weak<Self> = Arc::downgrade(self);
        let task: PruneTask = Arc::new(move || {
            if let Some(cache) = cache.upgrade() {
                run(&cache);
            }
        });
        let handle = scheduler.schedule(task, period)?;
        if let Some(previous) = self.prune_schedule.lock().replace(handle) {
            previous.cancel();
        }
        Ok(())
    }

    /// Stops scheduled pruning. Returns `true` if a schedule was active.
    pub fn cancel_prune_schedule(&self) -> bool {
        self.prune_schedule
            .lock()
            .take()
            .is_some_and(|handle| handle.cancel())
    }

    pub fn has_prune_schedule(&self) -> bool {
        self.prune_schedule.lock().is_some()
    }
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self::with_policy(FifoPolicy::with_capacity(capacity), capacity, timeout)
    }
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self::with_policy(LruPolicy::with_capacity(capacity), capacity, timeout)
    }
}

impl<K, V> LfuCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self::with_policy(LfuPolicy::with_capacity(capacity), capacity, timeout)
    }
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(timeout: Duration) -> Self {
        Self::with_policy(TimedPolicy::new(), 0, timeout)
    }
}

impl<K, V> NoOpCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::with_policy(NoOpPolicy::new(), 0, Duration::ZERO)
    }
}

impl<K, V> Default for NoOpCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, P> Cache<K, V> for PolicyCache<K, V, P>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
    P: EvictionPolicy<K>,
{
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn put(&self, key: K, value: V) {
        self.insert(key, value, None);
    }

    fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.insert(key, value, Some(ttl));
    }

    fn get_with(&self, key: &K, update_last_access: bool) -> Option<V> {
        self.read_resolved(key, update_last_access, |value| Some(value.clone()))
    }

    fn prune(&self) -> usize {
        let now = self.clock.now();
        let mut removed = Vec::new();
        {
            let mut inner = self.inner.write();
            inner.purge_expired(now, self.timeout, &mut removed);
            if self.bounded() {
                while inner.entries.len() > self.capacity {
                    if !inner.evict_one(&mut removed) {
                        break;
                    }
                }
            }
        }
        let count = removed.len();
        tracing::trace!(removed = count, "prune finished");
        self.dispatch(removed);
        count
    }

    fn remove(&self, key: &K) -> Option<V> {
        let entry = self.inner.write().take(key)?;
        let (key, value) = entry.into_parts();
        self.dispatch(vec![Removed::new(key, value.clone(), RemovalCause::Explicit)]);
        Some(value)
    }

    fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.policy.clear();
        inner.custom_ttl = false;
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.now();
        let inner = self.inner.read();
        inner
            .entries
            .get(key)
            .is_some_and(|entry| !inner.policy.honors_ttl() || !entry.is_expired(now, self.timeout))
    }

    fn entries(&self) -> Entries<K, V> {
        let now = self.clock.now();
        let inner = self.inner.read();
        let honors_ttl = inner.policy.honors_ttl();
        let live: Vec<CacheEntry<K, V>> = inner
            .entries
            .values()
            .filter(|entry| !honors_ttl || !entry.is_expired(now, self.timeout))
            .cloned()
            .collect();
        live.into_iter()
    }

    fn set_listener(&self, listener: Arc<dyn CacheListener<K, V>>) {
        *self.listener.write() = Some(listener);
    }

    fn clear_listener(&self) {
        *self.listener.write() = None;
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        self.counters.snapshot(self.len(), self.capacity)
    }
}

impl<K, V, P> MetricsSnapshotProvider for PolicyCache<K, V, P>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
    P: EvictionPolicy<K>,
{
    fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        Cache::metrics(self)
    }
}

impl<K, V, P> Drop for PolicyCache<K, V, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.prune_schedule.get_mut().take() {
            handle.cancel();
        }
    }
}

impl<K, V, P> fmt::Debug for PolicyCache<K, V, P>
where
    K: Eq + Hash + Clone,
    P: EvictionPolicy<K>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("PolicyCache")
            .field("policy", &inner.policy.kind())
            .field("len", &inner.entries.len())
            .field("capacity", &self.capacity)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

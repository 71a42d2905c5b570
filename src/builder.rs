//! Unified cache builder for all eviction policies.
//!
//! One builder carries the shared construction parameters (capacity,
//! default timeout, clock, prune schedule) and produces any cache in the
//! crate, either as its concrete type or policy-erased as [`AnyCache`].
//!
//! ```text
//!   CacheBuilder::new(capacity)
//!       .timeout(d)          default TTL, ZERO = never
//!       .clock(c)            time source (ManualClock in tests)
//!       .prune_every(p)      register prune() on a scheduler
//!       .scheduler(s)        which scheduler; global() when unset
//!
//!       .fifo() .lru() .lfu() .timed() .no_op() .weak()   → Arc<concrete>
//!       .try_*()                                          → Result<_, ConfigError>
//!       .build(CachePolicy)                               → AnyCache
//! ```
//!
//! The `try_*` constructors reject configurations that make no sense
//! (a capacity on a timed, weak or no-op cache, a zero prune period). The
//! infallible ones ignore what does not apply and log a scheduling failure
//! instead of returning it.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use stashkit::builder::{CacheBuilder, CachePolicy};
//! use stashkit::traits::Cache;
//!
//! let cache = CacheBuilder::new(100)
//!     .timeout(Duration::from_secs(60))
//!     .build::<u64, String>(CachePolicy::Lru);
//! cache.put(1, "hello".to_string());
//! assert_eq!(cache.get(&1), Some("hello".to_string()));
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{FifoCache, LfuCache, LruCache, NoOpCache, PolicyCache, TimedCache};
use crate::clock::SharedClock;
use crate::error::{ConfigError, ScheduleError};
use crate::listener::CacheListener;
use crate::metrics::CacheMetricsSnapshot;
use crate::policy::{EvictionPolicy, FifoPolicy, LfuPolicy, LruPolicy, NoOpPolicy, TimedPolicy};
use crate::scheduler::{self, Scheduler};
use crate::traits::{Cache, Entries};
use crate::weak::WeakCache;

/// Available cache eviction policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// First In, First Out eviction.
    Fifo,
    /// Least Recently Used eviction.
    Lru,
    /// Least Frequently Used eviction.
    Lfu,
    /// Expiry only, unbounded.
    Timed,
    /// Stores everything, expires nothing.
    NoOp,
}

impl CachePolicy {
    /// Whether the policy evicts on capacity.
    pub fn has_capacity(self) -> bool {
        matches!(self, CachePolicy::Fifo | CachePolicy::Lru | CachePolicy::Lfu)
    }
}

/// Policy-erased cache produced by [`CacheBuilder::build`].
///
/// Cloning is cheap and shares the underlying cache.
pub enum AnyCache<K, V> {
    Fifo(Arc<FifoCache<K, V>>),
    Lru(Arc<LruCache<K, V>>),
    Lfu(Arc<LfuCache<K, V>>),
    Timed(Arc<TimedCache<K, V>>),
    NoOp(Arc<NoOpCache<K, V>>),
}

macro_rules! dispatch {
    ($self:expr, $cache:ident => $body:expr) => {
        match $self {
            AnyCache::Fifo($cache) => $body,
            AnyCache::Lru($cache) => $body,
            AnyCache::Lfu($cache) => $body,
            AnyCache::Timed($cache) => $body,
            AnyCache::NoOp($cache) => $body,
        }
    };
}

impl<K, V> AnyCache<K, V> {
    pub fn policy(&self) -> CachePolicy {
        match self {
            AnyCache::Fifo(_) => CachePolicy::Fifo,
            AnyCache::Lru(_) => CachePolicy::Lru,
            AnyCache::Lfu(_) => CachePolicy::Lfu,
            AnyCache::Timed(_) => CachePolicy::Timed,
            AnyCache::NoOp(_) => CachePolicy::NoOp,
        }
    }
}

impl<K, V> AnyCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// See [`PolicyCache::schedule_prune`].
    pub fn schedule_prune(&self, scheduler: &dyn Scheduler, period: Duration) -> Result<(), ScheduleError> {
        dispatch!(self, cache => cache.schedule_prune(scheduler, period))
    }

    pub fn cancel_prune_schedule(&self) -> bool {
        dispatch!(self, cache => cache.cancel_prune_schedule())
    }
}

impl<K, V> Clone for AnyCache<K, V> {
    fn clone(&self) -> Self {
        match self {
            AnyCache::Fifo(cache) => AnyCache::Fifo(Arc::clone(cache)),
            AnyCache::Lru(cache) => AnyCache::Lru(Arc::clone(cache)),
            AnyCache::Lfu(cache) => AnyCache::Lfu(Arc::clone(cache)),
            AnyCache::Timed(cache) => AnyCache::Timed(Arc::clone(cache)),
            AnyCache::NoOp(cache) => AnyCache::NoOp(Arc::clone(cache)),
        }
    }
}

impl<K, V> Cache<K, V> for AnyCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn capacity(&self) -> usize {
        dispatch!(self, cache => cache.capacity())
    }

    fn timeout(&self) -> Duration {
        dispatch!(self, cache => cache.timeout())
    }

    fn put(&self, key: K, value: V) {
        dispatch!(self, cache => cache.put(key, value))
    }

    fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        dispatch!(self, cache => cache.put_with_ttl(key, value, ttl))
    }

    fn get_with(&self, key: &K, update_last_access: bool) -> Option<V> {
        dispatch!(self, cache => cache.get_with(key, update_last_access))
    }

    fn prune(&self) -> usize {
        dispatch!(self, cache => cache.prune())
    }

    fn remove(&self, key: &K) -> Option<V> {
        dispatch!(self, cache => cache.remove(key))
    }

    fn clear(&self) {
        dispatch!(self, cache => cache.clear())
    }

    fn len(&self) -> usize {
        dispatch!(self, cache => cache.len())
    }

    fn contains_key(&self, key: &K) -> bool {
        dispatch!(self, cache => cache.contains_key(key))
    }

    fn entries(&self) -> Entries<K, V> {
        dispatch!(self, cache => cache.entries())
    }

    fn set_listener(&self, listener: Arc<dyn CacheListener<K, V>>) {
        dispatch!(self, cache => cache.set_listener(listener))
    }

    fn clear_listener(&self) {
        dispatch!(self, cache => cache.clear_listener())
    }

    fn metrics(&self) -> CacheMetricsSnapshot {
        dispatch!(self, cache => cache.metrics())
    }
}

impl<K, V> fmt::Debug for AnyCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch!(self, cache => fmt::Debug::fmt(cache.as_ref(), f))
    }
}

/// Builder for creating cache instances.
#[derive(Clone, Default)]
pub struct CacheBuilder {
    capacity: usize,
    timeout: Duration,
    clock: Option<SharedClock>,
    prune_every: Option<Duration>,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl CacheBuilder {
    /// Create a new cache builder with the specified capacity (0 = unbounded).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Default TTL for entries stored without one. `Duration::ZERO` (the
    /// default) means entries never expire.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Prunes the built cache every `period`.
    pub fn prune_every(mut self, period: Duration) -> Self {
        self.prune_every = Some(period);
        self
    }

    /// Scheduler for [`prune_every`](Self::prune_every); the process-wide
    /// [`scheduler::global`] when unset.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn fifo<K, V>(&self) -> Arc<FifoCache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.finish(FifoPolicy::with_capacity(self.capacity))
    }

    pub fn lru<K, V>(&self) -> Arc<LruCache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.finish(LruPolicy::with_capacity(self.capacity))
    }

    pub fn lfu<K, V>(&self) -> Arc<LfuCache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.finish(LfuPolicy::with_capacity(self.capacity))
    }

    /// Unbounded timed cache; the builder's capacity is ignored.
    pub fn timed<K, V>(&self) -> Arc<TimedCache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.finish(TimedPolicy::new())
    }

    /// Pass-through cache; capacity and timeout are ignored.
    pub fn no_op<K, V>(&self) -> Arc<NoOpCache<K, V>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.finish(NoOpPolicy::new())
    }

    /// Weak-valued timed cache; the builder's capacity is ignored.
    pub fn weak<K, T>(&self) -> Arc<WeakCache<K, T>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let cache = Arc::new(self.weak_cache());
        if let Err(err) = self.schedule_weak(&cache) {
            tracing::warn!(error = %err, "weak cache built without scheduled pruning");
        }
        cache
    }

    pub fn try_fifo<K, V>(&self) -> Result<Arc<FifoCache<K, V>>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.try_finish(CachePolicy::Fifo, FifoPolicy::with_capacity(self.capacity))
    }

    pub fn try_lru<K, V>(&self) -> Result<Arc<LruCache<K, V>>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.try_finish(CachePolicy::Lru, LruPolicy::with_capacity(self.capacity))
    }

    pub fn try_lfu<K, V>(&self) -> Result<Arc<LfuCache<K, V>>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.try_finish(CachePolicy::Lfu, LfuPolicy::with_capacity(self.capacity))
    }

    pub fn try_timed<K, V>(&self) -> Result<Arc<TimedCache<K, V>>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.try_finish(CachePolicy::Timed, TimedPolicy::new())
    }

    pub fn try_no_op<K, V>(&self) -> Result<Arc<NoOpCache<K, V>>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.try_finish(CachePolicy::NoOp, NoOpPolicy::new())
    }

    pub fn try_weak<K, T>(&self) -> Result<Arc<WeakCache<K, T>>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        if self.capacity != 0 {
            return Err(ConfigError::new(format!(
                "weak caches have no capacity; got {}",
                self.capacity
            )));
        }
        let cache = Arc::new(self.weak_cache());
        self.schedule_weak(&cache)?;
        Ok(cache)
    }

    /// Build a cache with the specified policy.
    ///
    /// # Example
    ///
    /// ```rust
    /// use stashkit::builder::{CacheBuilder, CachePolicy};
    /// use stashkit::traits::Cache;
    ///
    /// let fifo = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Fifo);
    /// assert_eq!(fifo.capacity(), 100);
    ///
    /// // Capacity does not apply to timed caches
    /// let timed = CacheBuilder::new(100).build::<u64, String>(CachePolicy::Timed);
    /// assert_eq!(timed.capacity(), 0);
    /// ```
    pub fn build<K, V>(&self, policy: CachePolicy) -> AnyCache<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        match policy {
            CachePolicy::Fifo => AnyCache::Fifo(self.fifo()),
            CachePolicy::Lru => AnyCache::Lru(self.lru()),
            CachePolicy::Lfu => AnyCache::Lfu(self.lfu()),
            CachePolicy::Timed => AnyCache::Timed(self.timed()),
            CachePolicy::NoOp => AnyCache::NoOp(self.no_op()),
        }
    }

    /// Like [`build`](Self::build), rejecting settings the policy cannot use.
    pub fn try_build<K, V>(&self, policy: CachePolicy) -> Result<AnyCache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        Ok(match policy {
            CachePolicy::Fifo => AnyCache::Fifo(self.try_fifo()?),
            CachePolicy::Lru => AnyCache::Lru(self.try_lru()?),
            CachePolicy::Lfu => AnyCache::Lfu(self.try_lfu()?),
            CachePolicy::Timed => AnyCache::Timed(self.try_timed()?),
            CachePolicy::NoOp => AnyCache::NoOp(self.try_no_op()?),
        })
    }

    fn cache<K, V, P>(&self, policy: P) -> PolicyCache<K, V, P>
    where
        K: Eq + Hash + Clone,
        P: EvictionPolicy<K>,
    {
        let cache = PolicyCache::with_policy(policy, self.capacity, self.timeout);
        match &self.clock {
            Some(clock) => cache.with_clock(Arc::clone(clock)),
            None => cache,
        }
    }

    fn weak_cache<K, T>(&self) -> WeakCache<K, T>
    where
        K: Eq + Hash + Clone,
    {
        match &self.clock {
            Some(clock) => WeakCache::with_clock(self.timeout, Arc::clone(clock)),
            None => WeakCache::new(self.timeout),
        }
    }

    fn finish<K, V, P>(&self, policy: P) -> Arc<PolicyCache<K, V, P>>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        P: EvictionPolicy<K> + 'static,
    {
        let cache = Arc::new(self.cache(policy));
        if let Err(err) = self.schedule(&cache) {
            tracing::warn!(policy = %cache.policy_kind(), error = %err, "cache built without scheduled pruning");
        }
        cache
    }

    fn try_finish<K, V, P>(&self, kind: CachePolicy, policy: P) -> Result<Arc<PolicyCache<K, V, P>>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        P: EvictionPolicy<K> + 'static,
    {
        if !kind.has_capacity() && self.capacity != 0 {
            return Err(ConfigError::new(format!(
                "{kind:?} caches have no capacity; got {}",
                self.capacity
            )));
        }
        let cache = Arc::new(self.cache(policy));
        self.schedule(&cache)?;
        Ok(cache)
    }

    fn schedule<K, V, P>(&self, cache: &Arc<PolicyCache<K, V, P>>) -> Result<(), ScheduleError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        P: EvictionPolicy<K> + 'static,
    {
        let Some(period) = self.prune_every else {
            return Ok(());
        };
        match &self.scheduler {
            Some(scheduler) => cache.schedule_prune(scheduler.as_ref(), period),
            None => cache.schedule_prune(scheduler::global(), period),
        }
    }

    fn schedule_weak<K, T>(&self, cache: &WeakCache<K, T>) -> Result<(), ScheduleError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        T: Send + Sync + 'static,
    {
        let Some(period) = self.prune_every else {
            return Ok(());
        };
        match &self.scheduler {
            Some(scheduler) => cache.schedule_prune(scheduler.as_ref(), period),
            None => cache.schedule_prune(scheduler::global(), period),
        }
    }
}

impl fmt::Debug for CacheBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("capacity", &self.capacity)
            .field("timeout", &self.timeout)
            .field("manual_clock", &self.clock.is_some())
            .field("prune_every", &self.prune_every)
            .finish_non_exhaustive()
    }
}

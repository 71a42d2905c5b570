//! # Single-flight Memoization
//!
//! [`SimpleCache`] memoizes computations by key with no eviction policy of
//! its own. Its one guarantee: concurrent misses for the same key run the
//! supplier **once**; everyone else waits for that result.
//!
//! ```text
//!   get_or_insert_with(k, supplier)
//!
//!   1. read backing               ── hit & valid? ──────────────► return
//!   2. join flight for k
//!        Follower ── wait ── leader's value ────────────────────► return
//!                       └─── leader gave up (error/panic) ──► back to 1
//!        Leader
//!   3.   re-check backing         ── hit & valid? ── complete ──► return
//!   4.   supplier()
//!          Err  → drop guard (followers retry), nothing stored ─► Err
//!          Ok   → store, complete flight ───────────────────────► return
//! ```
//!
//! Flights are per key, so unrelated keys never wait on each other.
//!
//! ## Backing
//!
//! | Constructor       | Backing                                              |
//! |-------------------|------------------------------------------------------|
//! | `new()`           | strong map, entries live until removed               |
//! | `weak()`          | [`ReferenceStore`] weak mode, entries vanish with    |
//! |                   | their last outside `Arc`                             |
//! | `try_soft(n)`     | [`ReferenceStore`] soft mode, LRU beyond `n` entries  |
//!
//! Values are handed out as `Arc<V>`; with weak backing the caller's `Arc`
//! is what keeps an entry alive.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::ds::{FlightTable, Joined};
use crate::error::ConfigError;
use crate::listener::RemovalCause;
use crate::metrics::{CacheCounters, CacheMetricsSnapshot, CoreMetricsRecorder, MetricsSnapshotProvider};
use crate::store::{PurgeListener, ReferenceMode, ReferenceStore};

enum Backing<K, V> {
    Strong(RwLock<FxHashMap<K, Arc<V>>>),
    Reference(ReferenceStore<K, V>),
}

/// Memoizing map with per-key single-flight suppliers.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use stashkit::simple::SimpleCache;
///
/// let calls = AtomicUsize::new(0);
/// let cache: SimpleCache<u64, String> = SimpleCache::new();
///
/// let first = cache.get_or_insert_with(7, || {
///     calls.fetch_add(1, Ordering::SeqCst);
///     "seven".to_string()
/// });
/// let second = cache.get_or_insert_with(7, || unreachable!());
///
/// assert_eq!(*first, "seven");
/// assert!(std::sync::Arc::ptr_eq(&first, &second));
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
pub struct SimpleCache<K, V> {
    backing: Backing<K, V>,
    flights: FlightTable<K, Arc<V>>,
    counters: Arc<CacheCounters>,
}

impl<K, V> SimpleCache<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: 'static,
{
    /// Strongly backed cache.
    pub fn new() -> Self {
        Self::from_backing(Backing::Strong(RwLock::new(FxHashMap::default())))
    }

    /// Weakly backed cache.
    pub fn weak() -> Self {
        Self::with_store(ReferenceStore::weak())
    }

    /// Soft-backed cache holding at most `capacity` entries.
    pub fn try_soft(capacity: usize) -> Result<Self, ConfigError> {
        Ok(Self::with_store(ReferenceStore::try_soft(capacity)?))
    }

    /// Cache over an existing reference store. Entries the store drops on its
    /// own are counted as reclaimed; an existing purge listener is replaced.
    pub fn with_store(store: ReferenceStore<K, V>) -> Self {
        let counters = Arc::new(CacheCounters::new());
        let sink = Arc::clone(&counters);
        store.set_purge_listener(Arc::new(move |_: &K| {
            sink.record_removal(RemovalCause::Reclaimed);
        }));
        Self {
            backing: Backing::Reference(store),
            flights: FlightTable::new(),
            counters,
        }
    }

    fn from_backing(backing: Backing<K, V>) -> Self {
        Self {
            backing,
            flights: FlightTable::new(),
            counters: Arc::new(CacheCounters::new()),
        }
    }

    /// `None` for the strong backing.
    pub fn reference_mode(&self) -> Option<ReferenceMode> {
        match &self.backing {
            Backing::Strong(_) => None,
            Backing::Reference(store) => Some(store.mode()),
        }
    }

    /// Registers a listener for entries the reference store reclaims. Also
    /// keeps the reclaimed counter. Returns `false` for the strong backing,
    /// which never reclaims.
    pub fn set_purge_listener(&self, listener: PurgeListener<K>) -> bool {
        let Backing::Reference(store) = &self.backing else {
            return false;
        };
        let counters = Arc::clone(&self.counters);
        store.set_purge_listener(Arc::new(move |key: &K| {
            counters.record_removal(RemovalCause::Reclaimed);
            listener(key);
        }));
        true
    }

    fn lookup(&self, key: &K) -> Option<Arc<V>> {
        match &self.backing {
            Backing::Strong(map) => map.read().get(key).cloned(),
            Backing::Reference(store) => store.get(key),
        }
    }

    fn store(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        match &self.backing {
            Backing::Strong(map) => map.write().insert(key, value),
            Backing::Reference(store) => store.insert(key, value),
        }
    }

    /// Returns the cached value, if any.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let found = self.lookup(key);
        if found.is_some() {
            self.counters.record_hit();
        } else {
            self.counters.record_miss();
        }
        found
    }

    /// Stores `value`, returning the previous value.
    ///
    /// With weak backing use [`put_arc`](Self::put_arc) and keep the `Arc`:
    /// a value only the cache refers to is gone immediately.
    pub fn put(&self, key: K, value: V) -> Option<Arc<V>> {
        self.put_arc(key, Arc::new(value))
    }

    pub fn put_arc(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.counters.record_insert();
        self.store(key, value)
    }

    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        let removed = match &self.backing {
            Backing::Strong(map) => map.write().remove(key),
            Backing::Reference(store) => store.remove(key),
        };
        if removed.is_some() {
            self.counters.record_removal(RemovalCause::Explicit);
        }
        removed
    }

    pub fn contains_key(&self, key: &K) -> bool {
        match &self.backing {
            Backing::Strong(map) => map.read().contains_key(key),
            Backing::Reference(store) => store.contains_key(key),
        }
    }

    pub fn clear(&self) {
        match &self.backing {
            Backing::Strong(map) => map.write().clear(),
            Backing::Reference(store) => store.clear(),
        }
    }

    /// Stored entries; with weak backing this includes dead slots not yet
    /// swept.
    pub fn len(&self) -> usize {
        match &self.backing {
            Backing::Strong(map) => map.read().len(),
            Backing::Reference(store) => store.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        match &self.backing {
            Backing::Strong(map) => map.read().keys().cloned().collect(),
            Backing::Reference(store) => store.keys(),
        }
    }

    /// Snapshot of the live entries, taken under one lock.
    pub fn iter(&self) -> std::vec::IntoIter<(K, Arc<V>)> {
        let entries: Vec<(K, Arc<V>)> = match &self.backing {
            Backing::Strong(map) => map
                .read()
                .iter()
                .map(|(key, value)| (key.clone(), Arc::clone(value)))
                .collect(),
            Backing::Reference(store) => store.snapshot(),
        };
        entries.into_iter()
    }

    /// Sweeps reclaimed entries from a reference backing. Returns the count.
    pub fn purge(&self) -> usize {
        match &self.backing {
            Backing::Strong(_) => 0,
            Backing::Reference(store) => store.purge(),
        }
    }

    /// Returns the cached value or computes it once across all callers.
    pub fn get_or_insert_with<F>(&self, key: K, supplier: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        match self.resolve(key, None, || Ok::<V, std::convert::Infallible>(supplier())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with), recomputing
    /// when `valid` rejects the cached value.
    pub fn get_valid_or_insert_with<P, F>(&self, key: K, valid: P, supplier: F) -> Arc<V>
    where
        P: Fn(&V) -> bool,
        F: FnOnce() -> V,
    {
        match self.resolve(key, Some(&valid), || Ok::<V, std::convert::Infallible>(supplier())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible supplier. The error goes back to the leader's caller only;
    /// nothing is stored and waiting callers retry.
    ///
    /// ```
    /// use stashkit::simple::SimpleCache;
    ///
    /// let cache: SimpleCache<&str, u32> = SimpleCache::new();
    /// let err = cache.get_or_try_insert_with("port", || "eighty".parse::<u32>());
    /// assert!(err.is_err());
    /// assert!(cache.get(&"port").is_none());
    ///
    /// let port = cache.get_or_try_insert_with("port", || "80".parse::<u32>()).unwrap();
    /// assert_eq!(*port, 80);
    /// ```
    pub fn get_or_try_insert_with<F, E>(&self, key: K, supplier: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.resolve(key, None, supplier)
    }

    fn resolve<F, E>(&self, key: K, valid: Option<&dyn Fn(&V) -> bool>, supplier: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let accepts = |value: &Arc<V>| valid.map_or(true, |valid| valid(value.as_ref()));

        let guard = loop {
            if let Some(value) = self.lookup(&key).filter(|value| accepts(value)) {
                self.counters.record_hit();
                return Ok(value);
            }
            match self.flights.join(&key) {
                Joined::Follower(Some(value)) => {
                    self.counters.record_hit();
                    return Ok(value);
                },
                Joined::Follower(None) => continue,
                Joined::Leader(guard) => break guard,
            }
        };

        if let Some(value) = self.lookup(&key).filter(|value| accepts(value)) {
            self.counters.record_hit();
            guard.complete(Arc::clone(&value));
            return Ok(value);
        }

        self.counters.record_miss();
        let value = Arc::new(supplier()?);
        self.store(key, Arc::clone(&value));
        self.counters.record_insert();
        guard.complete(Arc::clone(&value));
        Ok(value)
    }
}

impl<K, V> Default for SimpleCache<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MetricsSnapshotProvider for SimpleCache<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: 'static,
{
    fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        let capacity = match self.reference_mode() {
            Some(ReferenceMode::Soft { capacity }) => capacity,
            _ => 0,
        };
        self.counters.snapshot(self.len(), capacity)
    }
}

impl<K, V> fmt::Debug for SimpleCache<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleCache")
            .field("backing", &self.reference_mode())
            .field("len", &self.len())
            .field("in_flight", &self.flights.in_flight())
            .finish()
    }
}

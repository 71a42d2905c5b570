//! # Cache Contract
//!
//! [`Cache`] is the capability-polymorphic contract every policy cache in this
//! crate implements: FIFO, LRU, LFU, timed, no-op and the weak-valued cache.
//! Code that only needs "a cache" takes `&dyn Cache<K, V>` or a generic
//! `C: Cache<K, V>` and works with any of them.
//!
//! ```text
//!   ┌───────────────────────────────────────────────────────────────┐
//!   │                        Cache<K, V>                            │
//!   │                                                               │
//!   │  capacity() / timeout()          fixed at construction        │
//!   │  put / put_with_ttl              may evict one victim         │
//!   │  get / get_with(update)          stale entries read as None   │
//!   │  get_or_insert_with(supplier)    compute on miss, store, return│
//!   │  prune() → usize                 drop expired (+ over-capacity)│
//!   │  remove / clear / len / is_full                               │
//!   │  entries() → snapshot iterator                                │
//!   │  set_listener                    single slot, last wins        │
//!   └───────────────────────────────────────────────────────────────┘
//!                  ▲                                ▲
//!                  │                                │
//!        PolicyCache<K, V, P>                 WeakCache<K, T>
//!        P: Fifo | Lru | Lfu | Timed | NoOp   (V = Arc<T>)
//! ```
//!
//! ## Thread Safety
//!
//! Every method takes `&self`. Implementations lock internally, so a cache
//! is shared by wrapping it in an `Arc`, not a `Mutex`.
//!
//! ## Supplier semantics
//!
//! `get_or_insert_with` on a policy cache is *not* single-flight: two threads
//! missing the same key at once may both run their supplier, and the later
//! `put` wins. Use [`SimpleCache`](crate::simple::SimpleCache) when the
//! computation must run once per key.

use std::sync::Arc;
use std::time::Duration;

use crate::entry::CacheEntry;
use crate::listener::CacheListener;
use crate::metrics::CacheMetricsSnapshot;

/// Snapshot iterator over live entries, see [`Cache::entries`].
pub type Entries<K, V> = std::vec::IntoIter<CacheEntry<K, V>>;

/// The cache contract.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use stashkit::builder::CacheBuilder;
/// use stashkit::traits::Cache;
///
/// fn warm<C: Cache<u64, String>>(cache: &C, rows: &[(u64, &str)]) {
///     for (id, name) in rows {
///         cache.put(*id, name.to_string());
///     }
/// }
///
/// let cache = CacheBuilder::new(100)
///     .timeout(Duration::from_secs(30))
///     .lru::<u64, String>();
/// warm(&*cache, &[(1, "one"), (2, "two")]);
/// assert_eq!(cache.len(), 2);
/// assert_eq!(cache.get(&1).as_deref(), Some("one"));
/// ```
pub trait Cache<K, V>: Send + Sync {
    /// Maximum number of live entries; 0 means unbounded.
    fn capacity(&self) -> usize;

    /// Default TTL for entries stored without one; `Duration::ZERO` = never.
    fn timeout(&self) -> Duration;

    /// Inserts or replaces `key` under the default timeout.
    ///
    /// When a new key would exceed the capacity, expired entries are pruned
    /// first; if the cache is still full the policy evicts exactly one
    /// victim. The victim's listener call happens before `put` returns.
    fn put(&self, key: K, value: V);

    /// Like [`put`](Self::put) with a per-entry TTL. `Duration::ZERO` means
    /// this entry never expires, whatever the cache default.
    fn put_with_ttl(&self, key: K, value: V, ttl: Duration);

    /// Same as `get_with(key, true)`.
    fn get(&self, key: &K) -> Option<V> {
        self.get_with(key, true)
    }

    /// Returns the value if present and not expired.
    ///
    /// With `update_last_access` the read refreshes the entry's recency and
    /// frequency bookkeeping, which changes LRU/LFU eviction order.
    fn get_with(&self, key: &K, update_last_access: bool) -> Option<V>;

    /// Returns the cached value or computes, stores and returns a new one.
    fn get_or_insert_with<F>(&self, key: K, update_last_access: bool, supplier: F) -> V
    where
        Self: Sized,
        V: Clone,
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get_with(&key, update_last_access) {
            return value;
        }
        let value = supplier();
        self.put(key, value.clone());
        value
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with), storing the
    /// computed value under its own TTL.
    fn get_or_insert_with_ttl<F>(
        &self,
        key: K,
        update_last_access: bool,
        ttl: Duration,
        supplier: F,
    ) -> V
    where
        Self: Sized,
        V: Clone,
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get_with(&key, update_last_access) {
            return value;
        }
        let value = supplier();
        self.put_with_ttl(key, value.clone(), ttl);
        value
    }

    /// Fallible supplier. On `Err` nothing is stored and the error is
    /// returned unchanged.
    ///
    /// ```
    /// use stashkit::builder::CacheBuilder;
    /// use stashkit::traits::Cache;
    ///
    /// let cache = CacheBuilder::new(10).fifo::<&str, u32>();
    /// let parsed: Result<u32, std::num::ParseIntError> =
    ///     cache.try_get_or_insert_with("n", true, || "x1".parse());
    /// assert!(parsed.is_err());
    /// assert!(!cache.contains_key(&"n"));
    /// ```
    fn try_get_or_insert_with<F, E>(
        &self,
        key: K,
        update_last_access: bool,
        supplier: F,
    ) -> Result<V, E>
    where
        Self: Sized,
        V: Clone,
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get_with(&key, update_last_access) {
            return Ok(value);
        }
        let value = supplier()?;
        self.put(key, value.clone());
        Ok(value)
    }

    /// Removes expired entries, then evicts victims while the cache holds
    /// more than `capacity` entries. Returns how many entries were removed.
    ///
    /// Idempotent: a second call with no mutation in between returns 0.
    fn prune(&self) -> usize;

    /// Removes `key`, notifying the listener if it was present.
    fn remove(&self, key: &K) -> Option<V>;

    /// Drops every entry without notifying the listener.
    fn clear(&self);

    /// Number of stored entries, including expired ones not yet pruned.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `key` is stored and not expired. Does not touch bookkeeping.
    fn contains_key(&self, key: &K) -> bool;

    /// `len() >= capacity()` for bounded caches; always false when unbounded.
    fn is_full(&self) -> bool {
        let capacity = self.capacity();
        capacity > 0 && self.len() >= capacity
    }

    /// Snapshot of the live (non-expired) entries.
    ///
    /// Taken under a single read lock, so the iterator is finite and never
    /// observes mutations made after the call.
    fn entries(&self) -> Entries<K, V>;

    /// Snapshot of the live keys.
    fn keys(&self) -> Vec<K>
    where
        Self: Sized,
    {
        self.entries().map(|entry| entry.into_parts().0).collect()
    }

    /// Registers the removal listener, replacing any previous one.
    fn set_listener(&self, listener: Arc<dyn CacheListener<K, V>>);

    /// Unregisters the removal listener.
    fn clear_listener(&self);

    /// Hit/miss and removal counters.
    fn metrics(&self) -> CacheMetricsSnapshot;
}

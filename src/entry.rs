//! The unit of storage shared by every policy cache.
//!
//! A [`CacheEntry`] carries the key/value pair plus the bookkeeping the
//! eviction policies score on:
//!
//! ```text
//!   created_at        ── FIFO order, TTL origin
//!   last_accessed_at  ── LRU order, LFU tie-break
//!   access_count      ── LFU order
//!   ttl               ── None = cache default, Some(ZERO) = never expires
//! ```
//!
//! Instants can collide on coarse clocks, so entries also carry monotonic
//! sequence numbers drawn from a per-cache counter. Policies order on those;
//! the instants are what callers observe.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A cached key/value pair with its access and expiry bookkeeping.
///
/// `access_count` counts every successful read, including reads that opt out
/// of refreshing recency, so it is atomic and can move under a shared lock.
#[derive(Debug)]
pub struct CacheEntry<K, V> {
    key: K,
    value: V,
    created_at: Instant,
    last_accessed_at: Instant,
    access_count: AtomicU64,
    ttl: Option<Duration>,
    pub(crate) insert_seq: u64,
    pub(crate) access_seq: u64,
}

impl<K, V> CacheEntry<K, V> {
    pub(crate) fn new(key: K, value: V, now: Instant, ttl: Option<Duration>, seq: u64) -> Self {
        Self {
            key,
            value,
            created_at: now,
            last_accessed_at: now,
            access_count: AtomicU64::new(0),
            ttl,
            insert_seq: seq,
            access_seq: seq,
        }
    }

    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[inline]
    pub fn value(&self) -> &V {
        &self.value
    }

    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[inline]
    pub fn last_accessed_at(&self) -> Instant {
        self.last_accessed_at
    }

    /// Number of successful reads that refreshed this entry.
    #[inline]
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// The entry's own TTL, if one was given at insert time.
    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// TTL in force for this entry: its own, else the cache default.
    ///
    /// `Duration::ZERO` means the entry never expires.
    #[inline]
    pub fn effective_ttl(&self, default_ttl: Duration) -> Duration {
        self.ttl.unwrap_or(default_ttl)
    }

    /// `now - created_at >= effective_ttl`, with a zero TTL never expiring.
    pub fn is_expired(&self, now: Instant, default_ttl: Duration) -> bool {
        let ttl = self.effective_ttl(default_ttl);
        if ttl.is_zero() {
            return false;
        }
        now.saturating_duration_since(self.created_at) >= ttl
    }

    /// Records a read. `last_accessed_at` never moves backwards.
    pub(crate) fn touch(&mut self, now: Instant, seq: u64) {
        if now > self.last_accessed_at {
            self.last_accessed_at = now;
        }
        let count = self.access_count.get_mut();
        *count = count.saturating_add(1);
        self.access_seq = seq;
    }

    /// Counts a read that leaves recency and policy order untouched.
    pub(crate) fn record_read(&self) {
        let _ = self
            .access_count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |count| count.checked_add(1));
    }

    /// Swaps the value, keeping all bookkeeping. `None` drops the entry.
    pub(crate) fn filter_map_value<U>(self, f: impl FnOnce(V) -> Option<U>) -> Option<CacheEntry<K, U>> {
        let value = f(self.value)?;
        Some(CacheEntry {
            key: self.key,
            value,
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            ttl: self.ttl,
            insert_seq: self.insert_seq,
            access_seq: self.access_seq,
        })
    }

    pub(crate) fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }

    /// Consumes the entry, returning its value.
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<K: Clone, V: Clone> Clone for CacheEntry<K, V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: AtomicU64::new(self.access_count()),
            ttl: self.ttl,
            insert_seq: self.insert_seq,
            access_seq: self.access_seq,
        }
    }
}

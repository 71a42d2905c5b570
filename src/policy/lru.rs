//! Least-recently-used eviction.
//!
//! The victim is the entry with the oldest `last_accessed_at`. Inserts count
//! as an access; so does every read made with `update_last_access`.
//!
//! ```text
//!   put A, put B            recency: A B      (capacity 2, left = oldest)
//!   get A                   recency: B A
//!   put C                   evict B → recency: A C
//! ```
//!
//! Recency is scored with the cache's access sequence rather than the
//! instant itself, so reads inside the same clock tick still order.

use std::hash::Hash;

use crate::ds::LazyMinHeap;
use crate::entry::CacheEntry;
use crate::policy::{EvictionPolicy, PolicyKind};

/// Recency-ordered victim selection.
#[derive(Debug)]
pub struct LruPolicy<K> {
    recency: LazyMinHeap<K, u64>,
}

impl<K> LruPolicy<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            recency: LazyMinHeap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            recency: LazyMinHeap::with_capacity(capacity),
        }
    }

    /// Least recently used key without removing it.
    pub fn peek_lru(&mut self) -> Option<&K> {
        self.recency.peek_min().map(|(key, _)| key)
    }
}

impl<K> Default for LruPolicy<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for LruPolicy<K>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    fn kind(&self) -> PolicyKind {
        PolicyKind::Lru
    }

    fn on_insert<V>(&mut self, entry: &CacheEntry<K, V>) {
        self.recency.update(entry.key().clone(), entry.access_seq);
    }

    fn on_access<V>(&mut self, entry: &CacheEntry<K, V>) {
        self.recency.update(entry.key().clone(), entry.access_seq);
    }

    fn on_remove(&mut self, key: &K) {
        self.recency.remove(key);
    }

    fn pop_victim(&mut self) -> Option<K> {
        self.recency.pop_min().map(|(key, _)| key)
    }

    fn clear(&mut self) {
        self.recency.clear();
    }
}

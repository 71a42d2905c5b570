//! First-in, first-out eviction.
//!
//! Victims leave in insertion order. Reads never reorder anything:
//!
//! ```text
//!   put A, put B            order: A B        (capacity 2)
//!   get A, get A, get A     order: A B        reads ignored
//!   put C                   evict A → order: B C
//! ```
//!
//! Replacing a key counts as a fresh insertion and moves it to the back.

use std::hash::Hash;

use crate::ds::LazyMinHeap;
use crate::entry::CacheEntry;
use crate::policy::{EvictionPolicy, PolicyKind};

/// Insertion-ordered victim selection.
#[derive(Debug)]
pub struct FifoPolicy<K> {
    order: LazyMinHeap<K, u64>,
}

impl<K> FifoPolicy<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            order: LazyMinHeap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: LazyMinHeap::with_capacity(capacity),
        }
    }

    /// Next victim without removing it.
    pub fn peek_oldest(&mut self) -> Option<&K> {
        self.order.peek_min().map(|(key, _)| key)
    }
}

impl<K> Default for FifoPolicy<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for FifoPolicy<K>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    fn kind(&self) -> PolicyKind {
        PolicyKind::Fifo
    }

    fn on_insert<V>(&mut self, entry: &CacheEntry<K, V>) {
        self.order.update(entry.key().clone(), entry.insert_seq);
    }

    #[inline]
    fn on_access<V>(&mut self, _entry: &CacheEntry<K, V>) {}

    fn on_remove(&mut self, key: &K) {
        self.order.remove(key);
    }

    fn pop_victim(&mut self) -> Option<K> {
        self.order.pop_min().map(|(key, _)| key)
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn entry(key: &'static str, seq: u64) -> CacheEntry<&'static str, ()> {
        CacheEntry::new(key, (), Instant::now(), None, seq)
    }

    #[test]
    fn victims_follow_insertion_order() {
        let mut policy = FifoPolicy::new();
        policy.on_insert(&entry("a", 0));
        policy.on_insert(&entry("b", 1));
        policy.on_insert(&entry("c", 2));

        assert_eq!(policy.pop_victim(), Some("a"));
        assert_eq!(policy.pop_victim(), Some("b"));
        assert_eq!(policy.pop_victim(), Some("c"));
        assert_eq!(policy.pop_victim(), None);
    }

    #[test]
    fn access_does_not_reorder() {
        let mut policy = FifoPolicy::new();
        let a = entry("a", 0);
        policy.on_insert(&a);
        policy.on_insert(&entry("b", 1));

        let mut read = a.clone();
        read.touch(Instant::now(), 5);
        policy.on_access(&read);

        assert_eq!(policy.peek_oldest(), Some(&"a"));
    }

    #[test]
    fn replacement_moves_key_to_back() {
        let mut policy = FifoPolicy::new();
        policy.on_insert(&entry("a", 0));
        policy.on_insert(&entry("b", 1));
        policy.on_insert(&entry("a", 2));

        assert_eq!(policy.pop_victim(), Some("b"));
        assert_eq!(policy.pop_victim(), Some("a"));
    }

    #[test]
    fn removed_key_is_skipped() {
        let mut policy = FifoPolicy::new();
        policy.on_insert(&entry("a", 0));
        policy.on_insert(&entry("b", 1));
        policy.on_remove(&"a");
        assert_eq!(policy.pop_victim(), Some("b"));
    }
}

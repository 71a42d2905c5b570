//! Least-frequently-used eviction.
//!
//! The victim is the entry with the lowest `access_count`; among equally
//! used entries the one accessed longest ago goes first.
//!
//! ```text
//!   Access pattern: put A, put B, get A ×3, get B ×1      (capacity 2)
//!
//!     score(A) = (3, seq of last A read)
//!     score(B) = (1, seq of last B read)
//!
//!   put C  → evict B (count 1 < 3) → {A:3, C:0}
//! ```
//!
//! A replaced key starts over at count 0, like any fresh entry.
//!
//! Reads that opt out of refreshing (`get_with(k, false)`) still raise the
//! entry's `access_count`, but the policy only re-scores on refreshing reads:
//! peeks move an entry's eviction order at its next `get`, not before.

use std::hash::Hash;

use crate::ds::LazyMinHeap;
use crate::entry::CacheEntry;
use crate::policy::{EvictionPolicy, PolicyKind};

/// `(access_count, access_seq)`: lexicographic order is the eviction order.
type FrequencyScore = (u64, u64);

/// Frequency-ordered victim selection.
#[derive(Debug)]
pub struct LfuPolicy<K> {
    frequency: LazyMinHeap<K, FrequencyScore>,
}

impl<K> LfuPolicy<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            frequency: LazyMinHeap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frequency: LazyMinHeap::with_capacity(capacity),
        }
    }

    /// Recorded access count for `key`.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.frequency.score_of(key).map(|(count, _)| *count)
    }

    #[inline]
    fn score<V>(entry: &CacheEntry<K, V>) -> FrequencyScore {
        (entry.access_count(), entry.access_seq)
    }
}

impl<K> Default for LfuPolicy<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for LfuPolicy<K>
where
    K: Eq + Hash + Clone + Send + Sync,
{
    fn kind(&self) -> PolicyKind {
        PolicyKind::Lfu
    }

    fn on_insert<V>(&mut self, entry: &CacheEntry<K, V>) {
        self.frequency.update(entry.key().clone(), Self::score(entry));
    }

    fn on_access<V>(&mut self, entry: &CacheEntry<K, V>) {
        self.frequency.update(entry.key().clone(), Self::score(entry));
    }

    fn on_remove(&mut self, key: &K) {
        self.frequency.remove(key);
    }

    fn pop_victim(&mut self) -> Option<K> {
        self.frequency.pop_min().map(|(key, _)| key)
    }

    fn clear(&mut self) {
        self.frequency.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn entry(key: &'static str, seq: u64) -> CacheEntry<&'static str, ()> {
        CacheEntry::new(key, (), Instant::now(), None, seq)
    }

    fn read(policy: &mut LfuPolicy<&'static str>, e: &mut CacheEntry<&'static str, ()>, seq: u64) {
        e.touch(Instant::now(), seq);
        policy.on_access(e);
    }

    #[test]
    fn least_read_entry_is_victim() {
        let mut policy = LfuPolicy::new();
        let mut a = entry("a", 0);
        let mut b = entry("b", 1);
        policy.on_insert(&a);
        policy.on_insert(&b);

        read(&mut policy, &mut a, 2);
        read(&mut policy, &mut a, 3);
        read(&mut policy, &mut a, 4);
        read(&mut policy, &mut b, 5);

        assert_eq!(policy.frequency(&"a"), Some(3));
        assert_eq!(policy.frequency(&"b"), Some(1));
        assert_eq!(policy.pop_victim(), Some("b"));
    }

    #[test]
    fn ties_break_on_oldest_access() {
        let mut policy = LfuPolicy::new();
        let mut a = entry("a", 0);
        let mut b = entry("b", 1);
        policy.on_insert(&a);
        policy.on_insert(&b);

        read(&mut policy, &mut b, 2);
        read(&mut policy, &mut a, 3);

        // Both read once; b's read is older.
        assert_eq!(policy.pop_victim(), Some("b"));
    }

    #[test]
    fn fresh_entry_loses_to_read_entries() {
        let mut policy = LfuPolicy::new();
        let mut a = entry("a", 0);
        policy.on_insert(&a);
        read(&mut policy, &mut a, 1);
        policy.on_insert(&entry("c", 2));
        assert_eq!(policy.pop_victim(), Some("c"));
    }
}

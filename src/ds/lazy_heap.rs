//! Lazy min-heap keyed by cache key, used to pick eviction victims.
//!
//! Every policy reduces "which entry goes first" to a score: insertion
//! sequence for FIFO, last-access sequence for LRU, `(access_count,
//! last-access sequence)` for LFU. Scores change on every read, so instead of
//! fixing heap entries in place an update pushes a fresh entry and leaves the
//! old one behind. The `scores` map is authoritative; a heap entry whose score
//! no longer matches it is stale and skipped when popped.
//!
//! ```text
//!   scores:  { A: 7, B: 3 }
//!   heap:    (B,3) (A,5)* (A,7)        * stale: scores[A] == 7
//!
//!   pop_min() → skip nothing, returns (B,3)
//!   pop_min() → skips (A,5), returns (A,7)
//! ```
//!
//! Stale entries are bounded by [`compact`](LazyMinHeap::compact), which
//! rebuilds the heap once it grows past a multiple of the live key count.
//!
//! Not thread-safe; owned by a policy that sits behind the cache lock.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::hash::Hash;

use rustc_hash::FxHashMap;

/// Heap length may reach this multiple of the live key count before a rebuild.
const STALE_FACTOR: usize = 4;

#[derive(Debug, Clone)]
struct Slot<K, S> {
    score: S,
    seq: u64,
    key: K,
}

impl<K, S: Ord> PartialEq for Slot<K, S> {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.seq == other.seq
    }
}

impl<K, S: Ord> Eq for Slot<K, S> {}

impl<K, S: Ord> PartialOrd for Slot<K, S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, S: Ord> Ord for Slot<K, S> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Min-heap with O(log n) score updates via lazy deletion.
///
/// # Example
///
/// ```
/// use stashkit::ds::LazyMinHeap;
///
/// let mut order: LazyMinHeap<&str, u64> = LazyMinHeap::new();
/// order.update("a", 1);
/// order.update("b", 2);
/// order.update("a", 3); // "a" read again
///
/// assert_eq!(order.peek_min(), Some((&"b", &2)));
/// assert_eq!(order.pop_min(), Some(("b", 2)));
/// assert_eq!(order.pop_min(), Some(("a", 3)));
/// assert!(order.is_empty());
/// ```
#[derive(Debug)]
pub struct LazyMinHeap<K, S> {
    scores: FxHashMap<K, S>,
    heap: BinaryHeap<Reverse<Slot<K, S>>>,
    seq: u64,
}

impl<K, S> LazyMinHeap<K, S>
where
    K: Eq + Hash + Clone,
    S: Ord + Clone,
{
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scores: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            heap: BinaryHeap::with_capacity(capacity),
            seq: 0,
        }
    }

    /// Number of live keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Number of heap slots, stale ones included.
    #[inline]
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn score_of(&self, key: &K) -> Option<&S> {
        self.scores.get(key)
    }

    /// Sets `key`'s score, returning the previous one.
    pub fn update(&mut self, key: K, score: S) -> Option<S> {
        let previous = self.scores.insert(key.clone(), score.clone());
        self.push(key, score);
        self.compact();
        previous
    }

    /// Forgets `key`. Its heap slots turn stale.
    pub fn remove(&mut self, key: &K) -> Option<S> {
        let removed = self.scores.remove(key);
        if self.scores.is_empty() {
            self.heap.clear();
        }
        removed
    }

    /// Removes and returns the live key with the lowest score.
    ///
    /// Equal scores pop in update order.
    pub fn pop_min(&mut self) -> Option<(K, S)> {
        loop {
            let Reverse(slot) = self.heap.pop()?;
            if self.is_live(&slot) {
                self.scores.remove(&slot.key);
                return Some((slot.key, slot.score));
            }
        }
    }

    /// Returns the live minimum without removing it, discarding any stale
    /// slots found on top.
    pub fn peek_min(&mut self) -> Option<(&K, &S)> {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.is_live(top) {
                break;
            }
            self.heap.pop();
        }
        self.heap
            .peek()
            .map(|Reverse(slot)| (&slot.key, &slot.score))
    }

    pub fn clear(&mut self) {
        self.scores.clear();
        self.heap.clear();
    }

    /// Rebuilds the heap from the live scores once stale slots dominate.
    pub fn compact(&mut self) {
        let live = self.scores.len().max(1);
        if self.heap.len() <= live.saturating_mul(STALE_FACTOR) {
            return;
        }
        self.rebuild();
    }

    /// Drops every stale slot. Relative order of equal scores is not kept.
    pub fn rebuild(&mut self) {
        let live: Vec<(K, S)> = self
            .scores
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect();
        self.heap.clear();
        for (key, score) in live {
            self.push(key, score);
        }
    }

    #[inline]
    fn is_live(&self, slot: &Slot<K, S>) -> bool {
        matches!(self.scores.get(&slot.key), Some(score) if *score == slot.score)
    }

    fn push(&mut self, key: K, score: S) {
        let slot = Slot {
            score,
            seq: self.seq,
            key,
        };
        self.seq = self.seq.wrapping_add(1);
        self.heap.push(Reverse(slot));
    }
}

impl<K, S> Default for LazyMinHeap<K, S>
where
    K: Eq + Hash + Clone,
    S: Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

//! Weak- and soft-reference backed map.
//!
//! ## Architecture
//! - Entries live in one `RwLock<FxHashMap<K, Slot<V>>>`.
//! - **Weak mode**: each slot is a `Weak<V>`. The store never keeps a value
//!   alive; once the last outside `Arc` is dropped the entry reads as absent
//!   and is removed by the next sweep.
//! - **Soft mode**: each slot is an `Arc<V>` plus a last-used stamp. Values
//!   stay alive until the store exceeds its soft capacity or
//!   [`reclaim`](ReferenceStore::reclaim) is called, at which point the
//!   least recently used entries go first.
//!
//! ## Reclamation timing
//! There is no collector telling the store that a value became unreachable.
//! Weak entries are detected lazily:
//!
//! ```text
//!   get(k)          dead slot reads as None, removed on the spot
//!   any operation   ops += 1; ops >= max(len, SWEEP_FLOOR) → full sweep
//!   purge()         full sweep now
//! ```
//!
//! Soft mode approximates memory-pressure eviction with an explicit bound:
//! it evicts by recency, not by how much memory is actually tight. Callers
//! with a real pressure signal call `reclaim(target_len)` from it.
//!
//! ## Purge listener
//! A registered [`PurgeListener`] hears about every entry the store drops on
//! its own (dead weak slots, soft evictions). Explicit `remove` and `clear`
//! are not reported. The listener runs after the map lock is released.
//!
//! ## Example Usage
//! ```rust
//! use std::sync::Arc;
//! use stashkit::store::ReferenceStore;
//!
//! let store: ReferenceStore<&str, String> = ReferenceStore::weak();
//! let value = Arc::new("payload".to_string());
//! store.insert("k", Arc::clone(&value));
//! assert!(store.get(&"k").is_some());
//!
//! drop(value);
//! assert!(store.get(&"k").is_none());
//! ```

use std::fmt;
use std::hash::Hash;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::ConfigError;
use crate::listener::panic_message;

/// Minimum number of operations between two amortized weak sweeps.
const SWEEP_FLOOR: usize = 16;

/// Callback for entries the store drops on its own.
pub type PurgeListener<K> = Arc<dyn Fn(&K) + Send + Sync>;

/// Value indirection used by a [`ReferenceStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Values are held weakly; the store never extends their lifetime.
    Weak,
    /// Values are held strongly, up to `capacity` entries.
    Soft { capacity: usize },
}

enum Slot<V> {
    Weak(Weak<V>),
    Soft { value: Arc<V>, last_used: AtomicU64 },
}

impl<V> Slot<V> {
    fn upgrade(&self) -> Option<Arc<V>> {
        match self {
            Slot::Weak(weak) => weak.upgrade(),
            Slot::Soft { value, .. } => Some(Arc::clone(value)),
        }
    }

    fn is_dead(&self) -> bool {
        match self {
            Slot::Weak(weak) => weak.strong_count() == 0,
            Slot::Soft { .. } => false,
        }
    }

    fn last_used(&self) -> u64 {
        match self {
            Slot::Weak(_) => 0,
            Slot::Soft { last_used, .. } => last_used.load(Ordering::Relaxed),
        }
    }
}

/// Concurrent map whose entries may disappear without an explicit remove.
///
/// All methods take `&self`.
pub struct ReferenceStore<K, V> {
    slots: RwLock<FxHashMap<K, Slot<V>>>,
    mode: ReferenceMode,
    tick: AtomicU64,
    ops: AtomicUsize,
    on_purge: RwLock<Option<PurgeListener<K>>>,
}

impl<K, V> ReferenceStore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Weak-valued store.
    pub fn weak() -> Self {
        Self::with_mode(ReferenceMode::Weak)
    }

    /// Soft-valued store bounded at `capacity` entries.
    pub fn try_soft(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("soft capacity must be > 0"));
        }
        Ok(Self::with_mode(ReferenceMode::Soft { capacity }))
    }

    fn with_mode(mode: ReferenceMode) -> Self {
        Self {
            slots: RwLock::new(FxHashMap::default()),
            mode,
            tick: AtomicU64::new(0),
            ops: AtomicUsize::new(0),
            on_purge: RwLock::new(None),
        }
    }

    pub fn mode(&self) -> ReferenceMode {
        self.mode
    }

    /// Registers the purge listener, replacing any previous one.
    pub fn set_purge_listener(&self, listener: PurgeListener<K>) {
        *self.on_purge.write() = Some(listener);
    }

    pub fn clear_purge_listener(&self) {
        *self.on_purge.write() = None;
    }

    /// Returns the value if it is still reachable.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.maybe_sweep();
        let dead = {
            let slots = self.slots.read();
            match slots.get(key) {
                None => return None,
                Some(slot) => match slot.upgrade() {
                    Some(value) => {
                        if let Slot::Soft { last_used, .. } = slot {
                            last_used.store(self.next_tick(), Ordering::Relaxed);
                        }
                        return Some(value);
                    },
                    None => key.clone(),
                },
            }
        };

        let purged = {
            let mut slots = self.slots.write();
            // Re-check: a concurrent insert may have refreshed the slot.
            match slots.get(&dead) {
                Some(slot) if slot.is_dead() => slots.remove(&dead).map(|_| dead),
                _ => None,
            }
        };
        self.notify(purged.into_iter().collect());
        None
    }

    /// Stores `value` under `key`, returning the previous live value.
    ///
    /// In soft mode an insert that pushes the store past its capacity evicts
    /// the least recently used other entry.
    pub fn insert(&self, key: K, value: Arc<V>) -> Option<Arc<V>> {
        self.maybe_sweep();
        let slot = match self.mode {
            ReferenceMode::Weak => Slot::Weak(Arc::downgrade(&value)),
            ReferenceMode::Soft { .. } => Slot::Soft {
                value,
                last_used: AtomicU64::new(self.next_tick()),
            },
        };

        let (previous, purged) = {
            let mut slots = self.slots.write();
            let previous = slots.insert(key.clone(), slot).and_then(|old| old.upgrade());
            let purged = match self.mode {
                ReferenceMode::Soft { capacity } if slots.len() > capacity => {
                    let excess = slots.len() - capacity;
                    evict_lru(&mut slots, excess, Some(&key))
                },
                _ => Vec::new(),
            };
            (previous, purged)
        };
        self.notify(purged);
        previous
    }

    /// Removes `key`, returning its value if it was still reachable.
    pub fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.maybe_sweep();
        self.slots.write().remove(key).and_then(|slot| slot.upgrade())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.slots
            .read()
            .get(key)
            .is_some_and(|slot| !slot.is_dead())
    }

    /// Number of stored slots, including dead weak slots not yet swept.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry without notifying the purge listener.
    pub fn clear(&self) {
        self.slots.write().clear();
        self.ops.store(0, Ordering::Relaxed);
    }

    /// Keys whose values are still reachable.
    pub fn keys(&self) -> Vec<K> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| !slot.is_dead())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Snapshot of the reachable entries.
    pub fn snapshot(&self) -> Vec<(K, Arc<V>)> {
        self.slots
            .read()
            .iter()
            .filter_map(|(key, slot)| slot.upgrade().map(|value| (key.clone(), value)))
            .collect()
    }

    /// Removes every dead weak slot. Returns how many were removed.
    pub fn purge(&self) -> usize {
        self.ops.store(0, Ordering::Relaxed);
        let purged = {
            let mut slots = self.slots.write();
            let dead: Vec<K> = slots
                .iter()
                .filter(|(_, slot)| slot.is_dead())
                .map(|(key, _)| key.clone())
                .collect();
            for key in &dead {
                slots.remove(key);
            }
            dead
        };
        let count = purged.len();
        if count > 0 {
            tracing::trace!(purged = count, "swept dead weak entries");
        }
        self.notify(purged);
        count
    }

    /// Shrinks the store to at most `target_len` entries.
    ///
    /// Dead weak slots go first. In soft mode the least recently used live
    /// entries follow until the target is met; weak mode never drops a live
    /// entry. Returns how many entries were removed.
    pub fn reclaim(&self, target_len: usize) -> usize {
        let mut removed = self.purge();
        if let ReferenceMode::Soft { .. } = self.mode {
            let purged = {
                let mut slots = self.slots.write();
                let excess = slots.len().saturating_sub(target_len);
                evict_lru(&mut slots, excess, None)
            };
            removed += purged.len();
            self.notify(purged);
        }
        if removed > 0 {
            tracing::debug!(removed, target_len, "reference store reclaimed entries");
        }
        removed
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Amortized sweep: one full pass per `max(len, SWEEP_FLOOR)` operations.
    fn maybe_sweep(&self) {
        if self.mode != ReferenceMode::Weak {
            return;
        }
        let ops = self.ops.fetch_add(1, Ordering::Relaxed) + 1;
        if ops >= self.len().max(SWEEP_FLOOR) {
            self.purge();
        }
    }

    fn notify(&self, purged: Vec<K>) {
        if purged.is_empty() {
            return;
        }
        let Some(listener) = self.on_purge.read().clone() else {
            return;
        };
        for key in &purged {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(key))) {
                tracing::warn!(
                    panic = %panic_message(payload.as_ref()),
                    "purge listener panicked"
                );
            }
        }
    }
}

/// Removes the `count` least recently used slots, never `keep`.
fn evict_lru<K, V>(slots: &mut FxHashMap<K, Slot<V>>, count: usize, keep: Option<&K>) -> Vec<K>
where
    K: Eq + Hash + Clone,
{
    if count == 0 {
        return Vec::new();
    }
    let mut candidates: Vec<(u64, K)> = slots
        .iter()
        .filter(|(key, _)| Some(*key) != keep)
        .map(|(key, slot)| (slot.last_used(), key.clone()))
        .collect();
    let count = count.min(candidates.len());
    if count < candidates.len() {
        candidates.select_nth_unstable_by_key(count, |(stamp, _)| *stamp);
    }
    candidates.truncate(count);

    candidates
        .into_iter()
        .filter_map(|(_, key)| slots.remove(&key).map(|_| key))
        .collect()
}

impl<K, V> fmt::Debug for ReferenceStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceStore")
            .field("mode", &self.mode)
            .field("len", &self.slots.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recording<K: Clone + Send + 'static>() -> (PurgeListener<K>, Arc<Mutex<Vec<K>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: PurgeListener<K> = Arc::new(move |key: &K| sink.lock().push(key.clone()));
        (listener, seen)
    }

    // ==============================================
    // Weak mode
    // ==============================================

    #[test]
    fn weak_store_does_not_keep_values_alive() {
        let store: ReferenceStore<u32, String> = ReferenceStore::weak();
        let value = Arc::new("v".to_string());
        store.insert(1, Arc::clone(&value));
        assert_eq!(Arc::strong_count(&value), 1);
        assert_eq!(store.get(&1).as_deref().map(String::as_str), Some("v"));

        drop(value);
        assert!(!store.contains_key(&1));
        assert!(store.get(&1).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn dead_read_notifies_purge_listener() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::weak();
        let (listener, seen) = recording();
        store.set_purge_listener(listener);

        store.insert(7, Arc::new(70));
        assert!(store.get(&7).is_none());
        assert_eq!(*seen.lock(), vec![7]);
    }

    #[test]
    fn purge_sweeps_only_dead_slots() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::weak();
        let alive = Arc::new(1);
        store.insert(1, Arc::clone(&alive));
        store.insert(2, Arc::new(2));
        store.insert(3, Arc::new(3));

        assert_eq!(store.purge(), 2);
        assert_eq!(store.purge(), 0);
        assert_eq!(store.keys(), vec![1]);
    }

    #[test]
    fn amortized_sweep_eventually_clears_dead_slots() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::weak();
        for i in 0..8 {
            store.insert(i, Arc::new(i));
        }
        let keep = Arc::new(100);
        for _ in 0..SWEEP_FLOOR {
            store.insert(100, Arc::clone(&keep));
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn weak_reclaim_never_drops_live_values() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::weak();
        let held: Vec<_> = (0..4).map(Arc::new).collect();
        for (i, value) in held.iter().enumerate() {
            store.insert(i as u32, Arc::clone(value));
        }
        assert_eq!(store.reclaim(0), 0);
        assert_eq!(store.len(), 4);
    }

    // ==============================================
    // Soft mode
    // ==============================================

    #[test]
    fn zero_soft_capacity_rejected() {
        let err = ReferenceStore::<u32, u32>::try_soft(0).unwrap_err();
        assert!(err.message().contains("capacity"));
    }

    #[test]
    fn soft_store_keeps_values_alive() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::try_soft(4).unwrap();
        store.insert(1, Arc::new(10));
        assert_eq!(store.get(&1).as_deref(), Some(&10));
    }

    #[test]
    fn soft_capacity_evicts_least_recently_used() {
        let store: ReferenceStore<&str, u32> = ReferenceStore::try_soft(2).unwrap();
        let (listener, seen) = recording();
        store.set_purge_listener(listener);

        store.insert("a", Arc::new(1));
        store.insert("b", Arc::new(2));
        store.get(&"a");
        store.insert("c", Arc::new(3));

        assert_eq!(*seen.lock(), vec!["b"]);
        assert!(store.contains_key(&"a"));
        assert!(store.contains_key(&"c"));
    }

    #[test]
    fn soft_reclaim_shrinks_to_target() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::try_soft(10).unwrap();
        for i in 0..10 {
            store.insert(i, Arc::new(i));
        }
        store.get(&0);

        assert_eq!(store.reclaim(3), 7);
        assert_eq!(store.len(), 3);
        assert!(store.contains_key(&0));
    }

    #[test]
    fn replacing_returns_previous_value() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::try_soft(2).unwrap();
        assert!(store.insert(1, Arc::new(1)).is_none());
        assert_eq!(store.insert(1, Arc::new(2)).as_deref(), Some(&1));
        assert_eq!(store.remove(&1).as_deref(), Some(&2));
        assert!(store.is_empty());
    }

    #[test]
    fn panicking_purge_listener_is_contained() {
        let store: ReferenceStore<u32, u32> = ReferenceStore::try_soft(1).unwrap();
        store.set_purge_listener(Arc::new(|_: &u32| panic!("purge hook")));
        store.insert(1, Arc::new(1));
        store.insert(2, Arc::new(2));
        assert_eq!(store.keys(), vec![2]);
    }
}

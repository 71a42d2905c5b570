//! Time-only expiry with no capacity concept.
//!
//! Nothing is ever evicted for space; entries leave when their TTL elapses
//! and `prune()` runs, usually on a schedule registered through
//! [`PolicyCache::schedule_prune`](crate::cache::PolicyCache::schedule_prune).

use std::marker::PhantomData;

use crate::entry::CacheEntry;
use crate::policy::{EvictionPolicy, PolicyKind};

#[derive(Debug)]
pub struct TimedPolicy<K> {
    _keys: PhantomData<fn(&K)>,
}

impl<K> TimedPolicy<K> {
    pub fn new() -> Self {
        Self { _keys: PhantomData }
    }
}

impl<K> Default for TimedPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for TimedPolicy<K> {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Timed
    }

    fn is_bounded(&self) -> bool {
        false
    }

    fn on_insert<V>(&mut self, _entry: &CacheEntry<K, V>) {}

    fn on_access<V>(&mut self, _entry: &CacheEntry<K, V>) {}

    fn on_remove(&mut self, _key: &K) {}

    fn pop_victim(&mut self) -> Option<K> {
        None
    }

    fn clear(&mut self) {}
}

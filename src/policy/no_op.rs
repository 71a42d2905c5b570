//! The policy that never decides anything.
//!
//! Nothing is stale and nothing is evicted: per-entry TTLs are ignored and
//! the cache is unbounded. Useful as a uniform stand-in where eviction is
//! switched off by configuration but callers still expect the [`Cache`]
//! contract.
//!
//! [`Cache`]: crate::traits::Cache

use std::marker::PhantomData;

use crate::entry::CacheEntry;
use crate::policy::{EvictionPolicy, PolicyKind};

#[derive(Debug)]
pub struct NoOpPolicy<K> {
    _keys: PhantomData<fn(&K)>,
}

impl<K> NoOpPolicy<K> {
    pub fn new() -> Self {
        Self { _keys: PhantomData }
    }
}

impl<K> Default for NoOpPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for NoOpPolicy<K> {
    fn kind(&self) -> PolicyKind {
        PolicyKind::NoOp
    }

    fn is_bounded(&self) -> bool {
        false
    }

    fn honors_ttl(&self) -> bool {
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

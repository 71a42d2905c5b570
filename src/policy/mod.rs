//! Eviction policies.
//!
//! A policy answers two questions for [`PolicyCache`](crate::cache::PolicyCache):
//!
//! 1. *Is entry E stale?* Every TTL-honoring policy uses the same test,
//!    `now - created_at >= effective_ttl` with a zero TTL never expiring;
//!    see [`CacheEntry::is_expired`].
//! 2. *When full, which entry goes?* Each bounded policy keeps its own
//!    ordering over keys and hands back one victim at a time.
//!
//! | Policy  | Stale when          | Victim when full                         |
//! |---------|---------------------|------------------------------------------|
//! | FIFO    | TTL elapsed         | oldest `created_at`                      |
//! | LRU     | TTL elapsed         | oldest `last_accessed_at`                |
//! | LFU     | TTL elapsed         | lowest `access_count`, then oldest access|
//! | Timed   | TTL elapsed         | none: unbounded, pruned on a schedule    |
//! | NoOp    | never               | none: unbounded, TTLs ignored            |
//!
//! Policies are plain single-threaded state owned by the cache and mutated
//! under its write lock.

pub mod fifo;
pub mod lfu;
pub mod lru;
pub mod no_op;
pub mod timed;

use std::fmt;

use crate::entry::CacheEntry;

pub use fifo::FifoPolicy;
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;
pub use no_op::NoOpPolicy;
pub use timed::TimedPolicy;

/// Names the policy families, for logging and the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Fifo,
    Lru,
    Lfu,
    Timed,
    NoOp,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyKind::Fifo => "fifo",
            PolicyKind::Lru => "lru",
            PolicyKind::Lfu => "lfu",
            PolicyKind::Timed => "timed",
            PolicyKind::NoOp => "no-op",
        };
        f.write_str(name)
    }
}

/// Bookkeeping and victim selection for one cache.
///
/// The cache calls the `on_*` hooks while holding its write lock and keeps
/// the policy's key set equal to its own. `pop_victim` removes the key from
/// the policy; the cache then removes it from the map.
pub trait EvictionPolicy<K>: Send + Sync {
    fn kind(&self) -> PolicyKind;

    /// Whether `capacity` is enforced. Unbounded policies report capacity 0.
    fn is_bounded(&self) -> bool {
        true
    }

    /// Whether TTLs apply at all.
    fn honors_ttl(&self) -> bool {
        true
    }

    /// A new entry (or a replacement for an existing key) was stored.
    fn on_insert<V>(&mut self, entry: &CacheEntry<K, V>);

    /// An entry was read with `update_last_access`.
    fn on_access<V>(&mut self, entry: &CacheEntry<K, V>);

    /// `key` left the cache for any reason other than `pop_victim`.
    fn on_remove(&mut self, key: &K);

    /// Chooses and forgets the next entry to evict.
    fn pop_victim(&mut self) -> Option<K>;

    fn clear(&mut self);
}

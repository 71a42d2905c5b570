//! Removal notifications.
//!
//! A cache holds at most one [`CacheListener`]; registering another replaces
//! it. Listeners run synchronously on the thread that removed the entry,
//! after the cache lock has been released, so a listener may call back into
//! the cache. A panicking listener is caught and logged; the removal it was
//! told about stays removed and the remaining notifications still fire.
//!
//! Plain closures are listeners:
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use stashkit::builder::CacheBuilder;
//! use stashkit::traits::Cache;
//!
//! let removed = Arc::new(AtomicUsize::new(0));
//! let cache = CacheBuilder::new(1).lru::<u32, &str>();
//!
//! let seen = Arc::clone(&removed);
//! cache.set_listener(Arc::new(move |_key: &u32, _value: &&str| {
//!     seen.fetch_add(1, Ordering::SeqCst);
//! }));
//!
//! cache.put(1, "one");
//! cache.put(2, "two"); // evicts 1
//! assert_eq!(removed.load(Ordering::SeqCst), 1);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Made room for a new entry.
    Evicted,
    /// Its TTL elapsed.
    Expired,
    /// `remove()` was called for it.
    Explicit,
    /// Its value was reclaimed by a reference-backed store.
    Reclaimed,
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemovalCause::Evicted => "evicted",
            RemovalCause::Expired => "expired",
            RemovalCause::Explicit => "explicit",
            RemovalCause::Reclaimed => "reclaimed",
        };
        f.write_str(name)
    }
}

/// Observer invoked once per removed entry.
pub trait CacheListener<K, V>: Send + Sync {
    fn on_remove(&self, key: &K, value: &V);
}

impl<K, V, F> CacheListener<K, V> for F
where
    F: Fn(&K, &V) + Send + Sync,
{
    fn on_remove(&self, key: &K, value: &V) {
        self(key, value)
    }
}

pub type SharedListener<K, V> = Arc<dyn CacheListener<K, V>>;

/// An entry that has left the map and still owes its listener call.
pub(crate) struct Removed<K, V> {
    pub key: K,
    pub value: V,
    pub cause: RemovalCause,
}

impl<K, V> Removed<K, V> {
    pub(crate) fn new(key: K, value: V, cause: RemovalCause) -> Self {
        Self { key, value, cause }
    }
}

/// Calls `listener` for each removal, isolating panics per entry.
pub(crate) fn notify_all<K, V>(listener: Option<&SharedListener<K, V>>, removed: Vec<Removed<K, V>>) {
    let Some(listener) = listener else {
        return;
    };
    for entry in removed {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            listener.on_remove(&entry.key, &entry.value);
        }));
        if let Err(payload) = outcome {
            tracing::warn!(
                cause = %entry.cause,
                panic = %panic_message(payload.as_ref()),
                "cache listener panicked; entry stays removed"
            );
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Reference-backed storage.
//!
//! ## Key Components
//! - [`ReferenceStore`]: a concurrent map that holds its values through
//!   `Weak<V>` (weak mode) or through `Arc<V>` with a soft capacity (soft
//!   mode), purging entries as they become unreachable or as the soft bound
//!   is exceeded.
//! - [`ReferenceMode`]: selects the indirection.
//!
//! Used by [`SimpleCache`](crate::simple::SimpleCache) for self-pruning
//! memoization.

pub mod reference;

pub use reference::{PurgeListener, ReferenceMode, ReferenceStore};

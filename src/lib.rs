//! stashkit: in-process caching with pluggable eviction, expiry, reference
//! backed stores and single-flight memoization.
//!
//! ## Modules
//!
//! - [`cache`]: the policy cache engine and its FIFO/LRU/LFU/timed/no-op aliases.
//! - [`weak`]: a timed cache over weakly held values.
//! - [`simple`]: single-flight memoization over strong, weak or soft storage.
//! - [`store`]: the weak/soft reference store behind `simple`.
//! - [`scheduler`]: periodic pruning, threaded or manually driven.
//! - [`builder`]: one entry point for every cache type.
//!
//! ## Quick start
//!
//! ```
//! use std::time::Duration;
//! use stashkit::prelude::*;
//!
//! let sessions = CacheBuilder::new(1_000)
//!     .timeout(Duration::from_secs(900))
//!     .lru::<u64, String>();
//!
//! sessions.put(7, "alice".to_string());
//! assert_eq!(sessions.get(&7).as_deref(), Some("alice"));
//! assert_eq!(sessions.metrics().hits, 1);
//! ```

pub mod builder;
pub mod cache;
pub mod clock;
pub mod ds;
pub mod entry;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod policy;
pub mod prelude;
pub mod scheduler;
pub mod simple;
pub mod store;
pub mod traits;
pub mod weak;

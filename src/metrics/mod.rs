//! Hit/miss and removal accounting shared by every cache in the crate.
//!
//! Recording and reading are split the same way the cache traits are:
//!
//! ```text
//!   CoreMetricsRecorder (&self, atomic)      MetricsSnapshotProvider
//!   ├── record_hit / record_miss             └── metrics() → CacheMetricsSnapshot
//!   ├── record_insert
//!   └── record_removal(RemovalCause)
//! ```
//!
//! Counters are relaxed atomics: they are observational and never feed back
//! into eviction decisions.

pub mod cell;
pub mod counters;
pub mod snapshot;
pub mod traits;

pub use counters::CacheCounters;
pub use snapshot::CacheMetricsSnapshot;
pub use traits::{CoreMetricsRecorder, MetricsSnapshotProvider};

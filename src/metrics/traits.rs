//! Recorder and provider traits.

use crate::listener::RemovalCause;
use crate::metrics::snapshot::CacheMetricsSnapshot;

/// Counters every cache records. Takes `&self`; implementations use atomics
/// so recording works from read paths too.
pub trait CoreMetricsRecorder {
    fn record_hit(&self);
    fn record_miss(&self);
    fn record_insert(&self);
    fn record_removal(&self, cause: RemovalCause);
}

/// Anything that can produce a point-in-time metrics snapshot.
pub trait MetricsSnapshotProvider {
    fn metrics_snapshot(&self) -> CacheMetricsSnapshot;
}

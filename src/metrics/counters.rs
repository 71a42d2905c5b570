use crate::listener::RemovalCause;
use crate::metrics::cell::MetricsCell;
use crate::metrics::snapshot::CacheMetricsSnapshot;
use crate::metrics::traits::CoreMetricsRecorder;

/// Live counters owned by a cache.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: MetricsCell,
    misses: MetricsCell,
    inserts: MetricsCell,
    evictions: MetricsCell,
    expirations: MetricsCell,
    removals: MetricsCell,
    reclaimed: MetricsCell,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Captures the counters together with the gauges passed in.
    pub fn snapshot(&self, len: usize, capacity: usize) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            hits: self.hits.get(),
            misses: self.misses.get(),
            inserts: self.inserts.get(),
            evictions: self.evictions.get(),
            expirations: self.expirations.get(),
            removals: self.removals.get(),
            reclaimed: self.reclaimed.get(),
            len,
            capacity,
        }
    }

    pub fn reset(&self) {
        for cell in [
            &self.hits,
            &self.misses,
            &self.inserts,
            &self.evictions,
            &self.expirations,
            &self.removals,
            &self.reclaimed,
        ] {
            cell.reset();
        }
    }
}

impl CoreMetricsRecorder for CacheCounters {
    #[inline]
    fn record_hit(&self) {
        self.hits.incr();
    }

    #[inline]
    fn record_miss(&self) {
        self.misses.incr();
    }

    #[inline]
    fn record_insert(&self) {
        self.inserts.incr();
    }

    #[inline]
    fn record_removal(&self, cause: RemovalCause) {
        match cause {
            RemovalCause::Evicted => self.evictions.incr(),
            RemovalCause::Expired => self.expirations.incr(),
            RemovalCause::Explicit => self.removals.incr(),
            RemovalCause::Reclaimed => self.reclaimed.incr(),
        }
    }
}

/// Point-in-time view of a cache's counters and gauges.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,

    pub evictions: u64,   // capacity-driven
    pub expirations: u64, // TTL-driven
    pub removals: u64,    // explicit remove()
    pub reclaimed: u64,   // reference store reclaimed the value

    // gauges captured at snapshot time
    pub len: usize,
    pub capacity: usize,
}

impl CacheMetricsSnapshot {
    /// Total lookups observed.
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups that hit, in `[0.0, 1.0]`; `0.0` with no lookups.
    pub fn hit_rate(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_without_requests_is_zero() {
        assert_eq!(CacheMetricsSnapshot::default().hit_rate(), 0.0);
    }

    #[test]
    fn hit_rate_is_hits_over_requests() {
        let snap = CacheMetricsSnapshot {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(snap.requests(), 4);
        assert!((snap.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}

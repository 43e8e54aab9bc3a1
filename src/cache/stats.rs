//! Cache hit/miss accounting.
//!
//! Invariant: `total_hits + total_misses == total_searches` and
//! `hit_rate == total_hits / total_searches` after any sequence of
//! operations. Counters are monotonic; `clear()` on the tiers does not reset
//! them.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// Point-in-time view exposed to the operational dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsSnapshot {
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_searches: u64,
    pub hit_rate: f64,
    pub entry_count: usize,
    pub size_bytes: u64,
}

impl CacheStatsSnapshot {
    pub fn from_counters(hits: u64, misses: u64, entry_count: usize, size_bytes: u64) -> Self {
        let total = hits + misses;
        Self {
            total_hits: hits,
            total_misses: misses,
            total_searches: total,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
            entry_count,
            size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_sum_to_searches() {
        let stats = CacheStats::default();
        for _ in 0..3 {
            stats.record_hit();
        }
        stats.record_miss();

        let (hits, misses) = stats.snapshot();
        let snap = CacheStatsSnapshot::from_counters(hits, misses, 0, 0);
        assert_eq!(snap.total_hits + snap.total_misses, snap.total_searches);
        assert!((snap.hit_rate - 0.75).abs() < 1e-9);
    }

    #[test]
    fn empty_stats_have_zero_hit_rate() {
        let snap = CacheStatsSnapshot::from_counters(0, 0, 0, 0);
        assert_eq!(snap.hit_rate, 0.0);
        assert_eq!(snap.total_searches, 0);
    }
}

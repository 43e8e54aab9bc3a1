//! Layered cache coordination.
//!
//! Three independently configured tiers, checked hot → warm → cold on read
//! and written through on every fresh fetch:
//!
//! ```text
//! lookup(key)
//!     │
//!     ├──→ [Hot]  in-process LRU, minute TTL        ──→ serve
//!     ├──→ [Warm] local SQLite, hour TTL, FIFO cap  ──→ promote to hot, serve
//!     ├──→ [Cold] shared SQLite, day TTL, hit count ──→ promote to warm+hot, serve
//!     └──→ miss
//! ```
//!
//! Reads that hit a lower tier are promoted into the faster ones so repeated
//! access converges toward hot-tier latency. Promotion copies keep the source
//! entry's timestamps: moving up a tier never extends an entry's life.
//!
//! Write failures on individual tiers are logged and swallowed; the computed
//! result is still returned to the caller.

pub mod cold;
pub mod entry;
pub mod hot;
pub mod key;
pub mod stats;
pub mod warm;

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use cold::ColdTier;
use entry::{CacheEntry, CachedPayload, Tier};
use hot::HotTier;
use key::CacheKey;
use stats::{CacheStats, CacheStatsSnapshot};
use warm::WarmTier;

/// Per-tier stale/expiry offsets, captured from [`EngineConfig`].
#[derive(Debug, Clone, Copy)]
struct TierTimings {
    stale_secs: i64,
    ttl_secs: i64,
}

pub struct CacheTiers {
    hot: HotTier,
    warm: WarmTier,
    cold: ColdTier,
    stats: CacheStats,
    /// Bumped by `clear()`; promotions stamped with an older generation are
    /// discarded, so a lookup racing a clear cannot resurrect a cleared key.
    clear_gen: AtomicU64,
    hot_timings: TierTimings,
    warm_timings: TierTimings,
    cold_timings: TierTimings,
}

impl CacheTiers {
    /// Open the tier stack. `None` paths give in-memory warm/cold stores
    /// (tests and ephemeral runs); production passes real paths so those
    /// tiers survive restarts.
    pub fn open(
        config: &EngineConfig,
        warm_path: Option<&Path>,
        cold_path: Option<&Path>,
    ) -> Result<Self> {
        let warm = match warm_path {
            Some(p) => WarmTier::open(p, &config.warm)?,
            None => WarmTier::in_memory(&config.warm)?,
        };
        let cold = match cold_path {
            Some(p) => ColdTier::open(p, &config.cold)?,
            None => ColdTier::in_memory(&config.cold)?,
        };
        Ok(Self {
            hot: HotTier::new(config.hot.capacity),
            warm,
            cold,
            stats: CacheStats::default(),
            clear_gen: AtomicU64::new(0),
            hot_timings: TierTimings {
                stale_secs: config.hot.stale_secs,
                ttl_secs: config.hot.ttl_secs,
            },
            warm_timings: TierTimings {
                stale_secs: config.warm.stale_secs,
                ttl_secs: config.warm.ttl_secs,
            },
            cold_timings: TierTimings {
                stale_secs: config.cold.stale_secs,
                ttl_secs: config.cold.ttl_secs,
            },
        })
    }

    /// Request-path read: returns a servable (fresh or stale, not expired)
    /// entry, promoting lower-tier hits into the faster tiers, and records a
    /// hit or miss.
    pub fn lookup(&self, key: &CacheKey, now: i64) -> Option<CacheEntry> {
        let generation = self.clear_gen.load(Ordering::Acquire);

        if let Some(entry) = self.hot.get(key)
            && entry.is_servable(now)
        {
            self.stats.record_hit();
            return Some(entry);
        }

        match self.warm.get(key) {
            Ok(Some(entry)) if entry.is_servable(now) => {
                self.promote(generation, key, &entry, false);
                self.stats.record_hit();
                debug!(key = %key, from = "warm", "cache promotion");
                return Some(entry);
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "warm tier read failed"),
        }

        match self.cold.get(key) {
            Ok(Some(entry)) if entry.is_servable(now) => {
                self.promote(generation, key, &entry, true);
                self.stats.record_hit();
                debug!(key = %key, from = "cold", "cache promotion");
                return Some(entry);
            }
            Ok(_) => {}
            Err(e) => warn!(key = %key, error = %e, "cold tier read failed"),
        }

        self.stats.record_miss();
        None
    }

    /// Last-resort read ignoring freshness, for degraded serving when every
    /// upstream collaborator has failed. Does not touch hit/miss counters.
    pub fn peek_any(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(entry) = self.hot.get(key) {
            return Some(entry);
        }
        if let Ok(Some(entry)) = self.warm.get(key) {
            return Some(entry);
        }
        if let Ok(Some(entry)) = self.cold.get(key) {
            return Some(entry);
        }
        None
    }

    /// Write-through to every tier, each with its own TTL schedule. Tier
    /// write failures are logged, never surfaced.
    pub fn put(&self, key: &CacheKey, payload: CachedPayload, now: i64) {
        self.hot.put(
            key.clone(),
            make_entry(payload.clone(), now, self.hot_timings, Tier::Hot),
        );
        if let Err(e) = self.warm.put(
            key,
            &make_entry(payload.clone(), now, self.warm_timings, Tier::Warm),
        ) {
            warn!(key = %key, error = %e, "warm tier write failed");
        }
        if let Err(e) = self.cold.put(
            key,
            &make_entry(payload, now, self.cold_timings, Tier::Cold),
            now,
        ) {
            warn!(key = %key, error = %e, "cold tier write failed");
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        self.hot.remove(key);
        if let Err(e) = self.warm.remove(key) {
            warn!(key = %key, error = %e, "warm tier invalidate failed");
        }
        if let Err(e) = self.cold.remove(key) {
            warn!(key = %key, error = %e, "cold tier invalidate failed");
        }
    }

    /// Clear every tier. Each tier clears under its own lock, so no reader
    /// observes a partially cleared tier, and the generation bump discards
    /// any promotion from a lookup that started before the clear.
    pub fn clear(&self) {
        self.clear_gen.fetch_add(1, Ordering::Release);
        self.hot.clear();
        if let Err(e) = self.warm.clear() {
            warn!(error = %e, "warm tier clear failed");
        }
        if let Err(e) = self.cold.clear() {
            warn!(error = %e, "cold tier clear failed");
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let (hits, misses) = self.stats.snapshot();
        let entry_count = self.hot.len()
            + self.warm.count().unwrap_or(0)
            + self.cold.count().unwrap_or(0);
        let size_bytes =
            self.warm.size_bytes().unwrap_or(0) + self.cold.size_bytes().unwrap_or(0);
        CacheStatsSnapshot::from_counters(hits, misses, entry_count, size_bytes)
    }

    /// Write a lower-tier hit into the faster tiers, unless a clear ran
    /// since `generation` was observed.
    fn promote(&self, generation: u64, key: &CacheKey, entry: &CacheEntry, to_warm: bool) {
        if self.clear_gen.load(Ordering::Acquire) != generation {
            debug!(key = %key, "discarding promotion, cache cleared during lookup");
            return;
        }
        self.hot.put(key.clone(), promoted(entry, Tier::Hot));
        if to_warm
            && let Err(e) = self.warm.put(key, &promoted(entry, Tier::Warm))
        {
            warn!(key = %key, error = %e, "warm tier promotion write failed");
        }
    }
}

fn promoted(entry: &CacheEntry, tier: Tier) -> CacheEntry {
    CacheEntry {
        tier,
        ..entry.clone()
    }
}

fn make_entry(payload: CachedPayload, now: i64, timings: TierTimings, tier: Tier) -> CacheEntry {
    CacheEntry {
        payload,
        created_at: now,
        stale_at: now + timings.stale_secs,
        expires_at: now + timings.ttl_secs,
        tier,
        hits: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SearchFilters, SortOrder};
    use crate::search::normalize::normalize;

    fn tiers() -> CacheTiers {
        CacheTiers::open(&EngineConfig::default(), None, None).unwrap()
    }

    fn key(s: &str) -> CacheKey {
        key::cache_key(
            &normalize(s, 200).unwrap(),
            &SearchFilters::default(),
            SortOrder::Relevance,
        )
    }

    fn payload(total: usize) -> CachedPayload {
        CachedPayload::new(Vec::new(), total, Vec::new())
    }

    #[test]
    fn read_after_write_within_ttl_returns_payload() {
        let cache = tiers();
        let k = key("zelda");
        cache.put(&k, payload(4), 1000);

        let entry = cache.lookup(&k, 1001).expect("hit");
        assert_eq!(entry.payload.total_count, 4);
        assert_eq!(entry.tier, Tier::Hot);
    }

    #[test]
    fn hot_expiry_falls_through_to_warm() {
        let cache = tiers();
        let k = key("zelda");
        cache.put(&k, payload(2), 0);

        // Past the hot TTL (300s) but inside the warm TTL (3600s).
        let entry = cache.lookup(&k, 1000).expect("warm hit");
        assert_eq!(entry.tier, Tier::Warm);

        // The warm hit was promoted; the next read is hot with the warm
        // entry's original timestamps.
        let entry = cache.lookup(&k, 1001).expect("hot hit");
        assert_eq!(entry.tier, Tier::Hot);
        assert_eq!(entry.expires_at, 3600);
    }

    #[test]
    fn fully_expired_entry_is_a_miss_but_peekable() {
        let cache = tiers();
        let k = key("zelda");
        cache.put(&k, payload(1), 0);

        let past_all_ttls = 100_000;
        assert!(cache.lookup(&k, past_all_ttls).is_none());
        assert!(cache.peek_any(&k).is_some());
    }

    #[test]
    fn invalidate_removes_from_all_tiers() {
        let cache = tiers();
        let k = key("zelda");
        cache.put(&k, payload(1), 0);
        cache.invalidate(&k);
        assert!(cache.lookup(&k, 1).is_none());
        assert!(cache.peek_any(&k).is_none());
    }

    #[test]
    fn clear_empties_all_tiers_but_keeps_counters() {
        let cache = tiers();
        cache.put(&key("a"), payload(1), 0);
        let _ = cache.lookup(&key("a"), 1);
        cache.clear();

        let snap = cache.stats();
        assert_eq!(snap.entry_count, 0);
        assert_eq!(snap.total_searches, 1);
    }

    #[test]
    fn promotion_from_a_pre_clear_lookup_is_discarded() {
        let cache = tiers();
        let k = key("zelda");
        cache.put(&k, payload(1), 0);

        // A reader snapshots the generation and reads the warm entry, then a
        // clear lands before it promotes.
        let generation = cache.clear_gen.load(Ordering::Acquire);
        let entry = cache.warm.get(&k).unwrap().unwrap();
        cache.clear();
        cache.promote(generation, &k, &entry, true);

        assert!(cache.hot.get(&k).is_none());
        assert!(cache.warm.get(&k).unwrap().is_none());
        assert!(cache.lookup(&k, 1).is_none());
    }

    #[test]
    fn stats_invariant_holds_after_mixed_traffic() {
        let cache = tiers();
        cache.put(&key("a"), payload(1), 0);

        let _ = cache.lookup(&key("a"), 1); // hit
        let _ = cache.lookup(&key("b"), 1); // miss
        let _ = cache.lookup(&key("a"), 2); // hit
        let _ = cache.lookup(&key("c"), 2); // miss

        let snap = cache.stats();
        assert_eq!(snap.total_hits + snap.total_misses, snap.total_searches);
        assert!((snap.hit_rate - 0.5).abs() < 1e-9);
    }
}

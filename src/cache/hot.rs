//! Hot tier: in-process bounded LRU map.
//!
//! Lookup and write are O(1) amortized. Capacity eviction is handled by the
//! LRU itself; TTL interpretation is left to the tier manager, which also
//! keeps expired entries reachable for degraded serving until they are
//! replaced or fall off the LRU.

use std::num::NonZeroUsize;

use fxhash::FxBuildHasher;
use lru::LruCache;
use parking_lot::Mutex;

use super::entry::CacheEntry;
use super::key::CacheKey;

pub struct HotTier {
    entries: Mutex<LruCache<CacheKey, CacheEntry, FxBuildHasher>>,
}

impl HotTier {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::with_hasher(capacity, FxBuildHasher::default())),
        }
    }

    /// Get a clone of the entry, marking it most-recently-used.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    pub fn put(&self, key: CacheKey, entry: CacheEntry) {
        self.entries.lock().put(key, entry);
    }

    pub fn remove(&self, key: &CacheKey) {
        self.entries.lock().pop(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::{CachedPayload, Tier};

    fn entry(expires_at: i64) -> CacheEntry {
        CacheEntry {
            payload: CachedPayload::new(Vec::new(), 0, Vec::new()),
            created_at: 0,
            stale_at: expires_at / 2,
            expires_at,
            tier: Tier::Hot,
            hits: 0,
        }
    }

    fn key(s: &str) -> CacheKey {
        use crate::model::{SearchFilters, SortOrder};
        use crate::search::normalize::normalize;
        super::super::key::cache_key(
            &normalize(s, 200).unwrap(),
            &SearchFilters::default(),
            SortOrder::Relevance,
        )
    }

    #[test]
    fn lru_evicts_least_recently_used_at_capacity() {
        let tier = HotTier::new(2);
        tier.put(key("a"), entry(100));
        tier.put(key("b"), entry(100));
        // Touch "a" so "b" is the eviction candidate.
        assert!(tier.get(&key("a")).is_some());
        tier.put(key("c"), entry(100));

        assert!(tier.get(&key("a")).is_some());
        assert!(tier.get(&key("b")).is_none());
        assert!(tier.get(&key("c")).is_some());
        assert_eq!(tier.len(), 2);
    }

    #[test]
    fn clear_empties_the_tier() {
        let tier = HotTier::new(8);
        tier.put(key("a"), entry(100));
        tier.clear();
        assert!(tier.is_empty());
    }
}

//! Stale-while-revalidate refresh deduplication.
//!
//! Per cache key the engine runs a three-state machine: Fresh entries are
//! served as-is, Stale entries are served immediately while a background
//! refresh runs, Expired entries force a synchronous fetch. This module owns
//! the one invariant that needs shared state: **at most one in-flight refresh
//! per key**, however many concurrent stale reads arrive.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::key::CacheKey;

#[derive(Default)]
pub struct Revalidator {
    in_flight: Mutex<HashSet<CacheKey>>,
}

impl Revalidator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the refresh slot for `key`. Returns `None` when a refresh is
    /// already in flight; otherwise a ticket that releases the slot on drop,
    /// so a panicking or failing refresh can never wedge the key.
    pub fn begin(self: &Arc<Self>, key: &CacheKey) -> Option<RefreshTicket> {
        let claimed = self.in_flight.lock().insert(key.clone());
        claimed.then(|| RefreshTicket {
            revalidator: Arc::clone(self),
            key: key.clone(),
        })
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn finish(&self, key: &CacheKey) {
        self.in_flight.lock().remove(key);
    }
}

/// RAII claim on a key's single refresh slot.
pub struct RefreshTicket {
    revalidator: Arc<Revalidator>,
    key: CacheKey,
}

impl Drop for RefreshTicket {
    fn drop(&mut self) {
        self.revalidator.finish(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::cache_key;
    use crate::model::{SearchFilters, SortOrder};
    use crate::search::normalize::normalize;

    fn key(s: &str) -> CacheKey {
        cache_key(
            &normalize(s, 200).unwrap(),
            &SearchFilters::default(),
            SortOrder::Relevance,
        )
    }

    #[test]
    fn second_claim_on_same_key_is_rejected() {
        let reval = Revalidator::new();
        let k = key("zelda");

        let ticket = reval.begin(&k).expect("first claim");
        assert!(reval.begin(&k).is_none());
        assert_eq!(reval.in_flight_count(), 1);

        drop(ticket);
        assert!(reval.begin(&k).is_some());
    }

    #[test]
    fn distinct_keys_refresh_independently() {
        let reval = Revalidator::new();
        let a = reval.begin(&key("a"));
        let b = reval.begin(&key("b"));
        assert!(a.is_some() && b.is_some());
        assert_eq!(reval.in_flight_count(), 2);
    }
}

//! Stable cache keys.
//!
//! A key is the SHA-256 of the canonical `query | filters | sort` encoding.
//! Determinism matters more than speed here: the same logical request must
//! map to the same key across processes and restarts, since the cold tier is
//! shared. Filter sets serialize as sorted `BTreeSet`s, so field order and
//! set order are both fixed.

use sha2::{Digest, Sha256};

use crate::model::{SearchFilters, SortOrder};
use crate::search::normalize::NormalizedQuery;

/// Hex SHA-256 key identifying one (query, filters, sort) combination.
///
/// This is the single canonical key type: cache tiers store it directly and
/// analytics keys by the normalized query text, so neither structure holds
/// references into the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a request.
pub fn cache_key(query: &NormalizedQuery, filters: &SearchFilters, sort: SortOrder) -> CacheKey {
    // serde_json writes struct fields in declaration order and BTreeSets in
    // sorted order, so this encoding is canonical.
    let filters_json = serde_json::to_string(filters).unwrap_or_default();
    let sort_json = serde_json::to_string(&sort).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(query.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(filters_json.as_bytes());
    hasher.update([0u8]);
    hasher.update(sort_json.as_bytes());
    CacheKey(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::normalize::normalize;

    #[test]
    fn same_request_same_key() {
        let q = normalize("Zelda", 200).unwrap();
        let a = cache_key(&q, &SearchFilters::default(), SortOrder::Relevance);
        let b = cache_key(&q, &SearchFilters::default(), SortOrder::Relevance);
        assert_eq!(a, b);
    }

    #[test]
    fn sort_and_filters_change_the_key() {
        let q = normalize("zelda", 200).unwrap();
        let base = cache_key(&q, &SearchFilters::default(), SortOrder::Relevance);

        let sorted = cache_key(&q, &SearchFilters::default(), SortOrder::RatingDesc);
        assert_ne!(base, sorted);

        let mut filters = SearchFilters::default();
        filters.genres.insert("rpg".into());
        let filtered = cache_key(&q, &filters, SortOrder::Relevance);
        assert_ne!(base, filtered);
    }

    #[test]
    fn normalization_collapses_to_one_key() {
        let a = normalize("  ZELDA ", 200).unwrap();
        let b = normalize("zelda", 200).unwrap();
        assert_eq!(
            cache_key(&a, &SearchFilters::default(), SortOrder::Relevance),
            cache_key(&b, &SearchFilters::default(), SortOrder::Relevance)
        );
    }
}

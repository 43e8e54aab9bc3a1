//! Core data types shared across the engine.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A candidate game record as returned by a storage or catalog collaborator.
///
/// Optional fields (`rating`, `release_date`) contribute zero to ranking when
/// absent; they never exclude a candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub platforms: BTreeSet<String>,
    pub rating: Option<f32>,
    #[serde(default)]
    pub review_count: u64,
    pub release_date: Option<NaiveDate>,
}

/// Closed, versioned filter set.
///
/// Every supported filter is enumerated here with explicit optionality;
/// unknown keys in serialized input are rejected rather than ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchFilters {
    #[serde(default)]
    pub genres: BTreeSet<String>,
    #[serde(default)]
    pub platforms: BTreeSet<String>,
    pub rating_floor: Option<f32>,
    pub released_from: Option<NaiveDate>,
    pub released_to: Option<NaiveDate>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.genres.is_empty()
            && self.platforms.is_empty()
            && self.rating_floor.is_none()
            && self.released_from.is_none()
            && self.released_to.is_none()
    }

    /// Whether a record passes every active filter.
    pub fn matches(&self, game: &GameRecord) -> bool {
        if !self.genres.is_empty() && self.genres.is_disjoint(&game.genres) {
            return false;
        }
        if !self.platforms.is_empty() && self.platforms.is_disjoint(&game.platforms) {
            return false;
        }
        if let Some(floor) = self.rating_floor
            && game.rating.is_none_or(|r| r < floor)
        {
            return false;
        }
        if let Some(from) = self.released_from
            && game.release_date.is_none_or(|d| d < from)
        {
            return false;
        }
        if let Some(to) = self.released_to
            && game.release_date.is_none_or(|d| d > to)
        {
            return false;
        }
        true
    }
}

/// Result ordering requested by the caller. Part of the cache key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    RatingDesc,
    NewestFirst,
    TitleAsc,
}

/// Pagination window applied after cache retrieval, so a single cache entry
/// serves every page of the same query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

/// Per-factor contributions behind a [`RankedResult::score`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub exact: f64,
    pub prefix: f64,
    pub all_words: f64,
    pub fuzzy: f64,
    pub popularity: f64,
    pub recency: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.exact + self.prefix + self.all_words + self.fuzzy + self.popularity + self.recency
    }
}

/// A scored candidate. Lists of these are always ordered by `score`
/// descending, ties broken by ascending `game.id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub game: GameRecord,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Response returned to the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<RankedResult>,
    pub total_count: usize,
    pub cache_hit: bool,
    /// True when the payload was served past its expiry because every
    /// upstream collaborator failed.
    pub degraded: bool,
    pub suggestions: Vec<String>,
}

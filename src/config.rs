//! Engine configuration.
//!
//! Every tunable lives in a struct with a `Default` impl; `from_env()` applies
//! `GAMESEARCH_*` overrides read through dotenvy. Ranking weights are a
//! tunable table, not literals scattered through the ranker.

use std::time::Duration;

/// Additive ranking factor weights.
///
/// The popularity term is capped below the exact-match bonus so raw review
/// volume can never outrank an exact title hit.
#[derive(Debug, Clone)]
pub struct RankingWeights {
    /// Case-insensitive exact title match.
    pub exact_match: f64,
    /// Title starts with the query.
    pub prefix_match: f64,
    /// Every query word appears in the title.
    pub all_words: f64,
    /// Multiplier applied to the [0, 1] fuzzy similarity.
    pub fuzzy_scale: f64,
    /// Score per review, before capping.
    pub popularity_per_review: f64,
    /// Ceiling on the popularity term.
    pub popularity_cap: f64,
    /// Bonus for a release inside the recency window.
    pub recency_bonus: f64,
    /// Days after release during which the full bonus applies.
    pub recency_full_days: i64,
    /// Days after which the bonus has decayed to zero.
    pub recency_horizon_days: i64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            exact_match: 2000.0,
            prefix_match: 500.0,
            all_words: 100.0,
            fuzzy_scale: 300.0,
            popularity_per_review: 0.1,
            popularity_cap: 1000.0,
            recency_bonus: 250.0,
            recency_full_days: 90,
            recency_horizon_days: 730,
        }
    }
}

/// Hot tier: in-process LRU map.
#[derive(Debug, Clone)]
pub struct HotTierConfig {
    pub capacity: usize,
    pub ttl_secs: i64,
    pub stale_secs: i64,
}

impl Default for HotTierConfig {
    fn default() -> Self {
        Self {
            capacity: 512,
            ttl_secs: 300,
            stale_secs: 60,
        }
    }
}

/// Warm tier: local persistent store, size-bounded FIFO.
#[derive(Debug, Clone)]
pub struct WarmTierConfig {
    pub max_entries: usize,
    pub ttl_secs: i64,
    pub stale_secs: i64,
}

impl Default for WarmTierConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            ttl_secs: 3600,
            stale_secs: 900,
        }
    }
}

/// Cold tier: shared persistent store, time-bounded.
#[derive(Debug, Clone)]
pub struct ColdTierConfig {
    pub ttl_secs: i64,
    pub stale_secs: i64,
    /// Expired rows are kept this long past `expires_at` so they remain
    /// available for degraded serving, then pruned.
    pub prune_grace_secs: i64,
}

impl Default for ColdTierConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            stale_secs: 21_600,
            prune_grace_secs: 604_800,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Queries longer than this are rejected before any I/O.
    pub max_query_len: usize,
    /// Below this many results the fuzzy fallback and suggestions kick in.
    pub min_results: usize,
    /// Ceiling on ranked results kept per cache entry.
    pub max_results: usize,
    /// Edit-distance budget for "did you mean" suggestions.
    pub max_suggest_distance: usize,
    pub max_suggestions: usize,
    /// How many popular titles to pull as the suggestion corpus.
    pub suggestion_corpus_size: usize,
    /// Deadline for any single storage/catalog call.
    pub upstream_timeout: Duration,
    pub weights: RankingWeights,
    pub hot: HotTierConfig,
    pub warm: WarmTierConfig,
    pub cold: ColdTierConfig,
    /// Interval between cache-warming sweeps.
    pub warm_interval: Duration,
    /// How many popular queries each sweep refreshes.
    pub warm_top_n: usize,
    /// Analytics rolling-window width.
    pub analytics_window_secs: i64,
    /// When true, no user identifier is attached to analytics records.
    pub anonymous_analytics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_query_len: 200,
            min_results: 5,
            max_results: 100,
            max_suggest_distance: 2,
            max_suggestions: 5,
            suggestion_corpus_size: 500,
            upstream_timeout: Duration::from_secs(3),
            weights: RankingWeights::default(),
            hot: HotTierConfig::default(),
            warm: WarmTierConfig::default(),
            cold: ColdTierConfig::default(),
            warm_interval: Duration::from_secs(3600),
            warm_top_n: 20,
            analytics_window_secs: 3600,
            anonymous_analytics: false,
        }
    }
}

impl EngineConfig {
    /// Load config from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(val) = dotenvy::var("GAMESEARCH_MAX_QUERY_LEN")
            && let Ok(n) = val.parse()
        {
            cfg.max_query_len = n;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_MIN_RESULTS")
            && let Ok(n) = val.parse()
        {
            cfg.min_results = n;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_MAX_RESULTS")
            && let Ok(n) = val.parse()
        {
            cfg.max_results = n;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_UPSTREAM_TIMEOUT_SECS")
            && let Ok(secs) = val.parse()
        {
            cfg.upstream_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_HOT_CAPACITY")
            && let Ok(n) = val.parse()
        {
            cfg.hot.capacity = n;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_WARM_MAX_ENTRIES")
            && let Ok(n) = val.parse()
        {
            cfg.warm.max_entries = n;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_WARM_INTERVAL_SECS")
            && let Ok(secs) = val.parse()
        {
            cfg.warm_interval = Duration::from_secs(secs);
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_WARM_TOP_N")
            && let Ok(n) = val.parse()
        {
            cfg.warm_top_n = n;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_ANALYTICS_WINDOW_SECS")
            && let Ok(secs) = val.parse()
        {
            cfg.analytics_window_secs = secs;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_ANONYMOUS_ANALYTICS") {
            cfg.anonymous_analytics = matches!(val.as_str(), "1" | "true" | "yes");
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_WEIGHT_EXACT")
            && let Ok(w) = val.parse()
        {
            cfg.weights.exact_match = w;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_WEIGHT_PREFIX")
            && let Ok(w) = val.parse()
        {
            cfg.weights.prefix_match = w;
        }

        if let Ok(val) = dotenvy::var("GAMESEARCH_WEIGHT_POPULARITY_CAP")
            && let Ok(w) = val.parse()
        {
            cfg.weights.popularity_cap = w;
        }

        cfg
    }
}

//! The search engine: request orchestration across cache, store, and catalog.
//!
//! ```text
//! search(raw, filters, sort, page)
//!     │
//!     ├──→ [Normalizer] ──→ InvalidQuery rejected before any I/O
//!     ├──→ [Cache Tiers]
//!     │        Fresh  ──→ serve
//!     │        Stale  ──→ serve + spawn one background refresh
//!     │        miss/Expired
//!     │            │
//!     ├──→ [Store text search] ─(short)→ [similarity fallback] ─(short)→ [catalog]
//!     │        failure ──→ [catalog] ──→ failure ──→ serve expired entry, degraded
//!     ├──→ [Ranker] ──→ write-through to all tiers
//!     └──→ [Analytics] (async, never blocks)
//! ```
//!
//! Independent queries run concurrently with no global lock; the only per-key
//! mutual exclusion is refresh deduplication in [`Revalidator`] and the tier
//! maps' own locks. Upstream calls are blocking collaborator code dispatched
//! through `spawn_blocking` under a `tokio::time::timeout` deadline.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate};
use tracing::{debug, info, warn};

use crate::analytics::{AnalyticsRecorder, Clock};
use crate::cache::CacheTiers;
use crate::cache::entry::{CachedPayload, Freshness};
use crate::cache::key::{CacheKey, cache_key};
use crate::cache::stats::CacheStatsSnapshot;
use crate::config::EngineConfig;
use crate::error::SearchError;
use crate::model::{GameRecord, PageRequest, SearchFilters, SearchResponse, SortOrder};
use crate::search::normalize::{NormalizedQuery, normalize};
use crate::search::{fuzzy, ranker};
use crate::swr::Revalidator;
use crate::upstream::{CatalogClient, GameStore, UpstreamError};

pub struct SearchEngine {
    config: EngineConfig,
    store: Arc<dyn GameStore>,
    catalog: Option<Arc<dyn CatalogClient>>,
    cache: Arc<CacheTiers>,
    revalidator: Arc<Revalidator>,
    analytics: Arc<AnalyticsRecorder>,
    clock: Arc<dyn Clock>,
}

impl SearchEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn GameStore>,
        catalog: Option<Arc<dyn CatalogClient>>,
        cache: Arc<CacheTiers>,
        analytics: Arc<AnalyticsRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            catalog,
            cache,
            revalidator: Revalidator::new(),
            analytics,
            clock,
        })
    }

    /// Execute one search request.
    ///
    /// `user` only feeds analytics attribution and is dropped entirely in
    /// anonymous mode.
    pub async fn search(
        self: &Arc<Self>,
        raw: &str,
        filters: SearchFilters,
        sort: SortOrder,
        page: PageRequest,
        user: Option<&str>,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let query = normalize(raw, self.config.max_query_len)?;
        let key = cache_key(&query, &filters, sort);
        let now = self.clock.now_unix();

        if let Some(entry) = self.cache.lookup(&key, now) {
            if entry.freshness(now) == Freshness::Stale {
                self.spawn_revalidation(&key, &query, &filters, sort);
            }
            debug!(query = %query, tier = ?entry.tier, "cache hit");
            return Ok(self.respond(entry.payload, true, false, page, &query, user, started));
        }

        match self.fetch_and_store(&key, &query, &filters, sort).await {
            Ok(payload) => Ok(self.respond(payload, false, false, page, &query, user, started)),
            Err(e) if e.is_upstream() => {
                // Last resort: an expired entry beats an error page.
                if let Some(entry) = self.cache.peek_any(&key) {
                    warn!(query = %query, error = %e, "serving expired entry, all upstreams failed");
                    Ok(self.respond(entry.payload, true, true, page, &query, user, started))
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch-and-cache cycle for the top popular queries. Always fetches
    /// fresh (no stale check); one failing query never aborts the batch.
    pub async fn warm_cache(self: &Arc<Self>) -> usize {
        let top = self.analytics.top_queries(self.config.warm_top_n);
        let mut warmed = 0;
        for record in top {
            let query = match normalize(&record.query, self.config.max_query_len) {
                Ok(q) => q,
                Err(e) => {
                    debug!(query = %record.query, error = %e, "skipping unwarmable query");
                    continue;
                }
            };
            let filters = SearchFilters::default();
            let key = cache_key(&query, &filters, SortOrder::Relevance);
            match self
                .fetch_and_store(&key, &query, &filters, SortOrder::Relevance)
                .await
            {
                Ok(_) => warmed += 1,
                Err(e) => {
                    warn!(query = %query, error = %e, "warm fetch failed, continuing batch");
                }
            }
        }
        info!(warmed = warmed, "cache warm sweep complete");
        warmed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    pub fn analytics(&self) -> &Arc<AnalyticsRecorder> {
        &self.analytics
    }

    /// Number of background refreshes currently in flight.
    pub fn refreshes_in_flight(&self) -> usize {
        self.revalidator.in_flight_count()
    }

    fn respond(
        &self,
        payload: CachedPayload,
        cache_hit: bool,
        degraded: bool,
        page: PageRequest,
        query: &NormalizedQuery,
        user: Option<&str>,
        started: Instant,
    ) -> SearchResponse {
        let latency_ms = started.elapsed().as_millis() as u64;
        self.analytics
            .record(query.as_str(), payload.total_count, latency_ms, cache_hit, user);
        let results = payload
            .results
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect();
        SearchResponse {
            results,
            total_count: payload.total_count,
            cache_hit,
            degraded,
            suggestions: payload.suggestions,
        }
    }

    /// Full fetch-rank-cache cycle for a cache miss or refresh.
    async fn fetch_and_store(
        self: &Arc<Self>,
        key: &CacheKey,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        sort: SortOrder,
    ) -> Result<CachedPayload, SearchError> {
        let candidates = self.gather_candidates(query, filters).await?;

        let now = self.clock.now_unix();
        let mut ranked = ranker::rank(query, candidates, &self.config.weights, today(now));
        ranker::apply_sort(&mut ranked, sort);
        let total_count = ranked.len();
        ranked.truncate(self.config.max_results);

        let suggestions = if total_count < self.config.min_results {
            self.suggestions(query).await
        } else {
            Vec::new()
        };

        let payload = CachedPayload::new(ranked, total_count, suggestions);
        self.cache.put(key, payload.clone(), now);
        Ok(payload)
    }

    /// Candidate gathering with the escalation ladder: text search, then
    /// similarity fallback when short, then the catalog. A hard store
    /// failure skips straight to the catalog.
    async fn gather_candidates(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
    ) -> Result<Vec<GameRecord>, SearchError> {
        let limit = self.config.max_results;

        let primary = {
            let store = Arc::clone(&self.store);
            let (q, f) = (query.clone(), filters.clone());
            self.with_deadline(move || store.text_search(&q, &f, limit))
                .await
        };

        let mut candidates = match primary {
            Ok(c) => c,
            Err(e) => {
                warn!(query = %query, error = %e, "store text search failed, falling back to catalog");
                return self.catalog_fallback(query, e).await;
            }
        };

        // Fuzzy matching only runs when exact/text search came up short.
        if candidates.len() < self.config.min_results {
            let fallback = {
                let store = Arc::clone(&self.store);
                let (q, f) = (query.clone(), filters.clone());
                self.with_deadline(move || store.similarity_search(&q, &f, limit))
                    .await
            };
            match fallback {
                Ok(more) => merge_by_id(&mut candidates, more),
                Err(e) => warn!(query = %query, error = %e, "similarity fallback failed"),
            }
        }

        if candidates.len() < self.config.min_results
            && let Some(catalog) = &self.catalog
        {
            let supplement = {
                let catalog = Arc::clone(catalog);
                let q = query.clone();
                self.with_deadline(move || catalog.lookup(&q, limit)).await
            };
            match supplement {
                Ok(more) => {
                    let filtered = more.into_iter().filter(|g| filters.matches(g)).collect();
                    merge_by_id(&mut candidates, filtered);
                }
                Err(e) => warn!(query = %query, error = %e, "catalog supplement failed"),
            }
        }

        Ok(candidates)
    }

    /// Catalog attempt after a hard store failure. When both collaborators
    /// fail, the primary store error is the one surfaced.
    async fn catalog_fallback(
        &self,
        query: &NormalizedQuery,
        store_error: UpstreamError,
    ) -> Result<Vec<GameRecord>, SearchError> {
        let Some(catalog) = &self.catalog else {
            return Err(map_upstream(store_error));
        };
        let result = {
            let catalog = Arc::clone(catalog);
            let q = query.clone();
            let limit = self.config.max_results;
            self.with_deadline(move || catalog.lookup(&q, limit)).await
        };
        match result {
            Ok(candidates) => Ok(candidates),
            Err(e) => {
                warn!(query = %query, error = %e, "catalog fallback also failed");
                Err(map_upstream(store_error))
            }
        }
    }

    async fn suggestions(&self, query: &NormalizedQuery) -> Vec<String> {
        let corpus = {
            let store = Arc::clone(&self.store);
            let limit = self.config.suggestion_corpus_size;
            self.with_deadline(move || store.suggestion_corpus(limit))
                .await
        };
        match corpus {
            Ok(corpus) => fuzzy::suggest(
                query.as_str(),
                &corpus,
                self.config.max_suggest_distance,
                self.config.max_suggestions,
            ),
            Err(e) => {
                warn!(query = %query, error = %e, "suggestion corpus unavailable");
                Vec::new()
            }
        }
    }

    /// Serve the stale payload now, refresh in the background. The ticket
    /// guarantees at most one in-flight refresh per key; the spawned task is
    /// detached, so a caller abandoning its request never cancels a refresh
    /// that would benefit future callers.
    fn spawn_revalidation(
        self: &Arc<Self>,
        key: &CacheKey,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        sort: SortOrder,
    ) {
        let Some(ticket) = self.revalidator.begin(key) else {
            debug!(key = %key, "refresh already in flight");
            return;
        };

        let engine = Arc::clone(self);
        let key = key.clone();
        let query = query.clone();
        let filters = filters.clone();
        tokio::spawn(async move {
            let _ticket = ticket;
            match engine.fetch_and_store(&key, &query, &filters, sort).await {
                Ok(_) => debug!(key = %key, "revalidation complete"),
                Err(e) => {
                    // The stale entry stays servable until expires_at.
                    warn!(key = %key, error = %e, "revalidation failed");
                }
            }
        });
    }

    /// Run a blocking collaborator call off the async path, bounded by the
    /// configured upstream deadline.
    async fn with_deadline<T, F>(&self, f: F) -> Result<T, UpstreamError>
    where
        F: FnOnce() -> Result<T, UpstreamError> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = self.config.upstream_timeout;
        match tokio::time::timeout(deadline, tokio::task::spawn_blocking(f)).await {
            Err(_) => Err(UpstreamError::Timeout(deadline)),
            Ok(Err(join)) => Err(UpstreamError::Unavailable(format!("task failed: {join}"))),
            Ok(Ok(result)) => result,
        }
    }
}

fn map_upstream(e: UpstreamError) -> SearchError {
    match e {
        UpstreamError::Timeout(d) => SearchError::UpstreamTimeout(d),
        UpstreamError::Unavailable(msg) => SearchError::UpstreamUnavailable(msg),
    }
}

fn merge_by_id(candidates: &mut Vec<GameRecord>, more: Vec<GameRecord>) {
    let seen: HashSet<u64> = candidates.iter().map(|g| g.id).collect();
    candidates.extend(more.into_iter().filter(|g| !seen.contains(&g.id)));
}

fn today(now: i64) -> NaiveDate {
    DateTime::from_timestamp(now, 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_by_id_deduplicates() {
        let game = |id: u64| GameRecord {
            id,
            title: format!("g{id}"),
            genres: Default::default(),
            platforms: Default::default(),
            rating: None,
            review_count: 0,
            release_date: None,
        };
        let mut base = vec![game(1), game(2)];
        merge_by_id(&mut base, vec![game(2), game(3)]);
        let ids: Vec<u64> = base.iter().map(|g| g.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn upstream_errors_map_onto_taxonomy() {
        assert!(matches!(
            map_upstream(UpstreamError::Timeout(std::time::Duration::from_secs(3))),
            SearchError::UpstreamTimeout(_)
        ));
        assert!(matches!(
            map_upstream(UpstreamError::Unavailable("down".into())),
            SearchError::UpstreamUnavailable(_)
        ));
    }
}

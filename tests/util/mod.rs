//! Shared fixtures: in-memory collaborators and a manual clock.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use game_search::analytics::{AnalyticsRecorder, Clock};
use game_search::cache::CacheTiers;
use game_search::config::EngineConfig;
use game_search::engine::SearchEngine;
use game_search::model::{GameRecord, SearchFilters};
use game_search::search::NormalizedQuery;
use game_search::upstream::{CatalogClient, GameStore, UpstreamError};

pub fn game(id: u64, title: &str, reviews: u64) -> GameRecord {
    GameRecord {
        id,
        title: title.to_string(),
        genres: Default::default(),
        platforms: Default::default(),
        rating: None,
        review_count: reviews,
        release_date: None,
    }
}

/// Manually advanced clock shared by the engine and the test body.
pub struct ManualClock(Mutex<i64>);

impl ManualClock {
    pub fn at(t: i64) -> Arc<Self> {
        Arc::new(Self(Mutex::new(t)))
    }

    pub fn advance(&self, secs: i64) {
        *self.0.lock() += secs;
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        *self.0.lock()
    }
}

/// In-memory storage collaborator with call counting and fault injection.
pub struct FakeStore {
    games: Mutex<Vec<GameRecord>>,
    pub text_calls: AtomicUsize,
    pub fail_all: AtomicBool,
    /// Artificial latency per text search, to hold a fetch in flight.
    pub delay_ms: AtomicU64,
    fail_query: Mutex<Option<String>>,
}

impl FakeStore {
    pub fn new(games: Vec<GameRecord>) -> Arc<Self> {
        Arc::new(Self {
            games: Mutex::new(games),
            text_calls: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            fail_query: Mutex::new(None),
        })
    }

    /// Make every call touching this query text fail.
    pub fn fail_for(&self, query: &str) {
        *self.fail_query.lock() = Some(query.to_string());
    }

    pub fn text_call_count(&self) -> usize {
        self.text_calls.load(Ordering::SeqCst)
    }

    fn check_faults(&self, query: &NormalizedQuery) -> Result<(), UpstreamError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(UpstreamError::Unavailable("injected store failure".into()));
        }
        if let Some(bad) = self.fail_query.lock().as_deref()
            && query.as_str().contains(bad)
        {
            return Err(UpstreamError::Unavailable("injected query failure".into()));
        }
        Ok(())
    }
}

impl GameStore for FakeStore {
    fn text_search(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            // Runs on the blocking pool, so sleeping here is fine.
            std::thread::sleep(std::time::Duration::from_millis(delay));
        }
        self.check_faults(query)?;
        let hits = self
            .games
            .lock()
            .iter()
            .filter(|g| {
                let title = g.title.to_lowercase();
                query.words().all(|w| title.contains(w))
            })
            .filter(|g| filters.matches(g))
            .take(limit)
            .cloned()
            .collect();
        Ok(hits)
    }

    fn similarity_search(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError> {
        self.check_faults(query)?;
        let hits = self
            .games
            .lock()
            .iter()
            .filter(|g| {
                game_search::search::fuzzy::similarity(query.as_str(), &g.title.to_lowercase())
                    >= 0.4
            })
            .filter(|g| filters.matches(g))
            .take(limit)
            .cloned()
            .collect();
        Ok(hits)
    }

    fn suggestion_corpus(&self, limit: usize) -> Result<Vec<String>, UpstreamError> {
        Ok(self
            .games
            .lock()
            .iter()
            .take(limit)
            .map(|g| g.title.clone())
            .collect())
    }
}

/// In-memory external catalog collaborator.
pub struct FakeCatalog {
    games: Mutex<Vec<GameRecord>>,
    pub calls: AtomicUsize,
    pub fail_all: AtomicBool,
}

impl FakeCatalog {
    pub fn new(games: Vec<GameRecord>) -> Arc<Self> {
        Arc::new(Self {
            games: Mutex::new(games),
            calls: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
        })
    }
}

impl CatalogClient for FakeCatalog {
    fn lookup(
        &self,
        query: &NormalizedQuery,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(UpstreamError::Unavailable(
                "injected catalog failure".into(),
            ));
        }
        let hits = self
            .games
            .lock()
            .iter()
            .filter(|g| {
                let title = g.title.to_lowercase();
                query.words().all(|w| title.contains(w))
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(hits)
    }
}

pub struct Harness {
    pub engine: Arc<SearchEngine>,
    pub store: Arc<FakeStore>,
    pub catalog: Arc<FakeCatalog>,
    pub clock: Arc<ManualClock>,
}

/// Short TTLs so tests can walk entries through fresh → stale → expired by
/// advancing the clock.
pub fn test_config() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.hot.ttl_secs = 1000;
    cfg.hot.stale_secs = 10;
    cfg.warm.ttl_secs = 2000;
    cfg.warm.stale_secs = 500;
    cfg.cold.ttl_secs = 3000;
    cfg.cold.stale_secs = 1000;
    cfg.analytics_window_secs = 10_000;
    cfg
}

pub fn harness(store_games: Vec<GameRecord>, catalog_games: Vec<GameRecord>) -> Harness {
    harness_with(store_games, catalog_games, test_config())
}

pub fn harness_with(
    store_games: Vec<GameRecord>,
    catalog_games: Vec<GameRecord>,
    config: EngineConfig,
) -> Harness {
    let clock = ManualClock::at(0);
    let store = FakeStore::new(store_games);
    let catalog = FakeCatalog::new(catalog_games);
    let cache = Arc::new(CacheTiers::open(&config, None, None).expect("in-memory tiers"));
    let analytics = Arc::new(
        AnalyticsRecorder::start(
            config.analytics_window_secs,
            config.anonymous_analytics,
            None,
            clock.clone() as Arc<dyn Clock>,
        )
        .expect("analytics"),
    );

    let engine = SearchEngine::new(
        config,
        store.clone(),
        Some(catalog.clone() as Arc<dyn CatalogClient>),
        cache,
        analytics,
        clock.clone(),
    );

    Harness {
        engine,
        store,
        catalog,
        clock,
    }
}

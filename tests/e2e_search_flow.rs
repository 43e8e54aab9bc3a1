//! End-to-end request flows: miss/hit, ranking, fallback, degraded serving.

mod util;

use std::sync::atomic::Ordering;

use game_search::error::{InvalidQuery, SearchError};
use game_search::model::{PageRequest, SearchFilters, SortOrder};
use util::{game, harness};

fn page() -> PageRequest {
    PageRequest::default()
}

#[tokio::test(flavor = "multi_thread")]
async fn miss_then_hit_round_trip() {
    let h = harness(vec![game(1, "Zelda", 500)], Vec::new());

    let first = h
        .engine
        .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.total_count, 1);

    let second = h
        .engine
        .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.results, first.results);
    assert_eq!(h.store.text_call_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn exact_match_outranks_popular_partial_match() {
    let h = harness(
        vec![game(2, "Legend of Zelda", 50_000), game(1, "Zelda", 500)],
        Vec::new(),
    );

    let response = h
        .engine
        .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert_eq!(response.results[0].game.title, "Zelda");
    assert_eq!(response.results[1].game.title, "Legend of Zelda");
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_candidate_set_is_not_an_error() {
    let h = harness(Vec::new(), Vec::new());

    let response = h
        .engine
        .search("qwxyt", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert!(response.results.is_empty());
    assert_eq!(response.total_count, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn over_length_query_rejected_before_any_io() {
    let h = harness(vec![game(1, "Zelda", 500)], Vec::new());

    let long = "a".repeat(500);
    let err = h
        .engine
        .search(&long, SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::InvalidQuery(InvalidQuery::TooLong { len: 500, .. })
    ));

    // Rejected before the cache or the store were consulted.
    assert_eq!(h.store.text_call_count(), 0);
    assert_eq!(h.engine.cache_stats().total_searches, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn store_failure_falls_back_to_catalog() {
    let h = harness(Vec::new(), vec![game(9, "Zelda", 100)]);
    h.store.fail_all.store(true, Ordering::SeqCst);

    let response = h
        .engine
        .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert_eq!(response.results[0].game.id, 9);
    assert!(h.catalog.calls.load(Ordering::SeqCst) >= 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn both_upstreams_failing_serves_expired_entry_as_degraded() {
    let h = harness(vec![game(1, "Zelda", 500)], Vec::new());

    let fresh = h
        .engine
        .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert!(!fresh.degraded);

    // Walk past every tier's expiry, then break both collaborators.
    h.clock.advance(100_000);
    h.store.fail_all.store(true, Ordering::SeqCst);
    h.catalog.fail_all.store(true, Ordering::SeqCst);

    let degraded = h
        .engine
        .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert!(degraded.degraded);
    assert_eq!(degraded.results, fresh.results);
}

#[tokio::test(flavor = "multi_thread")]
async fn both_upstreams_failing_with_cold_cache_surfaces_error() {
    let h = harness(vec![game(1, "Zelda", 500)], Vec::new());
    h.store.fail_all.store(true, Ordering::SeqCst);
    h.catalog.fail_all.store(true, Ordering::SeqCst);

    let err = h
        .engine
        .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap_err();
    assert!(err.is_upstream());
}

#[tokio::test(flavor = "multi_thread")]
async fn sparse_results_produce_suggestions() {
    let h = harness(
        vec![game(1, "Zelda", 500), game(2, "Halo", 400)],
        Vec::new(),
    );

    let response = h
        .engine
        .search("zeldo", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();
    assert!(response.suggestions.contains(&"Zelda".to_string()));
}

#[tokio::test(flavor = "multi_thread")]
async fn pagination_slices_the_cached_list() {
    let games = (1..=30).map(|i| game(i, &format!("mario {i}"), 0)).collect();
    let h = harness(games, Vec::new());

    let first_page = h
        .engine
        .search(
            "mario",
            SearchFilters::default(),
            SortOrder::Relevance,
            PageRequest { offset: 0, limit: 10 },
            None,
        )
        .await
        .unwrap();
    let second_page = h
        .engine
        .search(
            "mario",
            SearchFilters::default(),
            SortOrder::Relevance,
            PageRequest { offset: 10, limit: 10 },
            None,
        )
        .await
        .unwrap();

    assert_eq!(first_page.total_count, 30);
    assert_eq!(first_page.results.len(), 10);
    assert_eq!(second_page.results.len(), 10);
    assert_ne!(first_page.results[0].game.id, second_page.results[0].game.id);
    // Both pages came from the same entry: one upstream fetch.
    assert_eq!(h.store.text_call_count(), 1);
    assert!(second_page.cache_hit);
}

#[tokio::test(flavor = "multi_thread")]
async fn stats_invariant_holds_through_engine_traffic() {
    let h = harness(vec![game(1, "Zelda", 500)], Vec::new());

    for _ in 0..3 {
        let _ = h
            .engine
            .search("zelda", SearchFilters::default(), SortOrder::Relevance, page(), None)
            .await
            .unwrap();
    }
    let _ = h
        .engine
        .search("halo", SearchFilters::default(), SortOrder::Relevance, page(), None)
        .await
        .unwrap();

    let stats = h.engine.cache_stats();
    assert_eq!(stats.total_hits + stats.total_misses, stats.total_searches);
    assert_eq!(stats.total_searches, 4);
    assert_eq!(stats.total_hits, 2);
}

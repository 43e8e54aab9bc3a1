//! Multi-factor relevance scoring.
//!
//! Scoring is additive over independent, non-negative factors so any result's
//! position can be explained from its [`ScoreBreakdown`] alone:
//!
//! ```text
//! score = exact + prefix + all_words
//!       + fuzzy_similarity * fuzzy_scale
//!       + min(popularity_per_review * reviews, popularity_cap)
//!       + recency(release_date)
//! ```
//!
//! Ordering is deterministic: score descending, ties broken by ascending id,
//! stable across repeated calls with identical inputs.

use std::cmp::Ordering;

use chrono::NaiveDate;

use crate::config::RankingWeights;
use crate::model::{GameRecord, RankedResult, ScoreBreakdown, SortOrder};
use crate::search::fuzzy;
use crate::search::normalize::NormalizedQuery;

/// Score and order candidates for a query.
///
/// `today` anchors the recency factor; callers pass it from the injected
/// clock so ranking stays a pure function. Zero candidates returns an empty
/// ordered list, never an error.
pub fn rank(
    query: &NormalizedQuery,
    candidates: Vec<GameRecord>,
    weights: &RankingWeights,
    today: NaiveDate,
) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = candidates
        .into_iter()
        .map(|game| {
            let breakdown = score_one(query, &game, weights, today);
            RankedResult {
                score: breakdown.total(),
                breakdown,
                game,
            }
        })
        .collect();

    ranked.sort_by(by_score_then_id);
    ranked
}

/// Re-order an already-ranked list for a non-relevance sort.
///
/// Missing fields sort last; ties still break by ascending id so every sort
/// order stays deterministic.
pub fn apply_sort(results: &mut [RankedResult], sort: SortOrder) {
    match sort {
        SortOrder::Relevance => {}
        SortOrder::RatingDesc => results.sort_by(|a, b| {
            let ra = a.game.rating.unwrap_or(f32::NEG_INFINITY);
            let rb = b.game.rating.unwrap_or(f32::NEG_INFINITY);
            rb.partial_cmp(&ra)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.game.id.cmp(&b.game.id))
        }),
        SortOrder::NewestFirst => results.sort_by(|a, b| {
            b.game
                .release_date
                .cmp(&a.game.release_date)
                .then_with(|| a.game.id.cmp(&b.game.id))
        }),
        SortOrder::TitleAsc => results.sort_by(|a, b| {
            a.game
                .title
                .cmp(&b.game.title)
                .then_with(|| a.game.id.cmp(&b.game.id))
        }),
    }
}

fn by_score_then_id(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.game.id.cmp(&b.game.id))
}

fn score_one(
    query: &NormalizedQuery,
    game: &GameRecord,
    weights: &RankingWeights,
    today: NaiveDate,
) -> ScoreBreakdown {
    let title = game.title.to_lowercase();
    let q = query.as_str();

    let exact = if title == q { weights.exact_match } else { 0.0 };
    let prefix = if title.starts_with(q) {
        weights.prefix_match
    } else {
        0.0
    };
    let all_words = if query.words().all(|w| title.contains(w)) {
        weights.all_words
    } else {
        0.0
    };
    let fuzzy = fuzzy::similarity(q, &title) * weights.fuzzy_scale;
    let popularity = (weights.popularity_per_review * game.review_count as f64)
        .min(weights.popularity_cap);
    let recency = recency_term(game.release_date, weights, today);

    ScoreBreakdown {
        exact,
        prefix,
        all_words,
        fuzzy,
        popularity,
        recency,
    }
}

/// Full bonus inside the recent window, linear decay to zero at the horizon.
/// No release date contributes nothing; it never excludes a candidate.
fn recency_term(release: Option<NaiveDate>, weights: &RankingWeights, today: NaiveDate) -> f64 {
    let Some(date) = release else {
        return 0.0;
    };
    let days = (today - date).num_days();
    if days <= weights.recency_full_days {
        weights.recency_bonus
    } else if days < weights.recency_horizon_days {
        let span = (weights.recency_horizon_days - weights.recency_full_days) as f64;
        let remaining = (weights.recency_horizon_days - days) as f64;
        weights.recency_bonus * remaining / span
    } else {
        0.0
    }
}

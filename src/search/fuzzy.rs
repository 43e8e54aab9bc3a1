//! Edit-distance similarity and "did you mean" suggestions.
//!
//! Fuzzy matching is a fallback, not a default: the engine only reaches for
//! it when exact/text-index matching returns fewer than the configured
//! minimum, which bounds its cost to the queries that need it.

/// Similarity between two strings in `[0, 1]`.
///
/// `similarity(a, a) == 1.0` for every `a`, and the function is symmetric.
/// Case-sensitive; callers compare normalized/lowercased text.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// Suggest corpus entries within `max_edit_distance` of `query`.
///
/// Pairs whose length difference already exceeds the distance budget are
/// pruned before computing the full edit distance, since the difference is a
/// lower bound on it. Results are ordered by (distance, entry) and capped at
/// `max_suggestions`.
pub fn suggest(
    query: &str,
    corpus: &[String],
    max_edit_distance: usize,
    max_suggestions: usize,
) -> Vec<String> {
    let query_lower = query.to_lowercase();
    let query_len = query_lower.chars().count();

    let mut scored: Vec<(usize, &String)> = corpus
        .iter()
        .filter(|entry| {
            let len = entry.chars().count();
            len.abs_diff(query_len) <= max_edit_distance
        })
        .filter_map(|entry| {
            let distance = strsim::levenshtein(&query_lower, &entry.to_lowercase());
            (distance > 0 && distance <= max_edit_distance).then_some((distance, entry))
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, entry)| entry.clone())
        .collect()
}

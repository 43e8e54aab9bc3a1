//! Upstream collaborators: the game-record store and the external catalog.
//!
//! Both are slow relative to the cache and are only ever reached on a miss,
//! a revalidation, or a warming sweep. The traits are object-safe and
//! synchronous; the engine dispatches calls through `spawn_blocking` and
//! bounds them with `tokio::time::timeout`.

pub mod catalog;
pub mod sqlite;

use std::time::Duration;

use thiserror::Error;

use crate::model::{GameRecord, SearchFilters};
use crate::search::normalize::NormalizedQuery;

/// Failures crossing the collaborator boundary.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for UpstreamError {
    fn from(e: rusqlite::Error) -> Self {
        UpstreamError::Unavailable(e.to_string())
    }
}

/// Storage collaborator: full-text and similarity query primitives over the
/// local game catalog, plus composite filtering.
pub trait GameStore: Send + Sync {
    /// Weighted text search over title and descriptive fields.
    fn text_search(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError>;

    /// Trigram-like similarity fallback, used only when text search comes up
    /// short.
    fn similarity_search(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError>;

    /// Popular titles for "did you mean" suggestions.
    fn suggestion_corpus(&self, limit: usize) -> Result<Vec<String>, UpstreamError>;
}

/// External catalog collaborator. Rate-limited on its side, so the engine
/// only consults it when local coverage is insufficient or the store failed.
pub trait CatalogClient: Send + Sync {
    fn lookup(
        &self,
        query: &NormalizedQuery,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError>;
}

//! Error taxonomy for the search engine.
//!
//! Four failure classes cross the public boundary:
//! - [`SearchError::InvalidQuery`] — rejected before any cache or upstream I/O
//! - [`SearchError::UpstreamTimeout`] — a collaborator exceeded its deadline
//! - [`SearchError::UpstreamUnavailable`] — a collaborator returned a hard error
//! - [`SearchError::CacheCorrupt`] — a tier returned a payload that failed
//!   validation (the entry is evicted and the read treated as a miss)
//!
//! Analytics and cache-write failures never surface here; they are logged and
//! swallowed on the response path.

use std::time::Duration;
use thiserror::Error;

/// Reasons a raw query is rejected before normalization completes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuery {
    #[error("query is {len} characters, maximum is {max}")]
    TooLong { len: usize, max: usize },
    #[error("query is empty after normalization")]
    Empty,
}

/// Top-level error returned by [`crate::engine::SearchEngine`].
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] InvalidQuery),

    #[error("upstream timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("cache entry failed validation: {0}")]
    CacheCorrupt(String),
}

impl SearchError {
    /// Whether the error came from a collaborator rather than the caller.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            SearchError::UpstreamTimeout(_) | SearchError::UpstreamUnavailable(_)
        )
    }
}

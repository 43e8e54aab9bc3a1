//! Cache entry and payload types.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::model::RankedResult;

/// Bump when the payload layout changes; older rows then fail validation and
/// are evicted as corrupt rather than misread.
pub const PAYLOAD_VERSION: u32 = 1;

/// The cached product of one fetch-and-rank cycle.
///
/// Stores the full ranked list (bounded by `max_results`) plus suggestions,
/// so one entry serves every page of the same query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPayload {
    pub version: u32,
    pub results: Vec<RankedResult>,
    pub total_count: usize,
    pub suggestions: Vec<String>,
}

impl CachedPayload {
    pub fn new(results: Vec<RankedResult>, total_count: usize, suggestions: Vec<String>) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            results,
            total_count,
            suggestions,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode and validate a persisted payload.
    ///
    /// Any schema failure maps to [`SearchError::CacheCorrupt`]; callers evict
    /// the row and treat the read as a miss.
    pub fn from_json(raw: &str) -> Result<Self, SearchError> {
        let payload: CachedPayload =
            serde_json::from_str(raw).map_err(|e| SearchError::CacheCorrupt(e.to_string()))?;
        if payload.version != PAYLOAD_VERSION {
            return Err(SearchError::CacheCorrupt(format!(
                "payload version {} (expected {})",
                payload.version, PAYLOAD_VERSION
            )));
        }
        Ok(payload)
    }
}

/// Which cache layer an entry was read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
}

/// Lifecycle position of an entry at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < stale_at`: serve, no background work.
    Fresh,
    /// `stale_at <= now < expires_at`: serve, trigger one background refresh.
    Stale,
    /// `now >= expires_at`: only servable as a degraded last resort.
    Expired,
}

/// One cached result set with its lifecycle timestamps (unix seconds).
///
/// Owned exclusively by the tier manager; no other component mutates one.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: CachedPayload,
    pub created_at: i64,
    pub stale_at: i64,
    pub expires_at: i64,
    pub tier: Tier,
    pub hits: u64,
}

impl CacheEntry {
    pub fn freshness(&self, now: i64) -> Freshness {
        if now < self.stale_at {
            Freshness::Fresh
        } else if now < self.expires_at {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    pub fn is_servable(&self, now: i64) -> bool {
        self.freshness(now) != Freshness::Expired
    }
}

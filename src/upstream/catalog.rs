//! HTTP client for the external game catalog.
//!
//! The catalog enforces its own rate limits, so the engine reaches it only
//! when the local store fails or returns too few results; caching keeps the
//! call volume low.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use super::{CatalogClient, UpstreamError};
use crate::model::GameRecord;
use crate::search::normalize::NormalizedQuery;

/// Wire shape of one catalog result.
#[derive(Debug, Deserialize)]
struct CatalogGame {
    id: u64,
    title: String,
    #[serde(default)]
    genres: std::collections::BTreeSet<String>,
    #[serde(default)]
    platforms: std::collections::BTreeSet<String>,
    rating: Option<f32>,
    #[serde(default)]
    review_count: u64,
    release_date: Option<chrono::NaiveDate>,
}

impl From<CatalogGame> for GameRecord {
    fn from(g: CatalogGame) -> Self {
        GameRecord {
            id: g.id,
            title: g.title,
            genres: g.genres,
            platforms: g.platforms,
            rating: g.rating,
            review_count: g.review_count,
            release_date: g.release_date,
        }
    }
}

pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout,
        })
    }
}

impl CatalogClient for HttpCatalogClient {
    fn lookup(
        &self,
        query: &NormalizedQuery,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError> {
        let url = format!("{}/v1/games/search", self.base_url);
        debug!(query = %query, limit = limit, "catalog lookup");

        let response = self
            .client
            .get(&url)
            .query(&[("q", query.as_str()), ("limit", &limit.to_string())])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout(self.timeout)
                } else {
                    UpstreamError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(UpstreamError::Unavailable(format!(
                "catalog returned {}",
                response.status()
            )));
        }

        let games: Vec<CatalogGame> = response
            .json()
            .map_err(|e| UpstreamError::Unavailable(e.to_string()))?;
        Ok(games.into_iter().map(GameRecord::from).collect())
    }
}

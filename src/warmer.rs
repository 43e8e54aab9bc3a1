//! Background cache warming.
//!
//! Runs on a fixed interval, independent of request traffic: each sweep asks
//! analytics for the top popular queries and runs a fresh fetch-and-cache
//! cycle for each through [`SearchEngine::warm_cache`]. Tier writes are
//! idempotent replacements keyed by the same hash the request path uses, so
//! a sweep racing live traffic resolves as last-writer-wins.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::engine::SearchEngine;

pub struct CacheWarmer {
    engine: Arc<SearchEngine>,
}

impl CacheWarmer {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }

    /// Run one sweep immediately. The admin `warmCache` operation.
    pub async fn sweep_once(&self) -> usize {
        self.engine.warm_cache().await
    }

    /// Spawn the interval loop. The first sweep happens one interval after
    /// startup; abort the returned handle to stop warming.
    pub fn spawn(self, interval: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // the immediate first tick
            loop {
                ticker.tick().await;
                let warmed = self.engine.warm_cache().await;
                debug!(warmed = warmed, "scheduled warm sweep finished");
            }
        })
    }
}

//! Query analytics: popularity windows and trend detection.
//!
//! Recording is append-only and asynchronous. `record()` pushes onto an
//! unbounded channel and returns; a dedicated worker thread folds events into
//! the rolling window, so the response path never blocks on analytics and a
//! recording failure can never affect a search response.
//!
//! The aggregator is an explicit object with an injected [`Clock`] and a
//! clear init/teardown (construct, [`AnalyticsRecorder::shutdown`]), not
//! ambient module state. Window snapshots persist to SQLite at each boundary
//! so popularity and trend history survive restarts.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use serde::Serialize;
use tracing::{debug, warn};

/// Injected time source so windowing logic is testable.
pub trait Clock: Send + Sync {
    /// Unix seconds.
    fn now_unix(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Rolling per-query aggregate over the current + previous window.
#[derive(Debug, Clone, Serialize)]
pub struct PopularityRecord {
    pub query: String,
    pub count: u64,
    pub avg_result_count: f64,
    pub avg_latency_ms: f64,
    pub window_start: i64,
}

/// Window-over-window movement for one query.
#[derive(Debug, Clone, Serialize)]
pub struct TrendRecord {
    pub query: String,
    pub current_count: u64,
    pub previous_count: u64,
    pub growth_rate: f64,
}

#[derive(Debug)]
struct QueryEvent {
    query: String,
    result_count: usize,
    latency_ms: u64,
    cache_hit: bool,
    user: Option<String>,
}

#[derive(Debug, Default, Clone)]
struct WindowStats {
    count: u64,
    hits: u64,
    sum_results: u64,
    sum_latency_ms: u64,
    users: HashSet<String>,
}

struct AnalyticsState {
    window_secs: i64,
    window_start: i64,
    current: HashMap<String, WindowStats>,
    /// Counts of the last closed window, for trend comparison and as the
    /// previous half of the rolling popularity count.
    previous: HashMap<String, u64>,
    trends: Vec<TrendRecord>,
    db: Option<Connection>,
}

impl AnalyticsState {
    fn apply(&mut self, event: QueryEvent, now: i64) {
        self.maybe_roll(now);
        let stats = self.current.entry(event.query).or_default();
        stats.count += 1;
        if event.cache_hit {
            stats.hits += 1;
        }
        stats.sum_results += event.result_count as u64;
        stats.sum_latency_ms += event.latency_ms;
        if let Some(user) = event.user {
            stats.users.insert(user);
        }
    }

    /// Advance to the window containing `now`, closing the current one when
    /// its boundary has passed: persist it, recompute trends against the
    /// previously closed window, and shift.
    fn maybe_roll(&mut self, now: i64) {
        if now < self.window_start + self.window_secs {
            return;
        }

        let closing: HashMap<String, u64> = self
            .current
            .iter()
            .map(|(q, s)| (q.clone(), s.count))
            .collect();

        self.trends = compute_trends(&closing, &self.previous);
        if let Err(e) = self.persist_window() {
            warn!(error = %e, "failed to persist analytics window");
        }

        let elapsed_windows = (now - self.window_start) / self.window_secs;
        // A gap of more than one window means the closing counts are not the
        // adjacent previous window for whatever comes next.
        self.previous = if elapsed_windows == 1 {
            closing
        } else {
            HashMap::new()
        };
        self.window_start += elapsed_windows * self.window_secs;
        self.current.clear();
        debug!(window_start = self.window_start, "analytics window rolled");
    }

    fn persist_window(&self) -> Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        for (query, stats) in &self.current {
            db.execute(
                "INSERT OR REPLACE INTO popularity_windows
                     (window_start, query, count, hits, avg_results, avg_latency_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.window_start,
                    query,
                    stats.count as i64,
                    stats.hits as i64,
                    stats.sum_results as f64 / stats.count.max(1) as f64,
                    stats.sum_latency_ms as f64 / stats.count.max(1) as f64,
                ],
            )?;
        }
        Ok(())
    }

    fn top_n(&self, n: usize) -> Vec<PopularityRecord> {
        let mut merged: HashMap<&str, (u64, u64, u64)> = HashMap::new();
        for (query, stats) in &self.current {
            merged.insert(query, (stats.count, stats.sum_results, stats.sum_latency_ms));
        }
        for (query, count) in &self.previous {
            merged
                .entry(query)
                .and_modify(|(c, _, _)| *c += count)
                .or_insert((*count, 0, 0));
        }

        let mut records: Vec<PopularityRecord> = merged
            .into_iter()
            .map(|(query, (count, sum_results, sum_latency))| PopularityRecord {
                query: query.to_string(),
                count,
                avg_result_count: sum_results as f64 / count.max(1) as f64,
                avg_latency_ms: sum_latency as f64 / count.max(1) as f64,
                window_start: self.window_start,
            })
            .collect();
        records.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        records.truncate(n);
        records
    }
}

fn compute_trends(
    current: &HashMap<String, u64>,
    previous: &HashMap<String, u64>,
) -> Vec<TrendRecord> {
    let queries: HashSet<&String> = current.keys().chain(previous.keys()).collect();
    let mut trends: Vec<TrendRecord> = queries
        .into_iter()
        .map(|query| {
            let cur = current.get(query).copied().unwrap_or(0);
            let prev = previous.get(query).copied().unwrap_or(0);
            TrendRecord {
                query: query.clone(),
                current_count: cur,
                previous_count: prev,
                growth_rate: (cur as f64 - prev as f64) / prev.max(1) as f64,
            }
        })
        .collect();
    trends.sort_by(|a, b| {
        b.growth_rate
            .partial_cmp(&a.growth_rate)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.query.cmp(&b.query))
    });
    trends
}

pub struct AnalyticsRecorder {
    tx: Option<Sender<QueryEvent>>,
    state: Arc<Mutex<AnalyticsState>>,
    clock: Arc<dyn Clock>,
    anonymous: bool,
    worker: Option<JoinHandle<()>>,
}

impl AnalyticsRecorder {
    /// Start the recorder. `db_path: None` keeps window history in memory
    /// only; with a path, closed windows persist across restarts and the most
    /// recent one is reloaded as the trend baseline, provided it is adjacent
    /// to the current window.
    pub fn start(
        window_secs: i64,
        anonymous: bool,
        db_path: Option<&Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let db = match db_path {
            Some(p) => Some(open_analytics_db(p)?),
            None => None,
        };

        let window_secs = window_secs.max(1);
        let now = clock.now_unix();
        let window_start = now - now.rem_euclid(window_secs);

        // Only a window adjacent to the current one is a valid baseline;
        // anything older is subject to the same gap rule as a live roll.
        let previous = match db.as_ref().map(load_latest_window).transpose()? {
            Some(Some((start, counts))) if start == window_start - window_secs => counts,
            _ => HashMap::new(),
        };

        let state = Arc::new(Mutex::new(AnalyticsState {
            window_secs,
            window_start,
            current: HashMap::new(),
            previous,
            trends: Vec::new(),
            db,
        }));

        let (tx, rx): (Sender<QueryEvent>, Receiver<QueryEvent>) = crossbeam_channel::unbounded();
        let worker_state = Arc::clone(&state);
        let worker_clock = Arc::clone(&clock);
        let worker = std::thread::Builder::new()
            .name("analytics".into())
            .spawn(move || {
                for event in rx {
                    worker_state
                        .lock()
                        .apply(event, worker_clock.now_unix());
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            state,
            clock,
            anonymous,
            worker: Some(worker),
        })
    }

    /// Record one search outcome. Never blocks; a send failure is logged and
    /// swallowed.
    pub fn record(
        &self,
        query: &str,
        result_count: usize,
        latency_ms: u64,
        cache_hit: bool,
        user: Option<&str>,
    ) {
        let event = QueryEvent {
            query: query.to_string(),
            result_count,
            latency_ms,
            cache_hit,
            user: if self.anonymous {
                None
            } else {
                user.map(str::to_string)
            },
        };
        if let Some(tx) = &self.tx
            && let Err(e) = tx.send(event)
        {
            debug!(error = %e, "analytics channel closed, event dropped");
        }
    }

    /// Most popular queries over the rolling window, for the cache warmer.
    pub fn top_queries(&self, n: usize) -> Vec<PopularityRecord> {
        let mut state = self.state.lock();
        state.maybe_roll(self.clock.now_unix());
        state.top_n(n)
    }

    /// Trend records from the last window boundary.
    pub fn trends(&self) -> Vec<TrendRecord> {
        let mut state = self.state.lock();
        state.maybe_roll(self.clock.now_unix());
        state.trends.clone()
    }

    /// Drain the channel and stop the worker.
    pub fn shutdown(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("analytics worker panicked during shutdown");
        }
    }

    /// Block until every event sent so far has been folded in. Test-only
    /// synchronization point.
    #[doc(hidden)]
    pub fn flush(&self) {
        if let Some(tx) = &self.tx {
            while !tx.is_empty() {
                std::thread::yield_now();
            }
        }
        // One extra lock round-trip: the worker holds the state lock while
        // applying the final event.
        drop(self.state.lock());
    }
}

impl Drop for AnalyticsRecorder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn open_analytics_db(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS popularity_windows (
            window_start   INTEGER NOT NULL,
            query          TEXT NOT NULL,
            count          INTEGER NOT NULL,
            hits           INTEGER NOT NULL,
            avg_results    REAL NOT NULL,
            avg_latency_ms REAL NOT NULL,
            PRIMARY KEY (window_start, query)
        );",
    )?;
    Ok(conn)
}

fn load_latest_window(conn: &Connection) -> Result<Option<(i64, HashMap<String, u64>)>> {
    let latest: Option<i64> = conn.query_row(
        "SELECT MAX(window_start) FROM popularity_windows",
        [],
        |row| row.get(0),
    )?;
    let Some(latest) = latest else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT query, count FROM popularity_windows WHERE window_start = ?1",
    )?;
    let rows = stmt.query_map(params![latest], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
    })?;
    let mut out = HashMap::new();
    for row in rows {
        let (query, count) = row?;
        out.insert(query, count);
    }
    Ok(Some((latest, out)))
}

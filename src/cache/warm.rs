//! Warm tier: local persistent store, size-bounded FIFO.
//!
//! Backed by SQLite. Arrival order is the implicit rowid: `INSERT OR
//! REPLACE` re-inserts a refreshed key at the back of the queue, and the
//! oldest rows are dropped once the tier exceeds its entry bound.

use std::path::Path;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::entry::{CacheEntry, CachedPayload, Tier};
use super::key::CacheKey;
use crate::config::WarmTierConfig;

pub struct WarmTier {
    conn: Mutex<Connection>,
    max_entries: usize,
}

impl WarmTier {
    pub fn open(path: &Path, cfg: &WarmTierConfig) -> Result<Self> {
        Self::from_conn(Connection::open(path)?, cfg)
    }

    pub fn in_memory(cfg: &WarmTierConfig) -> Result<Self> {
        Self::from_conn(Connection::open_in_memory()?, cfg)
    }

    fn from_conn(conn: Connection, cfg: &WarmTierConfig) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS warm_cache (
                key        TEXT PRIMARY KEY,
                payload    TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                stale_at   INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            max_entries: cfg.max_entries,
        })
    }

    /// Read an entry regardless of freshness; the manager interprets TTLs.
    ///
    /// A row whose payload fails validation is evicted and reported as a
    /// miss.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT payload, created_at, stale_at, expires_at
                 FROM warm_cache WHERE key = ?1",
                params![key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((raw, created_at, stale_at, expires_at)) = row else {
            return Ok(None);
        };

        match CachedPayload::from_json(&raw) {
            Ok(payload) => Ok(Some(CacheEntry {
                payload,
                created_at,
                stale_at,
                expires_at,
                tier: Tier::Warm,
                hits: 0,
            })),
            Err(e) => {
                warn!(key = %key, error = %e, "evicting corrupt warm-tier entry");
                conn.execute("DELETE FROM warm_cache WHERE key = ?1", params![
                    key.as_str()
                ])?;
                Ok(None)
            }
        }
    }

    /// Write or refresh an entry, then enforce the FIFO size bound.
    pub fn put(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        let payload = entry.payload.to_json()?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO warm_cache (key, payload, created_at, stale_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                key.as_str(),
                payload,
                entry.created_at,
                entry.stale_at,
                entry.expires_at
            ],
        )?;
        conn.execute(
            "DELETE FROM warm_cache WHERE rowid IN (
                 SELECT rowid FROM warm_cache ORDER BY rowid ASC
                 LIMIT max(0, (SELECT COUNT(*) FROM warm_cache) - ?1)
             )",
            params![self.max_entries as i64],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM warm_cache WHERE key = ?1", params![
                key.as_str()
            ])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM warm_cache", [])?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM warm_cache", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn size_bytes(&self) -> Result<u64> {
        let n: i64 = self.conn.lock().query_row(
            "SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM warm_cache",
            [],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }
}

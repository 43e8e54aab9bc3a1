//! Cold tier: shared persistent store, time-bounded.
//!
//! Day-scale TTL keyed by the stable request hash, with a per-row hit counter
//! the warmer can use for warming decisions. Expired rows linger for a grace
//! period so they stay available as a degraded last resort, then get pruned
//! on the next write.

use std::path::Path;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use super::entry::{CacheEntry, CachedPayload, Tier};
use super::key::CacheKey;
use crate::config::ColdTierConfig;

pub struct ColdTier {
    conn: Mutex<Connection>,
    prune_grace_secs: i64,
}

impl ColdTier {
    pub fn open(path: &Path, cfg: &ColdTierConfig) -> Result<Self> {
        Self::from_conn(Connection::open(path)?, cfg)
    }

    pub fn in_memory(cfg: &ColdTierConfig) -> Result<Self> {
        Self::from_conn(Connection::open_in_memory()?, cfg)
    }

    fn from_conn(conn: Connection, cfg: &ColdTierConfig) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cold_cache (
                key        TEXT PRIMARY KEY,
                payload    TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                stale_at   INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                hits       INTEGER NOT NULL DEFAULT 0
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            prune_grace_secs: cfg.prune_grace_secs,
        })
    }

    /// Read an entry regardless of freshness, bumping its hit counter.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT payload, created_at, stale_at, expires_at, hits
                 FROM cold_cache WHERE key = ?1",
                params![key.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((raw, created_at, stale_at, expires_at, hits)) = row else {
            return Ok(None);
        };

        match CachedPayload::from_json(&raw) {
            Ok(payload) => {
                conn.execute(
                    "UPDATE cold_cache SET hits = hits + 1 WHERE key = ?1",
                    params![key.as_str()],
                )?;
                Ok(Some(CacheEntry {
                    payload,
                    created_at,
                    stale_at,
                    expires_at,
                    tier: Tier::Cold,
                    hits: hits as u64 + 1,
                }))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "evicting corrupt cold-tier entry");
                conn.execute("DELETE FROM cold_cache WHERE key = ?1", params![
                    key.as_str()
                ])?;
                Ok(None)
            }
        }
    }

    /// Write or refresh an entry, preserving its accumulated hit count, then
    /// prune rows expired past the grace period.
    pub fn put(&self, key: &CacheKey, entry: &CacheEntry, now: i64) -> Result<()> {
        let payload = entry.payload.to_json()?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cold_cache (key, payload, created_at, stale_at, expires_at, hits)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)
             ON CONFLICT(key) DO UPDATE SET
                 payload = excluded.payload,
                 created_at = excluded.created_at,
                 stale_at = excluded.stale_at,
                 expires_at = excluded.expires_at",
            params![
                key.as_str(),
                payload,
                entry.created_at,
                entry.stale_at,
                entry.expires_at
            ],
        )?;
        conn.execute(
            "DELETE FROM cold_cache WHERE expires_at < ?1",
            params![now - self.prune_grace_secs],
        )?;
        Ok(())
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM cold_cache WHERE key = ?1", params![
                key.as_str()
            ])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM cold_cache", [])?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM cold_cache", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn size_bytes(&self) -> Result<u64> {
        let n: i64 = self.conn.lock().query_row(
            "SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM cold_cache",
            [],
            |r| r.get(0),
        )?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SearchFilters, SortOrder};
    use crate::search::normalize::normalize;

    fn key(s: &str) -> CacheKey {
        super::super::key::cache_key(
            &normalize(s, 200).unwrap(),
            &SearchFilters::default(),
            SortOrder::Relevance,
        )
    }

    fn entry(created_at: i64, ttl: i64) -> CacheEntry {
        CacheEntry {
            payload: CachedPayload::new(Vec::new(), 1, Vec::new()),
            created_at,
            stale_at: created_at + ttl / 4,
            expires_at: created_at + ttl,
            tier: Tier::Cold,
            hits: 0,
        }
    }

    fn tier() -> ColdTier {
        ColdTier::in_memory(&ColdTierConfig {
            prune_grace_secs: 100,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn hit_counter_increments_on_read() {
        let t = tier();
        let k = key("zelda");
        t.put(&k, &entry(0, 1000), 0).unwrap();

        assert_eq!(t.get(&k).unwrap().unwrap().hits, 1);
        assert_eq!(t.get(&k).unwrap().unwrap().hits, 2);
    }

    #[test]
    fn refresh_preserves_hit_count() {
        let t = tier();
        let k = key("zelda");
        t.put(&k, &entry(0, 1000), 0).unwrap();
        let _ = t.get(&k).unwrap();

        t.put(&k, &entry(500, 1000), 500).unwrap();
        assert_eq!(t.get(&k).unwrap().unwrap().hits, 2);
    }

    #[test]
    fn prune_keeps_expired_rows_inside_grace() {
        let t = tier();
        let expired = key("old");
        t.put(&expired, &entry(0, 10), 0).unwrap();

        // Expired at t=10; still inside the 100s grace at t=50.
        t.put(&key("new"), &entry(50, 1000), 50).unwrap();
        assert!(t.get(&expired).unwrap().is_some());

        // Past grace at t=200: pruned by the next write.
        t.put(&key("newer"), &entry(200, 1000), 200).unwrap();
        assert!(t.get(&expired).unwrap().is_none());
    }
}

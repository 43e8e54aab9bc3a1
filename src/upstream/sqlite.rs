//! SQLite-backed game store: schema and query primitives.
//!
//! Text search goes through an FTS5 index over title and description;
//! similarity fallback pulls per-word candidates and scores them in process.
//! Rating and date filters are pushed into SQL; genre/platform set filters
//! are applied to the fetched rows, since both are stored as JSON arrays.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, Row, params};

use super::{GameStore, UpstreamError};
use crate::model::{GameRecord, SearchFilters};
use crate::search::fuzzy;
use crate::search::normalize::NormalizedQuery;

/// Minimum whole-title similarity for the fallback to keep a candidate.
const SIMILARITY_FLOOR: f64 = 0.35;

pub struct SqliteGameStore {
    conn: Mutex<Connection>,
}

impl SqliteGameStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_conn(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_conn(Connection::open_in_memory()?)
    }

    fn from_conn(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS games (
                id           INTEGER PRIMARY KEY,
                title        TEXT NOT NULL,
                description  TEXT NOT NULL DEFAULT '',
                genres       TEXT NOT NULL DEFAULT '[]',
                platforms    TEXT NOT NULL DEFAULT '[]',
                rating       REAL,
                review_count INTEGER NOT NULL DEFAULT 0,
                release_date TEXT
            );
            CREATE VIRTUAL TABLE IF NOT EXISTS games_fts USING fts5(
                title, description, content='games', content_rowid='id'
            );
            CREATE TRIGGER IF NOT EXISTS games_ai AFTER INSERT ON games BEGIN
                INSERT INTO games_fts(rowid, title, description)
                VALUES (new.id, new.title, new.description);
            END;
            CREATE TRIGGER IF NOT EXISTS games_ad AFTER DELETE ON games BEGIN
                INSERT INTO games_fts(games_fts, rowid, title, description)
                VALUES ('delete', old.id, old.title, old.description);
            END;
            CREATE TRIGGER IF NOT EXISTS games_au AFTER UPDATE ON games BEGIN
                INSERT INTO games_fts(games_fts, rowid, title, description)
                VALUES ('delete', old.id, old.title, old.description);
                INSERT INTO games_fts(rowid, title, description)
                VALUES (new.id, new.title, new.description);
            END;",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace a record. Used by `gamesearch import` and tests.
    pub fn upsert_game(&self, game: &GameRecord, description: &str) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO games
                 (id, title, description, genres, platforms, rating, review_count, release_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                game.id as i64,
                game.title,
                description,
                serde_json::to_string(&game.genres)?,
                serde_json::to_string(&game.platforms)?,
                game.rating,
                game.review_count as i64,
                game.release_date.map(|d| d.to_string()),
            ],
        )?;
        Ok(())
    }

    fn record_from_row(row: &Row<'_>) -> rusqlite::Result<(GameRecord, String, String)> {
        let genres_raw: String = row.get(3)?;
        let platforms_raw: String = row.get(4)?;
        let release_raw: Option<String> = row.get(7)?;
        Ok((
            GameRecord {
                id: row.get::<_, i64>(0)? as u64,
                title: row.get(1)?,
                genres: BTreeSet::new(),
                platforms: BTreeSet::new(),
                rating: row.get(5)?,
                review_count: row.get::<_, i64>(6)? as u64,
                release_date: release_raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
            },
            genres_raw,
            platforms_raw,
        ))
    }

    fn finish_record(
        (mut game, genres_raw, platforms_raw): (GameRecord, String, String),
    ) -> GameRecord {
        game.genres = serde_json::from_str(&genres_raw).unwrap_or_default();
        game.platforms = serde_json::from_str(&platforms_raw).unwrap_or_default();
        game
    }

    /// Quote each word so user text cannot inject FTS5 query syntax; words
    /// are implicitly AND-ed.
    fn fts_match_expr(query: &NormalizedQuery) -> String {
        query
            .words()
            .map(|w| format!("\"{}\"", w.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn query_rows(
        &self,
        sql: &str,
        args: &[&dyn rusqlite::ToSql],
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, Self::record_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            let game = Self::finish_record(row?);
            if filters.matches(&game) {
                out.push(game);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }
}

impl GameStore for SqliteGameStore {
    fn text_search(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError> {
        let match_expr = Self::fts_match_expr(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT g.id, g.title, g.description, g.genres, g.platforms,
                    g.rating, g.review_count, g.release_date
             FROM games g JOIN games_fts f ON g.id = f.rowid
             WHERE f.games_fts MATCH ?1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(match_expr)];

        if let Some(floor) = filters.rating_floor {
            args.push(Box::new(floor as f64));
            sql.push_str(&format!(" AND g.rating >= ?{}", args.len()));
        }
        if let Some(from) = filters.released_from {
            args.push(Box::new(from.to_string()));
            sql.push_str(&format!(" AND g.release_date >= ?{}", args.len()));
        }
        if let Some(to) = filters.released_to {
            args.push(Box::new(to.to_string()));
            sql.push_str(&format!(" AND g.release_date <= ?{}", args.len()));
        }

        // Over-fetch so in-process genre/platform filtering can still fill
        // the limit.
        args.push(Box::new((limit * 4) as i64));
        sql.push_str(&format!(" ORDER BY f.rank LIMIT ?{}", args.len()));

        let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| &**b).collect();
        self.query_rows(&sql, &arg_refs, filters, limit)
    }

    fn similarity_search(
        &self,
        query: &NormalizedQuery,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<GameRecord>, UpstreamError> {
        // Candidate pull: any word as an infix, most-reviewed first, then
        // whole-title similarity scoring in process.
        let mut sql = String::from(
            "SELECT id, title, description, genres, platforms,
                    rating, review_count, release_date
             FROM games WHERE ",
        );
        let words: Vec<String> = query.words().map(str::to_string).collect();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        let mut clauses = Vec::new();
        for word in &words {
            args.push(Box::new(format!("%{word}%")));
            clauses.push(format!("title LIKE ?{} COLLATE NOCASE", args.len()));
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }
        sql.push_str(&clauses.join(" OR "));
        args.push(Box::new((limit * 8) as i64));
        sql.push_str(&format!(
            " ORDER BY review_count DESC LIMIT ?{}",
            args.len()
        ));

        let arg_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| &**b).collect();
        let candidates = self.query_rows(&sql, &arg_refs, filters, limit * 8)?;

        let mut out: Vec<GameRecord> = candidates
            .into_iter()
            .filter(|g| fuzzy::similarity(query.as_str(), &g.title.to_lowercase()) >= SIMILARITY_FLOOR)
            .collect();
        out.truncate(limit);
        Ok(out)
    }

    fn suggestion_corpus(&self, limit: usize) -> Result<Vec<String>, UpstreamError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT title FROM games ORDER BY review_count DESC, id ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

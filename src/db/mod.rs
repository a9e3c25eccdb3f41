pub mod migrations;
pub mod models;
pub mod schema;
pub mod upsert;

use chrono::NaiveDate;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use models::*;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub struct Database {
    pub conn: Connection,
    pub path: PathBuf,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::storage_unavailable(path, e))?;
        }

        let conn = Connection::open(path).map_err(|e| Error::storage_unavailable(path, e))?;

        // Performance pragmas
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;",
        )?;

        let db = Self::init(conn, path.to_path_buf())?;
        info!("Opened database: {}", path.display());
        Ok(db)
    }

    /// Fresh private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::storage_unavailable(":memory:", e))?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> Result<Self> {
        schema::create_schema(&conn)?;
        migrations::run_migrations(&conn)?;
        register_regexp(&conn)?;
        Ok(Database { conn, path })
    }

    /// Begin a write transaction. Every ingested file is written inside one.
    pub fn transaction(&self) -> Result<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    /// Get a single video by ID.
    pub fn get_video(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let mut stmt = self.conn.prepare(
            "SELECT video_id, title, channel_id, channel_name, release_timestamp, timestamp,
                    duration, was_live, filename
             FROM video_metadata WHERE video_id = ?1",
        )?;

        let result = stmt
            .query_row([video_id], |row| {
                let duration_ms: Option<i64> = row.get(6)?;
                Ok(VideoMetadata {
                    video_id: row.get(0)?,
                    title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    channel_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    channel_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                    release_timestamp: timestamp_column(row, 4)?,
                    timestamp: timestamp_column(row, 5)?,
                    duration: duration_ms.map(chrono::TimeDelta::milliseconds),
                    was_live: row.get(7)?,
                    filename: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                })
            })
            .optional()?;

        Ok(result)
    }

    /// Count stored chat messages for one video.
    pub fn message_count(&self, video_id: &str) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM live_chat WHERE video_id = ?1",
            [video_id],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// Get database statistics.
    pub fn stats(&self) -> Result<DbStats> {
        let video_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM video_metadata", [], |r| r.get(0))?;
        let channel_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT channel_id) FROM video_metadata WHERE channel_id <> ''",
            [],
            |r| r.get(0),
        )?;

        let (message_count, author_count, earliest, latest) = self.conn.query_row(
            "SELECT COUNT(*),
                    COUNT(DISTINCT COALESCE(NULLIF(author_channel_id, ''), author)),
                    MIN(timestamp), MAX(timestamp)
             FROM live_chat",
            [],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    timestamp_column(r, 2)?,
                    timestamp_column(r, 3)?,
                ))
            },
        )?;

        let db_size_bytes = std::fs::metadata(&self.path)
            .map(|m| m.len())
            .unwrap_or(0);

        Ok(DbStats {
            video_count,
            message_count,
            channel_count,
            author_count,
            earliest,
            latest,
            db_size_bytes,
        })
    }

    /// Calendar days in `[since, until)` on which no video aired.
    pub fn missing_days(&self, since: NaiveDate, until: NaiveDate) -> Result<MissingDays> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT substr(COALESCE(release_timestamp, timestamp), 1, 10)
             FROM video_metadata
             WHERE substr(COALESCE(release_timestamp, timestamp), 1, 10) >= ?1
               AND substr(COALESCE(release_timestamp, timestamp), 1, 10) < ?2",
        )?;
        let rows = stmt.query_map(
            [since.to_string(), until.to_string()],
            |row| row.get::<_, String>(0),
        )?;

        let mut aired = BTreeSet::new();
        for row in rows {
            if let Ok(day) = NaiveDate::parse_from_str(&row?, "%Y-%m-%d") {
                aired.insert(day);
            }
        }

        let days = since
            .iter_days()
            .take_while(|d| *d < until)
            .filter(|d| !aired.contains(d))
            .collect();

        Ok(MissingDays { since, until, days })
    }

    /// Rebuild the trigram index over chat text from scratch.
    pub fn reindex(&self) -> Result<()> {
        self.conn
            .execute_batch("INSERT INTO live_chat_fts(live_chat_fts) VALUES('rebuild');")?;
        info!("Chat text index rebuilt");
        Ok(())
    }

    pub fn schema_version(&self) -> Result<Option<String>> {
        let version = self
            .conn
            .query_row(
                "SELECT value FROM vodchat_meta WHERE key = 'schema_version'",
                [],
                |r| r.get(0),
            )
            .optional()?;
        Ok(version)
    }
}

/// Register `regexp(pattern, text)` so `text REGEXP pattern` works in SQL.
/// Compiled patterns are cached per statement; NULL text never matches.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let re: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<Regex, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let matched = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => std::str::from_utf8(bytes)
                    .map(|text| re.is_match(text))
                    .unwrap_or(false),
                _ => false,
            };
            Ok(matched)
        },
    )
}

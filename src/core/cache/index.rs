//! Durable tier: SQLite index of synthesized audio.
//!
//! One row per (content key, voice, format). Rows are created after a
//! successful synthesis and file write, never updated, and removed by the
//! age-based sweep or when their backing file turns out to be missing.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::core::request::ContentKey;

/// Errors from the durable tier.
#[derive(Error, Debug)]
pub enum IndexError {
    /// An entry for the same (key, voice, format) already exists.
    #[error("Duplicate cache entry for {key} ({voice}, {format})")]
    Duplicate {
        key: String,
        voice: String,
        format: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for IndexError {
    fn from(err: sqlx::Error) -> Self {
        IndexError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// A durable cache record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub content_key: ContentKey,
    pub voice: String,
    pub format: String,
    pub audio_path: PathBuf,
    /// Unix seconds.
    pub created_at: i64,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        content_key: ContentKey,
        voice: impl Into<String>,
        format: impl Into<String>,
        audio_path: PathBuf,
    ) -> Self {
        Self {
            content_key,
            voice: voice.into(),
            format: format.into(),
            audio_path,
            created_at: unix_now(),
        }
    }

    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            content_key: ContentKey::from_hex(row.try_get::<String, _>("text_hash")?),
            voice: row.try_get("voice")?,
            format: row.try_get("format")?,
            audio_path: PathBuf::from(row.try_get::<String, _>("audio_path")?),
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Summary of the durable tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_entries: u64,
    pub oldest_created_at: Option<i64>,
}

pub(crate) fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// SQLite-backed durable index.
#[derive(Debug, Clone)]
pub struct CacheIndex {
    pool: SqlitePool,
}

impl CacheIndex {
    /// Opens (creating if needed) the index database at `db_path`.
    ///
    /// The database runs in WAL mode with NORMAL synchronous writes.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        debug!("Opened cache index at {}", db_path.display());
        Self::from_pool(pool).await
    }

    /// Opens a private in-memory index.
    ///
    /// Each SQLite memory connection is its own database, so the pool is
    /// pinned to one connection that never expires.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and ensures the schema exists.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let index = Self { pool };
        index.ensure_schema().await?;
        Ok(index)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tts_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                text_hash TEXT NOT NULL,
                voice TEXT NOT NULL,
                format TEXT NOT NULL,
                audio_path TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(text_hash, voice, format)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tts_cache_created_at ON tts_cache(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Inserts an entry. Fails closed with [`IndexError::Duplicate`] when the
    /// (key, voice, format) triple is already present.
    pub async fn insert(&self, entry: &CacheEntry) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO tts_cache (text_hash, voice, format, audio_path, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.content_key.as_str())
        .bind(&entry.voice)
        .bind(&entry.format)
        .bind(entry.audio_path.to_string_lossy().as_ref())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(IndexError::Duplicate {
                    key: entry.content_key.to_string(),
                    voice: entry.voice.clone(),
                    format: entry.format.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn lookup(
        &self,
        key: &ContentKey,
        voice: &str,
        format: &str,
    ) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT text_hash, voice, format, audio_path, created_at FROM tts_cache WHERE text_hash = ? AND voice = ? AND format = ?",
        )
        .bind(key.as_str())
        .bind(voice)
        .bind(format)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(CacheEntry::from_row).transpose()
    }

    /// Deletes one entry. Returns whether a row was removed.
    pub async fn delete(&self, key: &ContentKey, voice: &str, format: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM tts_cache WHERE text_hash = ? AND voice = ? AND format = ?")
                .bind(key.as_str())
                .bind(voice)
                .bind(format)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes every entry created strictly before `cutoff` (unix seconds)
    /// and returns the removed entries.
    pub async fn evict_created_before(&self, cutoff: i64) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query(
            "DELETE FROM tts_cache WHERE created_at < ? RETURNING text_hash, voice, format, audio_path, created_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(CacheEntry::from_row).collect()
    }

    /// Removes entries older than `max_age` relative to `now` (unix seconds).
    ///
    /// An entry aged exactly `max_age` is retained.
    pub async fn evict_older_than_at(&self, max_age: Duration, now: i64) -> Result<Vec<CacheEntry>> {
        let age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        self.evict_created_before(now.saturating_sub(age)).await
    }

    /// Removes entries older than `max_age` and returns how many were removed.
    pub async fn evict_older_than(&self, max_age: Duration) -> Result<u64> {
        let evicted = self.evict_older_than_at(max_age, unix_now()).await?;
        Ok(evicted.len() as u64)
    }

    pub async fn stats(&self) -> Result<IndexStats> {
        let row = sqlx::query("SELECT COUNT(*) AS total, MIN(created_at) AS oldest FROM tts_cache")
            .fetch_one(&self.pool)
            .await?;

        let total: i64 = row.try_get("total")?;
        Ok(IndexStats {
            total_entries: total.max(0) as u64,
            oldest_created_at: row.try_get("oldest")?,
        })
    }
}

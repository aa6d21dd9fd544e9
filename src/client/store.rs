//! # Durable Client Store
//!
//! Unread counts survive restarts. They are kept as one JSON document under a
//! fixed key in a small SQLite key/value table, opened in WAL mode.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::client::error::ClientResult;
use crate::shared::ids::ConversationId;

pub const UNREAD_KEY: &str = "unread_counts";

pub type UnreadCounts = HashMap<ConversationId, u32>;

/// Persistence for per-conversation unread counts
#[async_trait]
pub trait UnreadStore: Send + Sync {
    async fn load(&self) -> ClientResult<UnreadCounts>;
    async fn save(&self, counts: &UnreadCounts) -> ClientResult<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteUnreadStore {
    pool: SqlitePool,
}

impl SqliteUnreadStore {
    /// Open or create the store at `path`
    pub async fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::debug!("[Store] Opened {}", path.display());
        Ok(store)
    }

    /// Private in-memory database, mainly for tests
    pub async fn in_memory() -> ClientResult<Self> {
        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> ClientResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> ClientResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn put(&self, key: &str, value: &str) -> ClientResult<()> {
        sqlx::query("INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UnreadStore for SqliteUnreadStore {
    async fn load(&self) -> ClientResult<UnreadCounts> {
        match self.get(UNREAD_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(counts) => Ok(counts),
                Err(e) => {
                    tracing::warn!("[Store] Discarding unreadable unread counts: {}", e);
                    Ok(UnreadCounts::new())
                }
            },
            None => Ok(UnreadCounts::new()),
        }
    }

    async fn save(&self, counts: &UnreadCounts) -> ClientResult<()> {
        let raw = serde_json::to_string(counts)?;
        self.put(UNREAD_KEY, &raw).await
    }
}

/// Volatile store for sessions that should not touch disk
#[derive(Debug, Default)]
pub struct MemoryUnreadStore {
    counts: Mutex<UnreadCounts>,
}

impl MemoryUnreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UnreadStore for MemoryUnreadStore {
    async fn load(&self) -> ClientResult<UnreadCounts> {
        Ok(self.counts.lock().map(|c| c.clone()).unwrap_or_default())
    }

    async fn save(&self, counts: &UnreadCounts) -> ClientResult<()> {
        if let Ok(mut guard) = self.counts.lock() {
            *guard = counts.clone();
        }
        Ok(())
    }
}

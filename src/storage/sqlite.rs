// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite message store with an FTS5 search index.
//!
//! One database file holds every chat. Layout and migrations live in
//! [`super::schema`]; this module owns the connection and the queries.
//!
//! ## Connection
//!
//! A single connection, opened lazily on first use (or eagerly via
//! [`SqliteStore::connect`]) and held behind an async mutex. Every operation
//! runs under that lock, which gives the store one-writer semantics without
//! relying on SQLite's busy handling. [`SqliteStore::close`] drops the
//! connection; the next operation reopens it.
//!
//! ```text
//! journal_mode = WAL        readers don't block the writer
//! synchronous  = NORMAL     safe with WAL, one fsync per checkpoint
//! busy_timeout = 5s         other processes sharing the file
//! ```
//!
//! ## Ordering
//!
//! Unlike the in-memory store, reads come back newest first (by write time).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{ConnectOptions, Connection, SqliteConnection};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::schema;
use super::traits::{BackendKind, BackendStats, CacheError, CacheStats, MessageStore};
use crate::message::now_secs;
use crate::metrics;
use crate::search::{FtsQuery, SearchHit};

const BACKEND: &str = "sqlite";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Live-row predicate; binds `now` once.
const LIVE: &str = "(m.ttl = 0 OR (? - m.timestamp) < m.ttl)";

type HitRow = (String, String, String, f64, Option<f64>);

pub struct SqliteStore {
    path: PathBuf,
    max_messages: usize,
    ttl_seconds: u64,
    conn: Mutex<Option<SqliteConnection>>,
}

impl SqliteStore {
    /// Create a store for `path`. Nothing touches the disk until first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_messages: usize, ttl_seconds: u64) -> Self {
        Self {
            path: path.into(),
            max_messages,
            ttl_seconds,
            conn: Mutex::new(None),
        }
    }

    /// Create a store and connect immediately, surfacing path or migration
    /// problems up front.
    pub async fn open(path: impl Into<PathBuf>, max_messages: usize, ttl_seconds: u64) -> Result<Self, CacheError> {
        let store = Self::new(path, max_messages, ttl_seconds);
        store.connect().await?;
        Ok(store)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the connection and bring the schema up to date. No-op when
    /// already connected.
    pub async fn connect(&self) -> Result<(), CacheError> {
        let mut slot = self.conn.lock().await;
        self.ensure_connected(&mut slot).await?;
        Ok(())
    }

    /// Drop the connection. Safe to call repeatedly; later operations
    /// reconnect on demand.
    pub async fn close(&self) -> Result<(), CacheError> {
        let conn = self.conn.lock().await.take();
        if let Some(conn) = conn {
            conn.close().await?;
            info!(path = %self.path.display(), "Closed message cache database");
        }
        Ok(())
    }

    /// Full-text search over message text and sender names, best match first.
    ///
    /// Adjacent terms must all match; bare `AND`, `OR` and `NOT` combine
    /// terms and a trailing `*` matches by prefix. Blank queries return no
    /// hits. Expired messages are never returned.
    pub async fn search_messages(
        &self,
        query: &str,
        chat_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, CacheError> {
        let Some(fts) = FtsQuery::text(query) else {
            return Ok(Vec::new());
        };

        let chat_filter = if chat_id.is_some() { "AND messages_fts.chat_id = ?" } else { "" };
        let sql = format!(
            "SELECT m.chat_id, m.message_id, m.message_data, m.timestamp, bm25(messages_fts) AS score \
             FROM messages_fts JOIN cached_messages m ON m.rowid = messages_fts.rowid \
             WHERE messages_fts MATCH ? {chat_filter} AND {LIVE} \
             ORDER BY score LIMIT ?"
        );

        let mut q = sqlx::query_as::<_, HitRow>(&sql).bind(fts.as_str());
        if let Some(chat_id) = chat_id {
            q = q.bind(chat_id);
        }
        let q = q.bind(now_secs()).bind(limit_param(Some(limit)));

        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        let rows = q.fetch_all(&mut *conn).await?;

        let hits = decode_hits(rows);
        metrics::record_search_results("text", hits.len());
        debug!(query, chat_id, hits = hits.len(), "Full-text search");
        Ok(hits)
    }

    /// Messages whose sender name matches, newest first.
    pub async fn search_by_sender(
        &self,
        sender_name: &str,
        chat_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, CacheError> {
        let Some(fts) = FtsQuery::sender(sender_name) else {
            return Ok(Vec::new());
        };

        let chat_filter = if chat_id.is_some() { "AND messages_fts.chat_id = ?" } else { "" };
        let sql = format!(
            "SELECT m.chat_id, m.message_id, m.message_data, m.timestamp, NULL \
             FROM messages_fts JOIN cached_messages m ON m.rowid = messages_fts.rowid \
             WHERE messages_fts MATCH ? {chat_filter} AND {LIVE} \
             ORDER BY m.timestamp DESC, m.rowid DESC LIMIT ?"
        );

        let mut q = sqlx::query_as::<_, HitRow>(&sql).bind(fts.as_str());
        if let Some(chat_id) = chat_id {
            q = q.bind(chat_id);
        }
        let q = q.bind(now_secs()).bind(limit_param(Some(limit)));

        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        let rows = q.fetch_all(&mut *conn).await?;

        let hits = decode_hits(rows);
        metrics::record_search_results("sender", hits.len());
        debug!(sender_name, chat_id, hits = hits.len(), "Sender search");
        Ok(hits)
    }

    /// Repopulate the full-text index from the messages table.
    ///
    /// Returns the number of indexed rows. Only needed to repair a database
    /// that was modified outside this store.
    pub async fn rebuild_search_index(&self) -> Result<usize, CacheError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;

        let mut tx = conn.begin().await?;
        schema::rebuild_fts(&mut tx).await?;
        let indexed = schema::count_fts(&mut tx).await?;
        tx.commit().await?;

        info!(indexed, "Rebuilt full-text index");
        Ok(to_usize(indexed))
    }

    /// Compact the database file.
    pub async fn vacuum(&self) -> Result<(), CacheError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        sqlx::query("VACUUM").execute(&mut *conn).await?;
        info!(path = %self.path.display(), "Vacuumed message cache database");
        Ok(())
    }

    async fn ensure_connected<'a>(
        &self,
        slot: &'a mut Option<SqliteConnection>,
    ) -> Result<&'a mut SqliteConnection, CacheError> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => self.establish().await?,
        };
        Ok(slot.insert(conn))
    }

    async fn establish(&self) -> Result<SqliteConnection, CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CacheError::Io { path: parent.to_path_buf(), source })?;
        }

        let mut conn = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .connect()
            .await?;

        let version = schema::initialize(&mut conn).await?;
        info!(path = %self.path.display(), schema_version = version, "Opened message cache database");
        Ok(conn)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn get_messages(&self, chat_id: &str, limit: Option<usize>) -> Result<Vec<Value>, CacheError> {
        let sql = format!(
            "SELECT m.message_id, m.message_data FROM cached_messages m \
             WHERE m.chat_id = ? AND {LIVE} \
             ORDER BY m.timestamp DESC, m.rowid DESC LIMIT ?"
        );

        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(chat_id)
            .bind(now_secs())
            .bind(limit_param(limit))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(message_id, data)| decode_payload(chat_id, &message_id, &data))
            .collect())
    }

    async fn add_message(&self, chat_id: &str, message_id: &str, payload: Value) -> Result<(), CacheError> {
        let data = serde_json::to_string(&payload).map_err(|source| CacheError::Serialization {
            chat_id: chat_id.to_string(),
            message_id: message_id.to_string(),
            source,
        })?;

        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        let mut tx = conn.begin().await?;

        // DO UPDATE keeps the rowid, so the FTS update trigger fires in place
        sqlx::query(
            "INSERT INTO cached_messages (chat_id, message_id, message_data, timestamp, ttl) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(chat_id, message_id) DO UPDATE SET \
             message_data = excluded.message_data, timestamp = excluded.timestamp, ttl = excluded.ttl",
        )
        .bind(chat_id)
        .bind(message_id)
        .bind(&data)
        .bind(now_secs())
        .bind(to_i64(self.ttl_seconds))
        .execute(&mut *tx)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cached_messages WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_one(&mut *tx)
            .await?;

        let excess = count - to_i64(self.max_messages);
        let mut evicted = 0;
        if excess > 0 {
            evicted = sqlx::query(
                "DELETE FROM cached_messages WHERE rowid IN (\
                 SELECT rowid FROM cached_messages WHERE chat_id = ? \
                 ORDER BY timestamp ASC, rowid ASC LIMIT ?)",
            )
            .bind(chat_id)
            .bind(excess)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        if evicted > 0 {
            debug!(chat_id, evicted, "Evicted oldest messages");
            metrics::record_evictions(BACKEND, evicted as usize);
        }
        Ok(())
    }

    async fn clear_chat(&self, chat_id: &str) -> Result<(), CacheError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        let removed = sqlx::query("DELETE FROM cached_messages WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        debug!(chat_id, removed, "Cleared chat");
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        let removed = sqlx::query("DELETE FROM cached_messages")
            .execute(&mut *conn)
            .await?
            .rows_affected();
        info!(removed, "Cleared all cached messages");
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        if self.ttl_seconds == 0 {
            return Ok(0);
        }

        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;
        let removed = sqlx::query("DELETE FROM cached_messages WHERE ttl > 0 AND (? - timestamp) >= ttl")
            .bind(now_secs())
            .execute(&mut *conn)
            .await?
            .rows_affected() as usize;

        metrics::record_expired(BACKEND, removed);
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let mut slot = self.conn.lock().await;
        let conn = self.ensure_connected(&mut slot).await?;

        let (total_messages, total_chats): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT chat_id) FROM cached_messages")
                .fetch_one(&mut *conn)
                .await?;
        let indexed = schema::count_fts(conn).await?;
        let schema_version = schema::read_version(conn).await?.unwrap_or(0);

        let db_size_bytes = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read database file size");
                0
            }
        };

        metrics::set_cached_messages(BACKEND, to_usize(total_messages));
        metrics::set_cached_chats(BACKEND, to_usize(total_chats));
        metrics::set_db_bytes(db_size_bytes);

        Ok(CacheStats {
            total_chats: to_usize(total_chats),
            total_messages: to_usize(total_messages),
            max_messages_per_chat: self.max_messages,
            ttl_seconds: self.ttl_seconds,
            backend: BackendStats::Sqlite {
                fts_indexed_messages: to_usize(indexed),
                fts_enabled: true,
                db_size_bytes,
                db_path: self.path.clone(),
                schema_version,
            },
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }
}

/// A row that no longer parses is skipped, not fatal.
fn decode_payload(chat_id: &str, message_id: &str, data: &str) -> Option<Value> {
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(chat_id, message_id, error = %e, "Skipping undecodable cached message");
            metrics::record_skipped_row(BACKEND);
            None
        }
    }
}

fn decode_hits(rows: Vec<HitRow>) -> Vec<SearchHit> {
    rows.into_iter()
        .filter_map(|(chat_id, message_id, data, timestamp, rank)| {
            let payload = decode_payload(&chat_id, &message_id, &data)?;
            Some(SearchHit { chat_id, message_id, payload, timestamp, rank })
        })
        .collect()
}

/// SQLite treats a negative LIMIT as unbounded.
fn limit_param(limit: Option<usize>) -> i64 {
    limit.filter(|l| *l > 0).map_or(-1, to_i64)
}

fn to_i64<T: TryInto<i64>>(n: T) -> i64 {
    n.try_into().unwrap_or(i64::MAX)
}

fn to_usize(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

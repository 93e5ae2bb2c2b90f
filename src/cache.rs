// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Message cache facade.
//!
//! [`MessageCache`] is the single entry point callers use. It picks one
//! backend at construction time and forwards every operation to it, timing
//! and counting each call.
//!
//! ```text
//! MessageCache
//!   ├── store:   Arc<dyn MessageStore>      every backend
//!   └── durable: Option<Arc<SqliteStore>>   search / vacuum / close
//! ```
//!
//! Operations that only make sense on disk (search, index rebuild, vacuum,
//! connection lifecycle) return [`CacheError::DurableOnly`] on the in-memory
//! backend.
//!
//! # Example
//!
//! ```
//! use message_cache::{MessageCache, MessageCacheConfig};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), message_cache::CacheError> {
//! let cache = MessageCache::new(MessageCacheConfig::memory(2, 0))?;
//!
//! cache.add_message("chat", "1", &json!({"text": "one"})).await?;
//! cache.add_message("chat", "2", &json!({"text": "two"})).await?;
//! cache.add_message("chat", "3", &json!({"text": "three"})).await?;
//!
//! let texts: Vec<_> = cache
//!     .get_messages("chat", None)
//!     .await?
//!     .into_iter()
//!     .map(|m| m["text"].clone())
//!     .collect();
//! assert_eq!(texts, vec![json!("two"), json!("three")]);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::{BackendConfig, CacheSettings, MessageCacheConfig};
use crate::metrics::{self, LatencyTimer};
use crate::search::{SearchHit, DEFAULT_SEARCH_LIMIT};
use crate::storage::{BackendKind, CacheError, CacheStats, InMemoryStore, MessageStore, SqliteStore};

/// Bounded, TTL-aware message cache over one storage backend.
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct MessageCache {
    config: MessageCacheConfig,
    store: Arc<dyn MessageStore>,
    /// Same instance as `store` when the SQLite backend is selected
    durable: Option<Arc<SqliteStore>>,
}

impl MessageCache {
    /// Build a cache from a configuration.
    ///
    /// Validation happens here; the SQLite file itself is only opened on
    /// first use (or by [`connect`](Self::connect)).
    pub fn new(config: MessageCacheConfig) -> Result<Self, CacheError> {
        config.validate()?;

        let max = config.max_messages_per_chat;
        let ttl = config.ttl_seconds;
        let (store, durable): (Arc<dyn MessageStore>, Option<Arc<SqliteStore>>) = match &config.backend {
            BackendConfig::Memory => {
                let memory: Arc<dyn MessageStore> = Arc::new(InMemoryStore::new(max, ttl));
                (memory, None)
            }
            BackendConfig::Sqlite { path } => {
                let sqlite = Arc::new(SqliteStore::new(path.clone(), max, ttl));
                let store: Arc<dyn MessageStore> = sqlite.clone();
                (store, Some(sqlite))
            }
        };

        info!(
            backend = %store.kind(),
            max_messages_per_chat = max,
            ttl_seconds = ttl,
            "Message cache initialized"
        );

        Ok(Self { config, store, durable })
    }

    /// Build a cache from flat settings.
    pub fn from_settings(settings: CacheSettings) -> Result<Self, CacheError> {
        Self::new(MessageCacheConfig::try_from(settings)?)
    }

    #[must_use]
    pub fn config(&self) -> &MessageCacheConfig {
        &self.config
    }

    /// Active backend. Read ordering differs between backends.
    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.store.kind()
    }

    /// Live messages for a chat.
    ///
    /// Memory: oldest to newest, the last `limit` kept. SQLite: newest first,
    /// at most `limit`. `None` or `Some(0)` means no limit.
    pub async fn get_messages(&self, chat_id: &str, limit: Option<usize>) -> Result<Vec<Value>, CacheError> {
        let _timer = self.timer("get");
        let result = self.store.get_messages(chat_id, limit).await;
        self.observe("get", result)
    }

    /// Insert or replace a message, evicting the chat's oldest entries past
    /// the per-chat bound.
    ///
    /// A payload that cannot be represented as JSON is rejected with
    /// [`CacheError::Serialization`] and nothing is written.
    pub async fn add_message<P>(&self, chat_id: &str, message_id: &str, payload: &P) -> Result<(), CacheError>
    where
        P: Serialize + ?Sized,
    {
        let _timer = self.timer("add");
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(source) => {
                warn!(chat_id, message_id, error = %source, "Dropping unserializable message");
                metrics::record_serialization_failure();
                let err = CacheError::Serialization {
                    chat_id: chat_id.to_string(),
                    message_id: message_id.to_string(),
                    source,
                };
                return self.observe("add", Err(err));
            }
        };

        let result = self.store.add_message(chat_id, message_id, payload).await;
        self.observe("add", result)
    }

    pub async fn clear_chat(&self, chat_id: &str) -> Result<(), CacheError> {
        let _timer = self.timer("clear_chat");
        let result = self.store.clear_chat(chat_id).await;
        self.observe("clear_chat", result)
    }

    pub async fn clear_all(&self) -> Result<(), CacheError> {
        let _timer = self.timer("clear_all");
        let result = self.store.clear_all().await;
        self.observe("clear_all", result)
    }

    /// Physically remove expired messages. Always `0` when TTL is disabled.
    pub async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        if self.config.ttl_seconds == 0 {
            return Ok(0);
        }
        let _timer = self.timer("cleanup");
        let result = self.store.cleanup_expired().await;
        self.observe("cleanup", result)
    }

    pub async fn get_stats(&self) -> Result<CacheStats, CacheError> {
        let result = self.store.stats().await;
        self.observe("stats", result)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Durable-only operations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Open the database now instead of on first use.
    pub async fn connect(&self) -> Result<(), CacheError> {
        let result = match self.durable("connect") {
            Ok(store) => store.connect().await,
            Err(e) => Err(e),
        };
        self.observe("connect", result)
    }

    /// Full-text search, best match first. `limit` defaults to
    /// [`DEFAULT_SEARCH_LIMIT`].
    pub async fn search_messages(
        &self,
        query: &str,
        chat_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, CacheError> {
        let _timer = self.timer("search");
        let result = match self.durable("search_messages") {
            Ok(store) => {
                store
                    .search_messages(query, chat_id, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
                    .await
            }
            Err(e) => Err(e),
        };
        self.observe("search", result)
    }

    /// Messages from a sender, newest first. `limit` defaults to
    /// [`DEFAULT_SEARCH_LIMIT`].
    pub async fn search_by_sender(
        &self,
        sender_name: &str,
        chat_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, CacheError> {
        let _timer = self.timer("search_sender");
        let result = match self.durable("search_by_sender") {
            Ok(store) => {
                store
                    .search_by_sender(sender_name, chat_id, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
                    .await
            }
            Err(e) => Err(e),
        };
        self.observe("search_sender", result)
    }

    pub async fn rebuild_search_index(&self) -> Result<usize, CacheError> {
        let _timer = self.timer("rebuild_index");
        let result = match self.durable("rebuild_search_index") {
            Ok(store) => store.rebuild_search_index().await,
            Err(e) => Err(e),
        };
        self.observe("rebuild_index", result)
    }

    pub async fn vacuum(&self) -> Result<(), CacheError> {
        let _timer = self.timer("vacuum");
        let result = match self.durable("vacuum") {
            Ok(store) => store.vacuum().await,
            Err(e) => Err(e),
        };
        self.observe("vacuum", result)
    }

    /// Close the database connection. Later calls reopen it.
    pub async fn close(&self) -> Result<(), CacheError> {
        let result = match self.durable("close") {
            Ok(store) => store.close().await,
            Err(e) => Err(e),
        };
        self.observe("close", result)
    }

    fn durable(&self, operation: &'static str) -> Result<&SqliteStore, CacheError> {
        self.durable
            .as_deref()
            .ok_or(CacheError::DurableOnly(operation))
    }

    fn timer(&self, operation: &'static str) -> LatencyTimer {
        LatencyTimer::new(self.store.kind().as_str(), operation)
    }

    fn observe<T>(&self, operation: &'static str, result: Result<T, CacheError>) -> Result<T, CacheError> {
        let backend = self.store.kind().as_str();
        match &result {
            Ok(_) => metrics::record_operation(backend, operation, "success"),
            Err(e) => {
                warn!(backend, operation, error = %e, "Cache operation failed");
                metrics::record_operation(backend, operation, "error");
            }
        }
        result
    }
}

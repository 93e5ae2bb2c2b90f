use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to serialize payload for {chat_id}/{message_id}: {source}")]
    Serialization {
        chat_id: String,
        message_id: String,
        source: serde_json::Error,
    },
    #[error("Storage backend error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("Cannot prepare storage path '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Schema migration v{from} -> v{to} failed: {source}")]
    Migration {
        from: i64,
        to: i64,
        source: sqlx::Error,
    },
    #[error("Invalid cache configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("'{0}' requires the durable storage backend")]
    DurableOnly(&'static str),
}

/// Which backend a store (or the facade) is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Sqlite,
}

impl BackendKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache statistics common to every backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_chats: usize,
    pub total_messages: usize,
    pub max_messages_per_chat: usize,
    pub ttl_seconds: u64,
    /// Backend-specific fields
    #[serde(flatten)]
    pub backend: BackendStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendStats {
    Memory,
    Sqlite {
        /// Rows currently in the full-text index
        fts_indexed_messages: usize,
        fts_enabled: bool,
        /// Size of the main database file
        db_size_bytes: u64,
        db_path: PathBuf,
        schema_version: i64,
    },
}

/// The contract shared by both backends.
///
/// Payloads arrive already converted to [`Value`]; the facade owns the
/// conversion from caller types.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Live messages for a chat. Ordering is backend-specific.
    async fn get_messages(&self, chat_id: &str, limit: Option<usize>) -> Result<Vec<Value>, CacheError>;

    /// Upsert a message and enforce the per-chat bound.
    async fn add_message(&self, chat_id: &str, message_id: &str, payload: Value) -> Result<(), CacheError>;

    async fn clear_chat(&self, chat_id: &str) -> Result<(), CacheError>;

    async fn clear_all(&self) -> Result<(), CacheError>;

    /// Physically remove expired messages, returning how many were removed.
    async fn cleanup_expired(&self) -> Result<usize, CacheError>;

    async fn stats(&self) -> Result<CacheStats, CacheError>;

    fn kind(&self) -> BackendKind;
}

//! # Message Cache
//!
//! A bounded, TTL-aware cache of chat messages with a choice of two backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       MessageCache                          │
//! │  • Validated config, one backend chosen at construction    │
//! │  • Payloads: any serde::Serialize value → JSON             │
//! │  • Per-operation metrics and latency                       │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────┐  ┌──────────────────────────────┐
//! │      InMemoryStore        │  │         SqliteStore          │
//! │  • LruCache per chat      │  │  • cached_messages table     │
//! │  • Touch on re-add        │  │  • FTS5 index via triggers   │
//! │  • Lost on restart        │  │  • WAL, schema migrations    │
//! └───────────────────────────┘  └──────────────────────────────┘
//! ```
//!
//! Every chat holds at most `max_messages_per_chat` entries; adding past the
//! bound evicts that chat's oldest entries. Messages older than `ttl_seconds`
//! are invisible to reads and reclaimed by [`MessageCache::cleanup_expired`]
//! (or by [`spawn_expiry_sweeper`]). A TTL of `0` disables expiry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use message_cache::{MessageCache, MessageCacheConfig};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), message_cache::CacheError> {
//!     let cache = MessageCache::new(MessageCacheConfig::sqlite("data/messages.db", 50, 300))?;
//!
//!     cache
//!         .add_message("chat-1", "1001", &json!({"text": "deploy at noon", "sender_name": "Ann"}))
//!         .await?;
//!
//!     for hit in cache.search_messages("deploy", None, None).await? {
//!         println!("{}/{} rank={:?}", hit.chat_id, hit.message_id, hit.rank);
//!     }
//!
//!     cache.close().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: The [`MessageCache`] facade
//! - [`storage`]: Backends (memory, SQLite) and the shared [`MessageStore`] trait
//! - [`search`]: FTS5 query construction and [`SearchHit`]
//! - [`maintenance`]: Background expiry sweeper
//! - [`config`]: Settings and validation
//! - [`metrics`]: `metrics` crate instrumentation

pub mod cache;
pub mod config;
pub mod maintenance;
pub mod message;
pub mod metrics;
pub mod search;
pub mod storage;

pub use cache::MessageCache;
pub use config::{BackendConfig, CacheSettings, ConfigError, MessageCacheConfig};
pub use maintenance::spawn_expiry_sweeper;
pub use message::CachedMessage;
pub use metrics::LatencyTimer;
pub use search::{SearchHit, DEFAULT_SEARCH_LIMIT};
pub use storage::{
    BackendKind, BackendStats, CacheError, CacheStats, InMemoryStore, MessageStore, SqliteStore,
};

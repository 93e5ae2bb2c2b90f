// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Full-text search over cached messages.
//!
//! Available with the durable backend only. The SQLite store keeps an FTS5
//! index (`messages_fts`) in step with `cached_messages` via triggers; this
//! module owns query construction and the hit type.
//!
//! # Architecture
//!
//! ```text
//! caller text
//!     ↓
//! FtsQuery::text / FtsQuery::sender   (escaping, column scoping)
//!     ↓
//! messages_fts MATCH ?  ⋈  cached_messages ON rowid
//!     ↓
//! Vec<SearchHit>   (bm25 rank, lower = better)
//! ```
//!
//! # Indexed Columns
//!
//! ```text
//! chat_id, message_id       - stored UNINDEXED (chat filtering only)
//! text_content              - payload["text"]
//! sender_name               - payload["sender_name"]
//! ```

mod fts_query;

pub use fts_query::{escape_quotes, FtsQuery, SENDER_COLUMN};

use serde::Serialize;
use serde_json::Value;

/// Default number of hits returned by a search.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// One full-text search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chat_id: String,
    pub message_id: String,
    /// Stored payload
    pub payload: Value,
    /// Write time (UNIX epoch seconds)
    pub timestamp: f64,
    /// BM25 relevance (lower = better); `None` for sender lookups, which are
    /// ordered by recency instead.
    pub rank: Option<f64>,
}

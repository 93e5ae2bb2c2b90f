// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cached message record.
//!
//! The [`CachedMessage`] is the unit both backends store. Each record is keyed
//! by `(chat_id, message_id)` and carries its own TTL, snapshotted from the
//! cache configuration at the moment it was written.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single cached message.
///
/// # Example
///
/// ```
/// use message_cache::CachedMessage;
/// use serde_json::json;
///
/// let msg = CachedMessage::new("chat-1", "42", json!({"text": "hi"}), 0);
/// assert_eq!(msg.chat_id, "chat-1");
/// assert!(!msg.is_expired_at(msg.inserted_at + 1_000_000.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMessage {
    /// Conversation the message belongs to
    pub chat_id: String,
    /// Identifier, unique within `chat_id`
    pub message_id: String,
    /// Message body as received from the upstream source
    pub payload: Value,
    /// Write time (UNIX epoch seconds)
    pub inserted_at: f64,
    /// Time-to-live in seconds, `0` = never expires
    pub ttl: u64,
}

impl CachedMessage {
    /// Create a record stamped with the current time.
    pub fn new(
        chat_id: impl Into<String>,
        message_id: impl Into<String>,
        payload: Value,
        ttl: u64,
    ) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
            payload,
            inserted_at: now_secs(),
            ttl,
        }
    }

    /// Replace the payload and restart the record's age.
    pub fn refresh(&mut self, payload: Value, ttl: u64) {
        self.payload = payload;
        self.inserted_at = now_secs();
        self.ttl = ttl;
    }

    /// Whether the record is expired at `now` (epoch seconds).
    #[must_use]
    #[inline]
    pub fn is_expired_at(&self, now: f64) -> bool {
        is_expired(self.inserted_at, self.ttl, now)
    }
}

/// Shared expiry predicate: `ttl > 0 && now - inserted_at >= ttl`.
#[must_use]
#[inline]
pub fn is_expired(inserted_at: f64, ttl: u64, now: f64) -> bool {
    ttl > 0 && now - inserted_at >= ttl as f64
}

/// Current wall-clock time as fractional UNIX epoch seconds.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

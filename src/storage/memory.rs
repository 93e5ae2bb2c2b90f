//! Process-local message store.
//!
//! Each chat owns an [`LruCache`] ordered by recency of insert/touch. The
//! cache is created unbounded; the per-chat bound is enforced here so that
//! eviction is observable (counted, logged) and always oldest-first.

use std::collections::HashMap;

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::traits::{BackendKind, BackendStats, CacheError, CacheStats, MessageStore};
use crate::message::{now_secs, CachedMessage};
use crate::metrics;

const BACKEND: &str = "memory";

type ChatMessages = LruCache<String, CachedMessage>;

pub struct InMemoryStore {
    chats: Mutex<HashMap<String, ChatMessages>>,
    max_messages: usize,
    ttl_seconds: u64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new(max_messages: usize, ttl_seconds: u64) -> Self {
        Self {
            chats: Mutex::new(HashMap::new()),
            max_messages,
            ttl_seconds,
        }
    }

    /// Physically stored messages, expired ones included.
    pub async fn len(&self) -> usize {
        self.chats.lock().await.values().map(LruCache::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.chats.lock().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn get_messages(&self, chat_id: &str, limit: Option<usize>) -> Result<Vec<Value>, CacheError> {
        let chats = self.chats.lock().await;
        let Some(chat) = chats.get(chat_id) else {
            return Ok(Vec::new());
        };

        let now = now_secs();
        // LruCache iterates most-recent first; callers get oldest → newest.
        let mut live: Vec<Value> = chat
            .iter()
            .rev()
            .filter(|(_, msg)| !msg.is_expired_at(now))
            .map(|(_, msg)| msg.payload.clone())
            .collect();

        if let Some(limit) = limit.filter(|l| *l > 0) {
            if live.len() > limit {
                live.drain(..live.len() - limit);
            }
        }
        Ok(live)
    }

    async fn add_message(&self, chat_id: &str, message_id: &str, payload: Value) -> Result<(), CacheError> {
        let mut chats = self.chats.lock().await;
        let chat = chats
            .entry(chat_id.to_string())
            .or_insert_with(LruCache::unbounded);

        // get_mut promotes the entry to most-recent
        if let Some(existing) = chat.get_mut(message_id) {
            existing.refresh(payload, self.ttl_seconds);
        } else {
            chat.put(
                message_id.to_string(),
                CachedMessage::new(chat_id, message_id, payload, self.ttl_seconds),
            );
        }

        let mut evicted = 0;
        while chat.len() > self.max_messages {
            if chat.pop_lru().is_none() {
                break;
            }
            evicted += 1;
        }

        if evicted > 0 {
            debug!(chat_id, evicted, "Evicted least-recently-touched messages");
            metrics::record_evictions(BACKEND, evicted);
        }
        Ok(())
    }

    async fn clear_chat(&self, chat_id: &str) -> Result<(), CacheError> {
        self.chats.lock().await.remove(chat_id);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), CacheError> {
        self.chats.lock().await.clear();
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize, CacheError> {
        if self.ttl_seconds == 0 {
            return Ok(0);
        }

        let now = now_secs();
        let mut removed = 0;
        let mut chats = self.chats.lock().await;

        for chat in chats.values_mut() {
            let expired: Vec<String> = chat
                .iter()
                .filter(|(_, msg)| msg.is_expired_at(now))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &expired {
                chat.pop(id);
            }
            removed += expired.len();
        }
        chats.retain(|_, chat| !chat.is_empty());

        metrics::record_expired(BACKEND, removed);
        Ok(removed)
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let chats = self.chats.lock().await;
        let total_messages = chats.values().map(LruCache::len).sum();

        metrics::set_cached_messages(BACKEND, total_messages);
        metrics::set_cached_chats(BACKEND, chats.len());

        Ok(CacheStats {
            total_chats: chats.len(),
            total_messages,
            max_messages_per_chat: self.max_messages,
            ttl_seconds: self.ttl_seconds,
            backend: BackendStats::Memory,
        })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

//! Configuration for the message cache.
//!
//! Settings arrive flat (as they appear in a config file) via
//! [`CacheSettings`] and are validated into a [`MessageCacheConfig`], which
//! names exactly one backend.
//!
//! # Example
//!
//! ```
//! use message_cache::{BackendConfig, CacheSettings, MessageCacheConfig};
//!
//! // Minimal config (uses defaults: in-memory, 50 messages/chat, 300s TTL)
//! let config = MessageCacheConfig::default();
//! assert_eq!(config.max_messages_per_chat, 50);
//! assert_eq!(config.backend, BackendConfig::Memory);
//!
//! // From flat settings
//! let settings = CacheSettings {
//!     use_durable_storage: true,
//!     storage_path: Some("data/cache.db".into()),
//!     ..Default::default()
//! };
//! let config = MessageCacheConfig::try_from(settings).unwrap();
//! assert!(config.is_durable());
//!
//! // Durable storage without a path fails fast
//! let settings = CacheSettings { use_durable_storage: true, ..Default::default() };
//! assert!(MessageCacheConfig::try_from(settings).is_err());
//! ```

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_messages_per_chat must be at least 1")]
    ZeroCapacity,
    #[error("durable storage selected but no storage_path configured")]
    MissingStoragePath,
    #[error("storage_path must not be empty")]
    EmptyStoragePath,
}

/// Flat cache settings as read from a configuration source.
///
/// All fields have defaults, so an empty `[cache]` section is valid.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    /// Per-chat message bound (default: 50)
    #[serde(default = "default_max_messages_per_chat")]
    pub max_messages_per_chat: usize,

    /// Message time-to-live in seconds, 0 disables expiry (default: 300)
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Select the SQLite backend instead of the in-memory one
    #[serde(default)]
    pub use_durable_storage: bool,

    /// SQLite file path; parent directories are created on connect
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
}

fn default_max_messages_per_chat() -> usize { 50 }
fn default_ttl_seconds() -> u64 { 300 }

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_messages_per_chat: default_max_messages_per_chat(),
            ttl_seconds: default_ttl_seconds(),
            use_durable_storage: false,
            storage_path: None,
        }
    }
}

/// Backend selection with its backend-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackendConfig {
    /// Process-local, lost on restart
    #[default]
    Memory,
    /// Single SQLite file with an FTS5 search index
    Sqlite { path: PathBuf },
}

/// Validated cache configuration. Read-only once the cache is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCacheConfig {
    pub max_messages_per_chat: usize,
    pub ttl_seconds: u64,
    pub backend: BackendConfig,
}

impl Default for MessageCacheConfig {
    fn default() -> Self {
        Self {
            max_messages_per_chat: default_max_messages_per_chat(),
            ttl_seconds: default_ttl_seconds(),
            backend: BackendConfig::Memory,
        }
    }
}

impl MessageCacheConfig {
    /// In-memory configuration.
    #[must_use]
    pub fn memory(max_messages_per_chat: usize, ttl_seconds: u64) -> Self {
        Self {
            max_messages_per_chat,
            ttl_seconds,
            backend: BackendConfig::Memory,
        }
    }

    /// SQLite-backed configuration.
    #[must_use]
    pub fn sqlite(path: impl Into<PathBuf>, max_messages_per_chat: usize, ttl_seconds: u64) -> Self {
        Self {
            max_messages_per_chat,
            ttl_seconds,
            backend: BackendConfig::Sqlite { path: path.into() },
        }
    }

    #[must_use]
    pub fn is_durable(&self) -> bool {
        matches!(self.backend, BackendConfig::Sqlite { .. })
    }

    /// Check the invariants the backends rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_messages_per_chat == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if let BackendConfig::Sqlite { path } = &self.backend {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyStoragePath);
            }
        }
        Ok(())
    }
}

impl TryFrom<CacheSettings> for MessageCacheConfig {
    type Error = ConfigError;

    fn try_from(settings: CacheSettings) -> Result<Self, Self::Error> {
        let backend = if settings.use_durable_storage {
            let path = settings.storage_path.ok_or(ConfigError::MissingStoragePath)?;
            BackendConfig::Sqlite { path }
        } else {
            BackendConfig::Memory
        };

        let config = Self {
            max_messages_per_chat: settings.max_messages_per_chat,
            ttl_seconds: settings.ttl_seconds,
            backend,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults_from_empty_json() {
        let settings: CacheSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.max_messages_per_chat, 50);
        assert_eq!(settings.ttl_seconds, 300);
        assert!(!settings.use_durable_storage);
        assert!(settings.storage_path.is_none());
    }

    #[test]
    fn test_settings_deserialize_durable() {
        let settings: CacheSettings = serde_json::from_str(
            r#"{"max_messages_per_chat": 10, "ttl_seconds": 0, "use_durable_storage": true, "storage_path": "/tmp/x.db"}"#,
        )
        .unwrap();

        let config = MessageCacheConfig::try_from(settings).unwrap();
        assert_eq!(config.max_messages_per_chat, 10);
        assert_eq!(config.ttl_seconds, 0);
        assert_eq!(config.backend, BackendConfig::Sqlite { path: "/tmp/x.db".into() });
    }

    #[test]
    fn test_path_ignored_for_memory_backend() {
        let settings = CacheSettings {
            storage_path: Some("unused.db".into()),
            ..Default::default()
        };
        let config = MessageCacheConfig::try_from(settings).unwrap();
        assert_eq!(config.backend, BackendConfig::Memory);
        assert!(!config.is_durable());
    }

    #[test]
    fn test_durable_without_path_fails() {
        let settings = CacheSettings {
            use_durable_storage: true,
            ..Default::default()
        };
        assert_eq!(
            MessageCacheConfig::try_from(settings).unwrap_err(),
            ConfigError::MissingStoragePath
        );
    }

    #[test]
    fn test_empty_path_fails() {
        let config = MessageCacheConfig::sqlite("", 10, 0);
        assert_eq!(config.validate().unwrap_err(), ConfigError::EmptyStoragePath);
    }

    #[test]
    fn test_zero_capacity_fails() {
        let settings = CacheSettings {
            max_messages_per_chat: 0,
            ..Default::default()
        };
        assert_eq!(
            MessageCacheConfig::try_from(settings).unwrap_err(),
            ConfigError::ZeroCapacity
        );
        assert_eq!(
            MessageCacheConfig::memory(0, 10).validate().unwrap_err(),
            ConfigError::ZeroCapacity
        );
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! SQLite schema and one-time migrations for the durable store.
//!
//! ```sql
//! CREATE TABLE cached_messages (
//!   chat_id TEXT NOT NULL,
//!   message_id TEXT NOT NULL,
//!   message_data TEXT NOT NULL,   -- serialized JSON payload
//!   timestamp REAL NOT NULL,      -- epoch seconds at write time
//!   ttl INTEGER NOT NULL,         -- seconds, 0 = never expires
//!   PRIMARY KEY (chat_id, message_id)
//! )
//! ```
//!
//! `messages_fts` is an FTS5 table whose rowids mirror `cached_messages.rowid`.
//! Three triggers keep it in step with every insert, update and delete, so the
//! index can never be observed out of sync with the table.
//!
//! ## Versions
//!
//! - **1**: messages table only (no usable full-text index)
//! - **2**: FTS5 index + sync triggers
//!
//! A database without a `schema_version` row is fresh and needs no migration.
//! An older version gets its FTS table and triggers recreated and the index
//! rebuilt from `cached_messages`, all inside the connect transaction.

use sqlx::{Connection, SqliteConnection};
use tracing::{info, warn};

use super::traits::CacheError;

/// Structural generation this code writes and expects.
pub const SCHEMA_VERSION: i64 = 2;

const BASE_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cached_messages (
        chat_id TEXT NOT NULL,
        message_id TEXT NOT NULL,
        message_data TEXT NOT NULL,
        timestamp REAL NOT NULL,
        ttl INTEGER NOT NULL,
        PRIMARY KEY (chat_id, message_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_chat_timestamp ON cached_messages(chat_id, timestamp DESC)",
    "CREATE INDEX IF NOT EXISTS idx_timestamp_ttl ON cached_messages(timestamp, ttl)",
    "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY)",
];

// Identifiers are stored for filtering and joins but not tokenized, so a
// search term never matches a chat or message id.
const CREATE_FTS: &str = r#"
    CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
        chat_id UNINDEXED,
        message_id UNINDEXED,
        text_content,
        sender_name,
        tokenize = 'unicode61 remove_diacritics 2'
    )
"#;

// json_valid() guards keep a corrupt payload from aborting the write.
const CREATE_TRIGGERS: &[&str] = &[
    r#"
    CREATE TRIGGER IF NOT EXISTS cached_messages_ai AFTER INSERT ON cached_messages BEGIN
        INSERT INTO messages_fts(rowid, chat_id, message_id, text_content, sender_name)
        VALUES (
            NEW.rowid, NEW.chat_id, NEW.message_id,
            CASE WHEN json_valid(NEW.message_data) THEN json_extract(NEW.message_data, '$.text') END,
            CASE WHEN json_valid(NEW.message_data) THEN json_extract(NEW.message_data, '$.sender_name') END
        );
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS cached_messages_ad AFTER DELETE ON cached_messages BEGIN
        DELETE FROM messages_fts WHERE rowid = OLD.rowid;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS cached_messages_au AFTER UPDATE ON cached_messages BEGIN
        DELETE FROM messages_fts WHERE rowid = OLD.rowid;
        INSERT INTO messages_fts(rowid, chat_id, message_id, text_content, sender_name)
        VALUES (
            NEW.rowid, NEW.chat_id, NEW.message_id,
            CASE WHEN json_valid(NEW.message_data) THEN json_extract(NEW.message_data, '$.text') END,
            CASE WHEN json_valid(NEW.message_data) THEN json_extract(NEW.message_data, '$.sender_name') END
        );
    END
    "#,
];

const DROP_FTS: &[&str] = &[
    "DROP TRIGGER IF EXISTS cached_messages_ai",
    "DROP TRIGGER IF EXISTS cached_messages_ad",
    "DROP TRIGGER IF EXISTS cached_messages_au",
    "DROP TABLE IF EXISTS messages_fts",
];

/// Create missing structures, run pending migrations and stamp the version.
///
/// Everything happens in one transaction: a failed migration leaves the
/// database exactly as it was. Returns the version now recorded on disk.
pub async fn initialize(conn: &mut SqliteConnection) -> Result<i64, CacheError> {
    let mut tx = conn.begin().await?;

    for stmt in BASE_SCHEMA {
        sqlx::query(stmt).execute(&mut *tx).await?;
    }

    let existing: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&mut *tx)
        .await?;

    let recorded = match existing {
        Some(from) if from < SCHEMA_VERSION => {
            info!(from, to = SCHEMA_VERSION, "Migrating message cache schema");
            migrate_fts(&mut tx)
                .await
                .map_err(|source| CacheError::Migration { from, to: SCHEMA_VERSION, source })?;
            write_version(&mut tx).await?;
            let indexed = count_fts(&mut tx).await?;
            info!(to = SCHEMA_VERSION, indexed, "Schema migration complete");
            SCHEMA_VERSION
        }
        Some(current) => {
            if current > SCHEMA_VERSION {
                warn!(
                    on_disk = current,
                    supported = SCHEMA_VERSION,
                    "Database schema is newer than this build"
                );
            }
            create_fts(&mut tx).await?;
            current
        }
        None => {
            create_fts(&mut tx).await?;
            write_version(&mut tx).await?;
            SCHEMA_VERSION
        }
    };

    tx.commit().await?;
    Ok(recorded)
}

/// Read the recorded schema version (`None` if never stamped).
pub async fn read_version(conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(conn)
        .await
}

/// Repopulate `messages_fts` from `cached_messages`.
pub async fn rebuild_fts(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM messages_fts").execute(&mut *conn).await?;
    sqlx::query(
        r#"
        INSERT INTO messages_fts(rowid, chat_id, message_id, text_content, sender_name)
        SELECT rowid, chat_id, message_id,
            CASE WHEN json_valid(message_data) THEN json_extract(message_data, '$.text') END,
            CASE WHEN json_valid(message_data) THEN json_extract(message_data, '$.sender_name') END
        FROM cached_messages
        "#,
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn count_fts(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts")
        .fetch_one(conn)
        .await
}

async fn create_fts(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_FTS).execute(&mut *conn).await?;
    for stmt in CREATE_TRIGGERS {
        sqlx::query(stmt).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Older layouts may carry an incompatible FTS table (or none at all), so it
/// is recreated from scratch rather than patched.
async fn migrate_fts(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for stmt in DROP_FTS {
        sqlx::query(stmt).execute(&mut *conn).await?;
    }
    create_fts(conn).await?;
    rebuild_fts(conn).await
}

async fn write_version(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM schema_version").execute(&mut *conn).await?;
    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::ConnectOptions;

    async fn open(path: &std::path::Path) -> SqliteConnection {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .connect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_database_is_stamped_current() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open(&dir.path().join("fresh.db")).await;

        assert_eq!(initialize(&mut conn).await.unwrap(), SCHEMA_VERSION);
        assert_eq!(read_version(&mut conn).await.unwrap(), Some(SCHEMA_VERSION));
        assert_eq!(count_fts(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_initialize_twice_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open(&dir.path().join("twice.db")).await;

        initialize(&mut conn).await.unwrap();
        sqlx::query(
            "INSERT INTO cached_messages VALUES ('c', 'm', '{\"text\":\"hello\"}', 1.0, 0)",
        )
        .execute(&mut conn)
        .await
        .unwrap();

        assert_eq!(initialize(&mut conn).await.unwrap(), SCHEMA_VERSION);
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(count_fts(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_v1_database_gets_index_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open(&dir.path().join("legacy.db")).await;

        // Version 1 layout: messages but no FTS table or triggers
        for stmt in BASE_SCHEMA {
            sqlx::query(stmt).execute(&mut conn).await.unwrap();
        }
        sqlx::query("INSERT INTO schema_version (version) VALUES (1)")
            .execute(&mut conn)
            .await
            .unwrap();
        for (id, text) in [("1", "alpha beta"), ("2", "gamma"), ("3", "beta delta")] {
            sqlx::query("INSERT INTO cached_messages VALUES ('c', ?, ?, 1.0, 0)")
                .bind(id)
                .bind(serde_json::json!({"text": text}).to_string())
                .execute(&mut conn)
                .await
                .unwrap();
        }

        assert_eq!(initialize(&mut conn).await.unwrap(), SCHEMA_VERSION);
        assert_eq!(read_version(&mut conn).await.unwrap(), Some(SCHEMA_VERSION));
        assert_eq!(count_fts(&mut conn).await.unwrap(), 3);

        let hits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'beta'")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!(hits, 2);

        // Triggers exist after migration
        sqlx::query("DELETE FROM cached_messages WHERE message_id = '1'")
            .execute(&mut conn)
            .await
            .unwrap();
        assert_eq!(count_fts(&mut conn).await.unwrap(), 2);

        // Running again does not rebuild or duplicate anything
        assert_eq!(initialize(&mut conn).await.unwrap(), SCHEMA_VERSION);
        assert_eq!(count_fts(&mut conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_triggers_track_update_and_tolerate_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = open(&dir.path().join("triggers.db")).await;
        initialize(&mut conn).await.unwrap();

        sqlx::query("INSERT INTO cached_messages VALUES ('c', 'm', '{\"text\":\"first\"}', 1.0, 0)")
            .execute(&mut conn)
            .await
            .unwrap();
        sqlx::query("UPDATE cached_messages SET message_data = '{\"text\":\"second\"}'")
            .execute(&mut conn)
            .await
            .unwrap();

        let first: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'first'")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        let second: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages_fts WHERE messages_fts MATCH 'second'")
            .fetch_one(&mut conn)
            .await
            .unwrap();
        assert_eq!((first, second), (0, 1));

        sqlx::query("INSERT INTO cached_messages VALUES ('c', 'bad', 'not json {', 1.0, 0)")
            .execute(&mut conn)
            .await
            .unwrap();
        assert_eq!(count_fts(&mut conn).await.unwrap(), 2);
    }
}

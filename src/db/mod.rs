//! Database module for persistent storage.
//!
//! Provides async SQLite access using SQLx for the static registries:
//! the IP ban list, the account table (contacts and inboxes included),
//! the channel registry, global settings and privilege groups.
//!
//! Bans and settings are written through as they change; accounts and
//! channels are loaded on startup and saved on clean shutdown.

mod accounts;
mod bans;
mod channels;
mod settings;

pub use accounts::AccountRepository;
pub use bans::BanRepository;
pub use channels::ChannelRepository;
pub use settings::SettingsRepository;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Distinguishes in-memory databases from one another within the process.
static MEMORY_DB_SEQ: AtomicU64 = AtomicU64::new(1);

impl Database {
    /// Connection acquire timeout - prevents connection storms from
    /// blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a new database connection, creating the schema if needed.
    /// `":memory:"` yields a private in-memory database.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // Shared-cache URI so every pooled connection sees one database;
            // the sequence number keeps separate handles separate.
            let seq = MEMORY_DB_SEQ.fetch_add(1, Ordering::Relaxed);
            let options: SqliteConnectOptions =
                format!("sqlite:file:confabulator_mem_{seq}?mode=memory&cache=shared")
                    .parse::<SqliteConnectOptions>()?
                    .foreign_keys(true);

            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        let db = Self { pool };
        db.settings().prime_if_fresh().await?;
        Ok(db)
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn bans(&self) -> BanRepository<'_> {
        BanRepository::new(&self.pool)
    }

    pub fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(&self.pool)
    }

    pub fn channels(&self) -> ChannelRepository<'_> {
        ChannelRepository::new(&self.pool)
    }

    pub fn settings(&self) -> SettingsRepository<'_> {
        SettingsRepository::new(&self.pool)
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS blocked_client (
    blocked_client_id INTEGER PRIMARY KEY AUTOINCREMENT,
    ip_address        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS user_account (
    user_account_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name            TEXT NOT NULL UNIQUE,
    password        TEXT NOT NULL,
    administrator   INTEGER NOT NULL DEFAULT 0,
    forgiven        INTEGER NOT NULL DEFAULT 0,
    registered_at   INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS user_contact (
    user_contact_id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id        INTEGER NOT NULL
        REFERENCES user_account (user_account_id) ON DELETE CASCADE,
    friend_name     TEXT NOT NULL,
    position        INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS inbox_message (
    inbox_message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id         INTEGER NOT NULL
        REFERENCES user_account (user_account_id) ON DELETE CASCADE,
    source           TEXT NOT NULL,
    body             TEXT NOT NULL,
    unread           INTEGER NOT NULL,
    sent_at          INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS communication_channel (
    channel_id  INTEGER PRIMARY KEY,
    name        TEXT UNIQUE,
    owner       TEXT NOT NULL,
    password    TEXT NOT NULL DEFAULT '',
    buffer_size INTEGER,
    replay_size INTEGER,
    phase       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS channel_message (
    channel_message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id         INTEGER NOT NULL
        REFERENCES communication_channel (channel_id) ON DELETE CASCADE,
    position           INTEGER NOT NULL,
    source             TEXT NOT NULL,
    body               TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS channel_ban (
    channel_ban_id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id     INTEGER NOT NULL
        REFERENCES communication_channel (channel_id) ON DELETE CASCADE,
    name           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS muted_user (
    muted_user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    channel_id    INTEGER NOT NULL
        REFERENCES communication_channel (channel_id) ON DELETE CASCADE,
    muted_name    TEXT NOT NULL,
    muter_name    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS global_setting (
    "key" TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS privilege_group (
    privilege_group_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name               TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS privilege_relationship (
    parent_id INTEGER NOT NULL REFERENCES privilege_group (privilege_group_id),
    child_id  INTEGER NOT NULL REFERENCES privilege_group (privilege_group_id),
    UNIQUE (parent_id, child_id)
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_databases_are_isolated() {
        let first = Database::new(":memory:").await.unwrap();
        let second = Database::new(":memory:").await.unwrap();
        first.bans().add("10.0.0.1").await.unwrap();
        assert!(first.bans().contains("10.0.0.1").await.unwrap());
        assert!(!second.bans().contains("10.0.0.1").await.unwrap());
    }
}

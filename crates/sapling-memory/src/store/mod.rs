//! SQLite-backed persistent store.
//!
//! Split into focused submodules:
//! - `users`: the user directory (settings, reminder sub-settings, xp bookkeeping)
//! - `reminders`: reminder upsert, lookup, deletion, and delivery bookkeeping
//! - `cooldowns`: the per-activity cooldown table

mod cooldowns;
mod reminders;
mod users;

pub use reminders::NewReminder;

use sapling_core::{config::MemoryConfig, error::SaplingError, shellexpand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// How long a statement may wait for the database before giving up.
const BUSY_TIMEOUT_SECS: u64 = 5;

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Create a new store, running migrations on first use.
    pub async fn new(config: &MemoryConfig) -> Result<Self, SaplingError> {
        let db_path = shellexpand(&config.db_path);

        // Ensure parent directory exists.
        if let Some(parent) = std::path::Path::new(&db_path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SaplingError::Memory(format!("failed to create data dir: {e}")))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| SaplingError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
            .connect_with(opts)
            .await
            .map_err(|e| SaplingError::Memory(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Store initialized at {db_path}");

        Ok(Self { pool })
    }

    /// Open a private in-memory database (dry runs and tests).
    pub async fn in_memory() -> Result<Self, SaplingError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| SaplingError::Memory(format!("invalid db path: {e}")))?;
        // A single connection: every pooled connection would otherwise get its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| SaplingError::Memory(format!("failed to open in-memory sqlite: {e}")))?;
        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), SaplingError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] = &[
            ("001_init", include_str!("../../migrations/001_init.sql")),
            (
                "002_tracking_log",
                include_str!("../../migrations/002_tracking_log.sql"),
            ),
            (
                "003_cooldowns",
                include_str!("../../migrations/003_cooldowns.sql"),
            ),
        ];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        SaplingError::Memory(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| SaplingError::Memory(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    SaplingError::Memory(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

/// SQLite integers are signed; platform ids fit below `i64::MAX`.
pub(crate) fn db_id(id: u64) -> i64 {
    id as i64
}

pub(crate) fn from_db_id(id: i64) -> u64 {
    id as u64
}

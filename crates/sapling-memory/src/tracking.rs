//! Tracking log: one row per tracked in-game action.

use chrono::{DateTime, Utc};
use sapling_core::{activity::Activity, error::SaplingError};
use sqlx::SqlitePool;
use tracing::debug;

use crate::store::{db_id, from_db_id};

/// An entry to write to the tracking log.
pub struct TrackingEntry {
    pub user_id: u64,
    pub guild_id: u64,
    pub activity: Activity,
    pub logged_at: DateTime<Utc>,
}

/// Tracking log backed by SQLite.
#[derive(Clone)]
pub struct TrackingLog {
    pool: SqlitePool,
}

impl TrackingLog {
    /// Create a new tracking log sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the tracking log.
    pub async fn log(&self, entry: &TrackingEntry) -> Result<(), SaplingError> {
        sqlx::query(
            "INSERT INTO tracking_log (user_id, guild_id, activity, logged_at) VALUES (?, ?, ?, ?)",
        )
        .bind(db_id(entry.user_id))
        .bind(db_id(entry.guild_id))
        .bind(entry.activity.as_str())
        .bind(entry.logged_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("tracking log write failed: {e}")))?;

        debug!(
            "tracking: {} {} {} at {}",
            entry.guild_id, entry.user_id, entry.activity, entry.logged_at
        );

        Ok(())
    }

    /// Number of entries for a user and activity since `since`.
    pub async fn count_since(
        &self,
        user_id: u64,
        activity: Activity,
        since: DateTime<Utc>,
    ) -> Result<i64, SaplingError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tracking_log WHERE user_id = ? AND activity = ? AND logged_at >= ?",
        )
        .bind(db_id(user_id))
        .bind(activity.as_str())
        .bind(since.timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("tracking log count failed: {e}")))?;
        Ok(count)
    }

    /// Guild and time of the most recent entry for a user and activity.
    pub async fn last_entry(
        &self,
        user_id: u64,
        activity: Activity,
    ) -> Result<Option<(u64, DateTime<Utc>)>, SaplingError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            "SELECT guild_id, logged_at FROM tracking_log \
             WHERE user_id = ? AND activity = ? ORDER BY logged_at DESC, id DESC LIMIT 1",
        )
        .bind(db_id(user_id))
        .bind(activity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("tracking log lookup failed: {e}")))?;

        Ok(row.and_then(|(guild_id, logged_at)| {
            DateTime::<Utc>::from_timestamp(logged_at, 0).map(|at| (from_db_id(guild_id), at))
        }))
    }
}

//! Per-activity base cooldowns.

use super::Store;
use chrono::TimeDelta;
use sapling_core::{activity::Activity, error::SaplingError};

impl Store {
    /// Base cooldown for an activity, before any per-user modifier.
    pub async fn get_cooldown(&self, activity: Activity) -> Result<TimeDelta, SaplingError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT seconds FROM cooldowns WHERE activity = ?")
            .bind(activity.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SaplingError::Memory(format!("get cooldown failed: {e}")))?;

        row.map(|(seconds,)| TimeDelta::seconds(seconds))
            .ok_or_else(|| SaplingError::NotFound(format!("no cooldown stored for {activity}")))
    }

    /// Replace the base cooldown for an activity.
    pub async fn set_cooldown(
        &self,
        activity: Activity,
        cooldown: TimeDelta,
    ) -> Result<(), SaplingError> {
        sqlx::query(
            "INSERT INTO cooldowns (activity, seconds) VALUES (?, ?) \
             ON CONFLICT(activity) DO UPDATE SET seconds = excluded.seconds",
        )
        .bind(activity.as_str())
        .bind(cooldown.num_seconds())
        .execute(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("set cooldown failed: {e}")))?;
        Ok(())
    }
}

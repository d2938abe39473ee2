//! User directory: settings lookup, registration, and atomic partial updates.

use super::{db_id, from_db_id, Store};
use sapling_core::{
    activity::ReminderKind,
    error::SaplingError,
    settings::{ReminderSetting, UserSettings, UserUpdate},
};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::warn;

type UserRow = (
    i64,
    bool,
    bool,
    bool,
    bool,
    i64,
    i64,
    i64,
    i64,
    f64,
    i64,
    String,
);

const USER_COLUMNS: &str = "user_id, bot_enabled, reactions_enabled, tracking_enabled, \
     helper_prune_enabled, level, xp, xp_target, rebirth, xp_gain_average, xp_prune_count, \
     pruner_type";

impl Store {
    /// Load a user's settings. Unknown users raise `NotRegistered`; nothing is created.
    pub async fn get_user(&self, user_id: u64) -> Result<UserSettings, SaplingError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?"))
                .bind(db_id(user_id))
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| SaplingError::Memory(format!("get user failed: {e}")))?;

        let row = row.ok_or(SaplingError::NotRegistered(user_id))?;
        let reminders = self.get_reminder_settings(user_id).await?;
        Ok(user_from_row(row, reminders))
    }

    /// Register a user with every reminder enabled and default templates.
    ///
    /// Registering an existing user is a no-op that returns the stored settings.
    pub async fn create_user(&self, user_id: u64) -> Result<UserSettings, SaplingError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| SaplingError::Memory(format!("create user begin failed: {e}")))?;

        sqlx::query("INSERT OR IGNORE INTO users (user_id) VALUES (?)")
            .bind(db_id(user_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| SaplingError::Memory(format!("create user failed: {e}")))?;

        for kind in ReminderKind::ALL {
            sqlx::query(
                "INSERT OR IGNORE INTO reminder_settings (user_id, kind, enabled, message) \
                 VALUES (?, ?, 1, ?)",
            )
            .bind(db_id(user_id))
            .bind(kind.as_str())
            .bind(kind.default_message())
            .execute(&mut *tx)
            .await
            .map_err(|e| SaplingError::Memory(format!("create reminder setting failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| SaplingError::Memory(format!("create user commit failed: {e}")))?;

        self.get_user(user_id).await
    }

    /// Apply a partial update as a single statement and return the new settings.
    pub async fn update_user(
        &self,
        user_id: u64,
        update: &UserUpdate,
    ) -> Result<UserSettings, SaplingError> {
        if update.is_empty() {
            return self.get_user(user_id).await;
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut sets = query.separated(", ");
            if let Some(v) = update.bot_enabled {
                sets.push("bot_enabled = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.reactions_enabled {
                sets.push("reactions_enabled = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.tracking_enabled {
                sets.push("tracking_enabled = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.helper_prune_enabled {
                sets.push("helper_prune_enabled = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.level {
                sets.push("level = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.xp {
                sets.push("xp = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.xp_target {
                sets.push("xp_target = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.rebirth {
                sets.push("rebirth = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.xp_gain_average {
                sets.push("xp_gain_average = ").push_bind_unseparated(v);
            }
            if let Some(v) = update.xp_prune_count {
                sets.push("xp_prune_count = ").push_bind_unseparated(v);
            }
            if let Some(ref v) = update.pruner_type {
                sets.push("pruner_type = ").push_bind_unseparated(v.clone());
            }
        }
        query.push(" WHERE user_id = ").push_bind(db_id(user_id));

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| SaplingError::Memory(format!("update user failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(SaplingError::NotRegistered(user_id));
        }
        self.get_user(user_id).await
    }

    /// Fold one prune's xp gain into the rolling average, xp total, and sample count.
    ///
    /// The read-modify-write happens inside one statement so concurrent prunes
    /// for the same user cannot lose an update.
    pub async fn record_xp_gain(
        &self,
        user_id: u64,
        xp_gain: i64,
    ) -> Result<UserSettings, SaplingError> {
        let result = sqlx::query(
            "UPDATE users SET \
                 xp_gain_average = round(CASE WHEN xp_gain_average > 0 \
                     THEN (xp_prune_count * xp_gain_average + ?) / (xp_prune_count + 1) \
                     ELSE ? END, 5), \
                 xp = xp + ?, \
                 xp_prune_count = xp_prune_count + 1 \
             WHERE user_id = ?",
        )
        .bind(xp_gain as f64)
        .bind(xp_gain as f64)
        .bind(xp_gain)
        .bind(db_id(user_id))
        .execute(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("record xp gain failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(SaplingError::NotRegistered(user_id));
        }
        self.get_user(user_id).await
    }

    /// Store one reminder sub-setting.
    pub async fn set_reminder_setting(
        &self,
        user_id: u64,
        kind: ReminderKind,
        setting: &ReminderSetting,
    ) -> Result<(), SaplingError> {
        sqlx::query(
            "INSERT INTO reminder_settings (user_id, kind, enabled, message) VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, kind) DO UPDATE SET \
                 enabled = excluded.enabled, message = excluded.message",
        )
        .bind(db_id(user_id))
        .bind(kind.as_str())
        .bind(setting.enabled)
        .bind(&setting.message)
        .execute(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("set reminder setting failed: {e}")))?;
        Ok(())
    }

    async fn get_reminder_settings(
        &self,
        user_id: u64,
    ) -> Result<BTreeMap<ReminderKind, ReminderSetting>, SaplingError> {
        let rows: Vec<(String, bool, String)> = sqlx::query_as(
            "SELECT kind, enabled, message FROM reminder_settings WHERE user_id = ?",
        )
        .bind(db_id(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("get reminder settings failed: {e}")))?;

        let mut settings = BTreeMap::new();
        for (kind, enabled, message) in rows {
            match ReminderKind::from_str(&kind) {
                Ok(kind) => {
                    settings.insert(kind, ReminderSetting { enabled, message });
                }
                Err(e) => warn!("skipping stored reminder setting for {user_id}: {e}"),
            }
        }
        Ok(settings)
    }
}

fn user_from_row(row: UserRow, reminders: BTreeMap<ReminderKind, ReminderSetting>) -> UserSettings {
    let (
        user_id,
        bot_enabled,
        reactions_enabled,
        tracking_enabled,
        helper_prune_enabled,
        level,
        xp,
        xp_target,
        rebirth,
        xp_gain_average,
        xp_prune_count,
        pruner_type,
    ) = row;
    UserSettings {
        user_id: from_db_id(user_id),
        bot_enabled,
        reactions_enabled,
        tracking_enabled,
        helper_prune_enabled,
        level,
        xp,
        xp_target,
        rebirth,
        xp_gain_average,
        xp_prune_count,
        pruner_type,
        reminders,
    }
}

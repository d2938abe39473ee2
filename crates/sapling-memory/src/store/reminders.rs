//! Reminder upsert, lookup, deletion, and delivery bookkeeping.
//!
//! Every mutation is one SQL statement, so a reminder slot is never observed
//! half-written and concurrent inserts for the same key resolve last-write-wins.

use super::{db_id, from_db_id, Store};
use chrono::{DateTime, Utc};
use sapling_core::{
    activity::{Activity, ActivityGroup, Reminder},
    error::SaplingError,
};
use tracing::warn;

type ReminderRow = (i64, String, i64, i64, i64, String, bool);

const REMINDER_COLUMNS: &str =
    "user_id, activity, custom_id, channel_id, end_time, message, triggered";

/// Data for a reminder about to be written.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: u64,
    pub activity: Activity,
    pub channel_id: u64,
    pub end_time: DateTime<Utc>,
    pub message: String,
}

impl Store {
    /// Write the (user, activity) slot, replacing whatever was there.
    ///
    /// Overwriting also clears `triggered`, so a re-detected cooldown is pending again.
    pub async fn upsert_reminder(&self, new: &NewReminder) -> Result<Reminder, SaplingError> {
        let row: ReminderRow = sqlx::query_as(&format!(
            "INSERT INTO reminders (user_id, activity, custom_id, channel_id, end_time, message, triggered) \
             VALUES (?, ?, 0, ?, ?, ?, 0) \
             ON CONFLICT(user_id, activity, custom_id) DO UPDATE SET \
                 channel_id = excluded.channel_id, \
                 end_time = excluded.end_time, \
                 message = excluded.message, \
                 triggered = 0, \
                 updated_at = datetime('now') \
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(db_id(new.user_id))
        .bind(new.activity.as_str())
        .bind(db_id(new.channel_id))
        .bind(new.end_time.timestamp())
        .bind(&new.message)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("insert reminder failed: {e}")))?;

        reminder_from_row(row)
    }

    /// Allocate the next free custom slot for a user and write it.
    pub async fn insert_custom_reminder(
        &self,
        user_id: u64,
        channel_id: u64,
        end_time: DateTime<Utc>,
        message: &str,
    ) -> Result<Reminder, SaplingError> {
        let row: ReminderRow = sqlx::query_as(&format!(
            "INSERT INTO reminders (user_id, activity, custom_id, channel_id, end_time, message, triggered) \
             SELECT ?, 'custom', COALESCE(MAX(custom_id), 0) + 1, ?, ?, ?, 0 \
             FROM reminders WHERE user_id = ? AND activity = 'custom' \
             RETURNING {REMINDER_COLUMNS}"
        ))
        .bind(db_id(user_id))
        .bind(db_id(channel_id))
        .bind(end_time.timestamp())
        .bind(message)
        .bind(db_id(user_id))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("insert custom reminder failed: {e}")))?;

        reminder_from_row(row)
    }

    /// The pending reminder for a key. Missing or already-triggered slots are `NotFound`.
    pub async fn get_reminder(
        &self,
        user_id: u64,
        activity: Activity,
    ) -> Result<Reminder, SaplingError> {
        match self.find_reminder(user_id, activity).await? {
            Some(reminder) if !reminder.triggered => Ok(reminder),
            _ => Err(SaplingError::NotFound(format!(
                "no active {activity} reminder for {user_id}"
            ))),
        }
    }

    /// The stored reminder for a key, including one that already fired.
    pub async fn find_reminder(
        &self,
        user_id: u64,
        activity: Activity,
    ) -> Result<Option<Reminder>, SaplingError> {
        let row: Option<ReminderRow> = sqlx::query_as(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE user_id = ? AND activity = ? AND custom_id = 0"
        ))
        .bind(db_id(user_id))
        .bind(activity.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("find reminder failed: {e}")))?;

        row.map(reminder_from_row).transpose()
    }

    /// Delete a reminder slot. Deleting a missing slot is not an error.
    ///
    /// Returns `true` if a row was removed.
    pub async fn delete_reminder(&self, reminder: &Reminder) -> Result<bool, SaplingError> {
        self.delete_reminder_key(reminder.user_id, reminder.activity, reminder.custom_id)
            .await
    }

    pub async fn delete_reminder_key(
        &self,
        user_id: u64,
        activity: Activity,
        custom_id: i64,
    ) -> Result<bool, SaplingError> {
        let result = sqlx::query(
            "DELETE FROM reminders WHERE user_id = ? AND activity = ? AND custom_id = ?",
        )
        .bind(db_id(user_id))
        .bind(activity.as_str())
        .bind(custom_id)
        .execute(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("delete reminder failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending reminders for a user, soonest first, optionally limited to one group.
    pub async fn get_active_reminders(
        &self,
        user_id: u64,
        group: Option<ActivityGroup>,
    ) -> Result<Vec<Reminder>, SaplingError> {
        let rows: Vec<ReminderRow> = sqlx::query_as(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE user_id = ? AND triggered = 0 \
             ORDER BY end_time ASC, activity ASC, custom_id ASC"
        ))
        .bind(db_id(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("get active reminders failed: {e}")))?;

        Ok(rows
            .into_iter()
            .filter_map(decode_or_warn)
            .filter(|r| group.is_none_or(|g| r.activity.group() == g))
            .collect())
    }

    /// Pending reminders whose end time has passed.
    pub async fn get_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reminder>, SaplingError> {
        let rows: Vec<ReminderRow> = sqlx::query_as(&format!(
            "SELECT {REMINDER_COLUMNS} FROM reminders \
             WHERE triggered = 0 AND end_time <= ? \
             ORDER BY end_time ASC"
        ))
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("get due reminders failed: {e}")))?;

        Ok(rows.into_iter().filter_map(decode_or_warn).collect())
    }

    /// Flag a delivered reminder as triggered.
    ///
    /// Matches on the end time that was delivered: if the slot was overwritten in
    /// the meantime the new reminder stays pending. Returns `true` if flagged.
    pub async fn mark_triggered(&self, reminder: &Reminder) -> Result<bool, SaplingError> {
        let result = sqlx::query(
            "UPDATE reminders SET triggered = 1, updated_at = datetime('now') \
             WHERE user_id = ? AND activity = ? AND custom_id = ? AND end_time = ? AND triggered = 0",
        )
        .bind(db_id(reminder.user_id))
        .bind(reminder.activity.as_str())
        .bind(reminder.custom_id)
        .bind(reminder.end_time.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| SaplingError::Memory(format!("mark triggered failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove triggered reminders that ended before `before`. Returns the number removed.
    pub async fn purge_triggered(&self, before: DateTime<Utc>) -> Result<u64, SaplingError> {
        let result = sqlx::query("DELETE FROM reminders WHERE triggered = 1 AND end_time < ?")
            .bind(before.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| SaplingError::Memory(format!("purge triggered failed: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Number of pending reminders across all users.
    pub async fn count_pending_reminders(&self) -> Result<i64, SaplingError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reminders WHERE triggered = 0")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| SaplingError::Memory(format!("count reminders failed: {e}")))?;
        Ok(count)
    }
}

fn reminder_from_row(row: ReminderRow) -> Result<Reminder, SaplingError> {
    let (user_id, activity, custom_id, channel_id, end_time, message, triggered) = row;
    let activity: Activity = activity
        .parse()
        .map_err(|e| SaplingError::Memory(format!("corrupt reminder row: {e}")))?;
    let end_time = DateTime::<Utc>::from_timestamp(end_time, 0)
        .ok_or_else(|| SaplingError::Memory(format!("corrupt reminder end time {end_time}")))?;
    Ok(Reminder {
        user_id: from_db_id(user_id),
        activity,
        custom_id,
        channel_id: from_db_id(channel_id),
        end_time,
        message,
        triggered,
    })
}

fn decode_or_warn(row: ReminderRow) -> Option<Reminder> {
    reminder_from_row(row)
        .map_err(|e| warn!("skipping reminder row: {e}"))
        .ok()
}

//! Reminder scheduler: the single write path for reminders.
//!
//! Classifiers hand over a subject, an activity, and a non-negative duration;
//! the scheduler turns that into an absolute expiry and writes the slot.

use chrono::{DateTime, TimeDelta, Utc};
use sapling_core::{
    activity::{Activity, ActivityGroup, Reminder},
    error::SaplingError,
};
use sapling_memory::{NewReminder, Store};
use tracing::{debug, info};

use crate::timing::truncate_seconds;

/// What to remind about, before timing is applied.
#[derive(Debug, Clone)]
pub struct ReminderRequest {
    pub subject: u64,
    pub activity: Activity,
    pub channel_id: u64,
    pub message: String,
}

#[derive(Clone)]
pub struct ReminderScheduler {
    store: Store,
}

impl ReminderScheduler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Write a reminder expiring `duration` after `now`.
    ///
    /// Non-custom activities overwrite the subject's slot (latest write wins);
    /// custom reminders get a fresh slot each time.
    pub async fn insert(
        &self,
        request: &ReminderRequest,
        duration: TimeDelta,
        now: DateTime<Utc>,
    ) -> Result<Reminder, SaplingError> {
        if duration < TimeDelta::zero() {
            return Err(SaplingError::MalformedMessage(format!(
                "negative duration for {} reminder",
                request.activity
            )));
        }
        let end_time = truncate_seconds(now)
            .checked_add_signed(TimeDelta::seconds(duration.num_seconds()))
            .ok_or_else(|| {
                SaplingError::MalformedMessage(format!(
                    "{} reminder duration out of range",
                    request.activity
                ))
            })?;

        let reminder = if request.activity == Activity::Custom {
            self.store
                .insert_custom_reminder(request.subject, request.channel_id, end_time, &request.message)
                .await?
        } else {
            self.store
                .upsert_reminder(&NewReminder {
                    user_id: request.subject,
                    activity: request.activity,
                    channel_id: request.channel_id,
                    end_time,
                    message: request.message.clone(),
                })
                .await?
        };

        info!(
            "reminder: {} for {} at {}",
            reminder.activity, reminder.user_id, reminder.end_time
        );
        Ok(reminder)
    }

    /// The pending reminder for a key, or `NotFound`.
    pub async fn get(&self, subject: u64, activity: Activity) -> Result<Reminder, SaplingError> {
        self.store.get_reminder(subject, activity).await
    }

    /// The stored reminder for a key, triggered or not.
    pub async fn find(
        &self,
        subject: u64,
        activity: Activity,
    ) -> Result<Option<Reminder>, SaplingError> {
        self.store.find_reminder(subject, activity).await
    }

    /// Delete a reminder slot. Deleting twice is a no-op.
    pub async fn delete(&self, subject: u64, activity: Activity) -> Result<(), SaplingError> {
        if self.store.delete_reminder_key(subject, activity, 0).await? {
            debug!("reminder: deleted {activity} for {subject}");
        }
        Ok(())
    }

    /// Pending reminders for a subject, soonest first.
    pub async fn list_active(
        &self,
        subject: u64,
        group: Option<ActivityGroup>,
    ) -> Result<Vec<Reminder>, SaplingError> {
        self.store.get_active_reminders(subject, group).await
    }
}

/// Fill `{placeholder}` slots in a reminder template and collapse double spaces.
pub fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (key, value) in values {
        rendered = rendered.replace(&format!("{{{key}}}"), value);
    }
    while rendered.contains("  ") {
        rendered = rendered.replace("  ", " ");
    }
    rendered.trim().to_string()
}

/// How a game command is shown inside a reminder.
pub fn command_mention(activity: Activity) -> String {
    format!("`/{}`", activity.command_name())
}

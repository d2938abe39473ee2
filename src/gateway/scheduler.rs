//! Reminder delivery: post due reminders and retire them.

use super::Gateway;
use chrono::{DateTime, TimeDelta, Utc};
use sapling_core::{
    config::SchedulerConfig, error::SaplingError, message::OutgoingMessage, traits::Channel,
};
use sapling_memory::Store;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

impl Gateway {
    /// Background task: deliver due reminders every poll interval.
    pub(super) async fn delivery_loop(
        store: Store,
        channel: Arc<dyn Channel>,
        config: SchedulerConfig,
    ) {
        let retention = TimeDelta::hours(config.triggered_retention_hours);
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(config.poll_interval_secs)).await;

            if let Err(e) = deliver_due(&store, channel.as_ref(), Utc::now(), retention).await {
                error!("scheduler: delivery pass failed: {e}");
            }
        }
    }
}

/// Send every reminder due at `now`, mark it triggered, and purge triggered
/// reminders older than `retention`. Returns how many were delivered.
///
/// A failed send leaves the reminder pending for the next pass. A reminder
/// overwritten while it was being sent stays pending with its new expiry.
pub async fn deliver_due(
    store: &Store,
    channel: &dyn Channel,
    now: DateTime<Utc>,
    retention: TimeDelta,
) -> Result<usize, SaplingError> {
    let due = store.get_due_reminders(now).await?;
    let mut delivered = 0;

    for reminder in &due {
        let text = format!("<@{}> {}", reminder.user_id, reminder.message);
        if let Err(e) = channel
            .send(OutgoingMessage::Send {
                channel_id: reminder.channel_id,
                text,
            })
            .await
        {
            warn!(
                "scheduler: failed to deliver {} for {}: {e}",
                reminder.activity, reminder.user_id
            );
            continue;
        }

        if store.mark_triggered(reminder).await? {
            delivered += 1;
            info!("scheduler: delivered {} for {}", reminder.activity, reminder.user_id);
        } else {
            debug!(
                "scheduler: {} for {} changed during delivery",
                reminder.activity, reminder.user_id
            );
        }
    }

    let purged = store.purge_triggered(now - retention).await?;
    if purged > 0 {
        debug!("scheduler: purged {purged} triggered reminders");
    }
    Ok(delivered)
}

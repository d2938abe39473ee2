//! Daily reward.

use async_trait::async_trait;
use sapling_core::{
    activity::{Activity, ReminderKind},
    error::SaplingError,
    settings::FeatureGates,
};
use tracing::warn;

use super::{Classifier, ClassifyContext, Outcome};
use crate::patterns::{phrase_match, COMMAND_DAILY, DAILY_TITLE};
use crate::reminders::{command_mention, render_template, ReminderRequest};

pub struct DailyClassifier;

#[async_trait]
impl Classifier for DailyClassifier {
    fn name(&self) -> &'static str {
        "daily"
    }

    fn enabled(&self, gates: &FeatureGates) -> bool {
        gates.daily
    }

    /// Creates a reminder when the daily reward is claimed.
    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError> {
        if !phrase_match(&ctx.title_lower(), DAILY_TITLE) {
            return Ok(Outcome::none());
        }

        let subject = match ctx
            .resolve_subject(&COMMAND_DAILY, Some(ctx.fact.author.name.as_str()))
            .await
        {
            Ok(Some(subject)) => subject,
            Ok(None) => return Ok(Outcome::none()),
            Err(SaplingError::NotFound(e)) => {
                warn!(
                    "user not found in daily message {} (channel {}): {e}",
                    ctx.message.id, ctx.message.channel_id
                );
                return Ok(Outcome::warning());
            }
            Err(e) => return Err(e),
        };
        if !subject.allows(ReminderKind::Daily) {
            return Ok(Outcome::none());
        }

        let time_left = ctx
            .services
            .timing
            .from_cooldown(Activity::Daily, &subject.settings, ctx.message.observed_at(), ctx.now)
            .await?;
        if time_left < chrono::TimeDelta::zero() {
            return Ok(Outcome::none());
        }

        let message = render_template(
            subject.settings.reminder_message(ReminderKind::Daily),
            &[("command", &command_mention(Activity::Daily))],
        );
        ctx.services
            .scheduler
            .insert(
                &ReminderRequest {
                    subject: subject.user_id,
                    activity: Activity::Daily,
                    channel_id: ctx.message.channel_id,
                    message,
                },
                time_left,
                ctx.now,
            )
            .await?;

        Ok(Outcome::acknowledged(subject.settings.reactions_enabled))
    }
}

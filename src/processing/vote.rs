//! Vote.

use async_trait::async_trait;
use chrono::TimeDelta;
use sapling_core::{
    activity::{Activity, ReminderKind},
    error::SaplingError,
    settings::FeatureGates,
};
use tracing::{debug, warn};

use super::{Classifier, ClassifyContext, Outcome};
use crate::patterns::{capture, phrase_match, COMMAND_VOTE, VOTE_DESCRIPTION, VOTE_READY_TITLE, VOTE_TIME};
use crate::reminders::{command_mention, render_template, ReminderRequest};

pub struct VoteClassifier;

#[async_trait]
impl Classifier for VoteClassifier {
    fn name(&self) -> &'static str {
        "vote"
    }

    /// Always runs: a ready vote clears the reminder even when vote
    /// reminders are switched off.
    fn enabled(&self, _gates: &FeatureGates) -> bool {
        true
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError> {
        if !phrase_match(&ctx.description_lower(), VOTE_DESCRIPTION) {
            return Ok(Outcome::none());
        }

        let subject = match ctx
            .resolve_subject(&COMMAND_VOTE, Some(ctx.fact.author.name.as_str()))
            .await
        {
            Ok(Some(subject)) => subject,
            Ok(None) => return Ok(Outcome::none()),
            Err(SaplingError::NotFound(e)) => {
                warn!(
                    "user not found in vote message {} (channel {}): {e}",
                    ctx.message.id, ctx.message.channel_id
                );
                return Ok(Outcome::warning());
            }
            Err(e) => return Err(e),
        };

        if phrase_match(&ctx.title_lower(), VOTE_READY_TITLE) {
            debug!("vote ready for {}, clearing reminder", subject.user_id);
            ctx.services.scheduler.delete(subject.user_id, Activity::Vote).await?;
            return Ok(Outcome::none());
        }
        if !subject.allows(ReminderKind::Vote) {
            return Ok(Outcome::none());
        }

        // Countdown in the title, or an absolute timestamp on newer layouts.
        let timing = &ctx.services.timing;
        let time_left = if let Some(timestring) = capture(&VOTE_TIME, &ctx.fact.title) {
            timing.from_countdown(timestring, ctx.message.observed_at(), ctx.now)?
        } else if ctx.fact.title.contains("<t:") {
            timing.from_timestamp(&ctx.fact.title, ctx.now)?
        } else {
            return Err(SaplingError::MalformedMessage(
                "vote countdown not found in vote message".into(),
            ));
        };
        if time_left < TimeDelta::zero() {
            return Ok(Outcome::none());
        }

        let message = render_template(
            subject.settings.reminder_message(ReminderKind::Vote),
            &[("command", &command_mention(Activity::Vote))],
        );
        ctx.services
            .scheduler
            .insert(
                &ReminderRequest {
                    subject: subject.user_id,
                    activity: Activity::Vote,
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

//! Prune: reminder, tracking log, pruner type, and the xp helper.

use async_trait::async_trait;
use chrono::TimeDelta;
use sapling_core::{
    activity::{Activity, ReminderKind},
    error::SaplingError,
    message::{OutgoingMessage, Reaction},
    settings::{FeatureGates, UserSettings, UserUpdate},
};
use sapling_memory::TrackingEntry;
use tracing::{debug, info, warn};

use super::{Classifier, ClassifyContext, Outcome, Subject};
use crate::patterns::{
    capture, phrase_match, COMMAND_PRUNE, GOLDEN_NUGGET, NAME_FROM_MESSAGE_START, PRUNER_TYPE,
    PRUNE_CONTENT, XP_GAIN,
};
use crate::reminders::{command_mention, render_template, ReminderRequest};

pub struct PruneClassifier;

#[async_trait]
impl Classifier for PruneClassifier {
    fn name(&self) -> &'static str {
        "prune"
    }

    /// Runs for tracking alone, even with prune reminders off.
    fn enabled(&self, gates: &FeatureGates) -> bool {
        gates.prune || gates.tracking
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError> {
        let content = ctx.content_lower();
        if !phrase_match(&content, PRUNE_CONTENT) {
            return Ok(Outcome::none());
        }

        let author_name = capture(&NAME_FROM_MESSAGE_START, &ctx.message.content);
        let subject = match ctx.resolve_subject(&COMMAND_PRUNE, author_name).await {
            Ok(Some(subject)) => subject,
            Ok(None) => return Ok(Outcome::none()),
            Err(SaplingError::NotFound(e)) => {
                warn!(
                    "user not found in prune message {} (channel {}): {e}",
                    ctx.message.id, ctx.message.channel_id
                );
                return Ok(Outcome::warning());
            }
            Err(e) => return Err(e),
        };
        let Subject {
            user_id,
            mut settings,
        } = subject;
        if !settings.bot_enabled {
            return Ok(Outcome::none());
        }

        if settings.tracking_enabled {
            ctx.services
                .tracking
                .log(&TrackingEntry {
                    user_id,
                    guild_id: ctx.message.guild_id,
                    activity: Activity::Prune,
                    logged_at: ctx.now,
                })
                .await?;
        }
        if !settings.reminder_enabled(ReminderKind::Prune) {
            return Ok(Outcome::none());
        }

        if let Some(pruner) = capture(&PRUNER_TYPE, &content) {
            if pruner != settings.pruner_type {
                settings = ctx
                    .services
                    .store
                    .update_user(
                        user_id,
                        &UserUpdate {
                            pruner_type: Some(pruner.to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        } else {
            debug!("no pruner type in prune message {}", ctx.message.id);
        }

        let time_left = ctx
            .services
            .timing
            .from_cooldown(Activity::Prune, &settings, ctx.message.observed_at(), ctx.now)
            .await?;
        if time_left < TimeDelta::zero() {
            return Ok(Outcome::none());
        }

        let message = render_template(
            settings.reminder_message(ReminderKind::Prune),
            &[
                ("command", &command_mention(Activity::Prune)),
                ("pruner_emoji", pruner_emoji(&settings.pruner_type)),
            ],
        );
        ctx.services
            .scheduler
            .insert(
                &ReminderRequest {
                    subject: user_id,
                    activity: Activity::Prune,
                    channel_id: ctx.message.channel_id,
                    message,
                },
                time_left,
                ctx.now,
            )
            .await?;

        let mut outcome = Outcome::acknowledged(settings.reactions_enabled);
        if settings.reactions_enabled && phrase_match(&content, GOLDEN_NUGGET) {
            outcome.outgoing.push(OutgoingMessage::React {
                channel_id: ctx.message.channel_id,
                message_id: ctx.message.id,
                reaction: Reaction::Celebrate,
            });
        }

        if settings.helper_prune_enabled && settings.level > 0 && settings.xp_target > 0 {
            match xp_gain(&content) {
                Some(gain) => {
                    if let Some(notice) = xp_helper(ctx, user_id, gain).await? {
                        outcome.outgoing.push(notice);
                    }
                }
                None => {
                    warn!(
                        "xp gain not found in prune message {} (channel {})",
                        ctx.message.id, ctx.message.channel_id
                    );
                    outcome.warning = true;
                }
            }
        }
        Ok(outcome)
    }
}

fn pruner_emoji(pruner_type: &str) -> &'static str {
    match pruner_type {
        "wooden" => "\u{1fab5}",
        "copper" => "\u{1f7e0}",
        "iron" => "\u{1f529}",
        "diamond" => "\u{1f48e}",
        _ => "",
    }
}

fn xp_gain(content_lower: &str) -> Option<i64> {
    capture(&XP_GAIN, content_lower).and_then(|gain| gain.replace(',', "").parse().ok())
}

/// Fold the prune's xp into the user's progress. Returns the projection
/// notice, or `None` on level-up.
async fn xp_helper(
    ctx: &ClassifyContext<'_>,
    user_id: u64,
    gain: i64,
) -> Result<Option<OutgoingMessage>, SaplingError> {
    let settings = ctx.services.store.record_xp_gain(user_id, gain).await?;
    let xp_left = settings.xp_target - settings.xp;
    if xp_left < 0 {
        let next_level = settings.level + 1;
        ctx.services
            .store
            .update_user(
                user_id,
                &UserUpdate {
                    xp_gain_average: Some(0.0),
                    xp: Some((settings.xp - settings.xp_target).max(0)),
                    xp_prune_count: Some(0),
                    xp_target: Some(next_level.pow(3) * 150),
                    level: Some(next_level),
                    ..Default::default()
                },
            )
            .await?;
        info!("prune helper: {user_id} reached level {next_level}");
        return Ok(None);
    }

    Ok(Some(OutgoingMessage::Send {
        channel_id: ctx.message.channel_id,
        text: projection(&settings, xp_left),
    }))
}

fn projection(settings: &UserSettings, xp_left: i64) -> String {
    let level_target = if settings.rebirth <= 10 {
        5 + settings.rebirth
    } else {
        15 + (settings.rebirth - 10) / 2
    };
    let average = settings.xp_gain_average.floor() as i64;
    let prunes = if average > 0 {
        thousands((xp_left + average - 1) / average)
    } else {
        "N/A".to_string()
    };
    format!(
        "**{}** xp until level **{}** (~**{prunes}** prunes at **{}** xp average)\n\
         Rebirth {} | Level {}/{level_target}",
        thousands(xp_left),
        settings.level + 1,
        thousands(average),
        settings.rebirth,
        settings.level,
    )
}

fn thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}

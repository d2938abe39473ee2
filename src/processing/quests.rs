//! Quests: the overview with no quest running, and an active quest.

use async_trait::async_trait;
use chrono::TimeDelta;
use sapling_core::{
    activity::{Activity, QuestKind, ReminderKind},
    error::SaplingError,
    settings::FeatureGates,
};
use tracing::{debug, warn};

use super::{Classifier, ClassifyContext, Outcome, Subject};
use crate::patterns::{
    capture, phrase_match, COMMAND_QUESTS, NAME_FROM_POSSESSIVE, QUESTS_ACTIVE_AUTHOR,
    QUESTS_OVERVIEW_TITLE, QUEST_BUTTON_TIME, QUEST_TYPE,
};
use crate::reminders::{command_mention, render_template, ReminderRequest};
use crate::timing::{parse_countdown, parse_timestamp};

/// Overview buttons: position in the first component row → quest kind.
const OVERVIEW_BUTTONS: [(usize, QuestKind); 3] = [
    (1, QuestKind::Daily),
    (2, QuestKind::Weekly),
    (3, QuestKind::Monthly),
];

pub struct QuestsClassifier;

#[async_trait]
impl Classifier for QuestsClassifier {
    fn name(&self) -> &'static str {
        "quests"
    }

    fn enabled(&self, gates: &FeatureGates) -> bool {
        gates.quests
    }

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError> {
        let overview = on_overview(ctx).await?;
        let active = when_active(ctx).await?;
        Ok(Outcome {
            acknowledge: overview.acknowledge || active.acknowledge,
            warning: overview.warning || active.warning,
            outgoing: Vec::new(),
        })
    }
}

async fn quest_subject(
    ctx: &ClassifyContext<'_>,
    author_name: Option<&str>,
) -> Result<Option<Subject>, SaplingError> {
    let subject = ctx.resolve_subject(&COMMAND_QUESTS, author_name).await?;
    Ok(subject.filter(|subject| subject.allows(ReminderKind::Quests)))
}

fn quest_request(ctx: &ClassifyContext<'_>, subject: &Subject, kind: QuestKind) -> ReminderRequest {
    let activity = Activity::Quest(kind);
    ReminderRequest {
        subject: subject.user_id,
        activity,
        channel_id: ctx.message.channel_id,
        message: render_template(
            subject.settings.reminder_message(ReminderKind::Quests),
            &[
                ("command", &command_mention(activity)),
                ("quest_type", kind.as_str()),
            ],
        ),
    }
}

/// Overview with no quest active: each quest button shows the time until
/// that quest kind can be started again.
async fn on_overview(ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError> {
    if !phrase_match(&ctx.title_lower(), QUESTS_OVERVIEW_TITLE) {
        return Ok(Outcome::none());
    }
    let Some(subject) = quest_subject(ctx, Some(ctx.fact.author.name.as_str())).await? else {
        return Ok(Outcome::none());
    };

    let Some(row) = ctx.message.components.first() else {
        debug!("quest overview {} has no buttons", ctx.message.id);
        return Ok(Outcome::none());
    };

    // Read every countdown first so one unreadable button writes nothing.
    let mut cooldowns = Vec::new();
    for (index, kind) in OVERVIEW_BUTTONS {
        let Some(label) = row.get(index).and_then(|button| button.label.as_deref()) else {
            continue;
        };
        let label = label.to_lowercase();
        let Some(timestring) = capture(&QUEST_BUTTON_TIME, &label) else {
            continue;
        };
        cooldowns.push((kind, parse_countdown(timestring)?));
    }

    let mut inserted = false;
    for (kind, time_left) in cooldowns {
        ctx.services
            .scheduler
            .insert(&quest_request(ctx, &subject, kind), time_left, ctx.now)
            .await?;
        inserted = true;
    }
    Ok(Outcome::acknowledged(
        inserted && subject.settings.reactions_enabled,
    ))
}

/// A running quest: the reminder fires one quest cooldown after it started.
async fn when_active(ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError> {
    if !phrase_match(&ctx.author_lower(), QUESTS_ACTIVE_AUTHOR) {
        return Ok(Outcome::none());
    }
    let author_name = capture(&NAME_FROM_POSSESSIVE, &ctx.fact.author.name);
    let Some(subject) = quest_subject(ctx, author_name).await? else {
        return Ok(Outcome::none());
    };

    let description = ctx.description_lower();
    let Some(kind) = capture(&QUEST_TYPE, &description).and_then(QuestKind::parse) else {
        warn!(
            "quest type not found in quest message {} (channel {})",
            ctx.message.id, ctx.message.channel_id
        );
        return Err(SaplingError::MalformedMessage(
            "quest type not found in quest message".into(),
        ));
    };

    // Any field may carry the start, not only the first two.
    let started = ctx
        .fact
        .fields
        .iter()
        .find(|field| field.value.contains("<t:"))
        .and_then(|field| parse_timestamp(&field.value));
    let Some(started) = started else {
        warn!(
            "quest start not found in quest message {} (channel {})",
            ctx.message.id, ctx.message.channel_id
        );
        return Err(SaplingError::MalformedMessage(
            "quest start time not found in active quest message".into(),
        ));
    };

    let activity = Activity::Quest(kind);
    let time_left = ctx
        .services
        .timing
        .from_start(activity, &subject.settings, started, ctx.now)
        .await?;
    if time_left < TimeDelta::zero() {
        return Ok(Outcome::none());
    }

    ctx.services
        .scheduler
        .insert(&quest_request(ctx, &subject, kind), time_left, ctx.now)
        .await?;
    Ok(Outcome::acknowledged(subject.settings.reactions_enabled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::testing::*;
    use sapling_core::message::{Component, Embed};

    fn button(label: &str) -> Component {
        Component {
            label: Some(label.to_string()),
            disabled: false,
        }
    }

    fn overview(fx: &Fixture, labels: &[&str]) -> sapling_core::message::IncomingMessage {
        let mut message = fx.embed_message(Embed {
            author: author("alice", ""),
            title: Some("Available Quests".to_string()),
            ..Default::default()
        });
        message.components = vec![labels.iter().map(|label| button(label)).collect()];
        message
    }

    fn active(fx: &Fixture, description: &str, start_field: &str) -> sapling_core::message::IncomingMessage {
        fx.embed_message(Embed {
            author: author("alice's quest", ""),
            description: Some(description.to_string()),
            fields: vec![field("Progress", "3/10"), field("Started", start_field)],
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_overview_creates_three_quest_reminders() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(
            overview(&fx, &["Start", "Daily | 3h 2m", "Weekly | 1d 4h", "Monthly | 6d"]),
            1,
        );

        let outcome = fx
            .classify(&QuestsClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        assert!(outcome.acknowledge);

        let scheduler = &fx.services.scheduler;
        let daily = scheduler.get(1, Activity::Quest(QuestKind::Daily)).await.unwrap();
        let weekly = scheduler.get(1, Activity::Quest(QuestKind::Weekly)).await.unwrap();
        let monthly = scheduler.get(1, Activity::Quest(QuestKind::Monthly)).await.unwrap();
        assert_eq!(daily.end_time, fx.now + TimeDelta::minutes(3 * 60 + 2));
        assert_eq!(weekly.end_time, fx.now + TimeDelta::hours(28));
        assert_eq!(monthly.end_time, fx.now + TimeDelta::days(6));
        assert_eq!(weekly.message, "Your weekly quest is ready! `/quests`");
        assert_eq!(scheduler.list_active(1, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_overview_skips_buttons_without_countdown() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(
            overview(&fx, &["Start", "Daily", "Weekly | 2h", "Monthly"]),
            1,
        );

        fx.classify(&QuestsClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        let active = fx.services.scheduler.list_active(1, None).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].activity, Activity::Quest(QuestKind::Weekly));
    }

    #[tokio::test]
    async fn test_overview_with_unreadable_countdown_writes_nothing() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(
            overview(&fx, &["Start", "Daily | 3h", "Weekly | soon", "Monthly | 6d"]),
            1,
        );

        let err = fx
            .classify(&QuestsClassifier, &message, Some(&settings), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SaplingError::MalformedMessage(_)));
        assert!(fx.services.scheduler.list_active(1, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overview_respects_disabled_quest_reminders() {
        let fx = Fixture::new().await;
        fx.register(1).await;
        fx.services
            .store
            .set_reminder_setting(
                1,
                ReminderKind::Quests,
                &sapling_core::settings::ReminderSetting {
                    enabled: false,
                    message: String::new(),
                },
            )
            .await
            .unwrap();
        let settings = fx.services.store.get_user(1).await.unwrap();
        let message = interacted(overview(&fx, &["Start", "Daily | 3h"]), 1);

        let outcome = fx
            .classify(&QuestsClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::none());
        assert!(fx.services.scheduler.list_active(1, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_quest_from_start_timestamp() {
        let fx = Fixture::new().await;
        fx.register(1).await;
        fx.command(1, "alice", "tree quests").await;
        let started = fx.now - TimeDelta::days(2);
        let message = active(
            &fx,
            "> Weekly quest: water 10 trees",
            &format!("<t:{}:d>", started.timestamp()),
        );

        let outcome = fx
            .classify(&QuestsClassifier, &message, None, None)
            .await
            .unwrap();
        assert!(outcome.acknowledge);
        let reminder = fx
            .services
            .scheduler
            .get(1, Activity::Quest(QuestKind::Weekly))
            .await
            .unwrap();
        assert_eq!(reminder.end_time, started + TimeDelta::days(7));
    }

    #[tokio::test]
    async fn test_active_quest_start_found_in_a_later_field() {
        let fx = Fixture::new().await;
        fx.register(1).await;
        fx.command(1, "alice", "tree quests").await;
        let started = fx.now - TimeDelta::hours(5);
        let message = fx.embed_message(Embed {
            author: author("alice's quest", ""),
            description: Some("> Daily quest: prune 3 times".to_string()),
            fields: vec![
                field("Progress", "1/3"),
                field("Rewards", "50 xp"),
                field("Tip", "prune often"),
                field("Started", &format!("<t:{}:R>", started.timestamp())),
            ],
            ..Default::default()
        });

        fx.classify(&QuestsClassifier, &message, None, None)
            .await
            .unwrap();
        let reminder = fx
            .services
            .scheduler
            .get(1, Activity::Quest(QuestKind::Daily))
            .await
            .unwrap();
        assert_eq!(reminder.end_time, started + TimeDelta::days(1));
    }

    #[tokio::test]
    async fn test_active_quest_without_type_is_malformed() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(active(&fx, "water 10 trees", "<t:1799990000:d>"), 1);

        let err = fx
            .classify(&QuestsClassifier, &message, Some(&settings), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SaplingError::MalformedMessage(_)));
    }

    #[tokio::test]
    async fn test_active_quest_without_start_is_malformed() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(active(&fx, "> Daily quest", "yesterday"), 1);

        let err = fx
            .classify(&QuestsClassifier, &message, Some(&settings), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SaplingError::MalformedMessage(_)));
    }

    #[tokio::test]
    async fn test_finished_active_quest_is_stale() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let started = fx.now - TimeDelta::days(2);
        let message = interacted(
            active(&fx, "> Daily quest", &format!("<t:{}:d>", started.timestamp())),
            1,
        );

        let outcome = fx
            .classify(&QuestsClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::none());
        assert!(fx.services.scheduler.list_active(1, None).await.unwrap().is_empty());
    }
}

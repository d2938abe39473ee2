//! Boosts listed in the bonuses overview.

use async_trait::async_trait;
use chrono::TimeDelta;
use sapling_core::{
    activity::{Activity, BoostKind, ReminderKind},
    error::SaplingError,
    settings::{FeatureGates, UserUpdate},
};
use tracing::warn;

use super::{Classifier, ClassifyContext, Outcome};
use crate::patterns::{capture, phrase_match, BONUSES_TITLE, BOOST_TIME, COMMAND_BONUSES};
use crate::reminders::{render_template, ReminderRequest};

pub struct BonusesClassifier;

#[async_trait]
impl Classifier for BonusesClassifier {
    fn name(&self) -> &'static str {
        "bonuses"
    }

    fn enabled(&self, gates: &FeatureGates) -> bool {
        gates.boosts
    }

    /// Running boosts get a reminder; boosts shown without a countdown lose theirs.
    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError> {
        if !phrase_match(&ctx.title_lower(), BONUSES_TITLE) {
            return Ok(Outcome::none());
        }
        let Some(subject) = ctx
            .resolve_subject(&COMMAND_BONUSES, Some(ctx.fact.author.name.as_str()))
            .await?
        else {
            return Ok(Outcome::none());
        };
        if !subject.allows(ReminderKind::Boosts) {
            return Ok(Outcome::none());
        }

        let mut lines = format!("{}\n{}", ctx.fact.field(1).value, ctx.fact.field(2).value);
        if lines.trim().is_empty() {
            lines = ctx.fact.description.clone();
        }

        let mut cooldowns = Vec::new();
        let mut ready = Vec::new();
        for line in lines.lines() {
            let line = line.to_lowercase();
            let Some(boost) = BoostKind::ALL
                .into_iter()
                .find(|boost| line.contains(boost.display_name()))
            else {
                continue;
            };
            match capture(&BOOST_TIME, &line) {
                Some(timestring) => {
                    let time_left = ctx.services.timing.from_countdown(
                        timestring,
                        ctx.message.observed_at(),
                        ctx.now,
                    )?;
                    cooldowns.push((boost, time_left));
                }
                None => ready.push(boost),
            }
        }

        let mut inserted = false;
        for (boost, time_left) in cooldowns {
            if time_left < TimeDelta::zero() {
                continue;
            }
            let activity = Activity::Boost(boost);
            if boost == BoostKind::SweetApple {
                let previous = ctx.services.scheduler.find(subject.user_id, activity).await?;
                if previous.is_none_or(|reminder| reminder.triggered) {
                    ctx.services
                        .store
                        .update_user(
                            subject.user_id,
                            &UserUpdate {
                                xp_gain_average: Some(0.0),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
            }

            let message = render_template(
                subject.settings.reminder_message(ReminderKind::Boosts),
                &[
                    ("boost_emoji", boost.emoji()),
                    ("boost_name", boost.display_name()),
                ],
            );
            ctx.services
                .scheduler
                .insert(
                    &ReminderRequest {
                        subject: subject.user_id,
                        activity,
                        channel_id: ctx.message.channel_id,
                        message,
                    },
                    time_left,
                    ctx.now,
                )
                .await?;
            inserted = true;
        }

        let mut warning = false;
        for boost in ready {
            if let Err(e) = ctx
                .services
                .scheduler
                .delete(subject.user_id, Activity::Boost(boost))
                .await
            {
                warn!(
                    "failed to clear {} reminder from bonuses message {} (channel {}): {e}",
                    boost.as_str(),
                    ctx.message.id,
                    ctx.message.channel_id
                );
                warning = true;
            }
        }

        Ok(Outcome {
            acknowledge: inserted && subject.settings.reactions_enabled,
            warning,
            outgoing: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::testing::*;
    use crate::processing::EmbedUser;
    use sapling_core::message::{Embed, IncomingMessage};

    fn bonuses(fx: &Fixture, active: &str, passive: &str) -> IncomingMessage {
        fx.embed_message(Embed {
            author: author("alice", ""),
            title: Some("Buffs, bonuses and reductions".to_string()),
            fields: vec![
                field("Stats", "Level 10"),
                field("Boosts", active),
                field("Reductions", passive),
            ],
            ..Default::default()
        })
    }

    async fn seed_average(fx: &Fixture) {
        fx.update(
            1,
            UserUpdate {
                xp_gain_average: Some(950.0),
                ..Default::default()
            },
        )
        .await;
    }

    #[tokio::test]
    async fn test_sweet_apple_countdown_creates_reminder() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(
            bonuses(&fx, "\u{1f34e} Sweet apple: ends in **2h 15m**", ""),
            1,
        );

        let outcome = fx
            .classify(&BonusesClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        assert!(outcome.acknowledge);
        let reminder = fx
            .services
            .scheduler
            .get(1, Activity::Boost(BoostKind::SweetApple))
            .await
            .unwrap();
        assert_eq!(reminder.end_time, fx.now + TimeDelta::minutes(135));
        assert!(reminder.message.contains("**sweet apple**"));
    }

    #[tokio::test]
    async fn test_sweet_apple_after_triggered_reminder_resets_average() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(
            bonuses(&fx, "Sweet apple: ends in **2h 15m**", ""),
            1,
        );
        fx.classify(&BonusesClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        let previous = fx
            .services
            .scheduler
            .get(1, Activity::Boost(BoostKind::SweetApple))
            .await
            .unwrap();
        assert!(fx.services.store.mark_triggered(&previous).await.unwrap());
        seed_average(&fx).await;

        fx.classify(&BonusesClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        assert_eq!(fx.services.store.get_user(1).await.unwrap().xp_gain_average, 0.0);
        let reminder = fx
            .services
            .scheduler
            .get(1, Activity::Boost(BoostKind::SweetApple))
            .await
            .unwrap();
        assert!(!reminder.triggered);
    }

    #[tokio::test]
    async fn test_sweet_apple_with_pending_reminder_keeps_average() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(
            bonuses(&fx, "Sweet apple: ends in **2h 15m**", ""),
            1,
        );
        fx.classify(&BonusesClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        seed_average(&fx).await;

        fx.classify(&BonusesClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        assert_eq!(fx.services.store.get_user(1).await.unwrap().xp_gain_average, 950.0);
    }

    #[tokio::test]
    async fn test_boost_without_countdown_clears_reminder() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let running = interacted(
            bonuses(&fx, "Apple juice: ends in **40m**", "Fertilizer: ends in **3h**"),
            1,
        );
        fx.classify(&BonusesClassifier, &running, Some(&settings), None)
            .await
            .unwrap();

        let finished = interacted(
            bonuses(&fx, "Apple juice: ends in **39m**", "Fertilizer: inactive"),
            1,
        );
        let outcome = fx
            .classify(&BonusesClassifier, &finished, Some(&settings), None)
            .await
            .unwrap();
        assert!(outcome.acknowledge);
        assert!(!outcome.warning);
        let scheduler = &fx.services.scheduler;
        assert!(scheduler.get(1, Activity::Boost(BoostKind::AppleJuice)).await.is_ok());
        assert!(scheduler
            .find(1, Activity::Boost(BoostKind::Fertilizer))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_description_fallback() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let mut message = interacted(
            fx.embed_message(Embed {
                author: author("alice", ""),
                title: Some("Buffs, bonuses and reductions".to_string()),
                description: Some("Golden apple: ends in **1h**".to_string()),
                ..Default::default()
            }),
            1,
        );
        message.created_at = fx.now - TimeDelta::minutes(10);

        fx.classify(&BonusesClassifier, &message, Some(&settings), None)
            .await
            .unwrap();
        let reminder = fx
            .services
            .scheduler
            .get(1, Activity::Boost(BoostKind::GoldenApple))
            .await
            .unwrap();
        assert_eq!(reminder.end_time, fx.now + TimeDelta::minutes(50));
    }

    #[tokio::test]
    async fn test_unreadable_countdown_writes_nothing() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        let message = interacted(
            bonuses(&fx, "Apple juice: ends in **40m**", "Fertilizer: ends in **a while**"),
            1,
        );

        let err = fx
            .classify(&BonusesClassifier, &message, Some(&settings), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SaplingError::MalformedMessage(_)));
        assert!(fx.services.scheduler.list_active(1, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_other_users_bonuses_are_ignored() {
        let fx = Fixture::new().await;
        let settings = fx.register(1).await;
        fx.register(2).await;
        let embed_user = EmbedUser {
            user_id: 2,
            settings: None,
        };
        let message = interacted(
            bonuses(&fx, "Sweet apple: ends in **2h 15m**", ""),
            1,
        );

        let outcome = fx
            .classify(&BonusesClassifier, &message, Some(&settings), Some(&embed_user))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::none());
        assert!(fx.services.scheduler.list_active(1, None).await.unwrap().is_empty());
        assert!(fx.services.scheduler.list_active(2, None).await.unwrap().is_empty());
    }
}

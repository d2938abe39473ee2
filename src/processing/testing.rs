//! Shared fixtures for classifier and dispatcher tests.

use chrono::{DateTime, TimeDelta, Utc};
use sapling_core::{
    config::CooldownConfig,
    error::SaplingError,
    message::{Embed, EmbedAuthor, EmbedField, IncomingMessage, InteractionRef},
    settings::{UserSettings, UserUpdate},
};
use sapling_memory::{RecentMessage, RecentMessageIndex, Store, TrackingLog};
use std::sync::Arc;

use super::{Classifier, ClassifyContext, EmbedUser, Outcome, Services};
use crate::fact::normalize;
use crate::reminders::ReminderScheduler;
use crate::timing::TimeResolver;

pub const GAME_BOT: u64 = 555;
pub const CHANNEL: u64 = 100;
pub const GUILD: u64 = 200;

pub fn at(epoch: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(epoch, 0).unwrap()
}

pub async fn services() -> Services {
    let store = Store::in_memory().await.unwrap();
    Services {
        recent: Arc::new(RecentMessageIndex::new(TimeDelta::seconds(120), 100)),
        scheduler: ReminderScheduler::new(store.clone()),
        timing: TimeResolver::new(store.clone(), CooldownConfig::default()),
        tracking: TrackingLog::new(store.pool().clone()),
        store,
    }
}

pub struct Fixture {
    pub services: Services,
    pub now: DateTime<Utc>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self {
            services: services().await,
            now: at(1_800_000_000),
        }
    }

    pub async fn register(&self, user_id: u64) -> UserSettings {
        self.services.store.create_user(user_id).await.unwrap()
    }

    pub async fn update(&self, user_id: u64, update: UserUpdate) -> UserSettings {
        self.services.store.update_user(user_id, &update).await.unwrap()
    }

    /// Record a human command in the recent-message index.
    pub async fn command(&self, user_id: u64, name: &str, content: &str) {
        self.services
            .recent
            .record(
                RecentMessage {
                    message_id: user_id * 10,
                    channel_id: CHANNEL,
                    author_id: user_id,
                    author_name: name.to_string(),
                    content: content.to_string(),
                    created_at: self.now - TimeDelta::seconds(2),
                },
                self.now,
            )
            .await;
    }

    /// Run one classifier the way the dispatcher would.
    pub async fn classify(
        &self,
        classifier: &dyn Classifier,
        message: &IncomingMessage,
        settings: Option<&UserSettings>,
        embed_user: Option<&EmbedUser>,
    ) -> Result<Outcome, SaplingError> {
        let fact = normalize(message);
        let ctx = ClassifyContext {
            message,
            fact: &fact,
            interaction_user: message.interaction.as_ref().map(|i| i.user_id),
            settings,
            embed_user,
            now: self.now,
            services: &self.services,
        };
        classifier.classify(&ctx).await
    }

    pub fn message(&self) -> IncomingMessage {
        IncomingMessage {
            id: 9001,
            author_id: GAME_BOT,
            author_name: "Tree".to_string(),
            channel_id: CHANNEL,
            guild_id: GUILD,
            created_at: self.now,
            ..Default::default()
        }
    }

    pub fn embed_message(&self, embed: Embed) -> IncomingMessage {
        IncomingMessage {
            embeds: vec![embed],
            ..self.message()
        }
    }
}

/// Mark a message as the answer to `user_id`'s slash command.
pub fn interacted(mut message: IncomingMessage, user_id: u64) -> IncomingMessage {
    message.interaction = Some(InteractionRef {
        user_id,
        user_name: format!("user{user_id}"),
    });
    message
}

pub fn author(name: &str, icon_url: &str) -> Option<EmbedAuthor> {
    Some(EmbedAuthor {
        name: Some(name.to_string()),
        icon_url: Some(icon_url.to_string()),
    })
}

pub fn avatar(user_id: u64) -> String {
    format!("https://cdn.discordapp.com/avatars/{user_id}/abcdef.png")
}

pub fn field(name: &str, value: &str) -> EmbedField {
    EmbedField {
        name: name.to_string(),
        value: value.to_string(),
    }
}

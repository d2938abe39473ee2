//! Activity classifiers.
//!
//! Each classifier looks at one normalized message and decides whether it is
//! an occurrence of its activity. Classifiers share nothing but the read-only
//! [`ClassifyContext`] and the collaborators in [`Services`].

mod bonuses;
mod daily;
mod prune;
mod quests;
mod vote;

pub use bonuses::BonusesClassifier;
pub use daily::DailyClassifier;
pub use prune::PruneClassifier;
pub use quests::QuestsClassifier;
pub use vote::VoteClassifier;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use sapling_core::{
    activity::ReminderKind,
    error::SaplingError,
    message::{IncomingMessage, OutgoingMessage},
    settings::{FeatureGates, UserSettings},
};
use sapling_memory::{RecentMessageIndex, Store, TrackingLog};
use std::sync::Arc;
use tracing::debug;

use crate::fact::NormalizedFact;
use crate::reminders::ReminderScheduler;
use crate::timing::TimeResolver;

/// Collaborators every classifier may consult.
#[derive(Clone)]
pub struct Services {
    pub store: Store,
    pub recent: Arc<RecentMessageIndex>,
    pub scheduler: ReminderScheduler,
    pub timing: TimeResolver,
    pub tracking: TrackingLog,
}

/// The user an embed identifies through its author icon.
#[derive(Debug, Clone)]
pub struct EmbedUser {
    pub user_id: u64,
    /// `None` when the user is unregistered, or was deliberately not looked up.
    pub settings: Option<UserSettings>,
}

/// Everything a classifier reads for one message.
pub struct ClassifyContext<'a> {
    pub message: &'a IncomingMessage,
    pub fact: &'a NormalizedFact,
    pub interaction_user: Option<u64>,
    /// Settings of the interaction user, when there is one.
    pub settings: Option<&'a UserSettings>,
    pub embed_user: Option<&'a EmbedUser>,
    /// Evaluation instant, whole seconds.
    pub now: DateTime<Utc>,
    pub services: &'a Services,
}

/// A classifier's contribution to one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// A reminder was written and the subject wants reactions.
    pub acknowledge: bool,
    /// Something was recognized but could not be handled.
    pub warning: bool,
    pub outgoing: Vec<OutgoingMessage>,
}

impl Outcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn acknowledged(acknowledge: bool) -> Self {
        Self {
            acknowledge,
            ..Self::default()
        }
    }

    pub fn warning() -> Self {
        Self {
            warning: true,
            ..Self::default()
        }
    }
}

/// The user an occurrence is about, with their settings.
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: u64,
    pub settings: UserSettings,
}

impl Subject {
    /// Bot enabled and the reminder kind switched on.
    pub fn allows(&self, kind: ReminderKind) -> bool {
        self.settings.bot_enabled && self.settings.reminder_enabled(kind)
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the dispatcher should run this classifier under these gates.
    fn enabled(&self, gates: &FeatureGates) -> bool;

    async fn classify(&self, ctx: &ClassifyContext<'_>) -> Result<Outcome, SaplingError>;
}

/// The classifiers shipped with the engine.
pub fn default_classifiers() -> Vec<Box<dyn Classifier>> {
    vec![
        Box::new(BonusesClassifier),
        Box::new(DailyClassifier),
        Box::new(PruneClassifier),
        Box::new(QuestsClassifier),
        Box::new(VoteClassifier),
    ]
}

impl ClassifyContext<'_> {
    /// Work out who an occurrence is about.
    ///
    /// Uses the interaction user, then the embed user, then the newest
    /// matching command in the recent-message index (optionally by display
    /// name). Returns `Ok(None)` when a known interaction user and the embed
    /// user disagree. Index misses are `NotFound`, unknown users `NotRegistered`.
    pub async fn resolve_subject(
        &self,
        command: &Regex,
        author_name: Option<&str>,
    ) -> Result<Option<Subject>, SaplingError> {
        if let (Some(interaction), Some(embed)) = (self.interaction_user, self.embed_user) {
            if embed.user_id != interaction {
                debug!(
                    "subject mismatch in message {}: interaction {interaction}, embed {}",
                    self.message.id, embed.user_id
                );
                return Ok(None);
            }
        }

        if let Some(user_id) = self.interaction_user {
            return self.with_settings(user_id, self.settings.cloned()).await.map(Some);
        }
        if let Some(embed) = self.embed_user {
            return match &embed.settings {
                Some(settings) => Ok(Some(Subject {
                    user_id: embed.user_id,
                    settings: settings.clone(),
                })),
                None => Err(SaplingError::NotRegistered(embed.user_id)),
            };
        }

        let author_name = author_name.map(str::trim).filter(|name| !name.is_empty());
        let found = self
            .services
            .recent
            .find(self.message.channel_id, command, author_name, self.now)
            .await?;
        self.with_settings(found.author_id, None).await.map(Some)
    }

    async fn with_settings(
        &self,
        user_id: u64,
        known: Option<UserSettings>,
    ) -> Result<Subject, SaplingError> {
        let settings = match known {
            Some(settings) => settings,
            None => self.services.store.get_user(user_id).await?,
        };
        Ok(Subject { user_id, settings })
    }

    pub fn title_lower(&self) -> String {
        self.fact.title.to_lowercase()
    }

    pub fn description_lower(&self) -> String {
        self.fact.description.to_lowercase()
    }

    pub fn author_lower(&self) -> String {
        self.fact.author.name.to_lowercase()
    }

    pub fn content_lower(&self) -> String {
        self.message.content.to_lowercase()
    }
}

#[cfg(test)]
pub(crate) mod testing;

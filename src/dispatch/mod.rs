//! Dispatcher: routes one observed message through the classifiers.
//!
//! The dispatcher holds its collaborators explicitly. Concurrent calls for
//! different messages share only the recent-message index and storage.

use chrono::{DateTime, Utc};
use sapling_core::{
    config::GameConfig,
    error::SaplingError,
    message::{IncomingMessage, MessageEvent, OutgoingMessage, Reaction},
    settings::{FeatureGates, UserSettings},
};
use sapling_memory::RecentMessage;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::fact::normalize;
use crate::patterns::user_id_from_icon;
use crate::processing::{Classifier, ClassifyContext, EmbedUser, Outcome, Services};
use crate::timing::truncate_seconds;

/// What one dispatch decided. The caller turns it into platform actions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub message_id: u64,
    pub channel_id: u64,
    /// At least one classifier wrote a reminder for a user who wants reactions.
    pub acknowledged: bool,
    /// At least one classifier recognized the message but could not finish.
    pub warned: bool,
    /// Extra actions requested by classifiers.
    pub outgoing: Vec<OutgoingMessage>,
}

impl DispatchReport {
    fn for_message(message: &IncomingMessage) -> Self {
        Self {
            message_id: message.id,
            channel_id: message.channel_id,
            ..Self::default()
        }
    }

    fn merge(&mut self, outcome: Outcome) {
        self.acknowledged |= outcome.acknowledge;
        self.warned |= outcome.warning;
        self.outgoing.extend(outcome.outgoing);
    }

    /// Every platform action for this message, the single aggregated
    /// acknowledgement and warning reactions included.
    pub fn actions(&self) -> Vec<OutgoingMessage> {
        let mut actions = self.outgoing.clone();
        for (flag, reaction) in [
            (self.acknowledged, Reaction::Logo),
            (self.warned, Reaction::Warning),
        ] {
            if flag {
                actions.push(OutgoingMessage::React {
                    channel_id: self.channel_id,
                    message_id: self.message_id,
                    reaction,
                });
            }
        }
        actions
    }

    pub fn is_empty(&self) -> bool {
        !self.acknowledged && !self.warned && self.outgoing.is_empty()
    }
}

/// Whether an edit should be processed like a new message.
///
/// Pin toggles are ignored, as are edits that resolved an interactive prompt
/// by removing or disabling its components.
pub fn should_reprocess(before: &IncomingMessage, after: &IncomingMessage) -> bool {
    if before.pinned != after.pinned {
        return false;
    }
    if before.has_components() && !after.has_components() {
        return false;
    }
    after.has_active_components()
}

pub struct Dispatcher {
    game: GameConfig,
    services: Services,
    classifiers: Vec<Box<dyn Classifier>>,
    classifier_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        game: GameConfig,
        services: Services,
        classifiers: Vec<Box<dyn Classifier>>,
        classifier_timeout: Duration,
    ) -> Self {
        Self {
            game,
            services,
            classifiers,
            classifier_timeout,
        }
    }

    /// Handle a channel event as observed at `now`.
    pub async fn handle_at(&self, event: &MessageEvent, now: DateTime<Utc>) -> DispatchReport {
        match event {
            MessageEvent::New { message } => self.dispatch_at(message, now).await,
            MessageEvent::Edited { before, after } => {
                if should_reprocess(before, after) {
                    self.dispatch_at(after, now).await
                } else {
                    debug!("edit of message {} skipped", after.id);
                    DispatchReport::for_message(after)
                }
            }
        }
    }

    /// Classify `message` as observed at `now`.
    pub async fn dispatch_at(&self, message: &IncomingMessage, now: DateTime<Utc>) -> DispatchReport {
        let now = truncate_seconds(now);
        let mut report = DispatchReport::for_message(message);

        if !self.game.is_game_author(message.author_id) {
            self.services
                .recent
                .record(RecentMessage::from(message), now)
                .await;
            return report;
        }

        let interaction_user = message.interaction.as_ref().map(|i| i.user_id);
        let settings = match interaction_user {
            Some(user_id) => match self.services.store.get_user(user_id).await {
                Ok(settings) if settings.bot_enabled => Some(settings),
                Ok(_) => {
                    debug!("message {}: user {user_id} has the bot disabled", message.id);
                    return report;
                }
                Err(SaplingError::NotRegistered(_)) => {
                    debug!("message {}: user {user_id} is not registered", message.id);
                    return report;
                }
                Err(e) => {
                    error!("message {}: settings lookup for {user_id} failed: {e}", message.id);
                    report.warned = true;
                    return report;
                }
            },
            None => None,
        };

        let fact = normalize(message);
        let embed_user = self
            .embed_user(&fact.author.icon_url, interaction_user, settings.as_ref())
            .await;
        let gates = FeatureGates::resolve(settings.as_ref());

        let ctx = ClassifyContext {
            message,
            fact: &fact,
            interaction_user,
            settings: settings.as_ref(),
            embed_user: embed_user.as_ref(),
            now,
            services: &self.services,
        };

        for classifier in &self.classifiers {
            if !classifier.enabled(&gates) {
                continue;
            }
            let result = match tokio::time::timeout(self.classifier_timeout, classifier.classify(&ctx))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SaplingError::Timeout(format!(
                    "{} classifier exceeded {:?}",
                    classifier.name(),
                    self.classifier_timeout
                ))),
            };
            match result {
                Ok(outcome) => report.merge(outcome),
                Err(e) => record_failure(classifier.name(), message, e, &mut report),
            }
        }

        if !report.is_empty() {
            debug!(
                "message {}: acknowledged={} warned={} actions={}",
                message.id,
                report.acknowledged,
                report.warned,
                report.outgoing.len()
            );
        }
        report
    }

    /// The user named by the embed's author icon, if any.
    ///
    /// Settings are only fetched when no interaction user is known; when the
    /// two users differ the classifiers drop the message, so no lookup is made.
    async fn embed_user(
        &self,
        icon_url: &str,
        interaction_user: Option<u64>,
        settings: Option<&UserSettings>,
    ) -> Option<EmbedUser> {
        let user_id = user_id_from_icon(icon_url)?;
        let settings = match interaction_user {
            Some(interaction) if interaction == user_id => settings.cloned(),
            Some(_) => None,
            None => match self.services.store.get_user(user_id).await {
                Ok(settings) => Some(settings),
                Err(SaplingError::NotRegistered(_)) => None,
                Err(e) => {
                    warn!("embed user {user_id} lookup failed: {e}");
                    None
                }
            },
        };
        Some(EmbedUser { user_id, settings })
    }
}

fn record_failure(
    classifier: &str,
    message: &IncomingMessage,
    err: SaplingError,
    report: &mut DispatchReport,
) {
    match err {
        SaplingError::NotRegistered(user_id) => {
            debug!("{classifier}: user {user_id} in message {} is not registered", message.id);
        }
        SaplingError::NotFound(e) => {
            warn!(
                "{classifier}: message {} (channel {}): {e}",
                message.id, message.channel_id
            );
        }
        SaplingError::MalformedMessage(e) => {
            warn!(
                "{classifier}: malformed message {} (channel {}): {e}",
                message.id, message.channel_id
            );
            report.warned = true;
        }
        e => {
            error!(
                "{classifier}: failed on message {} (channel {}): {e}",
                message.id, message.channel_id
            );
            report.warned = true;
        }
    }
}

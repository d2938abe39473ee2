use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message observed in a guild channel, as delivered by the platform bridge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: u64,
    pub author_id: u64,
    /// Display name of the author at the time the message was sent.
    #[serde(default)]
    pub author_name: String,
    pub channel_id: u64,
    #[serde(default)]
    pub guild_id: u64,
    /// Free-form message text.
    #[serde(default)]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    /// Back-reference to the user whose slash command produced this message, if any.
    #[serde(default)]
    pub interaction: Option<InteractionRef>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    /// Component rows (buttons, selects) attached to the message.
    #[serde(default)]
    pub components: Vec<Vec<Component>>,
    #[serde(default)]
    pub pinned: bool,
}

impl IncomingMessage {
    /// Instant the current content was produced: the last edit, else creation.
    pub fn observed_at(&self) -> DateTime<Utc> {
        self.edited_at.unwrap_or(self.created_at)
    }

    /// `true` when no component is attached, or at least one is still enabled.
    pub fn has_active_components(&self) -> bool {
        if self.components.iter().all(|row| row.is_empty()) {
            return true;
        }
        self.components
            .iter()
            .flatten()
            .any(|component| !component.disabled)
    }

    pub fn has_components(&self) -> bool {
        self.components.iter().any(|row| !row.is_empty())
    }
}

/// The user who invoked the interaction a bot message answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionRef {
    pub user_id: u64,
    #[serde(default)]
    pub user_name: String,
}

/// Structured embed payload. Every part is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub author: Option<EmbedAuthor>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    #[serde(default)]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedFooter {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub icon_url: Option<String>,
}

/// A single interactive component (button or select).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

/// Event delivered by a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MessageEvent {
    New { message: IncomingMessage },
    Edited {
        before: IncomingMessage,
        after: IncomingMessage,
    },
}

/// Something the engine wants the platform to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutgoingMessage {
    /// Post text into a channel.
    Send { channel_id: u64, text: String },
    /// React to an observed message.
    React {
        channel_id: u64,
        message_id: u64,
        reaction: Reaction,
    },
}

/// Reactions the engine may attach to a processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    /// At least one reminder was scheduled.
    Logo,
    /// Something was recognized but could not be processed.
    Warning,
    /// Golden nugget found while pruning.
    Celebrate,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(disabled: bool) -> Component {
        Component {
            label: Some("Go".to_string()),
            disabled,
        }
    }

    #[test]
    fn test_no_components_counts_as_active() {
        let message = IncomingMessage::default();
        assert!(message.has_active_components());
        assert!(!message.has_components());
    }

    #[test]
    fn test_all_disabled_components_are_inactive() {
        let message = IncomingMessage {
            components: vec![vec![button(true), button(true)]],
            ..Default::default()
        };
        assert!(!message.has_active_components());
        assert!(message.has_components());
    }

    #[test]
    fn test_one_enabled_component_is_active() {
        let message = IncomingMessage {
            components: vec![vec![button(true)], vec![button(false)]],
            ..Default::default()
        };
        assert!(message.has_active_components());
    }

    #[test]
    fn test_observed_at_prefers_edit_time() {
        let created = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
        let edited = DateTime::<Utc>::from_timestamp(1_700_000_060, 0).unwrap();
        let mut message = IncomingMessage {
            created_at: created,
            ..Default::default()
        };
        assert_eq!(message.observed_at(), created);
        message.edited_at = Some(edited);
        assert_eq!(message.observed_at(), edited);
    }

    #[test]
    fn test_event_wire_format() {
        let line = r#"{"event":"new","message":{"id":1,"author_id":2,"channel_id":3,
            "created_at":"2026-01-01T00:00:00Z","embeds":[{"title":"Daily rewards"}]}}"#;
        let event: MessageEvent = serde_json::from_str(line).unwrap();
        match event {
            MessageEvent::New { message } => {
                assert_eq!(message.channel_id, 3);
                assert_eq!(message.embeds[0].title.as_deref(), Some("Daily rewards"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let out = OutgoingMessage::React {
            channel_id: 3,
            message_id: 1,
            reaction: Reaction::Logo,
        };
        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains(r#""action":"react""#));
        assert!(json.contains(r#""reaction":"logo""#));
    }
}

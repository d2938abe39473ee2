//! Embed/text normalizer.
//!
//! Flattens the first embed of a message into a fixed-shape record. Every
//! part is a plain `String` that defaults to empty, so classifiers match on
//! text without branching on missing structure.

use sapling_core::message::IncomingMessage;

/// Number of embed fields carried by a [`NormalizedFact`].
pub const FACT_FIELDS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactAuthor {
    pub icon_url: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactFooter {
    pub icon_url: String,
    pub text: String,
}

/// The facts a classifier can read from one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedFact {
    pub author: FactAuthor,
    pub title: String,
    pub description: String,
    pub fields: [FactField; FACT_FIELDS],
    pub footer: FactFooter,
}

impl NormalizedFact {
    /// Field at `index`; out-of-range indexes read as an empty field.
    pub fn field(&self, index: usize) -> &FactField {
        static EMPTY: FactField = FactField {
            name: String::new(),
            value: String::new(),
        };
        self.fields.get(index).unwrap_or(&EMPTY)
    }
}

/// Build the fact record for a message. Never fails.
pub fn normalize(message: &IncomingMessage) -> NormalizedFact {
    let mut fact = NormalizedFact::default();
    let Some(embed) = message.embeds.first() else {
        return fact;
    };

    if let Some(author) = &embed.author {
        fact.author.icon_url = author.icon_url.clone().unwrap_or_default();
        fact.author.name = author.name.clone().unwrap_or_default();
    }
    fact.title = embed.title.clone().unwrap_or_default();
    fact.description = embed.description.clone().unwrap_or_default();
    for (slot, field) in fact.fields.iter_mut().zip(&embed.fields) {
        slot.name = field.name.clone();
        slot.value = field.value.clone();
    }
    if let Some(footer) = &embed.footer {
        fact.footer.icon_url = footer.icon_url.clone().unwrap_or_default();
        fact.footer.text = footer.text.clone().unwrap_or_default();
    }
    fact
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapling_core::message::{Embed, EmbedAuthor, EmbedField, EmbedFooter};

    fn field(name: &str, value: &str) -> EmbedField {
        EmbedField {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_message_without_embed_is_all_empty() {
        let fact = normalize(&IncomingMessage::default());
        assert_eq!(fact, NormalizedFact::default());
        assert_eq!(fact.field(3).value, "");
    }

    #[test]
    fn test_full_embed_is_copied() {
        let message = IncomingMessage {
            embeds: vec![Embed {
                author: Some(EmbedAuthor {
                    name: Some("alice".to_string()),
                    icon_url: Some("https://cdn.example/avatars/42/a.png".to_string()),
                }),
                title: Some("Daily rewards".to_string()),
                description: Some("You got stuff".to_string()),
                fields: vec![field("one", "1"), field("two", "2")],
                footer: Some(EmbedFooter {
                    text: Some("footer".to_string()),
                    icon_url: None,
                }),
            }],
            ..Default::default()
        };

        let fact = normalize(&message);
        assert_eq!(fact.author.name, "alice");
        assert_eq!(fact.author.icon_url, "https://cdn.example/avatars/42/a.png");
        assert_eq!(fact.title, "Daily rewards");
        assert_eq!(fact.description, "You got stuff");
        assert_eq!(fact.field(1).value, "2");
        assert_eq!(fact.field(2), &FactField::default());
        assert_eq!(fact.footer.text, "footer");
        assert_eq!(fact.footer.icon_url, "");
    }

    #[test]
    fn test_extra_fields_are_dropped_and_far_indexes_are_empty() {
        let message = IncomingMessage {
            embeds: vec![Embed {
                fields: (0..8).map(|i| field(&i.to_string(), "v")).collect(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let fact = normalize(&message);
        assert_eq!(fact.field(5).name, "5");
        assert_eq!(fact.field(6), &FactField::default());
        assert_eq!(fact.field(100), &FactField::default());
    }

    #[test]
    fn test_only_first_embed_is_read() {
        let message = IncomingMessage {
            embeds: vec![
                Embed {
                    title: Some("first".to_string()),
                    ..Default::default()
                },
                Embed {
                    title: Some("second".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(normalize(&message).title, "first");
    }
}

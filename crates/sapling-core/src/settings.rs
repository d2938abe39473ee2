//! Per-user settings and the feature gates derived from them.

use crate::activity::ReminderKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One reminder sub-setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSetting {
    pub enabled: bool,
    /// Template with `{command}`-style placeholders.
    pub message: String,
}

impl ReminderSetting {
    pub fn default_for(kind: ReminderKind) -> Self {
        Self {
            enabled: true,
            message: kind.default_message().to_string(),
        }
    }
}

/// Everything stored about a registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: u64,
    pub bot_enabled: bool,
    pub reactions_enabled: bool,
    pub tracking_enabled: bool,
    /// Post level projections after each prune.
    pub helper_prune_enabled: bool,
    pub level: i64,
    pub xp: i64,
    pub xp_target: i64,
    pub rebirth: i64,
    /// Rolling average of xp gained per prune.
    pub xp_gain_average: f64,
    /// Number of prunes folded into `xp_gain_average`.
    pub xp_prune_count: i64,
    pub pruner_type: String,
    pub reminders: BTreeMap<ReminderKind, ReminderSetting>,
}

impl UserSettings {
    /// Fresh settings with every reminder enabled and default templates.
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            bot_enabled: true,
            reactions_enabled: true,
            tracking_enabled: true,
            helper_prune_enabled: false,
            level: 0,
            xp: 0,
            xp_target: 0,
            rebirth: 0,
            xp_gain_average: 0.0,
            xp_prune_count: 0,
            pruner_type: String::new(),
            reminders: ReminderKind::ALL
                .into_iter()
                .map(|kind| (kind, ReminderSetting::default_for(kind)))
                .collect(),
        }
    }

    /// The stored sub-setting, if the profile carries one.
    pub fn reminder(&self, kind: ReminderKind) -> Option<&ReminderSetting> {
        self.reminders.get(&kind)
    }

    /// Whether reminders of this kind are on. An absent sub-setting counts as enabled.
    pub fn reminder_enabled(&self, kind: ReminderKind) -> bool {
        self.reminder(kind).is_none_or(|setting| setting.enabled)
    }

    /// Message template for a kind, falling back to the built-in default.
    pub fn reminder_message(&self, kind: ReminderKind) -> &str {
        self.reminder(kind)
            .map(|setting| setting.message.as_str())
            .unwrap_or_else(|| kind.default_message())
    }
}

/// Partial update. Only `Some` fields are written, in a single statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub bot_enabled: Option<bool>,
    pub reactions_enabled: Option<bool>,
    pub tracking_enabled: Option<bool>,
    pub helper_prune_enabled: Option<bool>,
    pub level: Option<i64>,
    pub xp: Option<i64>,
    pub xp_target: Option<i64>,
    pub rebirth: Option<i64>,
    pub xp_gain_average: Option<f64>,
    pub xp_prune_count: Option<i64>,
    pub pruner_type: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Which classifier families run for a message.
///
/// Resolved from the interaction user's settings; every gate defaults to open
/// when there are no settings or the sub-setting is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureGates {
    pub boosts: bool,
    pub chests: bool,
    pub clean: bool,
    pub daily: bool,
    pub fusion: bool,
    pub hive: bool,
    pub prune: bool,
    pub quests: bool,
    pub research: bool,
    pub upgrade: bool,
    pub tracking: bool,
    pub vote: bool,
}

impl FeatureGates {
    pub fn resolve(settings: Option<&UserSettings>) -> Self {
        let enabled = |kind: ReminderKind| settings.is_none_or(|s| s.reminder_enabled(kind));
        Self {
            boosts: enabled(ReminderKind::Boosts),
            chests: enabled(ReminderKind::Chests),
            clean: enabled(ReminderKind::Clean),
            daily: enabled(ReminderKind::Daily),
            fusion: enabled(ReminderKind::Fusion),
            hive: enabled(ReminderKind::HiveEnergy),
            prune: enabled(ReminderKind::Prune),
            quests: enabled(ReminderKind::Quests),
            research: enabled(ReminderKind::Research),
            upgrade: enabled(ReminderKind::Upgrade),
            tracking: settings.is_none_or(|s| s.tracking_enabled),
            vote: enabled(ReminderKind::Vote),
        }
    }
}

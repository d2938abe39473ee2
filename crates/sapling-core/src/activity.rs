//! The closed set of activities a reminder can be scheduled for.

use crate::error::SaplingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quest cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestKind {
    Daily,
    Weekly,
    Monthly,
}

impl QuestKind {
    pub const ALL: [QuestKind; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parse a quest type as written in game messages ("Weekly", "monthly").
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name.trim().to_lowercase())
    }
}

/// Consumable boosts that run on a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoostKind {
    SweetApple,
    AppleJuice,
    GoldenApple,
    Fertilizer,
}

impl BoostKind {
    pub const ALL: [BoostKind; 4] = [
        Self::SweetApple,
        Self::AppleJuice,
        Self::GoldenApple,
        Self::Fertilizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SweetApple => "sweet-apple",
            Self::AppleJuice => "apple-juice",
            Self::GoldenApple => "golden-apple",
            Self::Fertilizer => "fertilizer",
        }
    }

    /// Name as it appears in the game's bonus overview.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SweetApple => "sweet apple",
            Self::AppleJuice => "apple juice",
            Self::GoldenApple => "golden apple",
            Self::Fertilizer => "fertilizer",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::SweetApple => "\u{1f34e}",
            Self::AppleJuice => "\u{1f9c3}",
            Self::GoldenApple => "\u{1f34f}",
            Self::Fertilizer => "\u{1f331}",
        }
    }
}

/// Listing groups used by reminder list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityGroup {
    Commands,
    Boosts,
    Custom,
}

impl FromStr for ActivityGroup {
    type Err = SaplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "commands" => Ok(Self::Commands),
            "boosts" => Ok(Self::Boosts),
            "custom" => Ok(Self::Custom),
            other => Err(SaplingError::NotFound(format!(
                "unknown activity group '{other}'"
            ))),
        }
    }
}

/// The per-user reminder sub-setting that governs an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReminderKind {
    Boosts,
    Chests,
    Clean,
    Custom,
    Daily,
    Fusion,
    HiveEnergy,
    Prune,
    Quests,
    Research,
    Upgrade,
    Vote,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 12] = [
        Self::Boosts,
        Self::Chests,
        Self::Clean,
        Self::Custom,
        Self::Daily,
        Self::Fusion,
        Self::HiveEnergy,
        Self::Prune,
        Self::Quests,
        Self::Research,
        Self::Upgrade,
        Self::Vote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boosts => "boosts",
            Self::Chests => "chests",
            Self::Clean => "clean",
            Self::Custom => "custom",
            Self::Daily => "daily",
            Self::Fusion => "fusion",
            Self::HiveEnergy => "hive-energy",
            Self::Prune => "prune",
            Self::Quests => "quests",
            Self::Research => "research",
            Self::Upgrade => "upgrade",
            Self::Vote => "vote",
        }
    }

    /// Template written for newly registered users.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Boosts => "{boost_emoji} Your **{boost_name}** boost ran out!",
            Self::Custom => "Custom reminder",
            Self::Prune => "{pruner_emoji} {command} is ready!",
            Self::Quests => "Your {quest_type} quest is ready! {command}",
            _ => "{command} is ready!",
        }
    }
}

impl FromStr for ReminderKind {
    type Err = SaplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SaplingError::NotFound(format!("unknown reminder kind '{s}'")))
    }
}

/// A recurring in-game action with its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Activity {
    Chests,
    Clean,
    Daily,
    Fusion,
    HiveEnergy,
    Prune,
    Research,
    Upgrade,
    Vote,
    Quest(QuestKind),
    Boost(BoostKind),
    Custom,
}

impl Activity {
    /// Stable storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chests => "chests",
            Self::Clean => "clean",
            Self::Daily => "daily",
            Self::Fusion => "fusion",
            Self::HiveEnergy => "hive-energy",
            Self::Prune => "prune",
            Self::Research => "research",
            Self::Upgrade => "upgrade",
            Self::Vote => "vote",
            Self::Quest(QuestKind::Daily) => "quest-daily",
            Self::Quest(QuestKind::Weekly) => "quest-weekly",
            Self::Quest(QuestKind::Monthly) => "quest-monthly",
            Self::Boost(boost) => boost.as_str(),
            Self::Custom => "custom",
        }
    }

    pub fn group(&self) -> ActivityGroup {
        match self {
            Self::Boost(_) => ActivityGroup::Boosts,
            Self::Custom => ActivityGroup::Custom,
            _ => ActivityGroup::Commands,
        }
    }

    pub fn reminder_kind(&self) -> ReminderKind {
        match self {
            Self::Chests => ReminderKind::Chests,
            Self::Clean => ReminderKind::Clean,
            Self::Daily => ReminderKind::Daily,
            Self::Fusion => ReminderKind::Fusion,
            Self::HiveEnergy => ReminderKind::HiveEnergy,
            Self::Prune => ReminderKind::Prune,
            Self::Research => ReminderKind::Research,
            Self::Upgrade => ReminderKind::Upgrade,
            Self::Vote => ReminderKind::Vote,
            Self::Quest(_) => ReminderKind::Quests,
            Self::Boost(_) => ReminderKind::Boosts,
            Self::Custom => ReminderKind::Custom,
        }
    }

    /// Game command that performs the activity.
    pub fn command_name(&self) -> &'static str {
        match self {
            Self::Chests => "chests",
            Self::Clean => "clean",
            Self::Daily => "daily",
            Self::Fusion => "fusion",
            Self::HiveEnergy => "hive",
            Self::Prune => "prune",
            Self::Research => "laboratory",
            Self::Upgrade => "tool upgrade",
            Self::Vote => "vote",
            Self::Quest(_) => "quests",
            Self::Boost(_) => "bonuses",
            Self::Custom => "reminders",
        }
    }

    /// Every activity, in a stable order.
    pub fn all() -> Vec<Activity> {
        let mut all = vec![
            Self::Chests,
            Self::Clean,
            Self::Daily,
            Self::Fusion,
            Self::HiveEnergy,
            Self::Prune,
            Self::Research,
            Self::Upgrade,
            Self::Vote,
        ];
        all.extend(QuestKind::ALL.into_iter().map(Self::Quest));
        all.extend(BoostKind::ALL.into_iter().map(Self::Boost));
        all.push(Self::Custom);
        all
    }
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activity {
    type Err = SaplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|activity| activity.as_str() == s)
            .ok_or_else(|| SaplingError::NotFound(format!("unknown activity '{s}'")))
    }
}

impl From<Activity> for String {
    fn from(activity: Activity) -> Self {
        activity.as_str().to_string()
    }
}

impl TryFrom<String> for Activity {
    type Error = SaplingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A scheduled notification for one (user, activity) slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub user_id: u64,
    pub activity: Activity,
    /// Slot number for custom reminders; `0` for every other activity.
    pub custom_id: i64,
    pub channel_id: u64,
    pub end_time: DateTime<Utc>,
    pub message: String,
    /// Set by the delivery loop once the reminder fired.
    pub triggered: bool,
}

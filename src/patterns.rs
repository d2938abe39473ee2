//! Trigger phrases and extraction patterns, one table per activity.
//!
//! Phrases are matched as lowercase substrings. Adding a language means
//! adding a phrase to the relevant table only.

use regex::Regex;
use std::sync::LazyLock;

// --- Trigger phrases ---

/// Embed title of the daily reward reply.
pub const DAILY_TITLE: &[&str] = &[
    "daily rewards", // English
];

/// Embed title of the quest overview when no quest is active.
pub const QUESTS_OVERVIEW_TITLE: &[&str] = &[
    "available quests", // English
];

/// Embed author name of an active quest.
pub const QUESTS_ACTIVE_AUTHOR: &[&str] = &[
    "'s quest", // English
];

/// Embed description of the vote reply.
pub const VOTE_DESCRIPTION: &[&str] = &[
    "click here to vote", // English
];

/// Embed title of a vote reply whose cooldown already ran out.
pub const VOTE_READY_TITLE: &[&str] = &[
    "cooldown ready!", // English
];

/// Message content of a prune.
pub const PRUNE_CONTENT: &[&str] = &[
    "you have pruned your tree", // English
];

/// Embed title of the bonuses overview.
pub const BONUSES_TITLE: &[&str] = &[
    "buffs, bonuses and reductions", // English
];

/// Prune content that earns a celebration.
pub const GOLDEN_NUGGET: &[&str] = &["goldennugget"];

/// Check if any phrase appears in the (already lowercased) text.
pub fn phrase_match(text_lower: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| text_lower.contains(phrase))
}

// --- Command invocations in the recent-message index ---

fn command_pattern(command: &str) -> Regex {
    Regex::new(&format!(r"(?i)^\s*(?:/|tree\s+){command}\b")).expect("command pattern")
}

pub static COMMAND_DAILY: LazyLock<Regex> = LazyLock::new(|| command_pattern("daily"));
pub static COMMAND_QUESTS: LazyLock<Regex> = LazyLock::new(|| command_pattern("quests?"));
pub static COMMAND_VOTE: LazyLock<Regex> = LazyLock::new(|| command_pattern("vote"));
pub static COMMAND_PRUNE: LazyLock<Regex> = LazyLock::new(|| command_pattern("prune"));
pub static COMMAND_BONUSES: LazyLock<Regex> =
    LazyLock::new(|| command_pattern("(?:bonuses|buffs)"));

// --- Extraction ---

/// User id embedded in an avatar URL.
pub static USER_ID_FROM_ICON_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"avatars/(\d+)/").expect("icon url pattern"));

/// Display name at the start of a plain-text game reply: `**name** ...`.
pub static NAME_FROM_MESSAGE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*\*(.+?)\*\*").expect("name pattern"));

/// Display name in an author line such as `alice's quest`.
pub static NAME_FROM_POSSESSIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)'s ").expect("possessive pattern"));

/// Countdown at the end of a quest overview button label: `Daily | 3h 2m`.
pub static QUEST_BUTTON_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\| (.+?)$").expect("quest button pattern"));

/// Quest type in an active quest description: `> Weekly quest`.
pub static QUEST_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)> (.+?) quest").expect("quest type pattern"));

/// Countdown in the vote title: ``**`11h 59m`**``.
pub static VOTE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*`(.+?)`\*\*").expect("vote time pattern"));

/// Pruner tier in a prune reply: `> Iron pruner`.
pub static PRUNER_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)> (.+?) pruner").expect("pruner pattern"));

/// XP gained in a prune reply: `got **1,234** <:xp:...>`.
pub static XP_GAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)got \*\*(.+?)\*\* <").expect("xp gain pattern"));

/// Countdown on a boost line: `ends in **2h 15m**`.
pub static BOOST_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)ends in \*\*(.+?)\*\*").expect("boost time pattern"));

/// Extract the user id embedded in an avatar URL, if any.
pub fn user_id_from_icon(icon_url: &str) -> Option<u64> {
    USER_ID_FROM_ICON_URL
        .captures(icon_url)
        .and_then(|caps| caps[1].parse().ok())
}

/// First capture group of `pattern` in `text`, trimmed.
pub fn capture<'t>(pattern: &Regex, text: &'t str) -> Option<&'t str> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

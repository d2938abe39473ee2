//! Time resolution: countdown text, embedded timestamps, and cooldown lookups.
//!
//! Every resolver returns a signed duration relative to the evaluation
//! instant. A negative result means the message describes something that
//! already ran out; callers drop it.

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use sapling_core::{
    activity::Activity, config::CooldownConfig, error::SaplingError, settings::UserSettings,
};
use sapling_memory::Store;
use std::sync::LazyLock;

static COUNTDOWN_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+)\s*(days|day|d|hours|hour|hrs|hr|h|minutes|minute|mins|min|m|seconds|second|secs|sec|s)",
    )
    .expect("countdown token pattern")
});

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<t:(\d+)(?::[a-zA-Z])?>").expect("timestamp pattern"));

/// Longest countdown accepted from message text, in seconds (ten years).
pub const MAX_COUNTDOWN_SECS: i64 = 3650 * 86_400;

/// Drop sub-second precision; stored instants are whole seconds.
pub fn truncate_seconds(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(instant.timestamp(), 0).unwrap_or(instant)
}

/// Parse a countdown such as `1d 4h`, `12h 3m 10s` or `` **`5 minutes`** ``.
///
/// Any text that is not a `{number}{unit}` token, a space, or a comma makes
/// the whole countdown malformed, as does a total above [`MAX_COUNTDOWN_SECS`].
pub fn parse_countdown(text: &str) -> Result<TimeDelta, SaplingError> {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != '*' && *c != '`')
        .collect::<String>()
        .to_lowercase();

    let mut rest = cleaned.trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    if rest.is_empty() {
        return Err(SaplingError::MalformedMessage(format!(
            "empty countdown '{text}'"
        )));
    }

    let mut total = TimeDelta::zero();
    while !rest.is_empty() {
        let caps = COUNTDOWN_TOKEN.captures(rest).ok_or_else(|| {
            SaplingError::MalformedMessage(format!("unreadable countdown '{text}' at '{rest}'"))
        })?;
        let amount: i64 = caps[1].parse().map_err(|_| {
            SaplingError::MalformedMessage(format!("countdown number too large in '{text}'"))
        })?;
        let unit_seconds = match &caps[2] {
            "d" | "day" | "days" => 86_400,
            "h" | "hr" | "hrs" | "hour" | "hours" => 3_600,
            "m" | "min" | "mins" | "minute" | "minutes" => 60,
            _ => 1,
        };
        let step = amount
            .checked_mul(unit_seconds)
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                SaplingError::MalformedMessage(format!("countdown out of range in '{text}'"))
            })?;
        total = total
            .checked_add(&step)
            .filter(|total| total.num_seconds() <= MAX_COUNTDOWN_SECS)
            .ok_or_else(|| {
                SaplingError::MalformedMessage(format!("countdown out of range in '{text}'"))
            })?;
        rest = rest[caps[0].len()..].trim_start_matches(|c: char| c.is_whitespace() || c == ',');
    }
    Ok(total)
}

/// Instant in the first `<t:EPOCH>` / `<t:EPOCH:STYLE>` markup of `text`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    TIMESTAMP
        .captures(text)
        .and_then(|caps| caps[1].parse::<i64>().ok())
        .and_then(|epoch| DateTime::<Utc>::from_timestamp(epoch, 0))
}

/// Resolves raw countdowns, timestamps and cooldowns into durations left.
#[derive(Clone)]
pub struct TimeResolver {
    store: Store,
    cooldowns: CooldownConfig,
}

impl TimeResolver {
    pub fn new(store: Store, cooldowns: CooldownConfig) -> Self {
        Self { store, cooldowns }
    }

    /// Countdown text as shown at `observed_at`, measured from `now`.
    pub fn from_countdown(
        &self,
        text: &str,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TimeDelta, SaplingError> {
        Ok(parse_countdown(text)? - (now - truncate_seconds(observed_at)))
    }

    /// Embedded absolute timestamp, measured from `now`.
    pub fn from_timestamp(&self, text: &str, now: DateTime<Utc>) -> Result<TimeDelta, SaplingError> {
        let expiry = parse_timestamp(text).ok_or_else(|| {
            SaplingError::MalformedMessage(format!("no timestamp in '{text}'"))
        })?;
        Ok(expiry - now)
    }

    /// Full cooldown for `activity` and this user, before any age correction.
    pub async fn cooldown_for(
        &self,
        activity: Activity,
        settings: &UserSettings,
    ) -> Result<TimeDelta, SaplingError> {
        let base = self.store.get_cooldown(activity).await?;
        if activity != Activity::Prune {
            return Ok(base);
        }
        let multiplier = self.cooldowns.pruner_multiplier(&settings.pruner_type);
        Ok(TimeDelta::seconds(
            (base.num_seconds() as f64 * multiplier).round() as i64,
        ))
    }

    /// Cooldown that started when the message was observed, measured from `now`.
    pub async fn from_cooldown(
        &self,
        activity: Activity,
        settings: &UserSettings,
        observed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TimeDelta, SaplingError> {
        let cooldown = self.cooldown_for(activity, settings).await?;
        Ok(cooldown - (now - truncate_seconds(observed_at)))
    }

    /// Cooldown that started at `started`, measured from `now`.
    pub async fn from_start(
        &self,
        activity: Activity,
        settings: &UserSettings,
        started: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<TimeDelta, SaplingError> {
        let cooldown = self.cooldown_for(activity, settings).await?;
        let expiry = started.checked_add_signed(cooldown).ok_or_else(|| {
            SaplingError::MalformedMessage(format!("{activity} start {started} out of range"))
        })?;
        Ok(expiry - now)
    }
}

/// Render a duration as `1d 4h 3m 2s`, skipping zero parts.
pub fn format_duration(duration: TimeDelta) -> String {
    let mut secs = duration.num_seconds();
    if secs <= 0 {
        return "0s".to_string();
    }
    let mut parts = Vec::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        let amount = secs / size;
        secs %= size;
        if amount > 0 {
            parts.push(format!("{amount}{unit}"));
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sapling_core::activity::QuestKind;

    fn at(epoch: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(epoch, 0).unwrap()
    }

    #[test]
    fn test_parse_countdown_units() {
        assert_eq!(parse_countdown("3h 2m").unwrap(), TimeDelta::minutes(182));
        assert_eq!(parse_countdown("1d 4h").unwrap(), TimeDelta::hours(28));
        assert_eq!(parse_countdown("6d").unwrap(), TimeDelta::days(6));
        assert_eq!(parse_countdown("45s").unwrap(), TimeDelta::seconds(45));
        assert_eq!(
            parse_countdown("2 hours, 5 minutes").unwrap(),
            TimeDelta::minutes(125)
        );
        assert_eq!(parse_countdown("0s").unwrap(), TimeDelta::zero());
    }

    #[test]
    fn test_parse_countdown_strips_markdown_and_case() {
        assert_eq!(parse_countdown("**`12H 3M`**").unwrap(), TimeDelta::minutes(723));
    }

    #[test]
    fn test_parse_countdown_rejects_unknown_tokens() {
        for bad in [
            "",
            "   ",
            "soon",
            "3h and 2m",
            "5 fortnights",
            "3h 2",
            "9000000000000000s 9000000000000000s",
            "1000000000d",
            "3651d",
        ] {
            let err = parse_countdown(bad).unwrap_err();
            assert!(
                matches!(err, SaplingError::MalformedMessage(_)),
                "expected malformed for {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_countdown_accepts_up_to_ten_years() {
        assert_eq!(parse_countdown("3650d").unwrap(), TimeDelta::days(3650));
        assert_eq!(
            parse_countdown("3649d 23h 59m 60s").unwrap(),
            TimeDelta::days(3650)
        );
    }

    #[test]
    fn test_parse_timestamp_styles() {
        assert_eq!(parse_timestamp("started <t:1700000000:d>"), Some(at(1_700_000_000)));
        assert_eq!(parse_timestamp("<t:1700000000>"), Some(at(1_700_000_000)));
        assert_eq!(parse_timestamp("no markup"), None);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::minutes(182)), "3h 2m");
        assert_eq!(format_duration(TimeDelta::seconds(90_061)), "1d 1h 1m 1s");
        assert_eq!(format_duration(TimeDelta::seconds(-5)), "0s");
    }

    #[tokio::test]
    async fn test_countdown_is_corrected_for_message_age() {
        let resolver = TimeResolver::new(Store::in_memory().await.unwrap(), CooldownConfig::default());
        let now = at(1_700_000_000);
        let left = resolver
            .from_countdown("1h", now - TimeDelta::minutes(10), now)
            .unwrap();
        assert_eq!(left, TimeDelta::minutes(50));

        let stale = resolver
            .from_countdown("1h", now - TimeDelta::seconds(3601), now)
            .unwrap();
        assert_eq!(stale, TimeDelta::seconds(-1));
    }

    #[tokio::test]
    async fn test_timestamp_mode() {
        let resolver = TimeResolver::new(Store::in_memory().await.unwrap(), CooldownConfig::default());
        let now = at(1_700_000_000);
        let left = resolver.from_timestamp("<t:1700000600:R>", now).unwrap();
        assert_eq!(left, TimeDelta::minutes(10));
        assert!(resolver.from_timestamp("nothing", now).is_err());
    }

    #[tokio::test]
    async fn test_prune_cooldown_uses_pruner_multiplier() {
        let resolver = TimeResolver::new(Store::in_memory().await.unwrap(), CooldownConfig::default());
        let mut settings = UserSettings::new(1);

        settings.pruner_type = "diamond".to_string();
        let diamond = resolver.cooldown_for(Activity::Prune, &settings).await.unwrap();
        assert_eq!(diamond, TimeDelta::seconds(1530));

        settings.pruner_type = "mystery".to_string();
        let unknown = resolver.cooldown_for(Activity::Prune, &settings).await.unwrap();
        assert_eq!(unknown, TimeDelta::minutes(30));

        let daily = resolver.cooldown_for(Activity::Daily, &settings).await.unwrap();
        assert_eq!(daily, TimeDelta::hours(24));
    }

    #[tokio::test]
    async fn test_from_start_for_active_quest() {
        let resolver = TimeResolver::new(Store::in_memory().await.unwrap(), CooldownConfig::default());
        let settings = UserSettings::new(1);
        let now = at(1_700_000_000);
        let left = resolver
            .from_start(
                Activity::Quest(QuestKind::Daily),
                &settings,
                now - TimeDelta::hours(20),
                now,
            )
            .await
            .unwrap();
        assert_eq!(left, TimeDelta::hours(4));
    }

    #[tokio::test]
    async fn test_from_start_past_calendar_range_is_malformed() {
        let resolver = TimeResolver::new(Store::in_memory().await.unwrap(), CooldownConfig::default());
        let settings = UserSettings::new(1);
        let err = resolver
            .from_start(
                Activity::Quest(QuestKind::Monthly),
                &settings,
                DateTime::<Utc>::MAX_UTC,
                at(1_700_000_000),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SaplingError::MalformedMessage(_)));
    }
}

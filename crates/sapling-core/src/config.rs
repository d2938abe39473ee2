use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::SaplingError;

/// Top-level Sapling configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sapling: SaplingConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub cooldowns: CooldownConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaplingConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for SaplingConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Which authors are trusted as the game bot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameConfig {
    /// Author id of the game bot.
    #[serde(default)]
    pub bot_id: u64,
    /// Optional test bot that is treated like the game bot (0 = none).
    #[serde(default)]
    pub test_bot_id: u64,
}

impl GameConfig {
    pub fn is_game_author(&self, author_id: u64) -> bool {
        author_id != 0 && (author_id == self.bot_id || author_id == self.test_bot_id)
    }
}

/// Memory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Message detection tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// How long user command messages stay in the recent-message index.
    #[serde(default = "default_recent_window")]
    pub recent_window_secs: u64,
    /// Hard cap on entries held by the recent-message index.
    #[serde(default = "default_recent_capacity")]
    pub recent_capacity: usize,
    /// Upper bound for one classifier's contribution to a message.
    #[serde(default = "default_classifier_timeout")]
    pub classifier_timeout_secs: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            recent_window_secs: default_recent_window(),
            recent_capacity: default_recent_capacity(),
            classifier_timeout_secs: default_classifier_timeout(),
        }
    }
}

/// Reminder delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Triggered reminders are kept this long before being purged.
    #[serde(default = "default_triggered_retention")]
    pub triggered_retention_hours: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
            triggered_retention_hours: default_triggered_retention(),
        }
    }
}

/// Cooldown modifiers that are not stored per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    /// Prune cooldown multiplier keyed by lowercase pruner type.
    #[serde(default = "default_pruner_multipliers")]
    pub pruner_multipliers: HashMap<String, f64>,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            pruner_multipliers: default_pruner_multipliers(),
        }
    }
}

impl CooldownConfig {
    /// Multiplier for a pruner type; unknown or empty types leave the cooldown unchanged.
    pub fn pruner_multiplier(&self, pruner_type: &str) -> f64 {
        self.pruner_multipliers
            .get(&pruner_type.trim().to_lowercase())
            .copied()
            .filter(|m| *m > 0.0)
            .unwrap_or(1.0)
    }
}

// --- Default value functions ---

fn default_name() -> String {
    "sapling".to_string()
}
fn default_data_dir() -> String {
    "~/.sapling".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_db_path() -> String {
    "~/.sapling/sapling.db".to_string()
}
fn default_recent_window() -> u64 {
    120
}
fn default_recent_capacity() -> usize {
    2000
}
fn default_classifier_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    5
}
fn default_triggered_retention() -> i64 {
    168
}
fn default_pruner_multipliers() -> HashMap<String, f64> {
    [
        ("wooden", 1.0),
        ("copper", 0.95),
        ("iron", 0.9),
        ("diamond", 0.85),
    ]
    .into_iter()
    .map(|(name, m)| (name.to_string(), m))
    .collect()
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, SaplingError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| SaplingError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| SaplingError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.sapling.name, "sapling");
        assert_eq!(cfg.detection.recent_window_secs, 120);
        assert_eq!(cfg.detection.classifier_timeout_secs, 10);
        assert!(cfg.scheduler.enabled);
        assert_eq!(cfg.scheduler.poll_interval_secs, 5);
        assert_eq!(cfg.game.bot_id, 0);
    }

    #[test]
    fn test_game_section_from_toml() {
        let toml_str = r#"
            [game]
            bot_id = 1000
            test_bot_id = 2000
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert!(cfg.game.is_game_author(1000));
        assert!(cfg.game.is_game_author(2000));
        assert!(!cfg.game.is_game_author(3000));
    }

    #[test]
    fn test_unset_test_bot_never_matches_zero() {
        let cfg = GameConfig {
            bot_id: 1000,
            test_bot_id: 0,
        };
        assert!(!cfg.is_game_author(0));
    }

    #[test]
    fn test_pruner_multiplier_lookup() {
        let cfg = CooldownConfig::default();
        assert_eq!(cfg.pruner_multiplier("Iron"), 0.9);
        assert_eq!(cfg.pruner_multiplier("unobtainium"), 1.0);
        assert_eq!(cfg.pruner_multiplier(""), 1.0);
    }

    #[test]
    fn test_pruner_multipliers_override() {
        let toml_str = r#"
            [cooldowns.pruner_multipliers]
            wooden = 1.0
            ruby = 0.5
        "#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.cooldowns.pruner_multiplier("ruby"), 0.5);
        assert_eq!(cfg.cooldowns.pruner_multiplier("diamond"), 1.0);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = load("/nonexistent/__sapling_config__.toml").unwrap();
        assert_eq!(cfg.memory.db_path, "~/.sapling/sapling.db");
    }

    #[test]
    fn test_shellexpand_leaves_plain_paths() {
        assert_eq!(shellexpand("/tmp/x.db"), "/tmp/x.db");
        assert_eq!(shellexpand(":memory:"), ":memory:");
    }
}

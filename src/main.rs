mod dispatch;
mod fact;
mod gateway;
mod patterns;
mod processing;
mod reminders;
mod timing;

use chrono::Utc;
use clap::{Parser, Subcommand};
use sapling_channels::JsonLinesChannel;
use sapling_core::{
    activity::{Activity, ActivityGroup},
    config::{self, shellexpand, Config},
    traits::Channel,
};
use sapling_memory::{RecentMessageIndex, Store, TrackingLog};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use dispatch::Dispatcher;
use gateway::{Clock, Gateway};
use processing::{default_classifiers, Services};
use reminders::{ReminderRequest, ReminderScheduler};
use timing::{format_duration, parse_countdown, TimeResolver};

#[derive(Parser)]
#[command(
    name = "sapling",
    version,
    about = "Sapling: cooldown reminders for a tree-growing game bot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Process live events from stdin and deliver reminders.
    Start,
    /// Process a recorded event file, evaluated at each message's own time.
    Replay {
        /// JSON-lines file with one message event per line.
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Register a user with default settings.
    Register {
        #[arg(short, long)]
        user: u64,
    },
    /// List a user's pending reminders.
    Reminders {
        #[arg(short, long)]
        user: u64,
        /// Only one group: commands, boosts or custom.
        #[arg(short, long)]
        group: Option<String>,
        /// Print the reminders as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Add a custom reminder.
    Remind {
        #[arg(short, long)]
        user: u64,
        /// Channel the reminder is posted in.
        #[arg(long)]
        channel: u64,
        /// Countdown such as `1h 30m`.
        #[arg(long = "in")]
        delay: String,
        #[arg(short, long)]
        message: String,
    },
    /// Show a user's tracked prunes.
    Stats {
        #[arg(short, long)]
        user: u64,
    },
    /// Show or change an activity's base cooldown.
    Cooldown {
        /// Activity key such as `prune` or `quest-weekly`.
        #[arg(short, long)]
        activity: String,
        /// New cooldown such as `25m`.
        #[arg(long)]
        set: Option<String>,
    },
    /// Show configuration and storage health.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    // Logs go to stderr and a daily file; stdout carries channel actions.
    let log_dir = PathBuf::from(shellexpand(&cfg.sapling.data_dir)).join("logs");
    let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("sapling")
        .filename_suffix("log")
        .build(&log_dir)
        .map_err(|e| anyhow::anyhow!("failed to open log dir {}: {e}", log_dir.display()))?;
    let (file_writer, _log_guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.sapling.log_level)),
        )
        .with_writer(std::io::stderr.and(file_writer))
        .with_ansi(false)
        .init();

    match cli.command {
        Commands::Start => {
            if cfg.game.bot_id == 0 {
                anyhow::bail!("game.bot_id is not set. Set it in {}.", cli.config);
            }
            let store = Store::new(&cfg.memory).await?;
            let channel: Arc<dyn Channel> = Arc::new(JsonLinesChannel::stdio());
            let gw = Arc::new(Gateway::new(
                channel,
                Arc::new(build_dispatcher(&cfg, store.clone())),
                store,
                cfg.scheduler.clone(),
                Clock::Wall,
            ));
            gw.run().await?;
        }
        Commands::Replay { file } => {
            let store = Store::new(&cfg.memory).await?;
            let channel: Arc<dyn Channel> = Arc::new(JsonLinesChannel::replay_file(&file).await?);
            let mut scheduler = cfg.scheduler.clone();
            scheduler.enabled = false;
            let gw = Arc::new(Gateway::new(
                channel,
                Arc::new(build_dispatcher(&cfg, store.clone())),
                store.clone(),
                scheduler,
                Clock::MessageTime,
            ));
            gw.run().await?;
            eprintln!(
                "Replay finished: {} pending reminders",
                store.count_pending_reminders().await?
            );
        }
        Commands::Register { user } => {
            let store = Store::new(&cfg.memory).await?;
            let settings = store.create_user(user).await?;
            println!(
                "User {} registered ({} reminder settings).",
                settings.user_id,
                settings.reminders.len()
            );
        }
        Commands::Reminders { user, group, json } => {
            let group = group
                .as_deref()
                .map(str::parse::<ActivityGroup>)
                .transpose()?;
            let store = Store::new(&cfg.memory).await?;
            store.get_user(user).await?;
            let reminders = ReminderScheduler::new(store).list_active(user, group).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reminders)?);
                return Ok(());
            }
            if reminders.is_empty() {
                println!("No pending reminders for {user}.");
                return Ok(());
            }

            let now = Utc::now();
            for (heading, group) in [
                ("Commands", ActivityGroup::Commands),
                ("Boosts", ActivityGroup::Boosts),
                ("Custom", ActivityGroup::Custom),
            ] {
                let entries: Vec<_> = reminders
                    .iter()
                    .filter(|r| r.activity.group() == group)
                    .collect();
                if entries.is_empty() {
                    continue;
                }
                println!("{heading}:");
                for reminder in entries {
                    let label = if reminder.activity == Activity::Custom {
                        format!("custom #{}", reminder.custom_id)
                    } else {
                        reminder.activity.to_string()
                    };
                    println!(
                        "  {label:<16} {:<12} {}",
                        format_duration(reminder.end_time - now),
                        reminder.message
                    );
                }
            }
        }
        Commands::Remind {
            user,
            channel,
            delay,
            message,
        } => {
            let duration = parse_countdown(&delay)?;
            let store = Store::new(&cfg.memory).await?;
            store.get_user(user).await?;
            let reminder = ReminderScheduler::new(store)
                .insert(
                    &ReminderRequest {
                        subject: user,
                        activity: Activity::Custom,
                        channel_id: channel,
                        message,
                    },
                    duration,
                    Utc::now(),
                )
                .await?;
            println!(
                "Custom reminder #{} set for {} (in {}).",
                reminder.custom_id,
                reminder.end_time.format("%Y-%m-%d %H:%M:%S UTC"),
                format_duration(duration)
            );
        }
        Commands::Stats { user } => {
            let store = Store::new(&cfg.memory).await?;
            let settings = store.get_user(user).await?;
            let tracking = TrackingLog::new(store.pool().clone());
            let now = Utc::now();
            println!("Stats for {user}");
            println!(
                "Tracking: {}",
                if settings.tracking_enabled { "on" } else { "off" }
            );
            for (label, window) in [
                ("last 24h", chrono::TimeDelta::hours(24)),
                ("last 7d", chrono::TimeDelta::days(7)),
            ] {
                println!(
                    "Prunes ({label}): {}",
                    tracking.count_since(user, Activity::Prune, now - window).await?
                );
            }
            match tracking.last_entry(user, Activity::Prune).await? {
                Some((guild_id, at)) => println!(
                    "Last prune: {} ago (guild {guild_id})",
                    format_duration(now - at)
                ),
                None => println!("Last prune: never"),
            }
        }
        Commands::Cooldown { activity, set } => {
            let activity: Activity = activity.parse()?;
            let store = Store::new(&cfg.memory).await?;
            if let Some(countdown) = set {
                let cooldown = parse_countdown(&countdown)?;
                store.set_cooldown(activity, cooldown).await?;
                tracing::info!("cooldown for {activity} set to {}s", cooldown.num_seconds());
            }
            println!(
                "{activity}: {}",
                format_duration(store.get_cooldown(activity).await?)
            );
        }
        Commands::Status => {
            println!("Sapling status\n");
            println!("Config: {}", cli.config);
            println!("Database: {}", shellexpand(&cfg.memory.db_path));
            println!(
                "Game bot: {}",
                if cfg.game.bot_id == 0 {
                    "not configured".to_string()
                } else {
                    cfg.game.bot_id.to_string()
                }
            );
            println!(
                "Delivery: {}",
                if cfg.scheduler.enabled {
                    format!("every {}s", cfg.scheduler.poll_interval_secs)
                } else {
                    "disabled".to_string()
                }
            );
            match Store::new(&cfg.memory).await {
                Ok(store) => println!(
                    "Pending reminders: {}",
                    store.count_pending_reminders().await?
                ),
                Err(e) => println!("Storage: unavailable ({e})"),
            }
        }
    }

    Ok(())
}

/// Wire the classifiers to storage and configuration.
fn build_dispatcher(cfg: &Config, store: Store) -> Dispatcher {
    let services = Services {
        recent: Arc::new(RecentMessageIndex::new(
            chrono::TimeDelta::seconds(cfg.detection.recent_window_secs as i64),
            cfg.detection.recent_capacity,
        )),
        scheduler: ReminderScheduler::new(store.clone()),
        timing: TimeResolver::new(store.clone(), cfg.cooldowns.clone()),
        tracking: TrackingLog::new(store.pool().clone()),
        store,
    };
    Dispatcher::new(
        cfg.game.clone(),
        services,
        default_classifiers(),
        Duration::from_secs(cfg.detection.classifier_timeout_secs),
    )
}

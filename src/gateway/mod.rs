//! Gateway: the event loop connecting a channel, the dispatcher, and
//! reminder delivery.

mod scheduler;

use chrono::{DateTime, Utc};
use sapling_core::{config::SchedulerConfig, message::MessageEvent, traits::Channel};
use sapling_memory::Store;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::dispatch::Dispatcher;

/// Which instant a message is evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Wall-clock time of arrival. Used for live traffic.
    Wall,
    /// The instant the message itself was observed. Used for replays, so
    /// recorded traffic schedules the same reminders it did live.
    MessageTime,
}

pub struct Gateway {
    channel: Arc<dyn Channel>,
    dispatcher: Arc<Dispatcher>,
    store: Store,
    scheduler_config: SchedulerConfig,
    clock: Clock,
}

impl Gateway {
    pub fn new(
        channel: Arc<dyn Channel>,
        dispatcher: Arc<Dispatcher>,
        store: Store,
        scheduler_config: SchedulerConfig,
        clock: Clock,
    ) -> Self {
        Self {
            channel,
            dispatcher,
            store,
            scheduler_config,
            clock,
        }
    }

    /// Run until the channel is exhausted or a shutdown signal arrives.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "Sapling gateway running | channel: {} | delivery: {}",
            self.channel.name(),
            if self.scheduler_config.enabled {
                "enabled"
            } else {
                "disabled"
            },
        );

        let mut rx = self
            .channel
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("failed to start channel {}: {e}", self.channel.name()))?;

        let sched_handle = if self.scheduler_config.enabled {
            let store = self.store.clone();
            let channel = self.channel.clone();
            let config = self.scheduler_config.clone();
            Some(tokio::spawn(async move {
                Self::delivery_loop(store, channel, config).await;
            }))
        } else {
            None
        };

        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        info!("channel {} exhausted", self.channel.name());
                        break;
                    };
                    let gw = self.clone();
                    let span = info_span!("dispatch", id = %Uuid::new_v4(), message_id = event_message_id(&event));
                    in_flight.spawn(async move { gw.handle_event(event).await }.instrument(span));
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
            while let Some(done) = in_flight.try_join_next() {
                if let Err(e) = done {
                    error!("dispatch task failed: {e}");
                }
            }
        }

        // Let in-flight dispatches finish so their reminders are written.
        while let Some(done) = in_flight.join_next().await {
            if let Err(e) = done {
                error!("dispatch task failed: {e}");
            }
        }

        self.shutdown(&sched_handle).await;
        Ok(())
    }

    async fn handle_event(&self, event: MessageEvent) {
        let now = match self.clock {
            Clock::Wall => Utc::now(),
            Clock::MessageTime => event_time(&event),
        };
        let report = self.dispatcher.handle_at(&event, now).await;
        for action in report.actions() {
            if let Err(e) = self.channel.send(action).await {
                error!("failed to send action for message {}: {e}", report.message_id);
            }
        }
    }

    async fn shutdown(&self, sched_handle: &Option<tokio::task::JoinHandle<()>>) {
        info!("Shutting down...");
        if let Some(h) = sched_handle {
            h.abort();
        }
        if let Err(e) = self.channel.stop().await {
            error!("failed to stop channel {}: {e}", self.channel.name());
        }
        info!("Shutdown complete.");
    }
}

fn event_message_id(event: &MessageEvent) -> u64 {
    match event {
        MessageEvent::New { message } => message.id,
        MessageEvent::Edited { after, .. } => after.id,
    }
}

fn event_time(event: &MessageEvent) -> DateTime<Utc> {
    match event {
        MessageEvent::New { message } => message.observed_at(),
        MessageEvent::Edited { after, .. } => after.observed_at(),
    }
}

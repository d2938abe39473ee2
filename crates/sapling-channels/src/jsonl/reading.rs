//! Line reader loop and Channel trait implementation.

use super::{parse_event_line, JsonLinesChannel};
use async_trait::async_trait;
use sapling_core::{
    error::SaplingError,
    message::{MessageEvent, OutgoingMessage},
    traits::Channel,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[async_trait]
impl Channel for JsonLinesChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<mpsc::Receiver<MessageEvent>, SaplingError> {
        let input = self
            .input
            .lock()
            .await
            .take()
            .ok_or_else(|| SaplingError::Channel(format!("{} channel already started", self.name)))?;

        let (tx, rx) = mpsc::channel(64);
        let name = self.name.clone();

        info!("{name} channel reading events...");

        tokio::spawn(async move {
            let mut lines = input.lines();
            let mut line_no: u64 = 0;

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("{name} channel reached end of input");
                        return;
                    }
                    Err(e) => {
                        warn!("{name} channel read error, stopping: {e}");
                        return;
                    }
                };
                line_no += 1;

                let event = match parse_event_line(&line) {
                    Ok(Some(event)) => event,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("{name} line {line_no}: {e}");
                        continue;
                    }
                };

                if tx.send(event).await.is_err() {
                    info!("{name} channel receiver dropped, stopping reader");
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<(), SaplingError> {
        let mut line = serde_json::to_string(&message)?;
        line.push('\n');

        let mut output = self.output.lock().await;
        output
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SaplingError::Channel(format!("{} write failed: {e}", self.name)))?;
        output
            .flush()
            .await
            .map_err(|e| SaplingError::Channel(format!("{} flush failed: {e}", self.name)))?;

        debug!("{} sent {}", self.name, line.trim_end());
        Ok(())
    }

    async fn stop(&self) -> Result<(), SaplingError> {
        info!("{} channel stopped", self.name);
        Ok(())
    }
}

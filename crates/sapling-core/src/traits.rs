use crate::{
    error::SaplingError,
    message::{MessageEvent, OutgoingMessage},
};
use async_trait::async_trait;

/// Messaging Channel trait: the link to the chat platform.
///
/// A channel yields observed message events and carries outbound actions
/// (posts and reactions) back to the platform.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for message events.
    /// Returns a receiver that yields events until the source is exhausted.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<MessageEvent>, SaplingError>;

    /// Deliver an outbound action.
    async fn send(&self, message: OutgoingMessage) -> Result<(), SaplingError>;

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), SaplingError> {
        Ok(())
    }
}

//! JSON-lines channel.
//!
//! One `MessageEvent` per input line; every outbound action is written as
//! one JSON object per output line. A platform bridge pipes events in and
//! reads actions back, so the engine never talks to the chat API itself.

mod reading;


use sapling_core::{error::SaplingError, message::MessageEvent};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::Mutex;

type EventInput = Box<dyn AsyncBufRead + Send + Unpin>;
type ActionOutput = Box<dyn AsyncWrite + Send + Unpin>;

/// Channel over a line-oriented byte stream pair.
pub struct JsonLinesChannel {
    name: String,
    /// Taken by `start`; a channel can only be started once.
    input: Mutex<Option<EventInput>>,
    output: Arc<Mutex<ActionOutput>>,
}

impl JsonLinesChannel {
    /// Create a channel reading events from `input` and writing actions to `output`.
    pub fn new<R, W>(name: &str, input: R, output: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            name: name.to_string(),
            input: Mutex::new(Some(Box::new(BufReader::new(input)))),
            output: Arc::new(Mutex::new(Box::new(output))),
        }
    }

    /// Events on stdin, actions on stdout.
    pub fn stdio() -> Self {
        Self::new("stdio", tokio::io::stdin(), tokio::io::stdout())
    }

    /// Events from a recorded file, actions on stdout.
    pub async fn replay_file(path: &Path) -> Result<Self, SaplingError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new("replay", file, tokio::io::stdout()))
    }
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_event_line(line: &str) -> Result<Option<MessageEvent>, SaplingError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line)
        .map(Some)
        .map_err(|e| SaplingError::Channel(format!("invalid event line: {e}")))
}

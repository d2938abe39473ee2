use thiserror::Error;

/// Top-level error type for Sapling.
#[derive(Debug, Error)]
pub enum SaplingError {
    /// The actor has no stored settings. Callers skip; nothing is created implicitly.
    #[error("user {0} is not registered")]
    NotRegistered(u64),

    /// A reminder or recent-message lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// An expected sub-pattern was absent from a recognized message.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A bounded operation did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Memory/storage error.
    #[error("memory error: {0}")]
    Memory(String),

    /// Error from a messaging channel.
    #[error("channel error: {0}")]
    Channel(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

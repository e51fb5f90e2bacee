/// Error types for the feed synchronization engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("History error: {0}")]
    History(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Identity error: {0}")]
    Identity(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;

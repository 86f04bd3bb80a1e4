/// Error types for the chat synchronization core
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("All {operation} endpoints failed: {detail}")]
    EndpointsExhausted {
        operation: &'static str,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, ChatError>;

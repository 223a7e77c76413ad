//! Error types for Hindsight

use thiserror::Error;

/// Main error type for Hindsight operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("frame payload is empty")]
    EmptyPayload,

    #[error("frame payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// Result type alias using Hindsight's Error
pub type Result<T> = std::result::Result<T, Error>;

//! Session errors

use thiserror::Error;

/// Errors raised by the recording session and replay tasks
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("capture environment is not ready")]
    NotReady,

    #[error("a replay task is already running")]
    Busy,

    #[error("replay window {start_ms}..{end_ms} is empty or inverted")]
    InvalidWindow { start_ms: i64, end_ms: i64 },

    #[error("no keyframe cached at or after {0}")]
    NoAnchor(i64),

    #[error("stream position {0} was evicted, the window is gone")]
    WindowLost(i64),

    #[error("gave up waiting for new frames after {retries} retries")]
    WaitBudgetExhausted { retries: u32 },

    #[error("replay cancelled")]
    Cancelled,

    #[error("cache error: {0}")]
    Cache(#[from] hindsight_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

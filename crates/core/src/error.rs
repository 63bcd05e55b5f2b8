// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The catalog refused the request because of its rate limit (HTTP 429)
    #[error("Request limit reached: {0}")]
    RateLimited(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Queue closed: {0}")]
    QueueClosed(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Work abandoned because shutdown was requested
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True when the error was derived from shutdown rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

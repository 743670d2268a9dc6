//! Common error types for rtag

use thiserror::Error;

/// Common result type for rtag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across rtag crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding of a stored column or telemetry document
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Replay telemetry could not be produced or is unusable
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

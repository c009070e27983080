//! Common error types for the fish crates

use thiserror::Error;

/// Common result type for fish-common operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by the playlist store and configuration loading
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error while persisting playlist state
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

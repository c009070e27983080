//! Error types for fish-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use std::time::Duration;
use thiserror::Error;

/// Main error type for fish-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio decoding errors (malformed WAV/MP3)
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// File extension with no decoder
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Playback did not finish within its expected duration plus margin
    #[error("Playback timed out after {timeout:?}")]
    PlaybackTimeout { timeout: Duration },

    /// Motor line write failures
    #[error("Motor error: {0}")]
    Motor(#[from] MotorError),

    /// Request that cannot be served as given (e.g. a sound name with a path)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Speech synthesis service errors
    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    /// Playlist persistence errors
    #[error("Playlist error: {0}")]
    Playlist(#[from] fish_common::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to drive one of the H-bridge control lines
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MotorError {
    /// Writing a control line failed
    #[error("failed to set {line} line: {reason}")]
    Line { line: &'static str, reason: String },

    /// Opening or requesting GPIO lines failed
    #[error("GPIO setup failed: {0}")]
    Setup(String),
}

/// Convenience Result type using fish-player Error
pub type Result<T> = std::result::Result<T, Error>;

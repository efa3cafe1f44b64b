//! Error types for the Conference Concierge.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, connecting to the remote agent,
//! dispatching turns, and consuming turn streams.

use thiserror::Error;

/// Unified error type for the Conference Concierge.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Only `Connection` is fatal to startup; `Dispatch`, `Stream` and `Busy`
/// are reported to the user and the conversation carries on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote agent could not be reached or initialized
    #[error("Connection error: {0}")]
    Connection(String),

    /// The remote agent rejected a turn
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// A turn stream broke before it completed
    #[error("Stream error: {0}")]
    Stream(String),

    /// A turn is already in flight for this conversation
    #[error("A response is still being generated; wait for it to finish")]
    Busy,

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Whether the conversation can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Dispatch(_) | AppError::Stream(_) | AppError::Busy
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

//! MusterBot error type.

use thiserror::Error;

/// Errors surfaced by MusterBot components.
#[derive(Debug, Error)]
pub enum MusterError {
    /// Chat transport failure (send failed, malformed API response).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Persistence failure (sqlite open/read/write).
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration failure (unreadable file, bad value).
    #[error("Config error: {0}")]
    Config(String),

    /// Malformed user-supplied input (dates, times).
    #[error("Parse error: {0}")]
    Parse(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type used throughout MusterBot.
pub type Result<T> = std::result::Result<T, MusterError>;

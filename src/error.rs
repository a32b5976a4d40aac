//! Error types for the Floodgate engine and service.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// A limiter was configured with a zero window or a zero request budget
    #[error("Invalid limiter configuration: {0}")]
    InvalidConfig(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request named a limiter that is not registered
    #[error("Unknown limiter: {0}")]
    UnknownLimiter(String),

    /// Malformed decision service requests
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for FloodgateError {
    fn from(err: config::ConfigError) -> Self {
        FloodgateError::Config(err.to_string())
    }
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;

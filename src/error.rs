//! Error types for the Floodgate library.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A window script replied with something other than the expected
    /// array of integers
    #[error("Unexpected script reply")]
    UnexpectedReply,

    /// Window size below one millisecond
    #[error("Window size must be at least 1 millisecond")]
    InvalidSize,

    /// Zero limit
    #[error("Limit must be greater than 0")]
    InvalidLimit,

    /// A limiter was built without any limits
    #[error("At least one limit is required")]
    NoLimits,

    /// Errors from the Redis client
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;

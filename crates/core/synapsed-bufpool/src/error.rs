//! Error types for the buffer pool.
//!
//! Construction problems, rejected requests and arena exhaustion are all
//! reported through [`BufferPoolError`] so callers can match on the failure
//! class without parsing messages.

use std::fmt;
use thiserror::Error;

/// Type alias for Results using `BufferPoolError`
pub type Result<T> = std::result::Result<T, BufferPoolError>;

/// Main error type for buffer pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferPoolError {
    /// Invalid page/block geometry or an unreadable configuration source.
    /// The pool is never created when this is returned.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A request the pool refuses to serve (zero-length buffer, write past
    /// the end of a view). Pool state is unchanged.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The arena could not grow far enough to carve a new segment
    #[error("Out of memory: cannot grow arena of {current} bytes by {requested} bytes")]
    OutOfMemory {
        /// Bytes the arena needed to add
        requested: usize,
        /// Arena length at the time of the failure
        current: usize,
    },

    /// A view that was not issued by this pool
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),
}

impl BufferPoolError {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    /// Create a new invalid buffer error
    pub fn invalid_buffer<T: fmt::Display>(msg: T) -> Self {
        Self::InvalidBuffer(msg.to_string())
    }

    /// Check if this error was caused by the caller's input
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidBuffer(_))
    }

    /// Check if this error aborts the operation that raised it without any
    /// way for the caller to retry with the same input
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::OutOfMemory { .. })
    }

    /// Check if the arena ran out of capacity
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

impl From<std::io::Error> for BufferPoolError {
    fn from(err: std::io::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<toml::de::Error> for BufferPoolError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = BufferPoolError::config("blockSize must be a power of 2");
        assert_eq!(
            err,
            BufferPoolError::Configuration("blockSize must be a power of 2".to_string())
        );
        assert_eq!(
            err.to_string(),
            "Configuration error: blockSize must be a power of 2"
        );
    }

    #[test]
    fn test_error_classification() {
        let arg = BufferPoolError::invalid_argument("size must be positive");
        assert!(arg.is_client_error());
        assert!(!arg.is_fatal());

        let oom = BufferPoolError::OutOfMemory {
            requested: 1024,
            current: 4096,
        };
        assert!(oom.is_fatal());
        assert!(oom.is_out_of_memory());
        assert!(!oom.is_client_error());

        let foreign = BufferPoolError::invalid_buffer("issued by pool 7");
        assert!(foreign.is_client_error());
    }

    #[test]
    fn test_error_conversions() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "pool.toml");
        let err: BufferPoolError = io_err.into();
        assert!(matches!(err, BufferPoolError::Configuration(_)));
    }
}

//! Directory error types.
//!
//! Error messages must not leak bind credentials. Filters and DNs are fine to
//! include; they are what an operator needs to diagnose a failed search.

use thiserror::Error;

/// Errors that can occur while querying a directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// A required argument was missing. No search was issued.
    #[error("Missing required argument: {0}")]
    Precondition(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection to the directory failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Bind (authentication of the service account) failed.
    #[error("Bind failed: {0}")]
    Bind(String),

    /// Search operation failed.
    #[error("Search failed: {0}")]
    Search(String),

    /// The server stopped returning entries because of a size limit.
    ///
    /// The orchestrator treats this as completion with partial results.
    #[error("Size limit exceeded")]
    SizeLimitExceeded,

    /// A `name;range=low-high` specifier could not be parsed.
    #[error("Invalid range specifier: {0}")]
    InvalidRange(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Protocol error reported by the client.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal error.
    #[error("Internal directory error: {0}")]
    Internal(String),
}

impl DirectoryError {
    /// Creates a precondition error.
    #[must_use]
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a search error.
    #[must_use]
    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }

    /// Creates a protocol error.
    #[must_use]
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Checks if this condition means "stop, but keep what you have".
    #[must_use]
    pub const fn is_partial_result(&self) -> bool {
        matches!(self, Self::SizeLimitExceeded)
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Bind(_) | Self::Timeout(_))
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

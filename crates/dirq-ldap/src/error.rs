//! LDAP-specific error types.
//!
//! ## Security Note
//!
//! Error messages must not leak bind credentials.

use dirq_core::DirectoryError;
use thiserror::Error;

/// LDAP-specific errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Invalid configuration.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// Plain `ldap://` without StartTLS while TLS is required.
    #[error("Security error: TLS is required. Use an 'ldaps://' URL or enable StartTLS.")]
    InsecureProtocol,

    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// Bind (authentication) failed.
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// Search operation failed.
    #[error("LDAP search failed: {0}")]
    Search(String),

    /// The server ended a search because of a size limit.
    #[error("LDAP size limit exceeded")]
    SizeLimitExceeded,

    /// Timeout error.
    #[error("LDAP operation timed out")]
    Timeout,

    /// Underlying ldap3 error.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

impl LdapError {
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

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout)
    }

    /// Checks if this is a security-related error.
    #[must_use]
    pub const fn is_security_error(&self) -> bool {
        matches!(self, Self::InsecureProtocol | Self::Bind(_))
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for DirectoryError {
    fn from(err: LdapError) -> Self {
        match err {
            LdapError::Configuration(msg) => Self::Configuration(msg),
            LdapError::InsecureProtocol => Self::Configuration(err.to_string()),
            LdapError::Connection(msg) => Self::Connection(msg),
            LdapError::Bind(msg) => Self::Bind(msg),
            LdapError::Search(msg) => Self::Search(msg),
            LdapError::SizeLimitExceeded => Self::SizeLimitExceeded,
            LdapError::Timeout => Self::Timeout("LDAP operation".to_string()),
            LdapError::Ldap3(e) => Self::Protocol(e.to_string()),
        }
    }
}

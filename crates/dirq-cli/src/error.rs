//! CLI error types.

use dirq_core::DirectoryError;
use dirq_ldap::LdapError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection settings rejected.
    #[error(transparent)]
    Ldap(#[from] LdapError),

    /// Directory operation failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Entry not found.
    #[error("{kind} not found: {name}")]
    NotFound {
        /// Kind of entry.
        kind: &'static str,
        /// Name that was looked up.
        name: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

//! LDAP connection configuration.
//!
//! ## Security Requirements
//!
//! By default TLS is required: the connection URL must use `ldaps://`, or
//! `ldap://` with StartTLS enabled. Plain `ldap://` transmits the bind
//! credential in cleartext and is only accepted with `require_tls(false)`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LdapError, LdapResult};

/// LDAP connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server URL (`ldaps://host:636` or `ldap://host:389`).
    pub connection_url: String,

    /// Bind DN for the service account.
    pub bind_dn: String,

    /// Bind credential (password).
    #[serde(skip_serializing, default)]
    pub bind_credential: String,

    /// Whether plain connections must be upgraded with StartTLS.
    pub starttls: bool,

    /// Whether to validate server certificates.
    /// Should always be true in production.
    pub validate_certificates: bool,

    /// Whether connections without TLS are rejected.
    pub require_tls: bool,

    /// Connection timeout.
    pub connection_timeout: Duration,

    /// Timeout applied to every operation.
    pub operation_timeout: Duration,
}

impl LdapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapConfigBuilder {
        LdapConfigBuilder::new()
    }

    /// Validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns [`LdapError::InsecureProtocol`] when TLS is required but the URL
    /// is plain `ldap://` without StartTLS, and a configuration error for a
    /// malformed URL or an empty bind DN.
    pub fn validate(&self) -> LdapResult<()> {
        let url = Url::parse(&self.connection_url)
            .map_err(|e| LdapError::config(format!("invalid connection_url: {e}")))?;

        match url.scheme() {
            "ldaps" => {}
            "ldap" if self.starttls || !self.require_tls => {}
            "ldap" => return Err(LdapError::InsecureProtocol),
            other => {
                return Err(LdapError::config(format!(
                    "unsupported URL scheme '{other}', expected ldap or ldaps"
                )));
            }
        }

        if url.host_str().is_none_or(str::is_empty) {
            return Err(LdapError::config("connection_url is missing a host"));
        }

        if self.bind_dn.is_empty() {
            return Err(LdapError::config("bind_dn cannot be empty"));
        }

        Ok(())
    }

    /// Whether the connection is encrypted.
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.starttls || self.connection_url.to_lowercase().starts_with("ldaps://")
    }
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for LDAP configuration.
#[derive(Debug, Default)]
pub struct LdapConfigBuilder {
    connection_url: Option<String>,
    bind_dn: Option<String>,
    bind_credential: Option<String>,
    starttls: bool,
    validate_certificates: bool,
    require_tls: bool,
    connection_timeout: Duration,
    operation_timeout: Duration,
}

impl LdapConfigBuilder {
    /// Creates a new builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            validate_certificates: true,
            require_tls: true,
            connection_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(30),
            ..Default::default()
        }
    }

    /// Sets the connection URL.
    #[must_use]
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    /// Sets the bind DN.
    #[must_use]
    pub fn bind_dn(mut self, dn: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self
    }

    /// Sets the bind credential (password).
    #[must_use]
    pub fn bind_credential(mut self, credential: impl Into<String>) -> Self {
        self.bind_credential = Some(credential.into());
        self
    }

    /// Upgrades plain connections with StartTLS.
    #[must_use]
    pub const fn starttls(mut self, enabled: bool) -> Self {
        self.starttls = enabled;
        self
    }

    /// Sets whether to validate certificates.
    #[must_use]
    pub const fn validate_certificates(mut self, validate: bool) -> Self {
        self.validate_certificates = validate;
        self
    }

    /// Sets whether connections without TLS are rejected.
    #[must_use]
    pub const fn require_tls(mut self, required: bool) -> Self {
        self.require_tls = required;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the operation timeout.
    #[must_use]
    pub const fn operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// ## Errors
    ///
    /// Returns an error if:
    /// - Required fields are missing
    /// - TLS is required and the URL is plain `ldap://` without StartTLS
    pub fn build(self) -> LdapResult<LdapConfig> {
        let config = LdapConfig {
            connection_url: self
                .connection_url
                .ok_or_else(|| LdapError::config("connection_url is required"))?,
            bind_dn: self
                .bind_dn
                .ok_or_else(|| LdapError::config("bind_dn is required"))?,
            bind_credential: self
                .bind_credential
                .ok_or_else(|| LdapError::config("bind_credential is required"))?,
            starttls: self.starttls,
            validate_certificates: self.validate_certificates,
            require_tls: self.require_tls,
            connection_timeout: self.connection_timeout,
            operation_timeout: self.operation_timeout,
        };

        config.validate()?;

        Ok(config)
    }
}

//! CLI configuration.
//!
//! ```toml
//! output_format = "table"
//!
//! [ldap]
//! url = "ldaps://dc01.example.com"
//! bind_dn = "CN=svc-dirq,OU=Service Accounts,DC=example,DC=com"
//! bind_credential = "..."
//!
//! [search]
//! base_dn = "DC=example,DC=com"
//! page_size = 500
//!
//! [search.referrals]
//! enabled = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use dirq_core::SearchConfig;
use dirq_ldap::LdapConfig;
use serde::{Deserialize, Serialize};

use crate::{CliError, CliResult};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Output format.
    pub output_format: OutputFormat,

    /// Server connection.
    pub ldap: LdapSection,

    /// Search engine settings.
    pub search: SearchConfig,
}

/// `[ldap]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapSection {
    /// Server URL (e.g., ldaps://dc01.example.com:636).
    pub url: String,

    /// Service account DN.
    pub bind_dn: String,

    /// Service account password.
    #[serde(skip_serializing)]
    pub bind_credential: String,

    /// Upgrade plain connections with StartTLS.
    pub starttls: bool,

    /// Validate server certificates.
    pub validate_certificates: bool,

    /// Reject connections without TLS.
    pub require_tls: bool,

    /// Connection timeout in seconds.
    pub connection_timeout_secs: u64,

    /// Operation timeout in seconds.
    pub operation_timeout_secs: u64,
}

impl Default for LdapSection {
    fn default() -> Self {
        Self {
            url: "ldaps://localhost:636".to_string(),
            bind_dn: String::new(),
            bind_credential: String::new(),
            starttls: false,
            validate_certificates: true,
            require_tls: true,
            connection_timeout_secs: 5,
            operation_timeout_secs: 30,
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing default file yields the defaults; a missing explicit file is
    /// an error.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path()?, false),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::parse(&content)
        } else if explicit {
            Err(CliError::Config(format!(
                "configuration file not found: {}",
                config_path.display()
            )))
        } else {
            Ok(Self::default())
        }
    }

    /// Parses TOML configuration.
    pub fn parse(content: &str) -> CliResult<Self> {
        toml::from_str(content)
            .map_err(|e| CliError::Config(format!("failed to parse config: {e}")))
    }

    /// Renders the configuration as TOML, without the bind credential.
    pub fn to_toml(&self) -> CliResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("failed to serialize config: {e}")))
    }

    /// Gets the default configuration file path.
    pub fn config_path() -> CliResult<PathBuf> {
        let home = dirs_next::home_dir()
            .ok_or_else(|| CliError::Config("could not determine home directory".to_string()))?;
        Ok(home.join(".dirq").join("dirq.toml"))
    }

    /// Applies command-line overrides.
    pub fn apply_overrides(
        &mut self,
        url: Option<&str>,
        base_dn: Option<&str>,
        bind_credential: Option<&str>,
    ) {
        if let Some(url) = url {
            self.ldap.url = url.to_string();
        }
        if let Some(base_dn) = base_dn {
            self.search.base_dn = base_dn.to_string();
        }
        if let Some(credential) = bind_credential {
            self.ldap.bind_credential = credential.to_string();
        }
    }

    /// Builds the connection configuration.
    pub fn ldap_config(&self) -> CliResult<LdapConfig> {
        let config = LdapConfig::builder()
            .connection_url(&self.ldap.url)
            .bind_dn(&self.ldap.bind_dn)
            .bind_credential(&self.ldap.bind_credential)
            .starttls(self.ldap.starttls)
            .validate_certificates(self.ldap.validate_certificates)
            .require_tls(self.ldap.require_tls)
            .connection_timeout(Duration::from_secs(self.ldap.connection_timeout_secs))
            .operation_timeout(Duration::from_secs(self.ldap.operation_timeout_secs))
            .build()?;
        Ok(config)
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
    /// Distinguished names only.
    Quiet,
}

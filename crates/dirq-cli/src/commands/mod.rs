//! Command implementations.

pub mod config;
pub mod group;
pub mod search;
pub mod user;

use std::sync::Arc;

use dirq_core::Directory;
use dirq_ldap::{LdapConnector, object_guid_parser};
use tracing::debug;

pub use config::run_config;
pub use group::run_group;
pub use search::{run_deleted, run_find, run_search};
pub use user::run_user;

use crate::CliResult;
use crate::cli::Command;
use crate::config::{CliConfig, OutputFormat};

/// Runs a command against the configured directory.
pub async fn run(command: Command, config: &CliConfig, format: OutputFormat) -> CliResult<()> {
    if let Command::Config = command {
        return run_config(config);
    }

    let directory = connect(config)?;
    match command {
        Command::Find(args) => run_find(&directory, args, format).await,
        Command::User(cmd) => run_user(&directory, cmd, format).await,
        Command::Group(cmd) => run_group(&directory, cmd, format).await,
        Command::Search(args) => run_search(&directory, args, format).await,
        Command::Deleted { filter } => run_deleted(&directory, filter, format).await,
        Command::Config => run_config(config),
    }
}

/// Builds the directory facade over an LDAP connector.
///
/// No connection is opened here; every search binds its own.
pub fn connect(config: &CliConfig) -> CliResult<Directory> {
    let connector = LdapConnector::new(config.ldap_config()?)?;
    debug!(url = %config.ldap.url, base_dn = %config.search.base_dn, "Directory configured");

    let directory = Directory::new(Arc::new(connector), config.search.clone())?
        .with_entry_parser(object_guid_parser());
    Ok(directory)
}

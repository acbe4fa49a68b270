//! # dirq-ldap
//!
//! `ldap3` implementation of the `dirq-core` connector traits.
//!
//! [`LdapConnector`] opens and binds one connection per logical search, runs
//! primitive searches through the paged-results adapter, attaches the
//! show-deleted control on request, and reports continuation references and
//! size-limit outcomes the way the engine expects them.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod guid;

pub use config::{LdapConfig, LdapConfigBuilder};
pub use connection::{LdapConnection, LdapConnector};
pub use error::{LdapError, LdapResult};
pub use guid::{format_guid, object_guid_parser};

//! # dirq-cli
//!
//! Command-line front-end for the dirq directory engine.
//!
//! This crate provides:
//! - Classified searches (`find`) with optional membership enrichment
//! - User and group lookups by name or DN
//! - Transitive group membership and member expansion
//! - Raw searches and deleted-object listing

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use config::CliConfig;
pub use error::{CliError, CliResult};

//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dirq_core::{MembershipScope, SearchScope};

use crate::config::OutputFormat;

/// dirq - query directory servers and resolve group membership.
#[derive(Debug, Parser)]
#[command(name = "dirq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (defaults to ~/.dirq/dirq.toml).
    #[arg(short, long, env = "DIRQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// LDAP server URL (overrides config).
    #[arg(short, long, env = "DIRQ_URL")]
    pub url: Option<String>,

    /// Base DN (overrides config).
    #[arg(short, long, env = "DIRQ_BASE_DN")]
    pub base_dn: Option<String>,

    /// Bind credential (overrides config).
    #[arg(long, env = "DIRQ_BIND_CREDENTIAL", hide_env_values = true)]
    pub bind_credential: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Find and classify entries into users, groups and other objects.
    Find(FindArgs),

    /// User commands.
    #[command(subcommand)]
    User(UserCommand),

    /// Group commands.
    #[command(subcommand)]
    Group(GroupCommand),

    /// Raw search returning every matching entry.
    Search(SearchArgs),

    /// List tombstoned objects.
    Deleted {
        /// Additional filter.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show the effective configuration.
    Config,
}

/// Arguments of `find`.
#[derive(Debug, Args)]
pub struct FindArgs {
    /// RFC 4515 filter; all users, groups and other objects when omitted.
    pub filter: Option<String>,

    /// Attributes to return (repeatable); per-kind defaults when omitted.
    #[arg(short, long = "attribute")]
    pub attributes: Vec<String>,

    /// Resolve group membership for these kinds of entries.
    #[arg(long, value_enum, default_value = "none")]
    pub membership: MembershipArg,
}

/// Arguments of `search`.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// RFC 4515 filter.
    pub filter: String,

    /// Search scope.
    #[arg(short, long, value_enum, default_value = "sub")]
    pub scope: ScopeArg,

    /// Attributes to return (repeatable); all when omitted.
    #[arg(short, long = "attribute")]
    pub attributes: Vec<String>,

    /// Maximum number of entries.
    #[arg(long)]
    pub size_limit: Option<u32>,
}

/// User commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Get a user by account name, principal name or DN.
    Get {
        /// sAMAccountName, userPrincipalName or DN.
        name: String,

        /// Include resolved group membership.
        #[arg(long)]
        groups: bool,
    },

    /// List users.
    List {
        /// Additional filter.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Check whether a user exists.
    Exists {
        /// sAMAccountName, userPrincipalName or DN.
        name: String,
    },

    /// List every group a user belongs to, directly or through nesting.
    Groups {
        /// sAMAccountName, userPrincipalName or DN.
        name: String,
    },

    /// Check whether a user is a member of a group, directly or through nesting.
    MemberOf {
        /// sAMAccountName, userPrincipalName or DN.
        user: String,

        /// Group common name or DN.
        group: String,
    },
}

/// Group commands.
#[derive(Debug, Subcommand)]
pub enum GroupCommand {
    /// Get a group by common name or DN.
    Get {
        /// Common name or DN.
        name: String,

        /// Include resolved parent groups.
        #[arg(long)]
        groups: bool,
    },

    /// List groups.
    List {
        /// Additional filter.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Check whether a group exists.
    Exists {
        /// Common name or DN.
        name: String,
    },

    /// List every group containing this group, directly or through nesting.
    Parents {
        /// Group DN.
        dn: String,
    },

    /// List every user in a group, including members of nested groups.
    Members {
        /// Common name or DN.
        name: String,
    },
}

/// Search scope argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    /// The base entry only.
    Base,
    /// Direct children of the base.
    One,
    /// The whole subtree.
    Sub,
}

impl From<ScopeArg> for SearchScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Base => Self::Base,
            ScopeArg::One => Self::OneLevel,
            ScopeArg::Sub => Self::Subtree,
        }
    }
}

/// Membership enrichment argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MembershipArg {
    /// No enrichment.
    None,
    /// Users only.
    User,
    /// Groups only.
    Group,
    /// Users and groups.
    All,
}

impl From<MembershipArg> for MembershipScope {
    fn from(arg: MembershipArg) -> Self {
        match arg {
            MembershipArg::None => Self::None,
            MembershipArg::User => Self::User,
            MembershipArg::Group => Self::Group,
            MembershipArg::All => Self::All,
        }
    }
}

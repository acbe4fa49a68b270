//! # dirq-core
//!
//! Query orchestration over an LDAP-family directory.
//!
//! This crate answers higher-level questions ("which groups is this user in",
//! "who belongs to this group", "find every entry matching this filter") by
//! composing primitive protocol searches into paged, recursive, multi-round
//! workflows:
//!
//! - [`search::Searcher`] runs one logical search: paging, range-attribute
//!   reassembly and referral chasing, joined before completion.
//! - [`membership::GroupResolver`] resolves the transitive set of groups an
//!   entry belongs to, terminating on cyclic membership graphs.
//! - [`members::MemberExpander`] expands a group into its (nested) users,
//!   fanning member lookups out in bounded chunks.
//! - [`finder::Finder`] classifies a broad search into users, groups and
//!   everything else.
//!
//! The wire client is not part of this crate. It plugs in through the
//! [`connector`] traits; `dirq-ldap` provides the `ldap3` implementation and
//! [`memory::MemoryDirectory`] an in-memory one.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod connector;
pub mod directory;
pub mod entry;
pub mod error;
pub mod filter;
pub mod finder;
pub mod members;
pub mod membership;
pub mod memory;
pub mod query;
pub mod range;
pub mod search;
pub mod set;

pub use config::{DefaultAttributes, ReferralConfig, SearchConfig};
pub use connector::{
    DirectoryConnection, DirectoryConnector, EntryStream, RawEntry, SearchControl, SearchItem,
    SearchRequest, SearchScope,
};
pub use directory::Directory;
pub use entry::{DirectoryEntry, EntryKind};
pub use error::{DirectoryError, DirectoryResult};
pub use finder::{FindResult, Finder};
pub use members::MemberExpander;
pub use membership::GroupResolver;
pub use query::{EntryParser, MembershipScope, QueryParameters};
pub use range::RangeCursor;
pub use search::Searcher;
pub use set::{EntrySet, MembershipPath, RecursionGuard};

//! Protocol client seam.
//!
//! The engine never talks to the wire itself. A [`DirectoryConnector`] opens
//! (and binds) connections, a [`DirectoryConnection`] runs primitive searches
//! and is unbound exactly once by the logical search that opened it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryResult;

/// OID of the Active Directory "show deleted objects" control.
pub const SHOW_DELETED_OID: &str = "1.2.840.113556.1.4.417";

/// LDAP search scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchScope {
    /// Search only the base DN.
    #[serde(rename = "base")]
    Base,
    /// Search one level below the base DN.
    #[serde(rename = "one")]
    OneLevel,
    /// Search the entire subtree.
    #[default]
    #[serde(rename = "sub")]
    Subtree,
}

/// Controls attached to a primitive search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchControl {
    /// Server-side paging with the given page size.
    PagedResults {
        /// Entries per page.
        size: u32,
    },
    /// Include tombstoned (deleted) objects.
    ShowDeleted,
}

/// One primitive protocol search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Search base.
    pub base_dn: String,
    /// Search scope.
    pub scope: SearchScope,
    /// RFC 4515 filter.
    pub filter: String,
    /// Requested attributes; empty means all user attributes.
    pub attributes: Vec<String>,
    /// Client-requested size limit.
    pub size_limit: Option<u32>,
    /// Client-requested time limit in seconds.
    pub time_limit: Option<u32>,
    /// Controls to attach.
    pub controls: Vec<SearchControl>,
}

impl SearchRequest {
    /// Creates a request with no limits and no controls.
    #[must_use]
    pub fn new(base_dn: impl Into<String>, scope: SearchScope, filter: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            scope,
            filter: filter.into(),
            attributes: Vec::new(),
            size_limit: None,
            time_limit: None,
            controls: Vec::new(),
        }
    }

    /// Sets the requested attributes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Adds a control.
    #[must_use]
    pub fn with_control(mut self, control: SearchControl) -> Self {
        self.controls.push(control);
        self
    }

    /// Returns the paged results size if paging was requested.
    #[must_use]
    pub fn page_size(&self) -> Option<u32> {
        self.controls.iter().find_map(|c| match c {
            SearchControl::PagedResults { size } => Some(*size),
            SearchControl::ShowDeleted => None,
        })
    }

    /// Whether the show-deleted control is attached.
    #[must_use]
    pub fn shows_deleted(&self) -> bool {
        self.controls.contains(&SearchControl::ShowDeleted)
    }
}

/// A record as produced by the protocol client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    /// Distinguished name.
    pub dn: String,
    /// Text attributes.
    pub attrs: HashMap<String, Vec<String>>,
    /// Binary attributes.
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
    /// OIDs of response controls attached to the entry. Protocol-only.
    pub controls: Vec<String>,
}

/// An item from a search result stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchItem {
    /// A matched entry.
    Entry(RawEntry),
    /// A continuation reference with one or more URLs.
    Referral(Vec<String>),
}

/// The result stream of one primitive search.
#[async_trait]
pub trait EntryStream: Send {
    /// Returns the next item, `None` at a successful end of stream.
    ///
    /// ## Errors
    ///
    /// [`DirectoryError::SizeLimitExceeded`](crate::DirectoryError::SizeLimitExceeded)
    /// when the server cut the result set short; any other error is a failure
    /// of the search.
    async fn next(&mut self) -> DirectoryResult<Option<SearchItem>>;
}

/// A bound connection to a directory server.
///
/// Connections are shared (through `Arc`) between the primary search of a
/// logical search and its range follow-ups, so every method takes `&self`.
#[async_trait]
pub trait DirectoryConnection: Send + Sync {
    /// Starts a primitive search.
    async fn search(&self, request: SearchRequest) -> DirectoryResult<Box<dyn EntryStream>>;

    /// Releases the connection.
    async fn unbind(&self) -> DirectoryResult<()>;
}

/// Opens connections.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Opens and binds a connection.
    ///
    /// `target` is `None` for the configured server, or a referral URL
    /// (`ldap://host[:port]/...`) to connect to another server.
    async fn connect(&self, target: Option<&str>) -> DirectoryResult<Arc<dyn DirectoryConnection>>;
}

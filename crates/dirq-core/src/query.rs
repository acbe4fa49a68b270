//! Parameters of one logical search.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::connector::SearchScope;
use crate::entry::{DirectoryEntry, EntryKind};

/// Which classified entries get their group membership resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipScope {
    /// No enrichment.
    #[default]
    None,
    /// Users only.
    User,
    /// Groups only.
    Group,
    /// Users and groups.
    All,
}

impl MembershipScope {
    /// Whether entries of `kind` are enriched.
    #[must_use]
    pub const fn includes(self, kind: EntryKind) -> bool {
        matches!(
            (self, kind),
            (Self::User | Self::All, EntryKind::User) | (Self::Group | Self::All, EntryKind::Group)
        )
    }

    /// Whether any enrichment was requested.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Post-processing hook applied to every entry before it is emitted.
///
/// Meant for value transformation (decoding, normalizing), not for changing
/// the identity of an entry.
#[derive(Clone)]
pub struct EntryParser(Arc<dyn Fn(&mut DirectoryEntry) + Send + Sync>);

impl EntryParser {
    /// Wraps a closure.
    pub fn new<F>(parse: F) -> Self
    where
        F: Fn(&mut DirectoryEntry) + Send + Sync + 'static,
    {
        Self(Arc::new(parse))
    }

    /// Applies the hook.
    pub fn apply(&self, entry: &mut DirectoryEntry) {
        (self.0)(entry);
    }
}

impl fmt::Debug for EntryParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntryParser(..)")
    }
}

/// Input to one logical search.
///
/// Unset fields fall back to the directory's [`SearchConfig`](crate::SearchConfig).
#[derive(Debug, Clone, Default)]
pub struct QueryParameters {
    /// Search base; the configured base DN when `None`.
    pub base_dn: Option<String>,

    /// RFC 4515 filter.
    pub filter: String,

    /// Search scope.
    pub scope: SearchScope,

    /// Requested attributes. `None` selects the per-kind defaults; an empty
    /// list or one containing `*` selects every attribute.
    pub attributes: Option<Vec<String>>,

    /// Maximum number of entries.
    pub size_limit: Option<u32>,

    /// Maximum search time in seconds.
    pub time_limit: Option<u32>,

    /// Group membership enrichment.
    pub include_membership: MembershipScope,

    /// Whether tombstoned objects are returned.
    pub include_deleted: bool,

    /// Per-call override of the configured post-processing hook.
    pub entry_parser: Option<EntryParser>,
}

impl QueryParameters {
    /// Creates parameters for a subtree search with `filter`.
    #[must_use]
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }

    /// Sets the search base.
    #[must_use]
    pub fn with_base_dn(mut self, base_dn: impl Into<String>) -> Self {
        self.base_dn = Some(base_dn.into());
        self
    }

    /// Sets the filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Sets the scope.
    #[must_use]
    pub const fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the requested attributes.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the size limit.
    #[must_use]
    pub const fn with_size_limit(mut self, limit: u32) -> Self {
        self.size_limit = Some(limit);
        self
    }

    /// Sets the time limit in seconds.
    #[must_use]
    pub const fn with_time_limit(mut self, seconds: u32) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    /// Sets the membership enrichment scope.
    #[must_use]
    pub const fn with_membership(mut self, scope: MembershipScope) -> Self {
        self.include_membership = scope;
        self
    }

    /// Includes tombstoned objects.
    #[must_use]
    pub const fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Sets the post-processing hook for this call.
    #[must_use]
    pub fn with_entry_parser(mut self, parser: EntryParser) -> Self {
        self.entry_parser = Some(parser);
        self
    }
}

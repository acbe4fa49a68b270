//! Broad searches classified into users, groups and everything else.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::entry::{DirectoryEntry, EntryKind};
use crate::error::DirectoryResult;
use crate::filter::{self, CLASSIFICATION_ATTRIBUTES, DEFAULT_FIND_FILTER};
use crate::membership::GroupResolver;
use crate::query::QueryParameters;
use crate::search::Searcher;
use crate::set::EntrySet;

/// Entries of one [`Finder::find`] call, bucketed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindResult {
    /// User entries.
    pub users: Vec<DirectoryEntry>,
    /// Group entries.
    pub groups: Vec<DirectoryEntry>,
    /// Entries that are neither (computers, contacts, containers...).
    pub other: Vec<DirectoryEntry>,
}

impl FindResult {
    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len() + self.groups.len() + self.other.len()
    }

    /// Whether nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a search and classifies its results.
#[derive(Clone, Copy)]
pub struct Finder<'a> {
    searcher: &'a Searcher,
}

impl<'a> Finder<'a> {
    /// Creates a finder issuing its searches through `searcher`.
    #[must_use]
    pub const fn new(searcher: &'a Searcher) -> Self {
        Self { searcher }
    }

    /// Searches with `params` and buckets every result by kind.
    ///
    /// An empty filter matches users, groups and computers. Entries of the
    /// kinds named by `params.include_membership` get their resolved groups
    /// attached.
    ///
    /// ## Errors
    ///
    /// The first failing search, including enrichment searches.
    #[instrument(skip(self, params), fields(filter = %params.filter))]
    pub async fn find(&self, params: &QueryParameters) -> DirectoryResult<FindResult> {
        let config = self.searcher.config();
        let requested = params.attributes.as_deref();
        let user_projection = filter::projection(requested, &config.attributes.user);
        let group_projection = filter::projection(requested, &config.attributes.group);

        let defaults = filter::union_attributes(&[
            config.attributes.user.as_slice(),
            config.attributes.group.as_slice(),
        ]);
        let other_projection = filter::projection(requested, &defaults);
        let mut search = params.clone();
        if search.filter.trim().is_empty() {
            search.filter = DEFAULT_FIND_FILTER.to_string();
        }
        search.attributes = Some(filter::wire_attributes(
            requested,
            &defaults,
            &CLASSIFICATION_ATTRIBUTES,
        ));

        let entries = self.searcher.search(&search).await?;
        let resolver = GroupResolver::new(self.searcher);
        let membership_options = QueryParameters {
            base_dn: params.base_dn.clone(),
            ..QueryParameters::default()
        };

        let mut result = FindResult::default();
        for entry in entries {
            let kind = entry.kind();
            let groups = if params.include_membership.includes(kind) {
                let groups = resolver.groups_for(&entry.dn, &membership_options).await?;
                Some(groups.into_vec())
            } else {
                None
            };

            match kind {
                EntryKind::User => {
                    let mut entry = filter::project(entry, user_projection.as_deref());
                    entry.groups = groups;
                    result.users.push(entry);
                }
                EntryKind::Group => {
                    let mut entry = filter::project(entry, group_projection.as_deref());
                    entry.groups = groups;
                    result.groups.push(entry);
                }
                EntryKind::Other => {
                    result.other.push(filter::project(entry, other_projection.as_deref()));
                }
            }
        }

        debug!(
            users = result.users.len(),
            groups = result.groups.len(),
            other = result.other.len(),
            "Classified search results"
        );
        Ok(result)
    }
}

/// Collects the identities of one bucket, for comparisons that ignore order.
#[must_use]
pub fn identities(entries: &[DirectoryEntry]) -> std::collections::HashSet<String> {
    entries
        .iter()
        .cloned()
        .collect::<EntrySet>()
        .identities()
}

//! Group member expansion.
//!
//! Expands a group into the users it contains, directly or through nested
//! groups. Member lists are resolved in chunks: each chunk becomes one
//! disjunctive filter over member DNs, and the chunks of one group are
//! searched concurrently.

use futures::future::{self, BoxFuture, FutureExt};
use tracing::{debug, instrument};

use crate::entry::{DirectoryEntry, GROUP_TYPE_ATTRIBUTE};
use crate::error::{DirectoryError, DirectoryResult};
use crate::filter;
use crate::query::QueryParameters;
use crate::search::Searcher;
use crate::set::{EntrySet, MembershipPath};

/// Expands groups into their (nested) user members.
#[derive(Clone, Copy)]
pub struct MemberExpander<'a> {
    searcher: &'a Searcher,
}

struct Lookup {
    base_dn: Option<String>,
    dn_attribute: String,
    wire: Vec<String>,
    projection: Option<Vec<String>>,
    chunk_size: usize,
}

impl Lookup {
    fn params(&self, filter: String, attributes: Vec<String>) -> QueryParameters {
        let mut params = QueryParameters::new(filter).with_attributes(attributes);
        params.base_dn.clone_from(&self.base_dn);
        params
    }
}

impl<'a> MemberExpander<'a> {
    /// Creates an expander issuing its searches through `searcher`.
    #[must_use]
    pub const fn new(searcher: &'a Searcher) -> Self {
        Self { searcher }
    }

    /// Returns every user that is a member of `group`, directly or through
    /// nested groups.
    ///
    /// `group` is a common name or a DN. Only `base_dn` and `attributes` of
    /// `options` are used; user entries are projected down to the requested
    /// attributes, or to the configured user defaults. A group that does not
    /// exist yields an empty set.
    ///
    /// ## Errors
    ///
    /// [`DirectoryError::Precondition`] for an empty `group`. The first failing
    /// search otherwise.
    #[instrument(skip(self, options))]
    pub async fn users_for(
        &self,
        group: &str,
        options: &QueryParameters,
    ) -> DirectoryResult<EntrySet> {
        if group.trim().is_empty() {
            return Err(DirectoryError::precondition("group name or distinguished name"));
        }

        let config = self.searcher.config();
        let dn_attribute = config.distinguished_name_attribute.clone();
        let requested = options.attributes.as_deref();
        let required = [
            dn_attribute.as_str(),
            "member",
            GROUP_TYPE_ATTRIBUTE,
            "objectCategory",
        ];
        let lookup = Lookup {
            base_dn: options.base_dn.clone(),
            wire: filter::wire_attributes(requested, &config.attributes.user, &required),
            projection: filter::projection(requested, &config.attributes.user),
            chunk_size: config.effective_chunk_size(),
            dn_attribute,
        };

        let group_params = lookup.params(
            filter::group_filter(group, &lookup.dn_attribute),
            vec![
                lookup.dn_attribute.clone(),
                "cn".to_string(),
                "member".to_string(),
                GROUP_TYPE_ATTRIBUTE.to_string(),
                "objectCategory".to_string(),
            ],
        );
        let Some(root) = self
            .searcher
            .search(&group_params)
            .await?
            .into_iter()
            .find(DirectoryEntry::is_group)
        else {
            debug!(group, "Group not found");
            return Ok(EntrySet::new());
        };

        let path = MembershipPath::new().push(&root.dn);
        let users = self.expand(root.values("member"), path, &lookup).await?;

        debug!(group = %root.dn, count = users.len(), "Expanded group members");
        Ok(users)
    }

    fn expand<'s>(
        &'s self,
        members: Vec<String>,
        path: MembershipPath,
        lookup: &'s Lookup,
    ) -> BoxFuture<'s, DirectoryResult<EntrySet>> {
        async move {
            if members.is_empty() {
                return Ok(EntrySet::new());
            }
            debug!(
                members = members.len(),
                chunks = members.len().div_ceil(lookup.chunk_size),
                depth = path.depth(),
                "Resolving members"
            );

            let chunks = members
                .chunks(lookup.chunk_size)
                .map(|chunk| self.resolve_chunk(chunk, &path, lookup));
            let resolved = future::try_join_all(chunks).await?;

            let mut users = EntrySet::new();
            for set in resolved {
                users.merge(set);
            }
            Ok(users)
        }
        .boxed()
    }

    async fn resolve_chunk(
        &self,
        chunk: &[String],
        path: &MembershipPath,
        lookup: &Lookup,
    ) -> DirectoryResult<EntrySet> {
        let params = lookup.params(
            filter::any_of(&lookup.dn_attribute, chunk),
            lookup.wire.clone(),
        );
        let entries = self.searcher.search(&params).await?;

        let mut users = EntrySet::new();
        for entry in entries {
            if !entry.has_attr(GROUP_TYPE_ATTRIBUTE) {
                users.insert(filter::project(entry, lookup.projection.as_deref()));
                continue;
            }
            if path.contains(&entry.dn) {
                debug!(group = %entry.dn, "Skipping group already being expanded");
                continue;
            }
            let nested = self
                .expand(entry.values("member"), path.push(&entry.dn), lookup)
                .await?;
            users.merge(nested);
        }
        Ok(users)
    }
}

//! Ancestor group resolution.
//!
//! Walks the membership graph upwards: starting from one entry, every group
//! listing it in `member` is collected, then every group listing one of those,
//! and so on. The graph may contain cycles; a [`RecursionGuard`] seeded with
//! the starting identity makes every identity be entered at most once.

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, instrument};

use crate::error::{DirectoryError, DirectoryResult};
use crate::filter;
use crate::query::QueryParameters;
use crate::search::Searcher;
use crate::set::{EntrySet, RecursionGuard};

/// Attributes every membership lookup needs, whatever the caller asked for.
const REQUIRED_ATTRIBUTES: [&str; 4] = ["objectCategory", "objectClass", "groupType", "cn"];

/// Resolves the transitive set of groups an entry belongs to.
#[derive(Clone, Copy)]
pub struct GroupResolver<'a> {
    searcher: &'a Searcher,
}

/// Per-call lookup settings shared by every level of the walk.
struct Lookup {
    base_dn: Option<String>,
    wire: Vec<String>,
    projection: Option<Vec<String>>,
}

impl<'a> GroupResolver<'a> {
    /// Creates a resolver issuing its searches through `searcher`.
    #[must_use]
    pub const fn new(searcher: &'a Searcher) -> Self {
        Self { searcher }
    }

    /// Returns every group `dn` is a direct or nested member of.
    ///
    /// Only `base_dn` and `attributes` of `options` are used. Group entries
    /// are projected down to the requested attributes, or to the configured
    /// group defaults.
    ///
    /// ## Errors
    ///
    /// [`DirectoryError::Precondition`] for an empty `dn`, before any search is
    /// issued. The first failing search otherwise.
    #[instrument(skip(self, options))]
    pub async fn groups_for(
        &self,
        dn: &str,
        options: &QueryParameters,
    ) -> DirectoryResult<EntrySet> {
        if dn.trim().is_empty() {
            return Err(DirectoryError::precondition("distinguished name"));
        }

        let config = self.searcher.config();
        let requested = options.attributes.as_deref();
        let lookup = Lookup {
            base_dn: options.base_dn.clone(),
            wire: filter::wire_attributes(
                requested,
                &config.attributes.group,
                &REQUIRED_ATTRIBUTES,
            ),
            projection: filter::projection(requested, &config.attributes.group),
        };

        let mut guard = RecursionGuard::starting_at(dn);
        let mut groups = EntrySet::new();
        self.collect(dn.to_string(), &lookup, &mut guard, &mut groups)
            .await?;

        debug!(dn, count = groups.len(), "Resolved group membership");
        Ok(groups)
    }

    fn collect<'s>(
        &'s self,
        dn: String,
        lookup: &'s Lookup,
        guard: &'s mut RecursionGuard,
        groups: &'s mut EntrySet,
    ) -> BoxFuture<'s, DirectoryResult<()>> {
        async move {
            let mut params = QueryParameters::new(filter::member_filter(&dn))
                .with_attributes(lookup.wire.clone());
            params.base_dn.clone_from(&lookup.base_dn);

            let parents = self.searcher.search(&params).await?;
            for parent in parents.into_iter().filter(|entry| entry.is_group()) {
                if !guard.enter(&parent.dn) {
                    continue;
                }
                let parent_dn = parent.dn.clone();
                groups.insert(filter::project(parent, lookup.projection.as_deref()));
                self.collect(parent_dn, lookup, guard, groups).await?;
            }
            Ok(())
        }
        .boxed()
    }
}

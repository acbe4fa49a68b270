//! High-level directory facade.
//!
//! [`Directory`] wires one [`Searcher`] to the resolvers and exposes the
//! everyday questions asked of a directory: find this user, list these
//! groups, is this user a member of that group.

use std::sync::Arc;

use tracing::debug;

use crate::config::SearchConfig;
use crate::connector::DirectoryConnector;
use crate::entry::DirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::filter;
use crate::finder::{FindResult, Finder};
use crate::members::MemberExpander;
use crate::membership::GroupResolver;
use crate::query::{EntryParser, QueryParameters};
use crate::search::Searcher;
use crate::set::EntrySet;

/// Filter matching tombstones in the deleted objects container.
const DELETED_FILTER: &str = "(isDeleted=TRUE)";

/// A queryable directory.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use dirq_core::memory::MemoryDirectory;
/// use dirq_core::{Directory, QueryParameters, SearchConfig};
///
/// # async fn example() -> dirq_core::DirectoryResult<()> {
/// let directory = Directory::new(
///     Arc::new(MemoryDirectory::new()),
///     SearchConfig::new("DC=example,DC=com"),
/// )?;
///
/// let groups = directory
///     .groups_for_user("jdoe", &QueryParameters::default())
///     .await?;
/// for group in &groups {
///     println!("{}", group.dn);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Directory {
    searcher: Searcher,
}

impl Directory {
    /// Creates a directory over `connector`.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        config: SearchConfig,
    ) -> DirectoryResult<Self> {
        Ok(Self {
            searcher: Searcher::new(connector, config)?,
        })
    }

    /// Sets the hook applied to every entry read from the directory.
    #[must_use]
    pub fn with_entry_parser(mut self, parser: EntryParser) -> Self {
        self.searcher = self.searcher.with_entry_parser(parser);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        self.searcher.config()
    }

    /// Returns the underlying searcher.
    #[must_use]
    pub const fn searcher(&self) -> &Searcher {
        &self.searcher
    }

    // ========================================================================
    // Searching
    // ========================================================================

    /// Runs a raw search. See [`Searcher::search`].
    pub async fn search(&self, params: &QueryParameters) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.searcher.search(params).await
    }

    /// Runs a classified search. See [`Finder::find`].
    pub async fn find(&self, params: &QueryParameters) -> DirectoryResult<FindResult> {
        Finder::new(&self.searcher).find(params).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Finds a user by sAMAccountName, userPrincipalName or DN.
    ///
    /// Membership enrichment and attributes follow `options`; its filter is
    /// ignored.
    pub async fn find_user(
        &self,
        name_or_dn: &str,
        options: &QueryParameters,
    ) -> DirectoryResult<Option<DirectoryEntry>> {
        if name_or_dn.trim().is_empty() {
            return Err(DirectoryError::precondition("user name or distinguished name"));
        }
        let mut params = options.clone();
        params.filter =
            filter::user_filter(name_or_dn, &self.config().distinguished_name_attribute);

        Ok(self.find(&params).await?.users.into_iter().next())
    }

    /// Finds every user matching `options.filter` (all users when empty).
    pub async fn find_users(
        &self,
        options: &QueryParameters,
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let mut params = options.clone();
        params.filter = filter::and("(objectCategory=User)", Some(options.filter.as_str()));

        Ok(self.find(&params).await?.users)
    }

    /// Whether a user exists.
    pub async fn user_exists(&self, name_or_dn: &str) -> DirectoryResult<bool> {
        let options = self.identity_only();
        Ok(self.find_user(name_or_dn, &options).await?.is_some())
    }

    /// Returns every group the user is a direct or nested member of. An
    /// unknown user has no groups.
    pub async fn groups_for_user(
        &self,
        name_or_dn: &str,
        options: &QueryParameters,
    ) -> DirectoryResult<EntrySet> {
        let Some(user) = self.find_user(name_or_dn, &self.identity_only()).await? else {
            debug!(user = name_or_dn, "User not found");
            return Ok(EntrySet::new());
        };
        self.groups_for(&user.dn, options).await
    }

    /// Whether the user is a direct or nested member of `group`, given as a
    /// common name or DN.
    pub async fn is_user_member_of(&self, user: &str, group: &str) -> DirectoryResult<bool> {
        if group.trim().is_empty() {
            return Err(DirectoryError::precondition("group name or distinguished name"));
        }
        let groups = self.groups_for_user(user, &QueryParameters::default()).await?;

        Ok(groups.iter().any(|candidate| {
            candidate.dn.eq_ignore_ascii_case(group)
                || candidate
                    .get_attr("cn")
                    .is_some_and(|cn| cn.eq_ignore_ascii_case(group))
        }))
    }

    // ========================================================================
    // Groups
    // ========================================================================

    /// Finds a group by common name or DN.
    pub async fn find_group(
        &self,
        name_or_dn: &str,
        options: &QueryParameters,
    ) -> DirectoryResult<Option<DirectoryEntry>> {
        if name_or_dn.trim().is_empty() {
            return Err(DirectoryError::precondition("group name or distinguished name"));
        }
        let mut params = options.clone();
        params.filter =
            filter::group_filter(name_or_dn, &self.config().distinguished_name_attribute);

        Ok(self.find(&params).await?.groups.into_iter().next())
    }

    /// Finds every group matching `options.filter` (all groups when empty).
    pub async fn find_groups(
        &self,
        options: &QueryParameters,
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let mut params = options.clone();
        params.filter = filter::and("(objectCategory=Group)", Some(options.filter.as_str()));

        Ok(self.find(&params).await?.groups)
    }

    /// Whether a group exists.
    pub async fn group_exists(&self, name_or_dn: &str) -> DirectoryResult<bool> {
        let options = self.identity_only();
        Ok(self.find_group(name_or_dn, &options).await?.is_some())
    }

    /// Returns every group the entry `dn` is a direct or nested member of.
    /// See [`GroupResolver::groups_for`].
    pub async fn groups_for(
        &self,
        dn: &str,
        options: &QueryParameters,
    ) -> DirectoryResult<EntrySet> {
        GroupResolver::new(&self.searcher).groups_for(dn, options).await
    }

    /// Returns every user in the group, directly or through nested groups.
    /// See [`MemberExpander::users_for`].
    pub async fn users_for_group(
        &self,
        name_or_dn: &str,
        options: &QueryParameters,
    ) -> DirectoryResult<EntrySet> {
        MemberExpander::new(&self.searcher)
            .users_for(name_or_dn, options)
            .await
    }

    // ========================================================================
    // Deleted Objects
    // ========================================================================

    /// Lists tombstoned objects.
    ///
    /// Searches the `CN=Deleted Objects` container of the configured base DN
    /// unless `options` names another base, with `(isDeleted=TRUE)` unless it
    /// carries a filter. The show-deleted control is always attached.
    pub async fn find_deleted_objects(
        &self,
        options: &QueryParameters,
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let mut params = options.clone().with_deleted();
        if params.base_dn.is_none() {
            params.base_dn = Some(format!("CN=Deleted Objects,{}", self.config().base_dn));
        }
        if params.filter.trim().is_empty() {
            params.filter = DELETED_FILTER.to_string();
        }
        self.searcher.search(&params).await
    }

    fn identity_only(&self) -> QueryParameters {
        QueryParameters::default()
            .with_attributes([self.config().distinguished_name_attribute.clone()])
    }
}

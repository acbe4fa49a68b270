//! Search orchestration.
//!
//! A [`Searcher`] owns one logical search at a time: it opens a connection,
//! runs a paged primitive search, completes range-limited attributes of each
//! entry with follow-up searches, chases referrals with nested searches, and
//! only returns once the primary stream has ended and every follow-up and
//! referral task has been joined. The connection is unbound exactly once on
//! every exit path.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use percent_encoding::percent_decode_str;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{ReferralPolicy, SearchConfig};
use crate::connector::{
    DirectoryConnection, DirectoryConnector, SearchControl, SearchItem, SearchRequest, SearchScope,
};
use crate::entry::DirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::query::{EntryParser, QueryParameters};
use crate::range::{self, RangeCursor};

/// Filter used when a query carries none.
const MATCH_ALL: &str = "(objectClass=*)";

/// Runs logical searches against a directory.
#[derive(Clone)]
pub struct Searcher {
    connector: Arc<dyn DirectoryConnector>,
    config: Arc<SearchConfig>,
    referrals: Arc<ReferralPolicy>,
    entry_parser: Option<EntryParser>,
}

impl Searcher {
    /// Creates a searcher.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(
        connector: Arc<dyn DirectoryConnector>,
        config: SearchConfig,
    ) -> DirectoryResult<Self> {
        config.validate()?;
        let referrals = ReferralPolicy::compile(&config.referrals)?;

        Ok(Self {
            connector,
            config: Arc::new(config),
            referrals: Arc::new(referrals),
            entry_parser: None,
        })
    }

    /// Sets the hook applied to every emitted entry.
    #[must_use]
    pub fn with_entry_parser(mut self, parser: EntryParser) -> Self {
        self.entry_parser = Some(parser);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Runs one logical search and collects its entries.
    ///
    /// Entries come back in no particular order. A size-limit condition ends
    /// the search successfully with the entries gathered so far.
    ///
    /// ## Errors
    ///
    /// Connection, bind and search failures of the primary search. Failed
    /// referral chases and failed range follow-ups are logged and absorbed.
    #[instrument(skip(self, params), fields(filter = %params.filter))]
    pub async fn search(&self, params: &QueryParameters) -> DirectoryResult<Vec<DirectoryEntry>> {
        let base_dn = params
            .base_dn
            .clone()
            .unwrap_or_else(|| self.config.base_dn.clone());

        let connection = self.connector.connect(None).await?;
        let result = self.run(Arc::clone(&connection), params, &base_dn, 0).await;
        release(connection.as_ref()).await;

        if let Ok(entries) = &result {
            debug!(base_dn = %base_dn, count = entries.len(), "Search completed");
        }
        result
    }

    /// Builds the primitive request for a query.
    fn request(&self, params: &QueryParameters, base_dn: &str) -> SearchRequest {
        let filter = match params.filter.trim() {
            "" => MATCH_ALL,
            filter => filter,
        };

        let mut request = SearchRequest::new(base_dn, params.scope, filter)
            .with_attributes(params.attributes.clone().unwrap_or_default())
            .with_control(SearchControl::PagedResults {
                size: self.config.page_size,
            });
        if params.include_deleted {
            request = request.with_control(SearchControl::ShowDeleted);
        }
        request.size_limit = params.size_limit;
        request.time_limit = params.time_limit;
        request
    }

    /// Drives one primitive search on `connection` to completion, joining
    /// range follow-ups and referral sub-searches. Does not unbind.
    async fn run(
        &self,
        connection: Arc<dyn DirectoryConnection>,
        params: &QueryParameters,
        base_dn: &str,
        hops: u8,
    ) -> DirectoryResult<Vec<DirectoryEntry>> {
        let request = self.request(params, base_dn);
        debug!(base_dn, filter = %request.filter, hops, "Starting search");
        let show_deleted = request.shows_deleted();

        let mut stream = connection.search(request).await?;
        let parser = params
            .entry_parser
            .clone()
            .or_else(|| self.entry_parser.clone());

        let mut entries = Vec::new();
        // Dropping these on an early return aborts the children.
        let mut range_tasks: JoinSet<DirectoryEntry> = JoinSet::new();
        let mut referral_tasks: JoinSet<Vec<DirectoryEntry>> = JoinSet::new();

        loop {
            match stream.next().await {
                Ok(Some(SearchItem::Entry(raw))) => {
                    let entry = DirectoryEntry::from_raw(raw);
                    if range::has_range_attributes(&entry) {
                        let connection = Arc::clone(&connection);
                        let parser = parser.clone();
                        range_tasks.spawn(async move {
                            let entry =
                                complete_ranges(connection.as_ref(), entry, show_deleted).await;
                            finalize(entry, parser.as_ref())
                        });
                    } else {
                        entries.push(finalize(entry, parser.as_ref()));
                    }
                }
                Ok(Some(SearchItem::Referral(urls))) => {
                    for url in urls {
                        if self.referrals.allows(&url, hops) {
                            debug!(url = %url, "Following referral");
                            referral_tasks.spawn(self.clone().chase_referral(
                                url,
                                params.clone(),
                                base_dn.to_string(),
                                hops + 1,
                            ));
                        } else {
                            debug!(url = %url, "Referral not followed");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) if e.is_partial_result() => {
                    info!(
                        base_dn,
                        received = entries.len() + range_tasks.len(),
                        "Size limit exceeded, returning partial results"
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        drop(stream);

        while let Some(joined) = range_tasks.join_next().await {
            let entry = joined.map_err(|e| {
                DirectoryError::Internal(format!("range retrieval task failed: {e}"))
            })?;
            entries.push(entry);
        }

        while let Some(joined) = referral_tasks.join_next().await {
            match joined {
                Ok(found) => entries.extend(found),
                Err(e) => warn!(error = %e, "Referral task failed"),
            }
        }

        Ok(entries)
    }

    /// Runs the query against a referral target. Never fails: a referral
    /// that cannot be chased contributes no entries.
    fn chase_referral(
        self,
        url: String,
        params: QueryParameters,
        fallback_base_dn: String,
        hops: u8,
    ) -> BoxFuture<'static, Vec<DirectoryEntry>> {
        async move {
            let base_dn = match referral_base_dn(&url) {
                Ok(Some(dn)) => dn,
                Ok(None) => fallback_base_dn,
                Err(e) => {
                    warn!(url = %url, error = %e, "Ignoring malformed referral");
                    return Vec::new();
                }
            };

            let connection = match self.connector.connect(Some(&url)).await {
                Ok(connection) => connection,
                Err(e) => {
                    warn!(url = %url, error = %e, "Could not connect to referral target");
                    return Vec::new();
                }
            };

            let result = self
                .run(Arc::clone(&connection), &params, &base_dn, hops)
                .await;
            release(connection.as_ref()).await;

            match result {
                Ok(entries) => {
                    debug!(url = %url, count = entries.len(), "Referral search completed");
                    entries
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Referral search failed");
                    Vec::new()
                }
            }
        }
        .boxed()
    }
}

/// Extracts the base DN from an LDAP URL (`ldap://host/DN??scope`).
///
/// Returns `None` when the URL carries no DN.
fn referral_base_dn(url: &str) -> DirectoryResult<Option<String>> {
    let parsed = Url::parse(url)
        .map_err(|e| DirectoryError::protocol(format!("invalid referral URL {url}: {e}")))?;

    let path = parsed.path().trim_start_matches('/');
    let dn = percent_decode_str(path)
        .decode_utf8()
        .map_err(|e| DirectoryError::protocol(format!("invalid referral DN in {url}: {e}")))?;

    Ok((!dn.is_empty()).then(|| dn.into_owned()))
}

fn finalize(mut entry: DirectoryEntry, parser: Option<&EntryParser>) -> DirectoryEntry {
    if let Some(parser) = parser {
        parser.apply(&mut entry);
    }
    entry
}

async fn release(connection: &dyn DirectoryConnection) {
    if let Err(e) = connection.unbind().await {
        debug!(error = %e, "Unbind failed");
    }
}

// ============================================================================
// Range Retrieval
// ============================================================================

/// Values of one window as returned by the server.
struct Window {
    /// `None` when the server returned the attribute without a range option,
    /// meaning nothing is left.
    cursor: Option<RangeCursor>,
    values: Vec<String>,
}

/// Moves every `name;range=...` attribute of the entry under its plain name
/// and fetches the remaining windows.
///
/// Follow-ups carry the show-deleted control when the primary search did,
/// so deleted entries stay visible. A failing follow-up leaves the values
/// merged so far in place.
async fn complete_ranges(
    connection: &dyn DirectoryConnection,
    mut entry: DirectoryEntry,
    show_deleted: bool,
) -> DirectoryEntry {
    for (key, cursor) in range::range_cursors(&entry) {
        let values = entry.attributes.remove(&key).unwrap_or_default();
        entry.append_values(&cursor.attribute, values);

        let mut current = cursor;
        while let Some(window) = current.next() {
            match fetch_window(connection, &entry.dn, &window, show_deleted).await {
                Ok(Some(Window {
                    cursor: Some(returned),
                    values,
                })) => {
                    debug!(
                        dn = %entry.dn,
                        range = %returned,
                        count = values.len(),
                        "Retrieved attribute range"
                    );
                    entry.append_values(&current.attribute, values);
                    if returned.low <= current.low {
                        warn!(dn = %entry.dn, range = %returned, "Range did not advance, stopping");
                        break;
                    }
                    current = returned;
                }
                Ok(Some(Window { cursor: None, values })) => {
                    entry.append_values(&current.attribute, values);
                    break;
                }
                Ok(None) => {
                    warn!(
                        dn = %entry.dn,
                        range = %window,
                        "Range follow-up returned no values, keeping values retrieved so far"
                    );
                    break;
                }
                Err(e) => {
                    warn!(
                        dn = %entry.dn,
                        range = %window,
                        error = %e,
                        "Range retrieval failed, keeping values retrieved so far"
                    );
                    break;
                }
            }
        }
    }
    entry
}

async fn fetch_window(
    connection: &dyn DirectoryConnection,
    dn: &str,
    window: &RangeCursor,
    show_deleted: bool,
) -> DirectoryResult<Option<Window>> {
    let mut request = SearchRequest::new(dn, SearchScope::Base, MATCH_ALL)
        .with_attributes(vec![window.to_string()]);
    if show_deleted {
        request = request.with_control(SearchControl::ShowDeleted);
    }

    let mut stream = connection.search(request).await?;
    let mut found = None;
    while let Some(item) = stream.next().await? {
        if let SearchItem::Entry(raw) = item {
            found.get_or_insert(raw);
        }
    }
    let Some(raw) = found else {
        return Ok(None);
    };

    let mut plain = None;
    for (name, values) in raw.attrs {
        if !window.matches_attribute(&name) {
            continue;
        }
        if RangeCursor::is_range_attribute(&name) {
            return Ok(Some(Window {
                cursor: Some(RangeCursor::parse(&name)?),
                values,
            }));
        }
        plain = Some(values);
    }

    Ok(plain.map(|values| Window {
        cursor: None,
        values,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReferralConfig;
    use crate::memory::MemoryDirectory;

    const BASE: &str = "DC=example,DC=com";

    fn user(cn: &str) -> DirectoryEntry {
        DirectoryEntry::new(format!("CN={cn},OU=Users,{BASE}"))
            .with_attr("cn", [cn])
            .with_attr("objectClass", ["top", "person", "user"])
    }

    fn searcher(directory: &MemoryDirectory, config: SearchConfig) -> Searcher {
        Searcher::new(Arc::new(directory.clone()), config).unwrap()
    }

    #[tokio::test]
    async fn pages_through_large_result_sets() {
        let directory = MemoryDirectory::new().with_server_size_limit(2);
        for cn in ["u1", "u2", "u3", "u4", "u5"] {
            directory.add_entry(user(cn));
        }
        let searcher = searcher(&directory, SearchConfig::new(BASE).with_page_size(2));

        let entries = searcher
            .search(&QueryParameters::new("(objectClass=user)"))
            .await
            .unwrap();

        assert_eq!(entries.len(), 5);
        let stats = directory.stats();
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.connections_released, 1);
    }

    #[tokio::test]
    async fn reassembles_range_limited_attributes() {
        let directory = MemoryDirectory::new().with_max_values(3);
        let members: Vec<String> = (0..8).map(|i| format!("CN=m{i},{BASE}")).collect();
        directory.add_entry(
            DirectoryEntry::new(format!("CN=Big,{BASE}"))
                .with_attr("cn", ["Big"])
                .with_attr("member", members.clone()),
        );
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let entries = searcher
            .search(&QueryParameters::new("(cn=Big)").with_attributes(["cn", "member"]))
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        let mut values = entry.values("member");
        values.sort();
        let mut expected = members;
        expected.sort();
        assert_eq!(values, expected);
        assert!(entry.attributes.keys().all(|k| !k.contains(";range=")));

        let stats = directory.stats();
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.connections_released, 1);
    }

    #[tokio::test]
    async fn failed_range_follow_up_keeps_partial_values() {
        let directory = MemoryDirectory::new().with_max_values(3);
        let members: Vec<String> = (0..6).map(|i| format!("CN=m{i},{BASE}")).collect();
        directory
            .add_entry(DirectoryEntry::new(format!("CN=Big,{BASE}")).with_attr("member", members));
        directory.fail_searches_containing("member;range=3-");
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let entries = searcher
            .search(&QueryParameters::new("(objectClass=*)").with_attributes(["member"]))
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].values("member").len(), 3);
    }

    #[tokio::test]
    async fn size_limit_is_partial_success() {
        let directory = MemoryDirectory::new();
        for cn in ["u1", "u2", "u3", "u4"] {
            directory.add_entry(user(cn));
        }
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let entries = searcher
            .search(&QueryParameters::new("(objectClass=user)").with_size_limit(2))
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(directory.stats().connections_released, 1);
    }

    #[tokio::test]
    async fn protocol_error_aborts_and_releases() {
        let directory = MemoryDirectory::new();
        directory.add_entry(user("u1"));
        directory.fail_searches_containing("(cn=broken)");
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let result = searcher.search(&QueryParameters::new("(cn=broken)")).await;

        assert!(matches!(result, Err(DirectoryError::Protocol(_))));
        let stats = directory.stats();
        assert_eq!(stats.connections_opened, 1);
        assert_eq!(stats.connections_released, 1);
    }

    #[tokio::test]
    async fn follows_allowed_referrals_only() {
        let directory = MemoryDirectory::new();
        directory.add_entry(user("local"));
        directory.add_partition("child.example.com", vec![user("remote")]);
        directory.add_partition("forestdnszones.example.com", vec![user("dns")]);
        directory.add_referral("ldap://child.example.com/OU=Users,DC=example,DC=com");
        directory.add_referral(
            "ldap://ForestDnsZones.example.com/DC=ForestDnsZones,DC=example,DC=com",
        );

        let config = SearchConfig::new(BASE).with_referrals(ReferralConfig::enabled());
        let searcher = searcher(&directory, config);

        let entries = searcher
            .search(&QueryParameters::new("(objectClass=user)"))
            .await
            .unwrap();

        let mut names: Vec<&str> = entries.iter().filter_map(|e| e.get_attr("cn")).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["local", "remote"]);

        let stats = directory.stats();
        assert_eq!(stats.connections_opened, 2);
        assert_eq!(stats.connections_released, 2);
    }

    #[tokio::test]
    async fn referral_failures_are_swallowed() {
        let directory = MemoryDirectory::new();
        directory.add_entry(user("local"));
        directory.add_referral("ldap://unreachable.example.com/DC=example,DC=com");
        let config = SearchConfig::new(BASE).with_referrals(ReferralConfig::enabled());
        let searcher = searcher(&directory, config);

        let entries = searcher
            .search(&QueryParameters::new("(objectClass=user)"))
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn referrals_ignored_when_disabled() {
        let directory = MemoryDirectory::new();
        directory.add_partition("child.example.com", vec![user("remote")]);
        directory.add_referral("ldap://child.example.com/OU=Users,DC=example,DC=com");
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let entries = searcher
            .search(&QueryParameters::new("(objectClass=user)"))
            .await
            .unwrap();

        assert!(entries.is_empty());
        assert_eq!(directory.stats().connections_opened, 1);
    }

    #[tokio::test]
    async fn entry_parser_override_wins() {
        let directory = MemoryDirectory::new();
        directory.add_entry(user("jane"));
        let searcher = searcher(&directory, SearchConfig::new(BASE)).with_entry_parser(
            EntryParser::new(|e| {
                e.append_values("source", vec!["configured".to_string()]);
            }),
        );

        let configured = searcher
            .search(&QueryParameters::new("(cn=jane)"))
            .await
            .unwrap();
        assert_eq!(configured[0].get_attr("source"), Some("configured"));

        let overridden = searcher
            .search(&QueryParameters::new("(cn=jane)").with_entry_parser(EntryParser::new(|e| {
                e.append_values("source", vec!["call".to_string()]);
            })))
            .await
            .unwrap();
        assert_eq!(overridden[0].get_attr("source"), Some("call"));
    }

    #[tokio::test]
    async fn deleted_objects_need_control() {
        let directory = MemoryDirectory::new();
        directory.add_entry(user("alive"));
        directory.add_entry(user("gone").with_attr("isDeleted", ["TRUE"]));
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let visible = searcher
            .search(&QueryParameters::new("(objectClass=user)"))
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);

        let all = searcher
            .search(&QueryParameters::new("(objectClass=user)").with_deleted())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn range_windows_keep_advancing() {
        let directory = MemoryDirectory::new().with_max_values(3);
        let members: Vec<String> = (0..20).map(|i| format!("CN=m{i:02},{BASE}")).collect();
        directory.add_entry(
            DirectoryEntry::new(format!("CN=Big,{BASE}"))
                .with_attr("cn", ["Big"])
                .with_attr("member", members.clone()),
        );
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let entries = searcher
            .search(&QueryParameters::new("(cn=Big)").with_attributes(["cn", "member"]))
            .await
            .unwrap();

        let mut values = entries[0].values("member");
        values.sort();
        assert_eq!(values, members);

        let requested: Vec<String> = directory
            .stats()
            .searches
            .iter()
            .skip(1)
            .flat_map(|s| s.attributes.clone())
            .collect();
        assert_eq!(requested[0], "member;range=3-6");
        assert_eq!(requested[1], "member;range=6-8");
        assert_eq!(requested.len(), 6);
    }

    #[tokio::test]
    async fn deleted_entries_keep_their_ranged_values() {
        let directory = MemoryDirectory::new().with_max_values(3);
        let members: Vec<String> = (0..5).map(|i| format!("CN=m{i},{BASE}")).collect();
        directory.add_entry(
            DirectoryEntry::new(format!("CN=Old,{BASE}"))
                .with_attr("isDeleted", ["TRUE"])
                .with_attr("member", members),
        );
        let searcher = searcher(&directory, SearchConfig::new(BASE));

        let entries = searcher
            .search(
                &QueryParameters::new("(isDeleted=TRUE)")
                    .with_attributes(["member"])
                    .with_deleted(),
            )
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].values("member").len(), 5);
        assert!(directory.stats().searches.iter().all(SearchRequest::shows_deleted));
    }

    #[test]
    fn referral_base_dn_is_decoded() {
        assert_eq!(
            referral_base_dn("ldap://child.example.com/OU=Sales%2CDC=example,DC=com").unwrap(),
            Some("OU=Sales,DC=example,DC=com".to_string())
        );
        assert_eq!(referral_base_dn("ldap://child.example.com").unwrap(), None);
        assert!(referral_base_dn("not a url").is_err());
    }
}

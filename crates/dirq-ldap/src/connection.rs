//! LDAP connections.
//!
//! Every logical search opens its own connection through [`LdapConnector`]
//! and unbinds it when done; connections are never pooled, since paging
//! cookies and bind state belong to one connection.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dirq_core::connector::SHOW_DELETED_OID;
use dirq_core::{
    DirectoryConnection, DirectoryConnector, DirectoryError, DirectoryResult, EntryStream, RawEntry,
    SearchItem, SearchRequest, SearchScope,
};
use ldap3::adapters::{Adapter, PagedResults};
use ldap3::controls::RawControl;
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, ResultEntry, Scope, SearchEntry, SearchOptions,
    SearchStream,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::LdapConfig;
use crate::error::{LdapError, LdapResult};

/// Result codes (RFC 4511) the connector handles specially.
const RC_SUCCESS: u32 = 0;
const RC_TIME_LIMIT_EXCEEDED: u32 = 3;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_REFERRAL: u32 = 10;
const RC_INVALID_CREDENTIALS: u32 = 49;

type Attributes = Vec<String>;

/// Opens bound LDAP connections.
#[derive(Debug, Clone)]
pub struct LdapConnector {
    config: Arc<LdapConfig>,
}

impl LdapConnector {
    /// Creates a connector.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration does not validate.
    pub fn new(config: LdapConfig) -> LdapResult<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Server URL to connect to for `target`: the configured server, or the
    /// scheme, host and port of a referral URL.
    fn server_url(&self, target: Option<&str>) -> LdapResult<String> {
        let Some(target) = target else {
            return Ok(self.config.connection_url.clone());
        };

        let url = Url::parse(target)
            .map_err(|e| LdapError::connection(format!("invalid referral URL {target}: {e}")))?;
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| LdapError::connection(format!("referral URL {target} has no host")))?;

        match url.scheme() {
            "ldaps" => {}
            "ldap" if self.config.starttls || !self.config.require_tls => {}
            "ldap" => return Err(LdapError::InsecureProtocol),
            other => {
                return Err(LdapError::connection(format!(
                    "unsupported referral scheme '{other}'"
                )));
            }
        }

        Ok(match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        })
    }

    /// Connects and binds with the service account.
    async fn open(&self, url: &str) -> LdapResult<Ldap> {
        let plain = url.to_lowercase().starts_with("ldap://");
        let settings = LdapConnSettings::new()
            .set_conn_timeout(self.config.connection_timeout)
            .set_starttls(plain && self.config.starttls)
            .set_no_tls_verify(!self.config.validate_certificates);

        debug!(url = %url, "Connecting to LDAP server");
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, url)
            .await
            .map_err(|e| LdapError::Connection(format!("{url}: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        debug!(bind_dn = %self.config.bind_dn, "Performing LDAP bind");
        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_credential)
            .await
            .map_err(|e| LdapError::Bind(e.to_string()))?;

        match result.rc {
            RC_SUCCESS => Ok(ldap),
            RC_INVALID_CREDENTIALS => Err(LdapError::Bind("invalid credentials".to_string())),
            rc => Err(LdapError::Bind(format!("code {rc}: {}", result.text))),
        }
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self, target: Option<&str>) -> DirectoryResult<Arc<dyn DirectoryConnection>> {
        let url = self.server_url(target)?;
        let ldap = self.open(&url).await?;
        info!(url = %url, "LDAP connection established");

        Ok(Arc::new(LdapConnection {
            ldap,
            url,
            operation_timeout: self.config.operation_timeout,
        }))
    }
}

// ============================================================================
// Connection
// ============================================================================

/// A bound connection to one LDAP server.
pub struct LdapConnection {
    ldap: Ldap,
    url: String,
    operation_timeout: Duration,
}

impl LdapConnection {
    /// URL of the server this connection is bound to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn start(
        &self,
        request: SearchRequest,
    ) -> LdapResult<SearchStream<'static, String, Attributes>> {
        let mut ldap = self.ldap.clone();
        ldap.with_timeout(self.operation_timeout);

        let mut options = SearchOptions::new();
        if let Some(limit) = request.size_limit {
            options = options.sizelimit(i32::try_from(limit).unwrap_or(i32::MAX));
        }
        if let Some(limit) = request.time_limit {
            options = options.timelimit(i32::try_from(limit).unwrap_or(i32::MAX));
        }
        ldap.with_search_options(options);

        if request.shows_deleted() {
            ldap.with_controls(RawControl {
                ctype: SHOW_DELETED_OID.to_string(),
                crit: true,
                val: None,
            });
        }

        let scope = to_ldap3_scope(request.scope);
        let stream = match request.page_size() {
            Some(size) => {
                let size = i32::try_from(size).unwrap_or(i32::MAX);
                let adapters: Vec<Box<dyn Adapter<'static, String, Attributes>>> =
                    vec![Box::new(PagedResults::new(size))];
                ldap.streaming_search_with(
                    adapters,
                    &request.base_dn,
                    scope,
                    &request.filter,
                    request.attributes,
                )
                .await?
            }
            None => {
                ldap.streaming_search(&request.base_dn, scope, &request.filter, request.attributes)
                    .await?
            }
        };
        Ok(stream)
    }
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn search(&self, request: SearchRequest) -> DirectoryResult<Box<dyn EntryStream>> {
        debug!(
            url = %self.url,
            base_dn = %request.base_dn,
            filter = %request.filter,
            "Starting LDAP search"
        );
        let stream = self.start(request).await?;
        Ok(Box::new(LdapEntryStream {
            stream,
            pending: VecDeque::new(),
            finished: false,
        }))
    }

    async fn unbind(&self) -> DirectoryResult<()> {
        let mut ldap = self.ldap.clone();
        ldap.unbind()
            .await
            .map_err(|e| DirectoryError::from(LdapError::from(e)))
    }
}

// ============================================================================
// Entry Stream
// ============================================================================

struct LdapEntryStream {
    stream: SearchStream<'static, String, Attributes>,
    pending: VecDeque<SearchItem>,
    finished: bool,
}

impl LdapEntryStream {
    async fn next_item(&mut self) -> LdapResult<Option<SearchItem>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }
            if self.finished {
                return Ok(None);
            }

            if let Some(entry) = self.stream.next().await? {
                if let Some(item) = to_item(entry) {
                    return Ok(Some(item));
                }
                continue;
            }

            self.finished = true;
            let result = self.stream.finish().await;
            outcome(result.rc, &result.text)?;
            if result.rc == RC_REFERRAL && !result.refs.is_empty() {
                self.pending.push_back(SearchItem::Referral(result.refs));
            }
        }
    }
}

#[async_trait]
impl EntryStream for LdapEntryStream {
    async fn next(&mut self) -> DirectoryResult<Option<SearchItem>> {
        self.next_item().await.map_err(DirectoryError::from)
    }
}

/// Converts one streamed result. Intermediate messages yield nothing.
fn to_item(entry: ResultEntry) -> Option<SearchItem> {
    if entry.is_intermediate() {
        return None;
    }
    if entry.is_ref() {
        return Some(SearchItem::Referral(ldap3::parse_refs(entry.0)));
    }

    let controls = entry.1.iter().map(|c| c.1.ctype.clone()).collect();
    let search_entry = SearchEntry::construct(entry);
    Some(SearchItem::Entry(RawEntry {
        dn: search_entry.dn,
        attrs: search_entry.attrs,
        bin_attrs: search_entry.bin_attrs,
        controls,
    }))
}

/// Maps the final result code of a search.
fn outcome(rc: u32, text: &str) -> LdapResult<()> {
    match rc {
        RC_SUCCESS | RC_REFERRAL => Ok(()),
        RC_SIZE_LIMIT_EXCEEDED => Err(LdapError::SizeLimitExceeded),
        RC_TIME_LIMIT_EXCEEDED => Err(LdapError::Timeout),
        rc => Err(LdapError::Search(format!("code {rc}: {text}"))),
    }
}

const fn to_ldap3_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}

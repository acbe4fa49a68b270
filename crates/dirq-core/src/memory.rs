//! In-memory directory.
//!
//! [`MemoryDirectory`] implements the connector traits over entries held in
//! memory. It evaluates RFC 4515 filters (`&`, `|`, `!`, equality, presence
//! and substrings), honours search scopes and the show-deleted control, and
//! can be told to behave like a real server in the ways the engine cares
//! about: range-limited delivery of large attributes, size limits,
//! continuation references to other partitions and injected failures.
//!
//! Connection accounting is exposed through [`MemoryDirectory::stats`] so
//! callers can check that every opened connection was released.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::connector::{
    DirectoryConnection, DirectoryConnector, EntryStream, RawEntry, SearchItem, SearchRequest,
    SearchScope,
};
use crate::entry::DirectoryEntry;
use crate::error::{DirectoryError, DirectoryResult};
use crate::range::RangeCursor;

/// Partition key of the directory's own naming context.
const DEFAULT_PARTITION: &str = "";

/// Connection and search accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryStats {
    /// Connections successfully opened.
    pub connections_opened: usize,
    /// Connections released through `unbind`.
    pub connections_released: usize,
    /// Pages served to paged searches.
    pub pages_served: usize,
    /// Every primitive search received, in order.
    pub searches: Vec<SearchRequest>,
}

impl DirectoryStats {
    /// Connections opened but not yet released.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.connections_opened
            .saturating_sub(self.connections_released)
    }
}

#[derive(Debug, Default)]
struct Partition {
    entries: Vec<DirectoryEntry>,
    referrals: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    partitions: HashMap<String, Partition>,
    max_values: Option<usize>,
    server_size_limit: Option<usize>,
    failing_searches: Vec<String>,
    unreachable: HashSet<String>,
    stats: DirectoryStats,
}

/// A directory held in memory.
///
/// Cloning yields another handle to the same directory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<Mutex<State>>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers multi-valued attributes in windows of at most `max_values`
    /// values, the way Active Directory applies `MaxValRange`.
    #[must_use]
    pub fn with_max_values(self, max_values: usize) -> Self {
        self.state.lock().max_values = Some(max_values.max(1));
        self
    }

    /// Caps unpaged searches at `limit` entries, after which the search ends
    /// with a size-limit condition.
    #[must_use]
    pub fn with_server_size_limit(self, limit: usize) -> Self {
        self.state.lock().server_size_limit = Some(limit);
        self
    }

    /// Adds an entry to the directory's own partition.
    pub fn add_entry(&self, entry: DirectoryEntry) {
        self.partition_mut(DEFAULT_PARTITION, |p| p.entries.push(entry));
    }

    /// Adds an entry (builder style).
    #[must_use]
    pub fn with_entry(self, entry: DirectoryEntry) -> Self {
        self.add_entry(entry);
        self
    }

    /// Adds a partition served by another host, reachable through referrals.
    pub fn add_partition(&self, host: &str, entries: Vec<DirectoryEntry>) {
        self.partition_mut(host, |p| p.entries.extend(entries));
    }

    /// Makes subtree and one-level searches of the directory's own partition
    /// return a continuation reference to `url`.
    pub fn add_referral(&self, url: impl Into<String>) {
        let url = url.into();
        self.partition_mut(DEFAULT_PARTITION, |p| p.referrals.push(url));
    }

    /// Makes searches of the partition served by `host` return a
    /// continuation reference to `url`.
    pub fn add_partition_referral(&self, host: &str, url: impl Into<String>) {
        let url = url.into();
        self.partition_mut(host, |p| p.referrals.push(url));
    }

    /// Fails every search whose filter or attribute list contains `pattern`.
    pub fn fail_searches_containing(&self, pattern: impl Into<String>) {
        self.state.lock().failing_searches.push(pattern.into());
    }

    /// Refuses connections to `host`.
    pub fn fail_connect_to(&self, host: &str) {
        self.state.lock().unreachable.insert(host.to_lowercase());
    }

    /// Returns a snapshot of the accounting.
    #[must_use]
    pub fn stats(&self) -> DirectoryStats {
        self.state.lock().stats.clone()
    }

    /// Clears the accounting.
    pub fn reset_stats(&self) {
        self.state.lock().stats = DirectoryStats::default();
    }

    fn partition_mut(&self, host: &str, update: impl FnOnce(&mut Partition)) {
        let mut state = self.state.lock();
        update(state.partitions.entry(host.to_lowercase()).or_default());
    }

    fn execute(
        &self,
        partition: &str,
        request: &SearchRequest,
    ) -> DirectoryResult<VecDeque<DirectoryResult<SearchItem>>> {
        let mut state = self.state.lock();
        state.stats.searches.push(request.clone());

        if let Some(pattern) = state.failing_searches.iter().find(|p| {
            request.filter.contains(p.as_str())
                || request.attributes.iter().any(|a| a.contains(p.as_str()))
        }) {
            return Err(DirectoryError::protocol(format!(
                "search rejected by server (matched {pattern})"
            )));
        }

        let filter = Filter::parse(&request.filter)?;
        let show_deleted = request.shows_deleted();
        let max_values = state.max_values;

        let Some(partition) = state.partitions.get(partition) else {
            return Ok(VecDeque::new());
        };

        let matched: Vec<RawEntry> = partition
            .entries
            .iter()
            .filter(|entry| in_scope(&entry.dn, &request.base_dn, request.scope))
            .filter(|entry| show_deleted || !is_deleted(entry))
            .filter(|entry| filter.matches(entry))
            .map(|entry| select(entry, &request.attributes, max_values))
            .collect::<DirectoryResult<_>>()?;

        let referrals = if request.scope == SearchScope::Base {
            Vec::new()
        } else {
            partition.referrals.clone()
        };

        let page_size = request.page_size();
        let limit = match (request.size_limit, page_size, state.server_size_limit) {
            (Some(limit), _, _) => usize::try_from(limit).ok().filter(|&l| l > 0),
            (None, None, server) => server,
            (None, Some(_), _) => None,
        };

        if let Some(size) = page_size.and_then(|s| usize::try_from(s).ok()).filter(|&s| s > 0) {
            state.stats.pages_served += matched.len().div_ceil(size).max(1);
        }

        let total = matched.len();
        let mut items: VecDeque<DirectoryResult<SearchItem>> = matched
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|entry| Ok(SearchItem::Entry(entry)))
            .collect();

        if limit.is_some_and(|limit| total > limit) {
            items.push_back(Err(DirectoryError::SizeLimitExceeded));
        } else if !referrals.is_empty() {
            items.push_back(Ok(SearchItem::Referral(referrals)));
        }

        Ok(items)
    }
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn connect(&self, target: Option<&str>) -> DirectoryResult<Arc<dyn DirectoryConnection>> {
        let partition = match target {
            None => DEFAULT_PARTITION.to_string(),
            Some(url) => referral_host(url)?,
        };

        let mut state = self.state.lock();
        let known = partition == DEFAULT_PARTITION || state.partitions.contains_key(&partition);
        if !known || state.unreachable.contains(&partition) {
            return Err(DirectoryError::connection(format!(
                "no directory server at {}",
                target.unwrap_or("default server")
            )));
        }
        state.stats.connections_opened += 1;

        Ok(Arc::new(MemoryConnection {
            directory: self.clone(),
            partition,
        }))
    }
}

fn referral_host(url: &str) -> DirectoryResult<String> {
    let parsed = Url::parse(url)
        .map_err(|e| DirectoryError::connection(format!("invalid server URL {url}: {e}")))?;
    parsed
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| DirectoryError::connection(format!("no host in {url}")))
}

/// A connection to one partition of a [`MemoryDirectory`].
#[derive(Debug)]
pub struct MemoryConnection {
    directory: MemoryDirectory,
    partition: String,
}

#[async_trait]
impl DirectoryConnection for MemoryConnection {
    async fn search(&self, request: SearchRequest) -> DirectoryResult<Box<dyn EntryStream>> {
        let items = self.directory.execute(&self.partition, &request)?;
        Ok(Box::new(MemoryStream { items }))
    }

    async fn unbind(&self) -> DirectoryResult<()> {
        self.directory.state.lock().stats.connections_released += 1;
        Ok(())
    }
}

struct MemoryStream {
    items: VecDeque<DirectoryResult<SearchItem>>,
}

#[async_trait]
impl EntryStream for MemoryStream {
    async fn next(&mut self) -> DirectoryResult<Option<SearchItem>> {
        self.items.pop_front().transpose()
    }
}

// ============================================================================
// Scopes and Attribute Selection
// ============================================================================

fn is_deleted(entry: &DirectoryEntry) -> bool {
    entry
        .get_attr("isDeleted")
        .is_some_and(|v| v.eq_ignore_ascii_case("TRUE"))
}

/// Parent of a DN, honouring escaped commas.
fn parent_dn(dn: &str) -> Option<&str> {
    let mut escaped = false;
    for (i, c) in dn.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ',' if !escaped => return Some(dn[i + 1..].trim_start()),
            _ => escaped = false,
        }
    }
    None
}

fn in_scope(dn: &str, base: &str, scope: SearchScope) -> bool {
    match scope {
        SearchScope::Base => dn.eq_ignore_ascii_case(base),
        SearchScope::OneLevel => {
            parent_dn(dn).is_some_and(|parent| parent.eq_ignore_ascii_case(base))
        }
        SearchScope::Subtree => {
            let mut current = Some(dn);
            while let Some(candidate) = current {
                if candidate.eq_ignore_ascii_case(base) {
                    return true;
                }
                current = parent_dn(candidate);
            }
            false
        }
    }
}

/// Builds the record returned for one entry.
fn select(
    entry: &DirectoryEntry,
    requested: &[String],
    max_values: Option<usize>,
) -> DirectoryResult<RawEntry> {
    let mut raw = RawEntry {
        dn: entry.dn.clone(),
        ..RawEntry::default()
    };

    let everything = requested.is_empty() || requested.iter().any(|a| a == "*");
    let stored = |name: &str| -> Option<(String, Vec<String>)> {
        if name.eq_ignore_ascii_case("distinguishedName") && entry.attr_key(name).is_none() {
            return Some(("distinguishedName".to_string(), vec![entry.dn.clone()]));
        }
        let key = entry.attr_key(name)?;
        Some((key.to_string(), entry.attributes.get(key).cloned().unwrap_or_default()))
    };

    if everything {
        for name in entry.attributes.keys() {
            if let Some((key, values)) = stored(name) {
                insert_windowed(&mut raw, key, values, max_values);
            }
        }
        if let Some((key, values)) = stored("distinguishedName") {
            raw.attrs.entry(key).or_insert(values);
        }
        raw.bin_attrs.clone_from(&entry.binary_attributes);
    }

    for name in requested.iter().filter(|a| a.as_str() != "*") {
        if RangeCursor::is_range_attribute(name) {
            let window = RangeCursor::parse(name)?;
            if let Some((key, values)) = stored(&window.attribute) {
                let (window_key, slice) =
                    slice_window(&key, &values, window.low, window.high, max_values);
                raw.attrs.insert(window_key, slice);
            }
            continue;
        }
        if let Some((key, values)) = stored(name) {
            if !raw.attrs.contains_key(&key) && !has_window_for(&raw, &key) {
                insert_windowed(&mut raw, key, values, max_values);
            }
            continue;
        }
        if let Some((key, values)) = entry
            .binary_attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            raw.bin_attrs.insert(key.clone(), values.clone());
        }
    }

    Ok(raw)
}

fn has_window_for(raw: &RawEntry, key: &str) -> bool {
    raw.attrs.keys().any(|k| {
        RangeCursor::is_range_attribute(k)
            && k.to_ascii_lowercase()
                .starts_with(&format!("{};", key.to_ascii_lowercase()))
    })
}

fn insert_windowed(
    raw: &mut RawEntry,
    key: String,
    values: Vec<String>,
    max_values: Option<usize>,
) {
    match max_values {
        Some(max) if values.len() > max => {
            let (window_key, slice) = slice_window(&key, &values, 0, None, Some(max));
            raw.attrs.insert(window_key, slice);
        }
        _ => {
            raw.attrs.insert(key, values);
        }
    }
}

/// Serves `low..=high` of `values`, capped at `max_values`. The returned key
/// carries `*` as upper bound when the window reaches the last value.
fn slice_window(
    key: &str,
    values: &[String],
    low: u32,
    high: Option<u32>,
    max_values: Option<usize>,
) -> (String, Vec<String>) {
    let start = usize::try_from(low).unwrap_or(usize::MAX).min(values.len());
    let mut end = high
        .and_then(|h| usize::try_from(h).ok())
        .map_or(values.len(), |h| h.saturating_add(1))
        .min(values.len());
    if let Some(max) = max_values {
        end = end.min(start.saturating_add(max));
    }
    let end = end.max(start);

    let slice = values[start..end].to_vec();
    let window_key = if end >= values.len() {
        format!("{key};range={start}-*")
    } else {
        format!("{key};range={start}-{}", end - 1)
    };
    (window_key, slice)
}

// ============================================================================
// Filters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Equal(String, String),
    Present(String),
    Substring {
        attribute: String,
        initial: Option<String>,
        any: Vec<String>,
        last: Option<String>,
    },
}

impl Filter {
    fn parse(input: &str) -> DirectoryResult<Self> {
        let trimmed = input.trim();
        let (filter, rest) = parse_filter(trimmed)
            .ok_or_else(|| DirectoryError::protocol(format!("malformed filter {trimmed}")))?;
        if !rest.trim().is_empty() {
            return Err(DirectoryError::protocol(format!("malformed filter {trimmed}")));
        }
        Ok(filter)
    }

    fn matches(&self, entry: &DirectoryEntry) -> bool {
        match self {
            Self::And(filters) => filters.iter().all(|f| f.matches(entry)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(entry)),
            Self::Not(filter) => !filter.matches(entry),
            // every entry has an object class
            Self::Present(attribute) => {
                attribute.eq_ignore_ascii_case("objectClass")
                    || !values_of(entry, attribute).is_empty()
            }
            Self::Equal(attribute, value) => {
                let category = attribute.eq_ignore_ascii_case("objectCategory");
                values_of(entry, attribute).iter().any(|candidate| {
                    candidate.eq_ignore_ascii_case(value)
                        || (category && category_matches(candidate, value))
                })
            }
            Self::Substring {
                attribute,
                initial,
                any,
                last,
            } => values_of(entry, attribute).iter().any(|candidate| {
                substring_matches(candidate, initial.as_deref(), any, last.as_deref())
            }),
        }
    }
}

fn values_of(entry: &DirectoryEntry, attribute: &str) -> Vec<String> {
    if attribute.eq_ignore_ascii_case("distinguishedName") || attribute.eq_ignore_ascii_case("dn") {
        return vec![entry.dn.clone()];
    }
    entry.values(attribute)
}

/// `objectCategory=User` matches the Person category, and a bare class name
/// matches the category DN whose first RDN names that class.
fn category_matches(category: &str, value: &str) -> bool {
    let class = category
        .split(',')
        .next()
        .and_then(|rdn| rdn.split_once('='))
        .map_or(category, |(_, class)| class)
        .trim();
    class.eq_ignore_ascii_case(value)
        || (value.eq_ignore_ascii_case("user") && class.eq_ignore_ascii_case("person"))
}

fn substring_matches(
    candidate: &str,
    initial: Option<&str>,
    any: &[String],
    last: Option<&str>,
) -> bool {
    let candidate = candidate.to_lowercase();
    let mut rest = candidate.as_str();

    if let Some(initial) = initial {
        let initial = initial.to_lowercase();
        let Some(stripped) = rest.strip_prefix(initial.as_str()) else {
            return false;
        };
        rest = stripped;
    }
    for part in any {
        let part = part.to_lowercase();
        let Some(position) = rest.find(part.as_str()) else {
            return false;
        };
        rest = &rest[position + part.len()..];
    }
    last.is_none_or(|last| rest.ends_with(last.to_lowercase().as_str()))
}

/// Parses one parenthesized filter, returning it and the unparsed rest.
fn parse_filter(input: &str) -> Option<(Filter, &str)> {
    let inner = input.strip_prefix('(')?;
    let mut chars = inner.chars();
    match chars.next()? {
        '&' => {
            let (filters, rest) = parse_list(&inner[1..])?;
            Some((Filter::And(filters), rest))
        }
        '|' => {
            let (filters, rest) = parse_list(&inner[1..])?;
            Some((Filter::Or(filters), rest))
        }
        '!' => {
            let (filter, rest) = parse_filter(inner[1..].trim_start())?;
            let rest = rest.trim_start().strip_prefix(')')?;
            Some((Filter::Not(Box::new(filter)), rest))
        }
        _ => {
            let end = find_unescaped_close(inner)?;
            let item = parse_item(&inner[..end])?;
            Some((item, &inner[end + 1..]))
        }
    }
}

fn parse_list(mut input: &str) -> Option<(Vec<Filter>, &str)> {
    let mut filters = Vec::new();
    loop {
        input = input.trim_start();
        if let Some(rest) = input.strip_prefix(')') {
            return Some((filters, rest));
        }
        let (filter, rest) = parse_filter(input)?;
        filters.push(filter);
        input = rest;
    }
}

fn find_unescaped_close(input: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ')' if !escaped => return Some(i),
            _ => escaped = false,
        }
    }
    None
}

fn parse_item(item: &str) -> Option<Filter> {
    let (attribute, value) = item.split_once('=')?;
    let attribute = attribute.trim();
    if attribute.is_empty() || attribute.ends_with(['<', '>', '~', ':']) {
        return None;
    }
    let attribute = attribute.to_string();

    if value == "*" {
        return Some(Filter::Present(attribute));
    }

    let parts: Vec<&str> = value.split('*').collect();
    if parts.len() == 1 {
        return Some(Filter::Equal(attribute, unescape(value)?));
    }

    let unescape_part = |part: &str| -> Option<Option<String>> {
        if part.is_empty() {
            Some(None)
        } else {
            unescape(part).map(Some)
        }
    };
    let initial = unescape_part(parts[0])?;
    let last = unescape_part(parts[parts.len() - 1])?;
    let any = parts[1..parts.len() - 1]
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| unescape(p))
        .collect::<Option<Vec<_>>>()?;

    Some(Filter::Substring {
        attribute,
        initial,
        any,
        last,
    })
}

/// Decodes `\XX` escapes.
fn unescape(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            let hex = value.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

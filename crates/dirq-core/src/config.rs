//! Engine configuration.
//!
//! One [`SearchConfig`] is threaded through every call of a
//! [`Directory`](crate::Directory). There is no process-wide default table:
//! two directories with different defaults never see each other's settings.

use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};

/// Page size used when none is configured. Matches the default `MaxPageSize`
/// of Active Directory.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Referral targets that are never chased unless the exclusion list is
/// overridden: the two application partitions holding DNS zones and the
/// configuration partition.
pub const DEFAULT_REFERRAL_EXCLUSIONS: [&str; 3] = [
    r"ldaps?://ForestDnsZones\..*/.*",
    r"ldaps?://DomainDnsZones\..*/.*",
    r"ldaps?://.*/CN=Configuration,.*",
];

// ============================================================================
// Search Configuration
// ============================================================================

/// Configuration consumed by the search engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base DN used when a query does not name one.
    pub base_dn: String,

    /// Server-side page size for paged searches.
    pub page_size: u32,

    /// Number of member DNs folded into one follow-up filter during group
    /// expansion. Defaults to the page size.
    pub chunk_size: Option<usize>,

    /// Attribute holding an entry's own DN, used to look entries up by DN
    /// inside a filter.
    pub distinguished_name_attribute: String,

    /// Referral chasing policy.
    pub referrals: ReferralConfig,

    /// Attributes requested when a query does not list its own.
    pub attributes: DefaultAttributes,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_dn: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            chunk_size: None,
            distinguished_name_attribute: "distinguishedName".to_string(),
            referrals: ReferralConfig::default(),
            attributes: DefaultAttributes::default(),
        }
    }
}

impl SearchConfig {
    /// Creates a configuration rooted at `base_dn` with defaults elsewhere.
    #[must_use]
    pub fn new(base_dn: impl Into<String>) -> Self {
        Self {
            base_dn: base_dn.into(),
            ..Self::default()
        }
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the member chunk size.
    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Sets the referral policy.
    #[must_use]
    pub fn with_referrals(mut self, referrals: ReferralConfig) -> Self {
        self.referrals = referrals;
        self
    }

    /// Sets the default attribute tables.
    #[must_use]
    pub fn with_attributes(mut self, attributes: DefaultAttributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Effective chunk size for member expansion. Never zero.
    #[must_use]
    pub fn effective_chunk_size(&self) -> usize {
        let size = self
            .chunk_size
            .unwrap_or(usize::try_from(self.page_size).unwrap_or(usize::MAX));
        size.max(1)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.base_dn.trim().is_empty() {
            return Err(DirectoryError::config("base_dn cannot be empty"));
        }
        if self.page_size == 0 {
            return Err(DirectoryError::config("page_size must be positive"));
        }
        if self.chunk_size == Some(0) {
            return Err(DirectoryError::config("chunk_size must be positive"));
        }
        if self.distinguished_name_attribute.is_empty() {
            return Err(DirectoryError::config(
                "distinguished_name_attribute cannot be empty",
            ));
        }
        ReferralPolicy::compile(&self.referrals)?;
        Ok(())
    }
}

// ============================================================================
// Default Attributes
// ============================================================================

/// Default attribute lists per entry kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultAttributes {
    /// Attributes returned for user entries.
    pub user: Vec<String>,

    /// Attributes returned for group entries.
    pub group: Vec<String>,
}

impl Default for DefaultAttributes {
    fn default() -> Self {
        let owned = |names: &[&str]| names.iter().map(ToString::to_string).collect();
        Self {
            user: owned(&[
                "distinguishedName",
                "userPrincipalName",
                "sAMAccountName",
                "mail",
                "lockoutTime",
                "whenCreated",
                "pwdLastSet",
                "userAccountControl",
                "employeeID",
                "sn",
                "givenName",
                "initials",
                "cn",
                "displayName",
                "comment",
                "description",
            ]),
            group: owned(&["distinguishedName", "objectCategory", "cn", "description"]),
        }
    }
}

// ============================================================================
// Referrals
// ============================================================================

/// Referral chasing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralConfig {
    /// Whether referrals are chased at all.
    pub enabled: bool,

    /// Case-insensitive regular expressions; a referral URL matching any of
    /// them is never followed.
    pub exclude: Vec<String>,

    /// Maximum number of nested referral hops from the original search.
    pub max_hops: u8,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            exclude: DEFAULT_REFERRAL_EXCLUSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            max_hops: 5,
        }
    }
}

impl ReferralConfig {
    /// Referral chasing enabled with the default exclusion list.
    #[must_use]
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// Compiled form of a [`ReferralConfig`].
#[derive(Debug, Clone)]
pub struct ReferralPolicy {
    enabled: bool,
    exclude: RegexSet,
    max_hops: u8,
}

impl ReferralPolicy {
    /// Compiles the exclusion patterns.
    ///
    /// ## Errors
    ///
    /// Returns a configuration error if a pattern is not a valid regex.
    pub fn compile(config: &ReferralConfig) -> DirectoryResult<Self> {
        let exclude = RegexSetBuilder::new(&config.exclude)
            .case_insensitive(true)
            .build()
            .map_err(|e| DirectoryError::config(format!("invalid referral exclusion: {e}")))?;

        Ok(Self {
            enabled: config.enabled,
            exclude,
            max_hops: config.max_hops,
        })
    }

    /// Whether a referral to `url` found at hop depth `hops` should be chased.
    #[must_use]
    pub fn allows(&self, url: &str, hops: u8) -> bool {
        self.enabled && hops < self.max_hops && !self.exclude.is_match(url)
    }

    /// Whether `url` matches the exclusion list.
    #[must_use]
    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclude.is_match(url)
    }
}

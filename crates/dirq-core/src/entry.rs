//! Directory entries and their classification.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::connector::RawEntry;

/// Marker attribute only group objects carry.
pub const GROUP_TYPE_ATTRIBUTE: &str = "groupType";

/// Marker attribute only user objects carry.
pub const USER_PRINCIPAL_NAME_ATTRIBUTE: &str = "userPrincipalName";

/// What kind of directory object an entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A user account.
    User,
    /// A group.
    Group,
    /// Anything else (computers, contacts, containers...).
    Other,
}

/// A directory entry with parsed attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished Name.
    pub dn: String,

    /// Attributes (all values are multi-valued).
    pub attributes: HashMap<String, Vec<String>>,

    /// Binary attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub binary_attributes: HashMap<String, Vec<Vec<u8>>>,

    /// Resolved group membership, present only when enrichment was requested
    /// for this kind of entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<DirectoryEntry>>,
}

impl DirectoryEntry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Self::default()
        }
    }

    /// Creates an entry from a raw protocol record, dropping protocol-only
    /// fields.
    #[must_use]
    pub fn from_raw(raw: RawEntry) -> Self {
        Self {
            dn: raw.dn,
            attributes: raw.attrs,
            binary_attributes: raw.bin_attrs,
            groups: None,
        }
    }

    /// Adds values to an attribute (builder style).
    #[must_use]
    pub fn with_attr<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.append_values(name, values.into_iter().map(Into::into));
        self
    }

    /// Lowercased DN, the identity key used for deduplication.
    #[must_use]
    pub fn identity_key(&self) -> String {
        self.dn.to_lowercase()
    }

    /// Finds the stored attribute name matching `name` case-insensitively.
    #[must_use]
    pub fn attr_key(&self, name: &str) -> Option<&str> {
        if self.attributes.contains_key(name) {
            return self
                .attributes
                .get_key_value(name)
                .map(|(k, _)| k.as_str());
        }
        self.attributes
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Gets a single-valued attribute.
    #[must_use]
    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.get_attrs(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Gets a multi-valued attribute.
    #[must_use]
    pub fn get_attrs(&self, name: &str) -> Option<&Vec<String>> {
        let key = self.attr_key(name)?;
        self.attributes.get(key)
    }

    /// Gets all values of an attribute, or an empty list.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<String> {
        self.get_attrs(name).cloned().unwrap_or_default()
    }

    /// Checks if the entry has a non-empty attribute.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.get_attrs(name).is_some_and(|v| !v.is_empty())
    }

    /// Removes an attribute, returning its values.
    pub fn remove_attr(&mut self, name: &str) -> Option<Vec<String>> {
        let key = self.attr_key(name)?.to_string();
        self.attributes.remove(&key)
    }

    /// Appends values to an attribute, creating it if needed. An existing
    /// attribute keeps its stored spelling.
    pub fn append_values(&mut self, name: &str, values: impl IntoIterator<Item = String>) {
        let key = self
            .attr_key(name)
            .map_or_else(|| name.to_string(), ToString::to_string);
        self.attributes.entry(key).or_default().extend(values);
    }

    /// Whether this entry represents a group.
    ///
    /// Checked in order: the group-type marker, the object category, the
    /// object class list.
    #[must_use]
    pub fn is_group(&self) -> bool {
        if self.has_attr(GROUP_TYPE_ATTRIBUTE) {
            return true;
        }
        if let Some(category) = self.get_attr("objectCategory") {
            return category_is(category, "group");
        }
        self.has_object_class("group")
    }

    /// Whether this entry represents a user.
    ///
    /// Checked in order: the principal-name marker, the object category, the
    /// object class list.
    #[must_use]
    pub fn is_user(&self) -> bool {
        if self.has_attr(USER_PRINCIPAL_NAME_ATTRIBUTE) {
            return true;
        }
        if let Some(category) = self.get_attr("objectCategory") {
            return category_is(category, "person");
        }
        self.has_object_class("user")
    }

    /// Classifies the entry. Groups win over users.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        if self.is_group() {
            EntryKind::Group
        } else if self.is_user() {
            EntryKind::User
        } else {
            EntryKind::Other
        }
    }

    fn has_object_class(&self, class: &str) -> bool {
        self.get_attrs("objectClass")
            .is_some_and(|classes| classes.iter().any(|c| c.eq_ignore_ascii_case(class)))
    }
}

/// Matches an `objectCategory` DN such as
/// `CN=Person,CN=Schema,CN=Configuration,DC=example,DC=com` against a schema
/// class name, or the bare class name some servers return.
fn category_is(category: &str, class: &str) -> bool {
    let first_rdn = category.split(',').next().unwrap_or_default().trim();
    let value = first_rdn
        .split_once('=')
        .map_or(first_rdn, |(attr, value)| {
            if attr.trim().eq_ignore_ascii_case("cn") {
                value
            } else {
                ""
            }
        });
    value.trim().eq_ignore_ascii_case(class)
}

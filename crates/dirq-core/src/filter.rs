//! Filter construction and attribute projection.
//!
//! Pure helpers; nothing in here performs I/O.

use std::collections::HashSet;

use crate::entry::DirectoryEntry;

/// Filter used by [`Finder`](crate::Finder) when the caller supplies none.
pub const DEFAULT_FIND_FILTER: &str =
    "(|(objectClass=user)(objectClass=group)(objectClass=computer))";

/// Attributes needed to classify an entry as user, group or other.
pub const CLASSIFICATION_ATTRIBUTES: [&str; 4] =
    ["objectCategory", "objectClass", "groupType", "userPrincipalName"];

/// Escapes special characters in filter assertion values (RFC 4515).
#[must_use]
pub fn escape_filter_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

/// Whether `value` looks like a distinguished name rather than a plain name.
#[must_use]
pub fn is_distinguished_name(value: &str) -> bool {
    value
        .split_once('=')
        .is_some_and(|(attr, rest)| !attr.trim().is_empty() && !rest.trim().is_empty())
}

/// `(attr=value)` with the value escaped.
#[must_use]
pub fn equality(attribute: &str, value: &str) -> String {
    format!("({attribute}={})", escape_filter_value(value))
}

/// Disjunction of equality assertions on one attribute.
///
/// A single value yields a plain equality filter. An empty list yields a
/// filter that matches nothing.
#[must_use]
pub fn any_of<S: AsRef<str>>(attribute: &str, values: &[S]) -> String {
    match values {
        [] => "(!(objectClass=*))".to_string(),
        [single] => equality(attribute, single.as_ref()),
        many => {
            let terms: String = many
                .iter()
                .map(|value| equality(attribute, value.as_ref()))
                .collect();
            format!("(|{terms})")
        }
    }
}

/// Filter selecting entries whose `member` attribute contains `dn`.
#[must_use]
pub fn member_filter(dn: &str) -> String {
    equality("member", dn)
}

/// Filter locating a user by DN, sAMAccountName or userPrincipalName.
#[must_use]
pub fn user_filter(name_or_dn: &str, dn_attribute: &str) -> String {
    if name_or_dn.is_empty() {
        return "(objectCategory=User)".to_string();
    }
    if is_distinguished_name(name_or_dn) {
        return format!("(&(objectCategory=User){})", equality(dn_attribute, name_or_dn));
    }
    let value = escape_filter_value(name_or_dn);
    format!("(&(objectCategory=User)(|(sAMAccountName={value})(userPrincipalName={value})))")
}

/// Filter locating a group by DN or common name.
#[must_use]
pub fn group_filter(name_or_dn: &str, dn_attribute: &str) -> String {
    if name_or_dn.is_empty() {
        return "(objectCategory=Group)".to_string();
    }
    if is_distinguished_name(name_or_dn) {
        return format!("(&(objectCategory=Group){})", equality(dn_attribute, name_or_dn));
    }
    format!("(&(objectCategory=Group){})", equality("cn", name_or_dn))
}

/// Combines a class filter with an optional caller filter.
#[must_use]
pub fn and(left: &str, right: Option<&str>) -> String {
    match right.map(str::trim).filter(|f| !f.is_empty()) {
        Some(right) => format!("(&{left}{right})"),
        None => left.to_string(),
    }
}

/// Whether an attribute request means "every attribute".
#[must_use]
pub fn includes_all_attributes(requested: Option<&[String]>) -> bool {
    requested.is_some_and(|attrs| attrs.is_empty() || attrs.iter().any(|a| a == "*"))
}

/// Case-insensitive union of attribute lists, first spelling and order kept.
#[must_use]
pub fn union_attributes<S: AsRef<str>>(lists: &[&[S]]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for list in lists {
        for name in *list {
            let name = name.as_ref();
            if seen.insert(name.to_ascii_lowercase()) {
                result.push(name.to_string());
            }
        }
    }
    result
}

/// Attribute list to put on the wire.
///
/// Empty means "all attributes". Otherwise the caller's list (or the
/// defaults) plus whatever the engine itself needs.
#[must_use]
pub fn wire_attributes(
    requested: Option<&[String]>,
    defaults: &[String],
    required: &[&str],
) -> Vec<String> {
    if includes_all_attributes(requested) {
        return Vec::new();
    }
    let base = requested.unwrap_or(defaults);
    let required: Vec<String> = required.iter().map(ToString::to_string).collect();
    union_attributes(&[base, required.as_slice()])
}

/// Attribute list an emitted entry is projected down to; `None` keeps all.
#[must_use]
pub fn projection(requested: Option<&[String]>, defaults: &[String]) -> Option<Vec<String>> {
    if includes_all_attributes(requested) {
        return None;
    }
    Some(requested.unwrap_or(defaults).to_vec())
}

/// Keeps only the listed attributes (case-insensitive). The DN and resolved
/// groups are always kept.
#[must_use]
pub fn project(mut entry: DirectoryEntry, attributes: Option<&[String]>) -> DirectoryEntry {
    let Some(attributes) = attributes else {
        return entry;
    };
    let keep: HashSet<String> = attributes.iter().map(|a| a.to_ascii_lowercase()).collect();
    entry
        .attributes
        .retain(|name, _| keep.contains(&name.to_ascii_lowercase()));
    entry
        .binary_attributes
        .retain(|name, _| keep.contains(&name.to_ascii_lowercase()));
    entry
}

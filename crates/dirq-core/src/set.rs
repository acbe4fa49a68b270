//! Identity-keyed collections used by the resolvers.
//!
//! DNs are compared case-insensitively everywhere in this module.

use std::collections::{HashMap, HashSet};

use serde::{Serialize, Serializer};

use crate::entry::DirectoryEntry;

// ============================================================================
// Entry Set
// ============================================================================

/// Deduplicated collection of entries keyed by DN, in discovery order.
///
/// Inserting an entry whose DN is already present replaces the stored entry
/// in place (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySet {
    entries: Vec<DirectoryEntry>,
    index: HashMap<String, usize>,
}

impl EntrySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry with this DN is present.
    #[must_use]
    pub fn contains(&self, dn: &str) -> bool {
        self.index.contains_key(&dn.to_lowercase())
    }

    /// Gets the entry stored for a DN.
    #[must_use]
    pub fn get(&self, dn: &str) -> Option<&DirectoryEntry> {
        self.index
            .get(&dn.to_lowercase())
            .map(|&position| &self.entries[position])
    }

    /// Inserts an entry. Returns `true` if the identity was new.
    pub fn insert(&mut self, entry: DirectoryEntry) -> bool {
        match self.index.get(&entry.identity_key()) {
            Some(&position) => {
                self.entries[position] = entry;
                false
            }
            None => {
                self.index.insert(entry.identity_key(), self.entries.len());
                self.entries.push(entry);
                true
            }
        }
    }

    /// Merges another set into this one.
    pub fn merge(&mut self, other: Self) {
        for entry in other.entries {
            self.insert(entry);
        }
    }

    /// Iterates in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, DirectoryEntry> {
        self.entries.iter()
    }

    /// Lowercased DNs of every entry.
    #[must_use]
    pub fn identities(&self) -> HashSet<String> {
        self.index.keys().cloned().collect()
    }

    /// Consumes the set, returning entries in discovery order.
    #[must_use]
    pub fn into_vec(self) -> Vec<DirectoryEntry> {
        self.entries
    }
}

impl FromIterator<DirectoryEntry> for EntrySet {
    fn from_iter<T: IntoIterator<Item = DirectoryEntry>>(iter: T) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

impl IntoIterator for EntrySet {
    type Item = DirectoryEntry;
    type IntoIter = std::vec::IntoIter<DirectoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntrySet {
    type Item = &'a DirectoryEntry;
    type IntoIter = std::slice::Iter<'a, DirectoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl Serialize for EntrySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

// ============================================================================
// Recursion Guards
// ============================================================================

/// Identities already entered during one ancestor-group resolution.
///
/// Grows monotonically for the lifetime of one top-level call.
#[derive(Debug, Clone, Default)]
pub struct RecursionGuard {
    seen: HashSet<String>,
}

impl RecursionGuard {
    /// Creates a guard seeded with the identity the resolution starts from.
    #[must_use]
    pub fn starting_at(dn: &str) -> Self {
        let mut guard = Self::default();
        guard.enter(dn);
        guard
    }

    /// Marks `dn` as entered. Returns `false` if it already was.
    pub fn enter(&mut self, dn: &str) -> bool {
        self.seen.insert(dn.to_lowercase())
    }

    /// Whether `dn` was entered.
    #[must_use]
    pub fn contains(&self, dn: &str) -> bool {
        self.seen.contains(&dn.to_lowercase())
    }
}

/// Chain of groups currently being expanded, outermost first.
///
/// Unlike [`RecursionGuard`] this is a path: each recursive branch extends its
/// own copy, so sibling branches never see each other's groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPath {
    stack: Vec<String>,
}

impl MembershipPath {
    /// Creates an empty path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this path extended with `dn`.
    #[must_use]
    pub fn push(&self, dn: &str) -> Self {
        let mut stack = self.stack.clone();
        stack.push(dn.to_lowercase());
        Self { stack }
    }

    /// Whether `dn` is on the path.
    #[must_use]
    pub fn contains(&self, dn: &str) -> bool {
        let key = dn.to_lowercase();
        self.stack.iter().any(|entry| *entry == key)
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_set_deduplicates_case_insensitively() {
        let mut set = EntrySet::new();
        assert!(set.insert(DirectoryEntry::new("CN=A,DC=example,DC=com").with_attr("cn", ["a"])));
        assert!(set.insert(DirectoryEntry::new("CN=B,DC=example,DC=com")));
        assert!(!set.insert(DirectoryEntry::new("cn=a,dc=example,dc=com").with_attr("cn", ["A2"])));

        assert_eq!(set.len(), 2);
        assert!(set.contains("Cn=A,Dc=Example,Dc=Com"));
        // last write wins, position kept
        let first = set.iter().next().unwrap();
        assert_eq!(first.get_attr("cn"), Some("A2"));
    }

    #[test]
    fn merge_unions_identities() {
        let mut left: EntrySet = [
            DirectoryEntry::new("CN=A,DC=x"),
            DirectoryEntry::new("CN=B,DC=x"),
        ]
        .into_iter()
        .collect();
        let right: EntrySet = [DirectoryEntry::new("cn=b,dc=x"), DirectoryEntry::new("CN=C,DC=x")]
            .into_iter()
            .collect();
        left.merge(right);

        let expected: HashSet<String> = ["cn=a,dc=x", "cn=b,dc=x", "cn=c,dc=x"]
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(left.identities(), expected);
    }

    #[test]
    fn guard_grows_monotonically() {
        let mut guard = RecursionGuard::starting_at("CN=Start,DC=x");
        assert!(guard.contains("cn=start,dc=x"));
        assert!(guard.enter("CN=G1,DC=x"));
        assert!(!guard.enter("cn=g1,dc=x"));
    }

    #[test]
    fn path_is_per_branch() {
        let root = MembershipPath::new().push("CN=G1,DC=x");
        let left = root.push("CN=G2,DC=x");
        let right = root.push("CN=G3,DC=x");

        assert!(left.contains("cn=g2,dc=x"));
        assert!(!right.contains("cn=g2,dc=x"));
        assert!(right.contains("CN=G1,DC=X"));
        assert_eq!(left.depth(), 2);
    }

    #[test]
    fn serializes_as_list() {
        let set: EntrySet = [DirectoryEntry::new("CN=A,DC=x")].into_iter().collect();
        let json = serde_json::to_value(&set).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["dn"], "CN=A,DC=x");
    }
}

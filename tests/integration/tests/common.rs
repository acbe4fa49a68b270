//! Common test utilities and fixtures.

use std::sync::Arc;

use dirq_core::memory::MemoryDirectory;
use dirq_core::{Directory, DirectoryEntry, SearchConfig};

/// Base DN of every fixture directory.
pub const BASE: &str = "DC=example,DC=com";

/// Test environment: an in-memory directory and the facade over it.
pub struct TestEnv {
    /// Backend, for fault injection and connection accounting.
    pub memory: MemoryDirectory,
    /// Facade under test.
    pub directory: Directory,
}

impl TestEnv {
    /// Creates an environment holding `entries`, with the default configuration.
    pub fn new(entries: Vec<DirectoryEntry>) -> anyhow::Result<Self> {
        Self::with_config(entries, SearchConfig::new(BASE))
    }

    /// Creates an environment holding `entries`.
    pub fn with_config(entries: Vec<DirectoryEntry>, config: SearchConfig) -> anyhow::Result<Self> {
        Self::over(MemoryDirectory::new(), entries, config)
    }

    /// Creates an environment over a prepared backend.
    pub fn over(
        memory: MemoryDirectory,
        entries: Vec<DirectoryEntry>,
        config: SearchConfig,
    ) -> anyhow::Result<Self> {
        init_tracing();
        for entry in entries {
            memory.add_entry(entry);
        }
        let directory = Directory::new(Arc::new(memory.clone()), config)?;
        Ok(Self { memory, directory })
    }

    /// Asserts every connection opened so far was released exactly once.
    pub fn assert_connections_released(&self) {
        let stats = self.memory.stats();
        assert!(stats.connections_opened > 0, "no connection was opened");
        assert_eq!(
            stats.connections_opened, stats.connections_released,
            "connections opened and released differ"
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dirq_core=debug")
        .with_test_writer()
        .try_init();
}

/// A user entry under `OU=Users`.
pub fn user(cn: &str) -> DirectoryEntry {
    let sam = cn.to_lowercase().replace(' ', ".");
    DirectoryEntry::new(format!("CN={cn},OU=Users,{BASE}"))
        .with_attr("cn", [cn])
        .with_attr("sAMAccountName", [sam.clone()])
        .with_attr("userPrincipalName", [format!("{sam}@example.com")])
        .with_attr("mail", [format!("{sam}@example.com")])
        .with_attr("objectCategory", [format!("CN=Person,CN=Schema,CN=Configuration,{BASE}")])
        .with_attr("objectClass", ["top", "person", "organizationalPerson", "user"])
}

/// A security group under `OU=Groups` with the given member DNs.
pub fn group<S: AsRef<str>>(cn: &str, members: &[S]) -> DirectoryEntry {
    DirectoryEntry::new(group_dn(cn))
        .with_attr("cn", [cn])
        .with_attr("groupType", ["-2147483646"])
        .with_attr("objectCategory", [format!("CN=Group,CN=Schema,CN=Configuration,{BASE}")])
        .with_attr("objectClass", ["top", "group"])
        .with_attr("member", members.iter().map(|m| m.as_ref().to_string()))
}

/// A computer, neither user nor group.
pub fn computer(cn: &str) -> DirectoryEntry {
    DirectoryEntry::new(format!("CN={cn},OU=Computers,{BASE}"))
        .with_attr("cn", [cn])
        .with_attr("objectCategory", [format!("CN=Computer,CN=Schema,CN=Configuration,{BASE}")])
        .with_attr("objectClass", ["top", "computer"])
}

/// DN of a fixture user.
pub fn user_dn(cn: &str) -> String {
    format!("CN={cn},OU=Users,{BASE}")
}

/// DN of a fixture group.
pub fn group_dn(cn: &str) -> String {
    format!("CN={cn},OU=Groups,{BASE}")
}

/// Sorted, lowercased DNs.
pub fn dns<'a>(entries: impl IntoIterator<Item = &'a DirectoryEntry>) -> Vec<String> {
    let mut dns: Vec<String> = entries.into_iter().map(|e| e.dn.to_lowercase()).collect();
    dns.sort();
    dns
}

/// Sorted, lowercased DNs from strings.
pub fn expected<S: AsRef<str>>(dns: &[S]) -> Vec<String> {
    let mut dns: Vec<String> = dns.iter().map(|d| d.as_ref().to_lowercase()).collect();
    dns.sort();
    dns
}

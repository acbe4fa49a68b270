//! Referral chasing across partitions.

use dirq_core::memory::MemoryDirectory;
use dirq_core::{DirectoryEntry, QueryParameters, ReferralConfig, SearchConfig};

use crate::common::{BASE, TestEnv, dns, expected, user, user_dn};

fn remote_user(cn: &str, domain: &str) -> DirectoryEntry {
    DirectoryEntry::new(format!("CN={cn},DC={domain},{BASE}"))
        .with_attr("cn", [cn])
        .with_attr("objectClass", ["top", "person", "user"])
}

fn chasing() -> SearchConfig {
    SearchConfig::new(BASE).with_referrals(ReferralConfig::enabled())
}

#[tokio::test]
async fn test_excluded_partition_is_never_followed() -> anyhow::Result<()> {
    let memory = MemoryDirectory::new();
    memory.add_partition("child.example.com", vec![remote_user("Remote", "child")]);
    memory.add_partition(
        "forestdnszones.example.com",
        vec![remote_user("Remote", "ForestDnsZones")],
    );
    memory.add_referral(format!("ldap://child.example.com/DC=child,{BASE}"));
    memory.add_referral(format!("ldap://ForestDnsZones.example.com/DC=ForestDnsZones,{BASE}"));

    let env = TestEnv::over(memory, vec![user("Local")], chasing())?;
    let entries = env.directory.search(&QueryParameters::new("(cn=*)")).await?;

    assert_eq!(
        dns(&entries),
        expected(&[user_dn("Local"), format!("CN=Remote,DC=child,{BASE}")])
    );
    // the local server and the child partition only
    assert_eq!(env.memory.stats().connections_opened, 2);
    env.assert_connections_released();
    Ok(())
}

#[tokio::test]
async fn test_unreachable_referral_does_not_fail_search() -> anyhow::Result<()> {
    let memory = MemoryDirectory::new();
    memory.add_partition("child.example.com", vec![remote_user("Remote", "child")]);
    memory.fail_connect_to("child.example.com");
    memory.add_referral(format!("ldap://child.example.com/DC=child,{BASE}"));

    let env = TestEnv::over(memory, vec![user("Local")], chasing())?;
    let entries = env.directory.search(&QueryParameters::new("(cn=*)")).await?;

    assert_eq!(dns(&entries), expected(&[user_dn("Local")]));
    env.assert_connections_released();
    Ok(())
}

#[tokio::test]
async fn test_referral_loop_stops_at_hop_limit() -> anyhow::Result<()> {
    let memory = MemoryDirectory::new();
    memory.add_partition("a.example.com", vec![remote_user("Alpha", "a")]);
    memory.add_partition("b.example.com", vec![remote_user("Beta", "b")]);
    memory.add_referral(format!("ldap://a.example.com/{BASE}"));
    memory.add_partition_referral("a.example.com", format!("ldap://b.example.com/{BASE}"));
    memory.add_partition_referral("b.example.com", format!("ldap://a.example.com/{BASE}"));

    let mut config = chasing();
    config.referrals.max_hops = 3;
    let env = TestEnv::over(memory, vec![user("Local")], config)?;

    let entries = env.directory.search(&QueryParameters::new("(cn=*)")).await?;

    // local, a, b, a again; the last referral back to b is dropped
    assert_eq!(env.memory.stats().connections_opened, 4);
    env.assert_connections_released();
    assert!(entries.iter().any(|e| e.dn.starts_with("CN=Beta")));
    Ok(())
}

#[tokio::test]
async fn test_referrals_ignored_when_disabled() -> anyhow::Result<()> {
    let memory = MemoryDirectory::new();
    memory.add_partition("child.example.com", vec![remote_user("Remote", "child")]);
    memory.add_referral(format!("ldap://child.example.com/DC=child,{BASE}"));

    let env = TestEnv::over(memory, vec![user("Local")], SearchConfig::new(BASE))?;
    let entries = env.directory.search(&QueryParameters::new("(cn=*)")).await?;

    assert_eq!(entries.len(), 1);
    assert_eq!(env.memory.stats().connections_opened, 1);
    Ok(())
}

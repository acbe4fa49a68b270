//! Range-limited attribute retrieval.

use dirq_core::memory::MemoryDirectory;
use dirq_core::{QueryParameters, RangeCursor, SearchConfig};

use crate::common::{BASE, TestEnv, group, group_dn, user_dn};

fn big_group(members: usize) -> dirq_core::DirectoryEntry {
    let dns: Vec<String> = (0..members).map(|i| user_dn(&format!("User {i:03}"))).collect();
    group("Big", &dns)
}

#[tokio::test]
async fn test_windows_are_merged_into_one_attribute() -> anyhow::Result<()> {
    let memory = MemoryDirectory::new().with_max_values(3);
    let env = TestEnv::over(memory, vec![big_group(20)], SearchConfig::new(BASE))?;

    let entries = env
        .directory
        .search(&QueryParameters::new("(cn=Big)").with_attributes(["cn", "member"]))
        .await?;

    let big = &entries[0];
    let mut members = big.values("member");
    assert_eq!(members.len(), 20);
    members.sort();
    members.dedup();
    assert_eq!(members.len(), 20, "no value delivered twice");
    assert!(big.attributes.keys().all(|k| !k.contains(";range=")));
    env.assert_connections_released();
    Ok(())
}

#[tokio::test]
async fn test_follow_ups_share_the_search_connection() -> anyhow::Result<()> {
    let memory = MemoryDirectory::new().with_max_values(5);
    let env = TestEnv::over(memory, vec![big_group(50)], SearchConfig::new(BASE))?;

    env.directory
        .search(&QueryParameters::new("(cn=Big)").with_attributes(["member"]))
        .await?;

    let stats = env.memory.stats();
    assert_eq!(stats.connections_opened, 1);
    assert!(stats.searches.len() > 1);
    assert!(stats.searches[1..]
        .iter()
        .all(|s| s.base_dn.eq_ignore_ascii_case(&group_dn("Big"))));
    Ok(())
}

#[tokio::test]
async fn test_failed_follow_up_keeps_delivered_values() -> anyhow::Result<()> {
    let memory = MemoryDirectory::new().with_max_values(4);
    memory.fail_searches_containing(";range=");
    let env = TestEnv::over(memory, vec![big_group(10)], SearchConfig::new(BASE))?;

    let entries = env
        .directory
        .search(&QueryParameters::new("(cn=Big)").with_attributes(["member"]))
        .await?;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].values("member").len(), 4);
    assert!(entries[0].attributes.keys().all(|k| !k.contains(";range=")));
    env.assert_connections_released();
    Ok(())
}

#[test]
fn test_cursor_advances_and_terminates() {
    let first = RangeCursor::parse("member;range=0-2").unwrap();
    let second = first.next().expect("follow-up after first window");
    assert_eq!(second.to_string(), "member;range=3-6");

    let degenerate = RangeCursor::parse("member;range=7-7").unwrap();
    assert!(degenerate.next().is_none());

    let last = RangeCursor::parse("member;range=3-*").unwrap();
    assert!(last.is_complete());
    assert!(last.next().is_none());
}

//! Classified searches.

use dirq_core::finder::identities;
use dirq_core::{MembershipScope, QueryParameters};

use crate::common::{TestEnv, computer, group, group_dn, user, user_dn};

fn fixture() -> anyhow::Result<TestEnv> {
    TestEnv::new(vec![
        user("Jane"),
        user("John"),
        computer("WS01"),
        group("Staff", &[user_dn("Jane"), user_dn("John")]),
        group("All", &[group_dn("Staff")]),
    ])
}

#[tokio::test]
async fn test_entries_are_classified() -> anyhow::Result<()> {
    let env = fixture()?;

    let result = env.directory.find(&QueryParameters::default()).await?;

    assert_eq!(result.users.len(), 2);
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.other.len(), 1);
    assert_eq!(result.len(), 5);
    env.assert_connections_released();
    Ok(())
}

#[tokio::test]
async fn test_group_enrichment_leaves_users_untouched() -> anyhow::Result<()> {
    let env = fixture()?;

    let params = QueryParameters::default().with_membership(MembershipScope::Group);
    let result = env.directory.find(&params).await?;

    assert!(result.groups.iter().all(|g| g.groups.is_some()));
    assert!(result.users.iter().all(|u| u.groups.is_none()));
    assert!(result.other.iter().all(|o| o.groups.is_none()));

    let staff = result
        .groups
        .iter()
        .find(|g| g.dn.eq_ignore_ascii_case(&group_dn("Staff")))
        .expect("Staff found");
    let parents = staff.groups.as_deref().unwrap_or_default();
    assert_eq!(parents.len(), 1);
    assert!(parents[0].dn.eq_ignore_ascii_case(&group_dn("All")));
    Ok(())
}

#[tokio::test]
async fn test_user_enrichment_resolves_nested_groups() -> anyhow::Result<()> {
    let env = fixture()?;

    let params =
        QueryParameters::new("(sAMAccountName=jane)").with_membership(MembershipScope::User);
    let result = env.directory.find(&params).await?;

    assert_eq!(result.users.len(), 1);
    let groups = result.users[0].groups.as_deref().unwrap_or_default();
    assert_eq!(groups.len(), 2);
    env.assert_connections_released();
    Ok(())
}

#[tokio::test]
async fn test_find_is_idempotent() -> anyhow::Result<()> {
    let env = fixture()?;
    let params = QueryParameters::default().with_membership(MembershipScope::All);

    let first = env.directory.find(&params).await?;
    let second = env.directory.find(&params).await?;

    assert_eq!(identities(&first.users), identities(&second.users));
    assert_eq!(identities(&first.groups), identities(&second.groups));
    assert_eq!(identities(&first.other), identities(&second.other));
    Ok(())
}

#[tokio::test]
async fn test_convenience_lookups() -> anyhow::Result<()> {
    let env = fixture()?;

    assert!(env.directory.user_exists("jane").await?);
    assert!(env.directory.user_exists("jane@example.com").await?);
    assert!(env.directory.user_exists(&user_dn("Jane")).await?);
    assert!(!env.directory.user_exists("nobody").await?);

    assert!(env.directory.group_exists("Staff").await?);
    assert!(!env.directory.group_exists("Jane").await?);

    let users = env.directory.find_users(&QueryParameters::new("(cn=J*)")).await?;
    assert_eq!(users.len(), 2);
    let groups = env.directory.find_groups(&QueryParameters::default()).await?;
    assert_eq!(groups.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_filter_values_are_escaped() -> anyhow::Result<()> {
    let env = fixture()?;

    // a wildcard in a name must not match every account
    assert!(!env.directory.user_exists("j*").await?);
    assert!(env.directory.find_user("*)(cn=*", &QueryParameters::default()).await?.is_none());
    Ok(())
}

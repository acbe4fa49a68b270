//! Ancestor group resolution.

use dirq_core::QueryParameters;

use crate::common::{TestEnv, dns, expected, group, group_dn, user, user_dn};

#[tokio::test]
async fn test_transitive_closure_without_duplicates() -> anyhow::Result<()> {
    // Jane -> Staff -> {Employees, Everyone}; Employees -> Everyone
    let env = TestEnv::new(vec![
        user("Jane"),
        group("Staff", &[user_dn("Jane")]),
        group("Employees", &[group_dn("Staff")]),
        group("Everyone", &[group_dn("Staff"), group_dn("Employees")]),
        group("Unrelated", &[user_dn("Someone Else")]),
    ])?;

    let groups = env
        .directory
        .groups_for(&user_dn("Jane"), &QueryParameters::default())
        .await?;

    assert_eq!(
        dns(&groups),
        expected(&[group_dn("Staff"), group_dn("Employees"), group_dn("Everyone")])
    );
    env.assert_connections_released();
    Ok(())
}

#[tokio::test]
async fn test_cycle_terminates() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![
        group("A", &[group_dn("B")]),
        group("B", &[group_dn("A")]),
    ])?;

    let groups = env
        .directory
        .groups_for(&group_dn("A"), &QueryParameters::default())
        .await?;

    assert_eq!(dns(&groups), expected(&[group_dn("B")]));
    Ok(())
}

#[tokio::test]
async fn test_identity_matching_ignores_case() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![
        user("Jane"),
        group("Staff", &[user_dn("Jane").to_uppercase()]),
        group("All", &[group_dn("staff")]),
    ])?;

    let groups = env
        .directory
        .groups_for(&user_dn("Jane"), &QueryParameters::default())
        .await?;

    assert_eq!(groups.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_membership_by_account_name() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![
        user("Jane"),
        group("Staff", &[user_dn("Jane")]),
        group("Admins", &[group_dn("Staff")]),
    ])?;

    assert!(env.directory.is_user_member_of("jane", "Admins").await?);
    assert!(env.directory.is_user_member_of("jane", &group_dn("Staff")).await?);
    assert!(!env.directory.is_user_member_of("jane", "Nobody").await?);
    assert!(env.directory.groups_for_user("nobody", &QueryParameters::default()).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_empty_identity_fails_without_network() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![user("Jane")])?;

    let result = env.directory.groups_for("", &QueryParameters::default()).await;

    assert!(matches!(result, Err(dirq_core::DirectoryError::Precondition(_))));
    assert_eq!(env.memory.stats().connections_opened, 0);
    Ok(())
}

#[tokio::test]
async fn test_search_failure_propagates() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![
        user("Jane"),
        group("Staff", &[user_dn("Jane")]),
        group("All", &[group_dn("Staff")]),
    ])?;
    env.memory.fail_searches_containing("CN=Staff");

    let result = env
        .directory
        .groups_for(&user_dn("Jane"), &QueryParameters::default())
        .await;

    assert!(result.is_err());
    env.assert_connections_released();
    Ok(())
}

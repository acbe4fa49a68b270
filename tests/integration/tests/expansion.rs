//! Group member expansion.

use dirq_core::memory::MemoryDirectory;
use dirq_core::{QueryParameters, SearchConfig};

use crate::common::{BASE, TestEnv, dns, expected, group, group_dn, user, user_dn};

#[tokio::test]
async fn test_nested_group_expands_to_users_only() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![
        user("U1"),
        user("U2"),
        user("U3"),
        group("G1", &[user_dn("U1"), user_dn("U2"), group_dn("G2")]),
        group("G2", &[user_dn("U3")]),
    ])?;

    let users = env
        .directory
        .users_for_group("G1", &QueryParameters::default())
        .await?;

    assert_eq!(dns(&users), expected(&[user_dn("U1"), user_dn("U2"), user_dn("U3")]));
    assert!(users.iter().all(|u| !u.is_group()));
    env.assert_connections_released();
    Ok(())
}

#[tokio::test]
async fn test_lookup_by_dn() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![user("U1"), group("G1", &[user_dn("U1")])])?;

    let users = env
        .directory
        .users_for_group(&group_dn("G1"), &QueryParameters::default())
        .await?;

    assert_eq!(dns(&users), expected(&[user_dn("U1")]));
    Ok(())
}

#[tokio::test]
async fn test_mutually_nested_groups_terminate() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![
        user("U1"),
        user("U2"),
        group("G1", &[user_dn("U1"), group_dn("G2")]),
        group("G2", &[user_dn("U2"), group_dn("G1")]),
    ])?;

    let users = env
        .directory
        .users_for_group("G1", &QueryParameters::default())
        .await?;

    assert_eq!(dns(&users), expected(&[user_dn("U1"), user_dn("U2")]));
    Ok(())
}

#[tokio::test]
async fn test_user_reached_twice_is_listed_once() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![
        user("U1"),
        group("G1", &[user_dn("U1"), group_dn("G2"), group_dn("G3")]),
        group("G2", &[user_dn("U1")]),
        group("G3", &[user_dn("U1"), group_dn("G2")]),
    ])?;

    let users = env
        .directory
        .users_for_group("G1", &QueryParameters::default())
        .await?;

    assert_eq!(users.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_result_is_chunk_size_invariant() -> anyhow::Result<()> {
    let members: Vec<String> = (0..40).map(|i| user_dn(&format!("User {i:02}"))).collect();
    let nested: Vec<String> = (40..47).map(|i| user_dn(&format!("User {i:02}"))).collect();

    let mut entries: Vec<_> = (0..47).map(|i| user(&format!("User {i:02}"))).collect();
    let mut top = members.clone();
    top.push(group_dn("Nested"));
    entries.push(group("Big", &top));
    entries.push(group("Nested", &nested));

    let mut results = Vec::new();
    for chunk_size in [1000, 7, 1] {
        // member lists arrive in windows of 15 values
        let memory = MemoryDirectory::new().with_max_values(15);
        let config = SearchConfig::new(BASE).with_page_size(10).with_chunk_size(chunk_size);
        let env = TestEnv::over(memory, entries.clone(), config)?;

        let users = env
            .directory
            .users_for_group("Big", &QueryParameters::default())
            .await?;
        env.assert_connections_released();
        results.push(dns(&users));
    }

    assert_eq!(results[0].len(), 47);
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);
    Ok(())
}

#[tokio::test]
async fn test_unknown_group_has_no_users() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![user("U1")])?;

    let users = env
        .directory
        .users_for_group("Ghosts", &QueryParameters::default())
        .await?;

    assert!(users.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_requested_attributes_shape_users() -> anyhow::Result<()> {
    let env = TestEnv::new(vec![user("U1"), group("G1", &[user_dn("U1")])])?;

    let users = env
        .directory
        .users_for_group("G1", &QueryParameters::default().with_attributes(["mail"]))
        .await?;

    let u1 = users.get(&user_dn("U1")).expect("U1 expanded");
    assert_eq!(u1.get_attr("mail"), Some("u1@example.com"));
    assert!(!u1.has_attr("sAMAccountName"));
    Ok(())
}

//! User commands.

use dirq_core::{Directory, MembershipScope, QueryParameters};

use crate::cli::UserCommand;
use crate::config::OutputFormat;
use crate::output::{output_answer, output_entries, output_entry};
use crate::{CliError, CliResult};

/// Runs a user command.
pub async fn run_user(
    directory: &Directory,
    cmd: UserCommand,
    format: OutputFormat,
) -> CliResult<()> {
    match cmd {
        UserCommand::Get { name, groups } => {
            let mut options = QueryParameters::default();
            if groups {
                options = options.with_membership(MembershipScope::User);
            }
            let user = directory
                .find_user(&name, &options)
                .await?
                .ok_or(CliError::NotFound { kind: "user", name })?;
            output_entry(&user, format)
        }
        UserCommand::List { filter } => {
            let options = QueryParameters::new(filter.unwrap_or_default());
            let users = directory.find_users(&options).await?;
            output_entries(&users, format)
        }
        UserCommand::Exists { name } => {
            let exists = directory.user_exists(&name).await?;
            let subject = if exists {
                format!("User '{name}' exists")
            } else {
                format!("User '{name}' does not exist")
            };
            output_answer(exists, &subject, format)
        }
        UserCommand::Groups { name } => {
            let groups = directory
                .groups_for_user(&name, &QueryParameters::default())
                .await?;
            output_entries(&groups.into_vec(), format)
        }
        UserCommand::MemberOf { user, group } => {
            let member = directory.is_user_member_of(&user, &group).await?;
            let subject = if member {
                format!("'{user}' is a member of '{group}'")
            } else {
                format!("'{user}' is not a member of '{group}'")
            };
            output_answer(member, &subject, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::fixtures;

    #[tokio::test]
    async fn get_unknown_user_is_not_found() {
        let (_, directory) = fixtures::directory();
        let result = run_user(
            &directory,
            UserCommand::Get {
                name: "nobody".to_string(),
                groups: false,
            },
            OutputFormat::Quiet,
        )
        .await;

        assert!(matches!(result, Err(CliError::NotFound { kind: "user", .. })));
    }

    #[tokio::test]
    async fn get_with_groups_resolves_membership() {
        let (memory, directory) = fixtures::directory();
        run_user(
            &directory,
            UserCommand::Get {
                name: "jdoe".to_string(),
                groups: true,
            },
            OutputFormat::Json,
        )
        .await
        .unwrap();

        // find, then one member search per level of nesting plus the empty top
        assert_eq!(memory.stats().searches.len(), 4);
        assert_eq!(memory.stats().open_connections(), 0);
    }

    #[tokio::test]
    async fn member_of_answers_for_nested_groups() {
        let (_, directory) = fixtures::directory();
        for group in ["Staff", "All"] {
            run_user(
                &directory,
                UserCommand::MemberOf {
                    user: "jdoe".to_string(),
                    group: group.to_string(),
                },
                OutputFormat::Quiet,
            )
            .await
            .unwrap();
        }
        assert!(directory.is_user_member_of("jdoe", "All").await.unwrap());
    }
}

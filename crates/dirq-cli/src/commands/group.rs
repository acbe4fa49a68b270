//! Group commands.

use dirq_core::{Directory, MembershipScope, QueryParameters};

use crate::cli::GroupCommand;
use crate::config::OutputFormat;
use crate::output::{output_answer, output_entries, output_entry};
use crate::{CliError, CliResult};

/// Runs a group command.
pub async fn run_group(
    directory: &Directory,
    cmd: GroupCommand,
    format: OutputFormat,
) -> CliResult<()> {
    match cmd {
        GroupCommand::Get { name, groups } => {
            let mut options = QueryParameters::default();
            if groups {
                options = options.with_membership(MembershipScope::Group);
            }
            let group = directory
                .find_group(&name, &options)
                .await?
                .ok_or(CliError::NotFound { kind: "group", name })?;
            output_entry(&group, format)
        }
        GroupCommand::List { filter } => {
            let options = QueryParameters::new(filter.unwrap_or_default());
            let groups = directory.find_groups(&options).await?;
            output_entries(&groups, format)
        }
        GroupCommand::Exists { name } => {
            let exists = directory.group_exists(&name).await?;
            let subject = if exists {
                format!("Group '{name}' exists")
            } else {
                format!("Group '{name}' does not exist")
            };
            output_answer(exists, &subject, format)
        }
        GroupCommand::Parents { dn } => {
            let parents = directory.groups_for(&dn, &QueryParameters::default()).await?;
            output_entries(&parents.into_vec(), format)
        }
        GroupCommand::Members { name } => {
            let users = directory
                .users_for_group(&name, &QueryParameters::default())
                .await?;
            output_entries(&users.into_vec(), format)
        }
    }
}

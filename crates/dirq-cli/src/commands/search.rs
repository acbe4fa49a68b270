//! Search commands: `find`, `search` and `deleted`.

use dirq_core::{Directory, FindResult, QueryParameters};

use crate::CliResult;
use crate::cli::{FindArgs, SearchArgs};
use crate::config::OutputFormat;
use crate::output::{info, output_entries, output_json};

/// Runs a classified search.
pub async fn run_find(
    directory: &Directory,
    args: FindArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let mut params = QueryParameters::new(args.filter.unwrap_or_default())
        .with_membership(args.membership.into());
    if !args.attributes.is_empty() {
        params = params.with_attributes(args.attributes);
    }

    let result = directory.find(&params).await?;
    output_find(&result, format)
}

fn output_find(result: &FindResult, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => output_json(result),
        OutputFormat::Table => {
            for (title, entries) in [
                ("Users", &result.users),
                ("Groups", &result.groups),
                ("Other", &result.other),
            ] {
                if entries.is_empty() {
                    continue;
                }
                info(&format!("{title} ({})", entries.len()));
                output_entries(entries, format)?;
            }
            if result.is_empty() {
                info("No results found.");
            }
            Ok(())
        }
        OutputFormat::Quiet => {
            output_entries(&result.users, format)?;
            output_entries(&result.groups, format)?;
            output_entries(&result.other, format)
        }
    }
}

/// Runs a raw search.
pub async fn run_search(
    directory: &Directory,
    args: SearchArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let mut params = QueryParameters::new(args.filter)
        .with_scope(args.scope.into())
        .with_attributes(args.attributes);
    if let Some(limit) = args.size_limit {
        params = params.with_size_limit(limit);
    }

    let entries = directory.search(&params).await?;
    output_entries(&entries, format)
}

/// Lists tombstoned objects.
pub async fn run_deleted(
    directory: &Directory,
    filter: Option<String>,
    format: OutputFormat,
) -> CliResult<()> {
    let params = QueryParameters::new(filter.unwrap_or_default());
    let entries = directory.find_deleted_objects(&params).await?;
    output_entries(&entries, format)
}

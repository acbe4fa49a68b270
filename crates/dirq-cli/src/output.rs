//! Output formatting utilities.

use colored::Colorize;
use dirq_core::{DirectoryEntry, EntryKind};
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::CliResult;
use crate::config::OutputFormat;

/// Prints a success message.
pub fn success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// One entry as a table row.
#[derive(Debug, Clone, Tabled)]
pub struct EntryRow {
    /// Object kind.
    pub kind: String,
    /// Common name.
    pub name: String,
    /// Account name (users only).
    pub account: String,
    /// Distinguished name.
    pub dn: String,
    /// Number of resolved groups, when enrichment ran.
    pub groups: String,
}

impl From<&DirectoryEntry> for EntryRow {
    fn from(entry: &DirectoryEntry) -> Self {
        let kind = match entry.kind() {
            EntryKind::User => "user",
            EntryKind::Group => "group",
            EntryKind::Other => "other",
        };
        Self {
            kind: kind.to_string(),
            name: entry.get_attr("cn").unwrap_or_default().to_string(),
            account: entry
                .get_attr("sAMAccountName")
                .unwrap_or_default()
                .to_string(),
            dn: entry.dn.clone(),
            groups: entry
                .groups
                .as_ref()
                .map(|g| g.len().to_string())
                .unwrap_or_default(),
        }
    }
}

/// Outputs a list of entries in the specified format.
pub fn output_entries(entries: &[DirectoryEntry], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            if entries.is_empty() {
                info("No results found.");
            } else {
                let rows: Vec<EntryRow> = entries.iter().map(EntryRow::from).collect();
                let table = Table::new(rows).with(Style::rounded()).to_string();
                println!("{table}");
            }
        }
        OutputFormat::Json => output_json(entries)?,
        OutputFormat::Quiet => {
            for entry in entries {
                println!("{}", entry.dn);
            }
        }
    }
    Ok(())
}

/// Outputs a single entry with all its attributes.
pub fn output_entry(entry: &DirectoryEntry, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table => {
            println!("{}", entry.dn.bold());
            let mut names: Vec<&String> = entry.attributes.keys().collect();
            names.sort_by_key(|n| n.to_lowercase());
            for name in names {
                for value in &entry.attributes[name] {
                    println!("  {}: {value}", name.cyan());
                }
            }
            if let Some(groups) = &entry.groups {
                println!("  {}:", "groups".cyan());
                for group in groups {
                    println!("    - {}", group.dn);
                }
            }
        }
        OutputFormat::Json => output_json(entry)?,
        OutputFormat::Quiet => println!("{}", entry.dn),
    }
    Ok(())
}

/// Outputs a yes/no answer; the process exit status is left to the caller.
pub fn output_answer(answer: bool, subject: &str, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table if answer => success(subject),
        OutputFormat::Table => warning(subject),
        OutputFormat::Json => output_json(&answer)?,
        OutputFormat::Quiet => println!("{answer}"),
    }
    Ok(())
}

/// Prints any serializable value as pretty JSON.
pub fn output_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

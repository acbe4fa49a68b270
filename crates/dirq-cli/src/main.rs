//! # dirq
//!
//! Main entry point for the dirq command-line tool.

#![forbid(unsafe_code)]

use clap::Parser;
use dirq_cli::{Cli, CliConfig, commands::run, output::error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match CliConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            error(&format!("Failed to load configuration: {e}"));
            std::process::exit(1);
        }
    };
    config.apply_overrides(
        cli.url.as_deref(),
        cli.base_dn.as_deref(),
        cli.bind_credential.as_deref(),
    );

    let format = cli.output.unwrap_or(config.output_format);
    if let Err(e) = run(cli.command, &config, format).await {
        error(&e.to_string());
        std::process::exit(1);
    }
}

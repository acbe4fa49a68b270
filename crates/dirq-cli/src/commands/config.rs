//! `config` command.

use crate::CliResult;
use crate::config::CliConfig;

/// Prints the effective configuration as TOML.
pub fn run_config(config: &CliConfig) -> CliResult<()> {
    match CliConfig::config_path() {
        Ok(path) => println!("# default location: {}", path.display()),
        Err(_) => println!("# default location unavailable"),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

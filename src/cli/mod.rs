//! `mailflow` command line: `serve`, `migrate` and `token`.

pub mod config_merger;
pub mod executor;
pub mod handlers;
pub mod parser;

pub use config_merger::ConfigurationMerger;
pub use executor::execute_command;
pub use parser::{Cli, Commands, LogLevel};

use crate::config::settings::Settings;
use crate::logger::init_logger;

/// Loads the layered configuration and applies the command-line overrides.
pub fn load_and_merge_config(cli: &Cli) -> anyhow::Result<Settings> {
    let merger = ConfigurationMerger::load(cli)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    merger
        .merge_cli_args(cli)
        .map_err(|e| anyhow::anyhow!("Configuration merge error: {}", e))
}

/// Entry point used by `main`.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_and_merge_config(&cli)?;
    if !matches!(cli.command, Some(Commands::Token { .. })) {
        init_logger(&settings.logger)
            .map_err(|e| anyhow::anyhow!("Logger initialization error: {}", e))?;
    }
    execute_command(&cli, settings).await
}

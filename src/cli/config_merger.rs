//! Applies command-line overrides on top of file and environment settings.

use super::parser::{Cli, Commands};
use crate::config::ConfigLoader;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

/// Holds the settings loaded from files and `MAILFLOW_*` variables; CLI
/// flags win over both.
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Loads the base settings the way the CLI asks: a single `--config` file
    /// or the layered directory, with `--env` picking the overlay.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let loader = match &cli.config {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::file_not_found(path.display().to_string()));
                }
                ConfigLoader::with_file(path)
            }
            None => ConfigLoader::new()?,
        };
        let loader = match cli.env {
            Some(environment) => loader.with_environment(environment),
            None => loader,
        };
        Ok(Self::new(loader.load_unvalidated()?))
    }

    /// Returns the merged settings, validated unless the command never
    /// touches the database or the network.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }

        if let Some(Commands::Serve {
            host,
            port,
            log_level,
            ..
        }) = &cli.command
        {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(level) = log_level {
                config.logger.level = level.as_str().to_string();
            }
        }

        if !matches!(cli.command, Some(Commands::Token { .. })) {
            config.validate()?;
        }
        Ok(config)
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn merger() -> ConfigurationMerger {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/mailflow".to_string();
        ConfigurationMerger::new(config)
    }

    fn merged(args: &[&str]) -> Settings {
        let cli = Cli::try_parse_from(args).unwrap();
        merger().merge_cli_args(&cli).unwrap()
    }

    #[test]
    fn verbose_and_quiet_set_the_level() {
        assert_eq!(merged(&["mailflow", "--verbose"]).logger.level, "debug");
        assert_eq!(merged(&["mailflow", "--quiet"]).logger.level, "error");
    }

    #[test]
    fn serve_flags_override_server_settings() {
        let config = merged(&["mailflow", "serve", "--host", "0.0.0.0", "--port", "8080"]);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn command_log_level_beats_global_flag() {
        let config = merged(&["mailflow", "--verbose", "serve", "--log-level", "warn"]);
        assert_eq!(config.logger.level, "warn");
    }

    #[test]
    fn invalid_base_is_reported_for_serve_but_not_token() {
        let merger = ConfigurationMerger::new(Settings::default());
        let serve = Cli::try_parse_from(["mailflow", "serve"]).unwrap();
        assert!(merger.merge_cli_args(&serve).is_err());

        let token = Cli::try_parse_from([
            "mailflow",
            "token",
            "6f1c9a2e-0d7b-4a53-9d43-2f0e7f1c8a10",
        ])
        .unwrap();
        assert!(merger.merge_cli_args(&token).is_ok());
    }

    #[test]
    fn missing_config_file_is_not_found() {
        let cli = Cli::try_parse_from(["mailflow", "--config", "/nonexistent/mailflow.toml"])
            .unwrap();
        assert!(matches!(
            ConfigurationMerger::load(&cli),
            Err(ConfigError::FileNotFound(_))
        ));
    }
}

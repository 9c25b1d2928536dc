//! Layered configuration loading.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};

use crate::config::environment::Environment as AppEnvironment;
use crate::config::error::ConfigError;
use crate::config::settings::Settings;

const CONFIG_DIR_ENV: &str = "MAILFLOW_CONFIG_DIR";
const CONFIG_FILE_ENV: &str = "MAILFLOW_CONFIG_FILE";
const DEFAULT_CONFIG_DIR: &str = "config";
const ENV_PREFIX: &str = "MAILFLOW";
const ENV_SEPARATOR: &str = "__";

/// Loads [`Settings`] from TOML files and `MAILFLOW_*` variables.
///
/// With a single file (`MAILFLOW_CONFIG_FILE` or `--config`) only that file
/// is read; otherwise `default.toml`, `{env}.toml` and `local.toml` are
/// layered from the config directory.
#[derive(Debug)]
pub struct ConfigLoader {
    config_dir: PathBuf,
    config_file: Option<PathBuf>,
    environment: AppEnvironment,
}

impl ConfigLoader {
    /// Builds a loader from the process environment.
    ///
    /// `MAILFLOW_CONFIG_DIR` and `MAILFLOW_CONFIG_FILE` are mutually exclusive.
    pub fn new() -> Result<Self, ConfigError> {
        let dir_var = std::env::var(CONFIG_DIR_ENV).ok();
        let config_file = std::env::var(CONFIG_FILE_ENV).ok().map(PathBuf::from);

        if config_file.is_some() && dir_var.is_some() {
            return Err(ConfigError::mutual_exclusivity(
                "MAILFLOW_CONFIG_DIR and MAILFLOW_CONFIG_FILE cannot both be set",
            ));
        }

        Ok(Self {
            config_dir: dir_var
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR)),
            config_file,
            environment: AppEnvironment::from_env(),
        })
    }

    /// Loader pinned to one file, used by `--config`.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            config_file: Some(path.into()),
            environment: AppEnvironment::from_env(),
        }
    }

    /// Overrides the environment picked from `MAILFLOW_APP_ENV`.
    pub fn with_environment(mut self, environment: AppEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn environment(&self) -> AppEnvironment {
        self.environment
    }

    /// Loads and validates the settings.
    pub fn load(&self) -> Result<Settings, ConfigError> {
        let settings = self.load_unvalidated()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads the settings without running `Settings::validate`.
    pub fn load_unvalidated(&self) -> Result<Settings, ConfigError> {
        self.build_config()?
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn build_config(&self) -> Result<Config, ConfigError> {
        let builder = Config::builder();
        let builder = match &self.config_file {
            Some(file) => Self::add_file(builder, file, true)?,
            None => {
                let builder = Self::add_file(builder, &self.config_dir.join("default.toml"), true)?;
                let env_file = self
                    .config_dir
                    .join(format!("{}.toml", self.environment.as_str()));
                let builder = Self::add_file(builder, &env_file, false)?;
                Self::add_file(builder, &self.config_dir.join("local.toml"), false)?
            }
        };

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_SEPARATOR)
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()
            .map_err(ConfigError::from)
    }

    fn add_file(
        builder: ConfigBuilder<DefaultState>,
        path: &Path,
        required: bool,
    ) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        if required && !path.exists() {
            return Err(ConfigError::file_not_found(path.display().to_string()));
        }
        Ok(builder.add_source(
            File::new(path.to_str().unwrap_or_default(), FileFormat::Toml).required(required),
        ))
    }
}

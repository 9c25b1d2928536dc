//! Typed settings for every configuration section.
//!
//! Each section deserializes with serde defaults so a partial TOML file is
//! valid; `validation.rs` adds the range checks.

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
pub use crate::logger::LoggerConfig as LoggerSettings;

fn default_app_name() -> String {
    "mailflow".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_token_expiration() -> i64 {
    24
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_cache_max_size() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_dispatch_cron() -> String {
    "*/30 * * * * *".to_string()
}

fn default_batch_size() -> i64 {
    50
}

fn default_claim_timeout_secs() -> u64 {
    900
}

fn default_free_max_uploads() -> Option<i64> {
    Some(2)
}

fn default_free_max_templates() -> Option<i64> {
    Some(3)
}

fn default_free_max_campaigns() -> Option<i64> {
    Some(3)
}

// ============================================================================
// Application / Server / Database
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

/// Axum HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Largest accepted request body; CSV uploads are bounded by this
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Run pending migrations before serving
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// JWT
// ============================================================================

/// Bearer token verification settings.
///
/// Tokens are issued by the identity provider in front of this service (or by
/// `mailflow token` in development); this service only verifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,

    /// Lifetime in hours of tokens minted by `mailflow token`
    #[serde(default = "default_token_expiration")]
    pub token_expiration: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_expiration: default_token_expiration(),
        }
    }
}

impl JwtConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::validation(
                "jwt.secret",
                "JWT secret cannot be empty",
            ));
        }
        if self.secret.len() < 32 {
            return Err(ConfigError::validation(
                "jwt.secret",
                "JWT secret should be at least 32 characters",
            ));
        }
        if self.token_expiration <= 0 {
            return Err(ConfigError::validation(
                "jwt.token_expiration",
                "Token expiration must be positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Plan/usage cache settings. Disabled means every lookup hits the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_cache_ttl(),
            max_size: default_cache_max_size(),
        }
    }
}

// ============================================================================
// Plans
// ============================================================================

/// Per-plan resource caps. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PlanLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_uploads: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_templates: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_campaigns: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlansConfig {
    #[serde(default = "default_free_limits")]
    pub free: PlanLimits,

    #[serde(default)]
    pub pro: PlanLimits,
}

fn default_free_limits() -> PlanLimits {
    PlanLimits {
        max_uploads: default_free_max_uploads(),
        max_templates: default_free_max_templates(),
        max_campaigns: default_free_max_campaigns(),
    }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            free: default_free_limits(),
            pro: PlanLimits::default(),
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Settings for the in-process dispatcher that feeds the mail transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Schedule the dispatch tick on startup
    #[serde(default)]
    pub enabled: bool,

    /// Six-field cron expression (with seconds) for the dispatch tick
    #[serde(default = "default_dispatch_cron")]
    pub cron: String,

    /// Recipients claimed per database round trip
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Delay between two sends of one campaign, in milliseconds
    #[serde(default)]
    pub pacing_ms: u64,

    /// Seconds after which a claimed recipient with no recorded outcome is
    /// marked failed instead of being sent again
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cron: default_dispatch_cron(),
            batch_size: default_batch_size(),
            pacing_ms: 0,
            claim_timeout_secs: default_claim_timeout_secs(),
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub jwt: JwtConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub plans: PlansConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{ConsoleConfig, FileConfig, LogFormat, RotationConfig};
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn arb_limits() -> impl Strategy<Value = PlanLimits> {
        (
            1i64..100,
            proptest::option::of(1i64..100),
            proptest::option::of(1i64..100),
        )
            .prop_map(|(max_uploads, max_templates, max_campaigns)| PlanLimits {
                max_uploads: Some(max_uploads),
                max_templates,
                max_campaigns,
            })
    }

    fn arb_logger() -> impl Strategy<Value = LoggerSettings> {
        (
            prop_oneof![
                Just("trace"),
                Just("debug"),
                Just("info"),
                Just("warn"),
                Just("error")
            ],
            any::<bool>(),
            any::<bool>(),
            prop_oneof![
                Just(LogFormat::Full),
                Just(LogFormat::Compact),
                Just(LogFormat::Json)
            ],
            1024u64..100_000_000,
            1usize..20,
            any::<bool>(),
        )
            .prop_map(
                |(level, colored, file_enabled, format, max_size, max_files, compress)| {
                    LoggerSettings {
                        level: level.to_string(),
                        console: ConsoleConfig {
                            enabled: true,
                            colored,
                        },
                        file: FileConfig {
                            enabled: file_enabled,
                            path: PathBuf::from("logs/mailflow.log"),
                            append: true,
                            format,
                            rotation: RotationConfig {
                                max_size,
                                max_files,
                                compress,
                            },
                        },
                    }
                },
            )
    }

    fn arb_settings() -> impl Strategy<Value = Settings> {
        (
            "[a-z][a-z0-9-]{0,20}",
            1u16..=65535,
            "[a-z]{1,10}",
            1u32..50,
            arb_logger(),
            any::<bool>(),
            arb_limits(),
            (any::<bool>(), 1i64..500, 0u64..5000),
        )
            .prop_map(
                |(name, port, db, max_connections, logger, cache_enabled, free, dispatch)| {
                    Settings {
                        application: ApplicationConfig {
                            name,
                            version: "0.1.0".to_string(),
                        },
                        server: ServerConfig {
                            port,
                            ..ServerConfig::default()
                        },
                        database: DatabaseConfig {
                            url: format!("postgres://localhost/{}", db),
                            max_connections,
                            ..DatabaseConfig::default()
                        },
                        jwt: JwtConfig::default(),
                        logger,
                        cache: CacheConfig {
                            enabled: cache_enabled,
                            ..CacheConfig::default()
                        },
                        plans: PlansConfig {
                            free,
                            pro: PlanLimits::default(),
                        },
                        dispatch: DispatchConfig {
                            enabled: dispatch.0,
                            batch_size: dispatch.1,
                            pacing_ms: dispatch.2,
                            ..DispatchConfig::default()
                        },
                    }
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn settings_survive_toml_round_trip(settings in arb_settings()) {
            let encoded = toml::to_string(&settings).expect("serialize settings");
            let decoded: Settings = toml::from_str(&encoded).expect("deserialize settings");
            prop_assert_eq!(settings, decoded);
        }
    }

    #[test]
    fn free_plan_defaults_cap_uploads_at_two() {
        let plans = PlansConfig::default();
        assert_eq!(plans.free.max_uploads, Some(2));
        assert_eq!(plans.pro.max_uploads, None);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let settings: Settings = toml::from_str("").expect("empty toml");
        assert_eq!(settings.server.address(), "127.0.0.1:3000");
        assert_eq!(settings.application.name, "mailflow");
        assert!(settings.cache.enabled);
        assert!(!settings.dispatch.enabled);
        assert_eq!(settings.dispatch.pacing_ms, 0);
    }

    #[test]
    fn jwt_validation_rejects_short_secret() {
        let config = JwtConfig {
            secret: "short".to_string(),
            token_expiration: 1,
        };
        match config.validate() {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "jwt.secret"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}

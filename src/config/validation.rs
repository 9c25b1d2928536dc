//! Range and format checks for loaded settings.

use crate::config::error::ConfigError;
use crate::config::settings::{
    CacheConfig, DatabaseConfig, DispatchConfig, PlanLimits, PlansConfig, ServerConfig, Settings,
};

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535",
            ));
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds",
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::validation(
                "server.max_body_bytes",
                "Body limit must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required",
            ));
        }
        if !(self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")) {
            return Err(ConfigError::validation(
                "database.url",
                "Expected a postgres:// or postgresql:// URL",
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigError::validation(
                "database.min_connections",
                format!(
                    "Min connections ({}) cannot exceed max connections ({})",
                    self.min_connections, self.max_connections
                ),
            ));
        }
        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && (self.ttl_seconds == 0 || self.max_size == 0) {
            return Err(ConfigError::validation(
                "cache",
                "An enabled cache needs a positive ttl_seconds and max_size",
            ));
        }
        Ok(())
    }
}

impl PlanLimits {
    fn validate(&self, plan: &str) -> Result<(), ConfigError> {
        let limits = [
            ("max_uploads", self.max_uploads),
            ("max_templates", self.max_templates),
            ("max_campaigns", self.max_campaigns),
        ];
        for (name, value) in limits {
            if matches!(value, Some(v) if v < 0) {
                return Err(ConfigError::validation(
                    format!("plans.{}.{}", plan, name),
                    "Limits cannot be negative",
                ));
            }
        }
        Ok(())
    }
}

impl PlansConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.free.validate("free")?;
        self.pro.validate("pro")
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size <= 0 {
            return Err(ConfigError::validation(
                "dispatch.batch_size",
                "Batch size must be positive",
            ));
        }
        // tokio-cron-scheduler expects the seconds field first
        if self.cron.split_whitespace().count() < 6 {
            return Err(ConfigError::validation(
                "dispatch.cron",
                "Cron expression needs six fields (sec min hour day month weekday)",
            ));
        }
        // A claim must outlive one paced batch, or in-progress rows would be
        // failed as stale
        let batch_ms = (self.batch_size as u64).saturating_mul(self.pacing_ms);
        if self.claim_timeout_secs > i64::MAX as u64 / 1000
            || self.claim_timeout_secs.saturating_mul(1000) <= batch_ms
        {
            return Err(ConfigError::validation(
                "dispatch.claim_timeout_secs",
                "Claim timeout must exceed batch_size * pacing_ms",
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Validates every section; the JWT secret is only checked when serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.cache.validate()?;
        self.plans.validate()?;
        self.dispatch.validate()?;
        self.logger
            .validate()
            .map_err(|e| ConfigError::validation("logger", e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Settings {
        let mut settings = Settings::default();
        settings.database.url = "postgres://localhost/mailflow".to_string();
        settings
    }

    fn field_of(result: Result<(), ConfigError>) -> String {
        match result {
            Err(ConfigError::ValidationError { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn defaults_with_url_are_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_non_postgres_url() {
        let mut settings = valid();
        settings.database.url = "mysql://localhost/db".to_string();
        assert_eq!(field_of(settings.validate()), "database.url");
    }

    #[test]
    fn rejects_negative_plan_limit() {
        let mut settings = valid();
        settings.plans.free.max_campaigns = Some(-1);
        assert_eq!(field_of(settings.validate()), "plans.free.max_campaigns");
    }

    #[test]
    fn rejects_five_field_cron() {
        let mut settings = valid();
        settings.dispatch.cron = "*/5 * * * *".to_string();
        assert_eq!(field_of(settings.validate()), "dispatch.cron");
    }

    #[test]
    fn rejects_claim_timeout_shorter_than_a_paced_batch() {
        let mut settings = valid();
        settings.dispatch.batch_size = 50;
        settings.dispatch.pacing_ms = 20_000;
        settings.dispatch.claim_timeout_secs = 900;
        assert_eq!(field_of(settings.validate()), "dispatch.claim_timeout_secs");

        settings.dispatch.claim_timeout_secs = 1_001;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_min_above_max_connections() {
        let mut settings = valid();
        settings.database.min_connections = 20;
        assert_eq!(field_of(settings.validate()), "database.min_connections");
    }
}

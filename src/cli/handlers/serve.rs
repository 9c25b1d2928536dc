//! `mailflow serve`

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::server::Server;

pub struct ServeCommandHandler {
    config: Settings,
}

impl ServeCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(self, dry_run: bool) -> anyhow::Result<()> {
        if dry_run {
            self.validate_only()?;
            return Ok(());
        }
        Server::new(self.config).run().await
    }

    /// Checks everything `serve` would check before binding, then exits.
    pub fn validate_only(&self) -> AppResult<()> {
        self.config.validate()?;
        self.config.jwt.validate()?;

        println!("✓ Configuration is valid");
        println!("✓ Server would bind to: {}", self.config.server.address());
        println!(
            "✓ Dispatch scheduler: {}",
            if self.config.dispatch.enabled {
                format!("enabled ({})", self.config.dispatch.cron)
            } else {
                "disabled".to_string()
            }
        );
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/mailflow".to_string();
        config.jwt.secret = "x".repeat(32);
        config
    }

    #[tokio::test]
    async fn dry_run_passes_with_valid_settings() {
        let handler = ServeCommandHandler::new(valid_config());
        assert!(handler.execute(true).await.is_ok());
    }

    #[test]
    fn dry_run_requires_a_jwt_secret() {
        let mut config = valid_config();
        config.jwt.secret.clear();
        let handler = ServeCommandHandler::new(config);
        assert!(matches!(
            handler.validate_only(),
            Err(crate::error::AppError::Configuration { key, .. }) if key == "jwt.secret"
        ));
    }

    #[test]
    fn dry_run_rejects_port_zero() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(ServeCommandHandler::new(config).validate_only().is_err());
    }
}

//! `mailflow migrate`

use crate::config::settings::Settings;
use crate::db::{pending_migrations, revert_migrations, run_migrations};
use crate::error::AppResult;

pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> AppResult<()> {
        self.config.database.validate()?;
        let url = &self.config.database.url;

        if dry_run {
            let pending = pending_migrations(url).await?;
            if pending.is_empty() {
                println!("✓ No pending migrations, database is up to date");
            } else {
                println!("Found {} pending migration(s):", pending.len());
                for name in &pending {
                    println!("  - {}", name);
                }
            }
            return Ok(());
        }

        if let Some(steps) = rollback {
            let reverted = revert_migrations(url, steps).await?;
            tracing::warn!(count = reverted.len(), "Migrations reverted");
            println!("✓ Rolled back {} migration(s)", reverted.len());
            for version in &reverted {
                println!("  - {}", version);
            }
            return Ok(());
        }

        let applied = run_migrations(url).await?;
        tracing::info!(count = applied.len(), "Migrations applied");
        if applied.is_empty() {
            println!("✓ No migrations to apply, database is up to date");
        } else {
            println!("✓ Applied {} migration(s):", applied.len());
            for version in &applied {
                println!("  - {}", version);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn database_url_is_checked_before_connecting() {
        let handler = MigrateCommandHandler::new(Settings::default());
        match handler.execute(true, None).await {
            Err(crate::error::AppError::Configuration { key, .. }) => {
                assert_eq!(key, "database.url")
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }
}

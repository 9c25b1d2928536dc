//! Dispatches a parsed command to its handler.

use super::handlers::{MigrateCommandHandler, ServeCommandHandler, TokenCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;

/// Runs the command; no subcommand means `serve`.
pub async fn execute_command(cli: &Cli, settings: Settings) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(*dry_run).await
        }
        None => ServeCommandHandler::new(settings).execute(false).await,
        Some(Commands::Migrate { dry_run, rollback }) => {
            MigrateCommandHandler::new(settings)
                .execute(*dry_run, *rollback)
                .await?;
            Ok(())
        }
        Some(Commands::Token {
            user_id,
            email,
            hours,
        }) => {
            TokenCommandHandler::new(settings).execute(*user_id, email.clone(), *hours)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/mailflow".to_string();
        config.jwt.secret = "k".repeat(32);
        config
    }

    #[tokio::test]
    async fn serve_dry_run_exits_cleanly() {
        let cli = Cli::try_parse_from(["mailflow", "serve", "--dry-run"]).unwrap();
        assert!(execute_command(&cli, valid_config()).await.is_ok());
    }

    #[tokio::test]
    async fn token_prints_without_a_database() {
        let cli = Cli::try_parse_from([
            "mailflow",
            "token",
            "6f1c9a2e-0d7b-4a53-9d43-2f0e7f1c8a10",
        ])
        .unwrap();
        assert!(execute_command(&cli, valid_config()).await.is_ok());
    }
}

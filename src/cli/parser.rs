//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::config::Environment;

/// Campaign service: contact uploads, templates and email dispatch
#[derive(Parser, Debug)]
#[command(name = "mailflow")]
#[command(long_about = "
Mailflow serves the campaign API and runs the dispatch scheduler.

EXAMPLES:
    mailflow serve
    mailflow serve --host 0.0.0.0 --port 8080
    mailflow --config /etc/mailflow/production.toml serve
    mailflow serve --dry-run
    mailflow migrate --dry-run
    mailflow migrate --rollback 1
    mailflow token 6f1c9a2e-0d7b-4a53-9d43-2f0e7f1c8a10 --hours 2
")]
#[command(version = crate::clap_long_version())]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Read only this TOML file instead of the layered config directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Environment whose overlay file is loaded (development, test, staging, production)
    #[arg(short, long, value_parser = parse_environment)]
    pub env: Option<Environment>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Address to bind, e.g. 127.0.0.1 or 0.0.0.0
        #[arg(long, value_name = "ADDRESS", value_parser = parse_host)]
        host: Option<String>,

        #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
        port: Option<u16>,

        /// Overrides the configured level and --verbose/--quiet
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate the configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply, list or revert database migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Revert this many of the most recent migrations
        #[arg(long, value_name = "STEPS", value_parser = clap::value_parser!(u32).range(1..=100))]
        rollback: Option<u32>,
    },
    /// Print a bearer token for a user id, for local development
    Token {
        user_id: Uuid,

        #[arg(long)]
        email: Option<String>,

        /// Lifetime in hours; defaults to jwt.token_expiration
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        hours: Option<i64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    #[value(alias = "warning")]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    value.parse::<Environment>().map_err(|e| e.to_string())
}

fn parse_host(value: &str) -> Result<String, String> {
    let host = value.trim();
    if host.is_empty() {
        return Err("Host address cannot be empty".to_string());
    }
    if host.contains(char::is_whitespace) {
        return Err("Host address cannot contain spaces".to_string());
    }
    if host.len() > 253 {
        return Err("Host address is too long (maximum 253 characters)".to_string());
    }
    if host.chars().all(|c| c.is_ascii_digit() || c == '.') {
        let octets: Vec<&str> = host.split('.').collect();
        if octets.len() != 4 || octets.iter().any(|o| o.parse::<u8>().is_err()) {
            return Err(format!("Invalid IPv4 address: '{}'", host));
        }
    }
    Ok(host.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["mailflow"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_overrides_parse() {
        let cli = Cli::try_parse_from([
            "mailflow", "--env", "prod", "serve", "--host", "0.0.0.0", "--port", "8080",
            "--log-level", "warning",
        ])
        .unwrap();
        assert_eq!(cli.env, Some(Environment::Production));
        match cli.command {
            Some(Commands::Serve {
                host,
                port,
                log_level,
                dry_run,
            }) => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(8080));
                assert_eq!(log_level, Some(LogLevel::Warn));
                assert!(!dry_run);
            }
            other => panic!("expected serve, got {:?}", other),
        }
    }

    #[test]
    fn port_zero_is_rejected() {
        assert!(Cli::try_parse_from(["mailflow", "serve", "--port", "0"]).is_err());
    }

    #[test]
    fn bad_hosts_are_rejected() {
        for host in ["", "a b", "999.1.1.1", "1.2.3"] {
            assert!(parse_host(host).is_err(), "host {:?}", host);
        }
        for host in ["localhost", "127.0.0.1", "mail.example.com", "::1"] {
            assert!(parse_host(host).is_ok(), "host {:?}", host);
        }
    }

    #[test]
    fn rollback_is_bounded_and_exclusive_with_dry_run() {
        assert!(Cli::try_parse_from(["mailflow", "migrate", "--rollback", "0"]).is_err());
        assert!(Cli::try_parse_from(["mailflow", "migrate", "--rollback", "101"]).is_err());
        assert!(
            Cli::try_parse_from(["mailflow", "migrate", "--dry-run", "--rollback", "1"]).is_err()
        );
        assert!(Cli::try_parse_from(["mailflow", "migrate", "--rollback", "2"]).is_ok());
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["mailflow", "-v", "-q"]).is_err());
    }

    #[test]
    fn token_takes_a_user_id() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from(["mailflow", "token", &id.to_string(), "--hours", "2"])
            .unwrap();
        match cli.command {
            Some(Commands::Token { user_id, hours, email }) => {
                assert_eq!(user_id, id);
                assert_eq!(hours, Some(2));
                assert!(email.is_none());
            }
            other => panic!("expected token, got {:?}", other),
        }
        assert!(Cli::try_parse_from(["mailflow", "token", "nope"]).is_err());
    }
}

//! `mailflow token`: mints a bearer token with the configured secret.

use uuid::Uuid;

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::utils::jwt::generate_token;

pub struct TokenCommandHandler {
    config: Settings,
}

impl TokenCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    pub fn token(&self, user_id: Uuid, email: Option<String>, hours: Option<i64>) -> AppResult<String> {
        self.config.jwt.validate()?;
        let hours = hours.unwrap_or(self.config.jwt.token_expiration);
        generate_token(user_id, email, &self.config.jwt.secret, hours)
    }

    pub fn execute(&self, user_id: Uuid, email: Option<String>, hours: Option<i64>) -> AppResult<()> {
        println!("{}", self.token(user_id, email, hours)?);
        Ok(())
    }
}

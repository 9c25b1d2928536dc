use uuid::Uuid;

use crate::domain::normalize_email;
use crate::error::{AppError, AppResult};
use crate::models::{GoogleAccount, NewGoogleAccount};
use crate::repositories::UserRepository;
use crate::services::ensure_owner;

/// Sending accounts a campaign can bind to. Only the address is recorded;
/// credentials live with the mail transport.
#[derive(Clone)]
pub struct AccountService {
    repo: UserRepository,
}

impl AccountService {
    pub fn new(repo: UserRepository) -> Self {
        Self { repo }
    }

    pub async fn register(&self, user_id: Uuid, email: &str) -> AppResult<GoogleAccount> {
        let email = normalize_email(email).ok_or_else(|| AppError::Validation {
            field: "email".to_string(),
            reason: "Invalid email address".to_string(),
        })?;
        self.repo
            .create_google_account(NewGoogleAccount { user_id, email })
            .await
    }

    pub async fn list(&self, user_id: Uuid) -> AppResult<Vec<GoogleAccount>> {
        self.repo.list_google_accounts(user_id).await
    }

    pub async fn get(&self, user_id: Uuid, account_id: Uuid) -> AppResult<GoogleAccount> {
        let account = self
            .repo
            .find_google_account(account_id)
            .await?
            .ok_or_else(|| AppError::not_found("google_account", account_id))?;
        let owner = account.user_id;
        ensure_owner(account, owner, user_id, "google account")
    }
}

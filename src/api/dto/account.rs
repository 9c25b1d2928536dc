use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::config::PlanLimits;
use crate::models::{GoogleAccount, Usage, UserPlan};

/// Records a sending account that was connected elsewhere.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGoogleAccountRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "sender@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GoogleAccountResponse {
    pub id: Uuid,
    pub email: String,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: jiff::Timestamp,
}

impl From<GoogleAccount> for GoogleAccountResponse {
    fn from(account: GoogleAccount) -> Self {
        Self {
            id: account.id,
            email: account.email,
            created_at: account.created_at.to_jiff(),
        }
    }
}

/// The caller's plan, its limits and current usage. A missing limit means
/// unlimited.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlanResponse {
    pub plan: UserPlan,
    #[schema(value_type = Object)]
    pub limits: PlanLimits,
    pub usage: Usage,
}

use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use jiff_diesel::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subscription tier. A user id with no row in `users` is on `Free`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, DbEnum, utoipa::ToSchema,
)]
#[db_enum(existing_type_path = "crate::schema::sql_types::UserPlan")]
#[serde(rename_all = "lowercase")]
pub enum UserPlan {
    #[default]
    Free,
    Pro,
}

impl std::fmt::Display for UserPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserPlan::Free => write!(f, "free"),
            UserPlan::Pro => write!(f, "pro"),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub plan: UserPlan,
    pub created_at: Timestamp,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::google_accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct GoogleAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::google_accounts)]
pub struct NewGoogleAccount {
    pub user_id: Uuid,
    pub email: String,
}

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{GoogleAccount, NewGoogleAccount, UserPlan};

#[derive(Clone)]
pub struct UserRepository {
    pool: AsyncDbPool,
}

impl UserRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Plan stored for the user, if the user has a row at all.
    pub async fn find_plan(&self, user_id: Uuid) -> AppResult<Option<UserPlan>> {
        use crate::schema::users::dsl::*;
        let mut conn = self.pool.get().await?;

        users
            .filter(id.eq(user_id))
            .select(plan)
            .first::<UserPlan>(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    pub async fn create_google_account(
        &self,
        account: NewGoogleAccount,
    ) -> AppResult<GoogleAccount> {
        use crate::schema::google_accounts::dsl::*;
        let mut conn = self.pool.get().await?;

        diesel::insert_into(google_accounts)
            .values(&account)
            .returning(GoogleAccount::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn find_google_account(&self, account_id: Uuid) -> AppResult<Option<GoogleAccount>> {
        use crate::schema::google_accounts::dsl::*;
        let mut conn = self.pool.get().await?;

        google_accounts
            .find(account_id)
            .select(GoogleAccount::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    pub async fn list_google_accounts(&self, owner: Uuid) -> AppResult<Vec<GoogleAccount>> {
        use crate::schema::google_accounts::dsl::*;
        let mut conn = self.pool.get().await?;

        google_accounts
            .filter(user_id.eq(owner))
            .order(created_at.asc())
            .select(GoogleAccount::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }
}

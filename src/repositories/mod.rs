//! Async data access over the diesel-async pool.

mod campaign_repo;
mod template_repo;
mod upload_repo;
mod user_repo;

pub use campaign_repo::{
    BatchOutcome, CampaignRepository, Delivery, RecipientHandler, STALE_CLAIM_ERROR,
};
pub use template_repo::TemplateRepository;
pub use upload_repo::{CascadeCounts, UploadRepository};
pub use user_repo::UserRepository;

use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::error::AppResult;

/// Current time as a `timestamptz` bind value.
pub(crate) fn now() -> jiff_diesel::Timestamp {
    jiff_diesel::Timestamp::from(jiff::Timestamp::now())
}

/// Takes a transaction-scoped advisory lock keyed by the user, so plan-capped
/// inserts for one user run one at a time. Released on commit or rollback.
pub(crate) async fn lock_user_quota(conn: &mut AsyncPgConnection, user: Uuid) -> AppResult<()> {
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind::<diesel::sql_types::Uuid, _>(user)
        .execute(conn)
        .await?;
    Ok(())
}

/// True when `used` already fills `cap`.
pub(crate) fn at_cap(used: i64, cap: Option<i64>) -> bool {
    cap.is_some_and(|limit| used >= limit)
}

/// All repositories over one pool. Cloning only bumps the pool's refcount.
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub uploads: UploadRepository,
    pub templates: TemplateRepository,
    pub campaigns: CampaignRepository,
}

impl Repositories {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            uploads: UploadRepository::new(pool.clone()),
            templates: TemplateRepository::new(pool.clone()),
            campaigns: CampaignRepository::new(pool),
        }
    }
}

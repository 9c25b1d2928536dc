//! Campaigns and their recipient snapshots.

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::upsert::on_constraint;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use jiff_diesel::Timestamp;
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::domain::lifecycle::recipient_can_move;
use crate::error::{AppError, AppResult};
use crate::models::{
    Campaign, CampaignRecipient, CampaignStatus, Contact, NewCampaign, NewCampaignRecipient,
    RecipientStats, RecipientStatus, UpdateCampaign,
};
use crate::repositories::{at_cap, lock_user_quota, now};

const INSERT_CHUNK: usize = 1000;

pub const STALE_CLAIM_ERROR: &str = "Delivery outcome unknown";

/// What a [`RecipientHandler`] reports for one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Terminal for this recipient
    Failed(String),
    /// Problem with the sending account; the recipient goes back to
    /// pending and the batch stops
    Halt(String),
}

#[async_trait]
pub trait RecipientHandler: Send + Sync {
    async fn deliver(&self, recipient: &CampaignRecipient) -> Delivery;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Recipients claimed into `sending` by this batch
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    /// Set when the handler halted the batch
    pub halted: Option<String>,
    /// The campaign left `running` while the batch was in flight
    pub interrupted: bool,
}

#[derive(Clone)]
pub struct CampaignRepository {
    pool: AsyncDbPool,
}

impl CampaignRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Returns `None` without inserting when the owner already has `cap`
    /// campaigns.
    pub async fn create(
        &self,
        campaign: NewCampaign,
        cap: Option<i64>,
    ) -> AppResult<Option<Campaign>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                lock_user_quota(conn, campaign.user_id).await?;
                let used = campaigns
                    .filter(user_id.eq(campaign.user_id))
                    .count()
                    .get_result::<i64>(conn)
                    .await?;
                if at_cap(used, cap) {
                    return Ok(None);
                }

                diesel::insert_into(campaigns)
                    .values(&campaign)
                    .returning(Campaign::as_returning())
                    .get_result(conn)
                    .await
                    .map(Some)
                    .map_err(AppError::from)
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn find_by_id(&self, campaign_id: Uuid) -> AppResult<Option<Campaign>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        campaigns
            .find(campaign_id)
            .select(Campaign::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    pub async fn list_by_user(
        &self,
        owner: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Campaign>, i64)> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        let items = campaigns
            .filter(user_id.eq(owner))
            .order(created_at.desc())
            .offset(offset)
            .limit(limit)
            .select(Campaign::as_select())
            .load(&mut conn)
            .await?;

        let total = campaigns
            .filter(user_id.eq(owner))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        Ok((items, total))
    }

    pub async fn count_by_user(&self, owner: Uuid) -> AppResult<i64> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        campaigns
            .filter(user_id.eq(owner))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn list_by_status(&self, wanted: CampaignStatus) -> AppResult<Vec<Campaign>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        campaigns
            .filter(status.eq(wanted))
            .order(created_at.asc())
            .select(Campaign::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Scheduled campaigns whose `scheduled_at` is not in the future.
    pub async fn list_due(&self, at: Timestamp) -> AppResult<Vec<Campaign>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        campaigns
            .filter(status.eq(CampaignStatus::Scheduled))
            .filter(scheduled_at.le(at))
            .order(scheduled_at.asc())
            .select(Campaign::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Applies draft edits. Returns `None` if the campaign is no longer a draft.
    pub async fn update_draft(
        &self,
        campaign_id: Uuid,
        changes: UpdateCampaign,
    ) -> AppResult<Option<Campaign>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        diesel::update(
            campaigns
                .filter(id.eq(campaign_id))
                .filter(status.eq(CampaignStatus::Draft)),
        )
        .set(&changes)
        .returning(Campaign::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(AppError::from)
    }

    /// Moves `from -> to` only if the row is still in `from`. Sets
    /// `completed_at` when completing.
    pub async fn transition(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> AppResult<Option<Campaign>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        let finished: Option<Timestamp> = (to == CampaignStatus::Completed).then(now);
        diesel::update(
            campaigns
                .filter(id.eq(campaign_id))
                .filter(status.eq(from)),
        )
        .set((status.eq(to), completed_at.eq(finished)))
        .returning(Campaign::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(AppError::from)
    }

    pub async fn schedule(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        at: Timestamp,
    ) -> AppResult<Option<Campaign>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        diesel::update(
            campaigns
                .filter(id.eq(campaign_id))
                .filter(status.eq(from)),
        )
        .set((status.eq(CampaignStatus::Scheduled), scheduled_at.eq(Some(at))))
        .returning(Campaign::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(AppError::from)
    }

    /// First launch: moves `from -> running` and snapshots one pending
    /// recipient per subscribed contact of `upload`, all in one transaction.
    /// Recipients that already exist are left alone. Returns `None` when the
    /// campaign was no longer in `from`.
    pub async fn launch_with_snapshot<F>(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        upload: Uuid,
        subject_for: F,
    ) -> AppResult<Option<(Campaign, usize)>>
    where
        F: Fn(&Contact) -> String + Send + Sync,
    {
        use crate::schema::{campaign_recipients, campaigns, contacts};
        let mut conn = self.pool.get().await?;
        let subject_for = &subject_for;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                let Some(launched) = diesel::update(
                    campaigns::table
                        .filter(campaigns::id.eq(campaign_id))
                        .filter(campaigns::status.eq(from)),
                )
                .set((
                    campaigns::status.eq(CampaignStatus::Running),
                    campaigns::started_at.eq(Some(now())),
                ))
                .returning(Campaign::as_returning())
                .get_result(conn)
                .await
                .optional()?
                else {
                    return Ok(None);
                };

                let audience = contacts::table
                    .filter(contacts::upload_id.eq(upload))
                    .filter(contacts::unsubscribed.eq(false))
                    .order((contacts::created_at.asc(), contacts::id.asc()))
                    .select(Contact::as_select())
                    .load(conn)
                    .await?;

                let rows: Vec<NewCampaignRecipient> = audience
                    .iter()
                    .map(|contact| NewCampaignRecipient {
                        campaign_id,
                        contact_id: contact.id,
                        email: contact.email.clone(),
                        rendered_subject: subject_for(contact),
                    })
                    .collect();

                let mut inserted = 0;
                for chunk in rows.chunks(INSERT_CHUNK) {
                    inserted += diesel::insert_into(campaign_recipients::table)
                        .values(chunk)
                        .on_conflict(on_constraint("campaign_recipients_campaign_contact_key"))
                        .do_nothing()
                        .execute(conn)
                        .await?;
                }

                Ok(Some((launched, inserted)))
            }
            .scope_boxed()
        })
        .await
    }

    /// Deletes the campaign and its recipients.
    pub async fn delete(&self, campaign: Uuid) -> AppResult<usize> {
        use crate::schema::{campaign_recipients, campaigns};
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                diesel::delete(
                    campaign_recipients::table
                        .filter(campaign_recipients::campaign_id.eq(campaign)),
                )
                .execute(conn)
                .await?;

                diesel::delete(campaigns::table.find(campaign))
                    .execute(conn)
                    .await
                    .map_err(AppError::from)
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn recipient_stats(&self, campaign: Uuid) -> AppResult<RecipientStats> {
        use crate::schema::campaign_recipients::dsl::*;
        let mut conn = self.pool.get().await?;

        let rows = campaign_recipients
            .filter(campaign_id.eq(campaign))
            .group_by(status)
            .select((status, count_star()))
            .load::<(RecipientStatus, i64)>(&mut conn)
            .await?;

        let mut stats = RecipientStats::default();
        for (state, n) in rows {
            match state {
                RecipientStatus::Pending => stats.pending = n,
                RecipientStatus::Sending => stats.sending = n,
                RecipientStatus::Sent => stats.sent = n,
                RecipientStatus::Failed => stats.failed = n,
            }
            stats.total += n;
        }
        Ok(stats)
    }

    /// Recipients not yet settled: still `pending`, or claimed and `sending`.
    pub async fn count_unsettled(&self, campaign: Uuid) -> AppResult<i64> {
        use crate::schema::campaign_recipients::dsl::*;
        let mut conn = self.pool.get().await?;

        campaign_recipients
            .filter(campaign_id.eq(campaign))
            .filter(status.eq_any([RecipientStatus::Pending, RecipientStatus::Sending]))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    pub async fn list_recipients(&self, campaign: Uuid) -> AppResult<Vec<CampaignRecipient>> {
        use crate::schema::campaign_recipients::dsl::*;
        let mut conn = self.pool.get().await?;

        campaign_recipients
            .filter(campaign_id.eq(campaign))
            .order((created_at.asc(), id.asc()))
            .select(CampaignRecipient::as_select())
            .load(&mut conn)
            .await
            .map_err(AppError::from)
    }

    async fn campaign_status(&self, campaign: Uuid) -> AppResult<Option<CampaignStatus>> {
        use crate::schema::campaigns::dsl::*;
        let mut conn = self.pool.get().await?;

        campaigns
            .find(campaign)
            .select(status)
            .first::<CampaignStatus>(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    /// Moves up to `limit` pending recipients to `sending` in a short
    /// transaction. Rows are picked with `FOR UPDATE SKIP LOCKED`, so
    /// concurrent dispatchers never claim the same recipient. No lock is held
    /// once this returns.
    pub async fn claim_batch(
        &self,
        campaign: Uuid,
        limit: i64,
    ) -> AppResult<Vec<CampaignRecipient>> {
        use crate::schema::campaign_recipients as r;
        ensure_move(RecipientStatus::Pending, RecipientStatus::Sending)?;
        let mut conn = self.pool.get().await?;

        let mut claimed = conn
            .transaction::<_, AppError, _>(|conn| {
                async move {
                    let ids = r::table
                        .filter(r::campaign_id.eq(campaign))
                        .filter(r::status.eq(RecipientStatus::Pending))
                        .order((r::created_at.asc(), r::id.asc()))
                        .limit(limit)
                        .select(r::id)
                        .for_update()
                        .skip_locked()
                        .load::<Uuid>(conn)
                        .await?;

                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(
                        r::table
                            .filter(r::id.eq_any(&ids))
                            .filter(r::status.eq(RecipientStatus::Pending)),
                    )
                    .set((
                        r::status.eq(RecipientStatus::Sending),
                        r::claimed_at.eq(Some(now())),
                    ))
                    .returning(CampaignRecipient::as_returning())
                    .get_results(conn)
                    .await
                    .map_err(AppError::from)
                }
                .scope_boxed()
            })
            .await?;

        claimed.sort_by_key(|recipient| (recipient.created_at.to_jiff(), recipient.id));
        Ok(claimed)
    }

    /// Records the outcome of one claimed recipient in its own statement.
    /// Returns `false` if the row was no longer `sending`.
    pub async fn settle(
        &self,
        recipient: Uuid,
        next: RecipientStatus,
        reason: Option<String>,
    ) -> AppResult<bool> {
        use crate::schema::campaign_recipients::dsl::*;
        ensure_move(RecipientStatus::Sending, next)?;
        let mut conn = self.pool.get().await?;

        let delivered: Option<Timestamp> = (next == RecipientStatus::Sent).then(now);
        let updated = diesel::update(
            campaign_recipients
                .filter(id.eq(recipient))
                .filter(status.eq(RecipientStatus::Sending)),
        )
        .set((status.eq(next), error.eq(reason), sent_at.eq(delivered)))
        .execute(&mut conn)
        .await?;

        Ok(updated == 1)
    }

    /// Hands claimed recipients that were never sent back to `pending`.
    pub async fn release(&self, recipients: &[Uuid]) -> AppResult<usize> {
        use crate::schema::campaign_recipients::dsl::*;
        if recipients.is_empty() {
            return Ok(0);
        }
        ensure_move(RecipientStatus::Sending, RecipientStatus::Pending)?;
        let mut conn = self.pool.get().await?;

        diesel::update(
            campaign_recipients
                .filter(id.eq_any(recipients))
                .filter(status.eq(RecipientStatus::Sending)),
        )
        .set((
            status.eq(RecipientStatus::Pending),
            claimed_at.eq(None::<Timestamp>),
        ))
        .execute(&mut conn)
        .await
        .map_err(AppError::from)
    }

    /// Fails recipients claimed before `cutoff` that were never settled. The
    /// send may have happened, so they are not retried.
    pub async fn fail_stale_claims(&self, campaign: Uuid, cutoff: Timestamp) -> AppResult<usize> {
        use crate::schema::campaign_recipients::dsl::*;
        ensure_move(RecipientStatus::Sending, RecipientStatus::Failed)?;
        let mut conn = self.pool.get().await?;

        diesel::update(
            campaign_recipients
                .filter(campaign_id.eq(campaign))
                .filter(status.eq(RecipientStatus::Sending))
                .filter(claimed_at.lt(cutoff)),
        )
        .set((
            status.eq(RecipientStatus::Failed),
            error.eq(Some(STALE_CLAIM_ERROR)),
        ))
        .execute(&mut conn)
        .await
        .map_err(AppError::from)
    }

    /// Claims up to `limit` recipients, then hands each to `handler` and
    /// commits its outcome right after the send. Stops early if the campaign
    /// leaves `running` or the handler halts; claimed rows that were never
    /// handed over go back to `pending`.
    ///
    /// A row whose send went through but whose outcome could not be written
    /// stays `sending` until [`Self::fail_stale_claims`] picks it up. It is
    /// never sent twice.
    pub async fn deliver_batch(
        &self,
        campaign: Uuid,
        limit: i64,
        handler: &dyn RecipientHandler,
    ) -> AppResult<BatchOutcome> {
        let batch = self.claim_batch(campaign, limit).await?;
        let mut outcome = BatchOutcome {
            claimed: batch.len(),
            ..BatchOutcome::default()
        };
        let mut attempted = 0;

        let delivered: AppResult<()> = async {
            for recipient in &batch {
                if self.campaign_status(campaign).await? != Some(CampaignStatus::Running) {
                    outcome.interrupted = true;
                    return Ok(());
                }

                let (next, reason) = match handler.deliver(recipient).await {
                    Delivery::Sent => (RecipientStatus::Sent, None),
                    Delivery::Failed(reason) => (RecipientStatus::Failed, Some(reason)),
                    Delivery::Halt(reason) => {
                        outcome.halted = Some(reason);
                        return Ok(());
                    }
                };
                attempted += 1;

                if self.settle(recipient.id, next, reason).await? {
                    match next {
                        RecipientStatus::Sent => outcome.sent += 1,
                        _ => outcome.failed += 1,
                    }
                }
            }
            Ok(())
        }
        .await;

        let unsent: Vec<Uuid> = batch[attempted..].iter().map(|r| r.id).collect();
        let released = self.release(&unsent).await;
        delivered?;
        released?;
        Ok(outcome)
    }
}

fn ensure_move(from: RecipientStatus, to: RecipientStatus) -> AppResult<()> {
    if recipient_can_move(from, to) {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Recipient cannot move from {} to {}", from, to).into())
    }
}

//! Uploads and their contacts.

use diesel::prelude::*;
use diesel::upsert::on_constraint;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult};
use crate::models::{Contact, NewContact, NewUpload, Upload};
use crate::repositories::{at_cap, lock_user_quota};

const INSERT_CHUNK: usize = 1000;

/// Row counts removed by [`UploadRepository::delete_cascade`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeCounts {
    pub recipients: usize,
    pub campaigns: usize,
    pub contacts: usize,
}

#[derive(Clone)]
pub struct UploadRepository {
    pool: AsyncDbPool,
}

impl UploadRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    /// Inserts the upload together with its contacts and summary in one
    /// transaction. Returns `None` without inserting when the owner already
    /// has `cap` uploads; the count runs under the owner's quota lock.
    pub async fn create<F>(
        &self,
        upload: NewUpload,
        cap: Option<i64>,
        header: Vec<String>,
        contacts_for: F,
    ) -> AppResult<Option<(Upload, usize)>>
    where
        F: FnOnce(&Upload) -> Vec<NewContact> + Send,
    {
        use crate::schema::uploads;
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                lock_user_quota(conn, upload.user_id).await?;
                let used = uploads::table
                    .filter(uploads::user_id.eq(upload.user_id))
                    .count()
                    .get_result::<i64>(conn)
                    .await?;
                if at_cap(used, cap) {
                    return Ok(None);
                }

                let created = diesel::insert_into(uploads::table)
                    .values(&upload)
                    .returning(Upload::as_returning())
                    .get_result(conn)
                    .await?;
                let inserted = insert_chunks(conn, &contacts_for(&created)).await?;
                let created = write_summary(conn, created.id, header).await?;
                Ok(Some((created, inserted)))
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn find_by_id(&self, upload_id: Uuid) -> AppResult<Option<Upload>> {
        use crate::schema::uploads::dsl::*;
        let mut conn = self.pool.get().await?;

        uploads
            .find(upload_id)
            .select(Upload::as_select())
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
    ) -> AppResult<(Vec<Upload>, i64)> {
        use crate::schema::uploads::dsl::*;
        let mut conn = self.pool.get().await?;

        let items = uploads
            .filter(user_id.eq(owner))
            .order(created_at.desc())
            .offset(offset)
            .limit(limit)
            .select(Upload::as_select())
            .load(&mut conn)
            .await?;

        let total = uploads
            .filter(user_id.eq(owner))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        Ok((items, total))
    }

    pub async fn count_by_user(&self, owner: Uuid) -> AppResult<i64> {
        use crate::schema::uploads::dsl::*;
        let mut conn = self.pool.get().await?;

        uploads
            .filter(user_id.eq(owner))
            .count()
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Adds contacts to an existing upload and rewrites its summary in one
    /// transaction. Emails already stored for the same user and upload are
    /// skipped. Returns the refreshed upload and the number of new rows.
    pub async fn append_contacts(
        &self,
        upload_id: Uuid,
        header: Vec<String>,
        rows: Vec<NewContact>,
    ) -> AppResult<(Upload, usize)> {
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                let inserted = insert_chunks(conn, &rows).await?;
                let upload = write_summary(conn, upload_id, header).await?;
                Ok((upload, inserted))
            }
            .scope_boxed()
        })
        .await
    }

    pub async fn list_contacts(
        &self,
        upload: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Contact>, i64)> {
        use crate::schema::contacts::dsl::*;
        let mut conn = self.pool.get().await?;

        let items = contacts
            .filter(upload_id.eq(upload))
            .order((created_at.asc(), id.asc()))
            .offset(offset)
            .limit(limit)
            .select(Contact::as_select())
            .load(&mut conn)
            .await?;

        let total = contacts
            .filter(upload_id.eq(upload))
            .count()
            .get_result::<i64>(&mut conn)
            .await?;

        Ok((items, total))
    }

    /// Subscribed contacts of an upload in insertion order.
    pub async fn eligible_contacts(&self, upload: Uuid, limit: Option<i64>) -> AppResult<Vec<Contact>> {
        use crate::schema::contacts::dsl::*;
        let mut conn = self.pool.get().await?;

        let mut query = contacts
            .filter(upload_id.eq(upload))
            .filter(unsubscribed.eq(false))
            .order((created_at.asc(), id.asc()))
            .select(Contact::as_select())
            .into_boxed();
        if let Some(n) = limit {
            query = query.limit(n);
        }
        query.load(&mut conn).await.map_err(AppError::from)
    }

    pub async fn find_contact(&self, contact_id: Uuid) -> AppResult<Option<Contact>> {
        use crate::schema::contacts::dsl::*;
        let mut conn = self.pool.get().await?;

        contacts
            .find(contact_id)
            .select(Contact::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(AppError::from)
    }

    pub async fn unsubscribe(&self, contact_id: Uuid) -> AppResult<Contact> {
        use crate::schema::contacts::dsl::*;
        let mut conn = self.pool.get().await?;

        diesel::update(contacts.find(contact_id))
            .set(unsubscribed.eq(true))
            .returning(Contact::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(AppError::from)
    }

    /// Deletes an upload and everything hanging off it in one transaction:
    /// recipients, then campaigns, then contacts, then the upload itself.
    pub async fn delete_cascade(&self, upload: Uuid) -> AppResult<CascadeCounts> {
        use crate::schema::{campaign_recipients, campaigns, contacts, uploads};
        let mut conn = self.pool.get().await?;

        conn.transaction::<_, AppError, _>(|conn| {
            async move {
                let upload_campaigns = campaigns::table
                    .filter(campaigns::upload_id.eq(upload))
                    .select(campaigns::id);
                let upload_contacts = contacts::table
                    .filter(contacts::upload_id.eq(upload))
                    .select(contacts::id);

                let recipients = diesel::delete(
                    campaign_recipients::table.filter(
                        campaign_recipients::campaign_id
                            .eq_any(upload_campaigns)
                            .or(campaign_recipients::contact_id.eq_any(upload_contacts)),
                    ),
                )
                .execute(conn)
                .await?;

                let removed_campaigns =
                    diesel::delete(campaigns::table.filter(campaigns::upload_id.eq(upload)))
                        .execute(conn)
                        .await?;

                let removed_contacts =
                    diesel::delete(contacts::table.filter(contacts::upload_id.eq(upload)))
                        .execute(conn)
                        .await?;

                let removed = diesel::delete(uploads::table.find(upload))
                    .execute(conn)
                    .await?;
                if removed == 0 {
                    return Err(AppError::not_found("upload", upload));
                }

                Ok(CascadeCounts {
                    recipients,
                    campaigns: removed_campaigns,
                    contacts: removed_contacts,
                })
            }
            .scope_boxed()
        })
        .await
    }
}

/// Rows per INSERT stay under PostgreSQL's bind parameter limit.
async fn insert_chunks(conn: &mut AsyncPgConnection, rows: &[NewContact]) -> AppResult<usize> {
    use crate::schema::contacts;

    let mut inserted = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        inserted += diesel::insert_into(contacts::table)
            .values(chunk)
            .on_conflict(on_constraint("contacts_user_upload_email_key"))
            .do_nothing()
            .execute(conn)
            .await?;
    }
    Ok(inserted)
}

/// Writes the parsed header and the stored contact count back to the upload.
async fn write_summary(
    conn: &mut AsyncPgConnection,
    upload_id: Uuid,
    header: Vec<String>,
) -> AppResult<Upload> {
    use crate::schema::{contacts, uploads};

    let stored = contacts::table
        .filter(contacts::upload_id.eq(upload_id))
        .count()
        .get_result::<i64>(conn)
        .await?;

    diesel::update(uploads::table.find(upload_id))
        .set((
            uploads::column_names.eq(header),
            uploads::row_count.eq(i32::try_from(stored).unwrap_or(i32::MAX)),
        ))
        .returning(Upload::as_returning())
        .get_result(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found("upload", upload_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, THREE_CONTACTS};

    #[tokio::test]
    async fn cascade_delete_leaves_nothing_behind() {
        let Some(fx) = Fixture::new().await else { return };
        let upload = fx.upload(THREE_CONTACTS).await;
        let campaign = fx.launched(&upload).await;
        let draft = fx.campaign(&upload).await;

        let counts = fx.repos.uploads.delete_cascade(upload.id).await.unwrap();
        assert_eq!(
            counts,
            CascadeCounts {
                recipients: 3,
                campaigns: 2,
                contacts: 3,
            }
        );

        assert!(fx.repos.uploads.find_by_id(upload.id).await.unwrap().is_none());
        let (contacts, total) = fx.repos.uploads.list_contacts(upload.id, 0, 10).await.unwrap();
        assert!(contacts.is_empty());
        assert_eq!(total, 0);
        for id in [campaign.id, draft.id] {
            assert!(fx.repos.campaigns.find_by_id(id).await.unwrap().is_none());
            assert!(fx.repos.campaigns.list_recipients(id).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn deleting_a_missing_upload_is_not_found() {
        let Some(fx) = Fixture::new().await else { return };
        match fx.repos.uploads.delete_cascade(Uuid::new_v4()).await {
            Err(AppError::NotFound { entity, .. }) => assert_eq!(entity, "upload"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn capped_create_writes_nothing_at_the_limit() {
        let Some(fx) = Fixture::new().await else { return };
        let new = || NewUpload {
            user_id: fx.user_id,
            filename: "a.csv".into(),
            blob_key: "blobs/a".into(),
        };

        let (first, inserted) = fx
            .repos
            .uploads
            .create(new(), Some(1), vec!["email".into()], |upload| {
                vec![NewContact {
                    user_id: upload.user_id,
                    upload_id: upload.id,
                    email: "ann@example.com".into(),
                    fields: serde_json::json!({"email": "ann@example.com"}),
                }]
            })
            .await
            .unwrap()
            .expect("under the cap");
        assert_eq!((first.row_count, inserted), (1, 1));
        assert_eq!(first.column_names, vec!["email".to_string()]);

        let refused = fx
            .repos
            .uploads
            .create(new(), Some(1), Vec::new(), |_| panic!("rows built at the cap"))
            .await
            .unwrap();
        assert!(refused.is_none());
        assert_eq!(fx.repos.uploads.count_by_user(fx.user_id).await.unwrap(), 1);
    }
}

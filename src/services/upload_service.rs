//! Uploads, CSV ingestion and contacts.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{ParsedContact, ParsedCsv, parse_contacts};
use crate::error::{AppError, AppResult};
use crate::models::{Contact, NewContact, NewUpload, Upload};
use crate::repositories::UploadRepository;
use crate::services::{PlanService, Resource, ensure_owner};

/// Outcome of one CSV ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct IngestReport {
    /// Contacts added by this file
    pub inserted: usize,
    /// Rows with a missing or invalid email
    pub skipped: usize,
    /// Rows repeating an email seen earlier in the file or already stored
    pub duplicates: usize,
    /// Contacts stored for the upload after ingestion
    pub row_count: i32,
    pub columns: Vec<String>,
}

fn contact_rows(upload: &Upload, contacts: &[ParsedContact]) -> Vec<NewContact> {
    contacts
        .iter()
        .map(|c| NewContact {
            user_id: upload.user_id,
            upload_id: upload.id,
            email: c.email.clone(),
            fields: c.fields.clone(),
        })
        .collect()
}

/// Rows the database skipped as already stored count as duplicates too.
fn report_for(upload: &Upload, parsed: ParsedCsv, inserted: usize) -> IngestReport {
    let report = IngestReport {
        inserted,
        skipped: parsed.skipped,
        duplicates: parsed.duplicates + parsed.contacts.len().saturating_sub(inserted),
        row_count: upload.row_count,
        columns: parsed.columns,
    };
    tracing::info!(
        upload_id = %upload.id,
        inserted = report.inserted,
        skipped = report.skipped,
        duplicates = report.duplicates,
        row_count = report.row_count,
        "Contacts ingested"
    );
    report
}

#[derive(Clone)]
pub struct UploadService {
    repo: UploadRepository,
    plans: PlanService,
}

impl UploadService {
    pub fn new(repo: UploadRepository, plans: PlanService) -> Self {
        Self { repo, plans }
    }

    /// Creates the upload and, when a CSV body is supplied, ingests it. The
    /// CSV is parsed before anything is written, so a rejected file leaves no
    /// upload behind.
    pub async fn create(
        &self,
        user_id: Uuid,
        filename: String,
        blob_key: String,
        csv: Option<String>,
    ) -> AppResult<(Upload, Option<IngestReport>)> {
        let parsed = csv
            .as_deref()
            .map(|body| parse_contacts(body.as_bytes()))
            .transpose()?;
        let cap = self.plans.ensure_can_create(user_id, Resource::Uploads).await?;

        let header = parsed.as_ref().map(|p| p.columns.clone()).unwrap_or_default();
        let contacts = parsed.as_ref().map(|p| p.contacts.as_slice()).unwrap_or_default();
        let (upload, inserted) = self
            .repo
            .create(
                NewUpload {
                    user_id,
                    filename,
                    blob_key,
                },
                cap.limit,
                header,
                |upload| contact_rows(upload, contacts),
            )
            .await?
            .ok_or_else(|| self.plans.limit_reached(user_id, cap))?;
        self.plans.invalidate_usage(user_id).await;
        tracing::info!(upload_id = %upload.id, %user_id, "Upload created");

        let report = parsed.map(|parsed| report_for(&upload, parsed, inserted));
        Ok((upload, report))
    }

    pub async fn get(&self, user_id: Uuid, upload_id: Uuid) -> AppResult<Upload> {
        let upload = self
            .repo
            .find_by_id(upload_id)
            .await?
            .ok_or_else(|| AppError::not_found("upload", upload_id))?;
        let owner = upload.user_id;
        ensure_owner(upload, owner, user_id, "upload")
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Upload>, i64)> {
        self.repo.list_by_user(user_id, offset, limit).await
    }

    pub async fn ingest(
        &self,
        user_id: Uuid,
        upload_id: Uuid,
        csv: &[u8],
    ) -> AppResult<(Upload, IngestReport)> {
        let upload = self.get(user_id, upload_id).await?;
        self.ingest_into(upload, csv).await
    }

    async fn ingest_into(&self, upload: Upload, csv: &[u8]) -> AppResult<(Upload, IngestReport)> {
        let parsed = parse_contacts(csv)?;
        let rows = contact_rows(&upload, &parsed.contacts);
        let (upload, inserted) = self
            .repo
            .append_contacts(upload.id, parsed.columns.clone(), rows)
            .await?;

        let report = report_for(&upload, parsed, inserted);
        Ok((upload, report))
    }

    pub async fn list_contacts(
        &self,
        user_id: Uuid,
        upload_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Contact>, i64)> {
        self.get(user_id, upload_id).await?;
        self.repo.list_contacts(upload_id, offset, limit).await
    }

    pub async fn unsubscribe(&self, user_id: Uuid, contact_id: Uuid) -> AppResult<Contact> {
        let contact = self
            .repo
            .find_contact(contact_id)
            .await?
            .ok_or_else(|| AppError::not_found("contact", contact_id))?;
        ensure_owner((), contact.user_id, user_id, "contact")?;
        self.repo.unsubscribe(contact_id).await
    }

    /// Removes the upload with its contacts, the campaigns built on it and
    /// their recipients.
    pub async fn delete(&self, user_id: Uuid, upload_id: Uuid) -> AppResult<()> {
        self.get(user_id, upload_id).await?;
        let counts = self.repo.delete_cascade(upload_id).await?;
        self.plans.invalidate_usage(user_id).await;
        tracing::info!(
            %upload_id,
            recipients = counts.recipients,
            campaigns = counts.campaigns,
            contacts = counts.contacts,
            "Upload deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use diesel_async::AsyncPgConnection;
    use diesel_async::pooled_connection::AsyncDieselConnectionManager;
    use diesel_async::pooled_connection::bb8::Pool;

    use super::*;
    use crate::config::Settings;
    use crate::services::LogTransport;
    use crate::state::AppState;
    use crate::test_support::{Fixture, THREE_CONTACTS};

    #[tokio::test]
    async fn csv_without_email_column_is_rejected_before_touching_storage() {
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new("postgres://127.0.0.1:1/unreachable");
        let pool = Pool::builder()
            .connection_timeout(Duration::from_millis(300))
            .build_unchecked(manager);
        let state = AppState::new(pool, &Settings::default(), Arc::new(LogTransport));

        let result = state
            .services
            .uploads
            .create(
                Uuid::new_v4(),
                "names.csv".into(),
                "blobs/names".into(),
                Some("name\nAnn\n".into()),
            )
            .await;
        assert!(matches!(result, Err(AppError::UnprocessableContent { .. })));
    }

    #[tokio::test]
    async fn rejected_csv_does_not_use_a_plan_slot() {
        let Some(fx) = Fixture::new().await else { return };
        let uploads = &fx.state.services.uploads;

        let bad = uploads
            .create(fx.user_id, "bad.csv".into(), "blobs/bad".into(), Some("name\nAnn\n".into()))
            .await;
        assert!(matches!(bad, Err(AppError::UnprocessableContent { .. })));
        assert_eq!(uploads.list(fx.user_id, 0, 10).await.unwrap().1, 0);

        // The free plan allows two uploads
        fx.upload(THREE_CONTACTS).await;
        fx.upload(THREE_CONTACTS).await;
        assert_eq!(uploads.list(fx.user_id, 0, 10).await.unwrap().1, 2);
    }

    #[tokio::test]
    async fn report_counts_skipped_and_duplicate_rows() {
        let Some(fx) = Fixture::new().await else { return };
        let csv = "email,first_name\nann@example.com,Ann\nnot-an-email,X\nBob@Example.com,Bob\n,Y\nANN@example.com,Again\n";

        let (upload, report) = fx
            .state
            .services
            .uploads
            .create(fx.user_id, "mixed.csv".into(), "blobs/mixed".into(), Some(csv.into()))
            .await
            .unwrap();
        let report = report.expect("csv was supplied");

        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.row_count, 2);
        assert_eq!(upload.row_count, 2);
        assert_eq!(upload.column_names, vec!["email", "first_name"]);
    }

    #[tokio::test]
    async fn row_count_matches_stored_contacts_across_ingests() {
        let Some(fx) = Fixture::new().await else { return };
        let uploads = &fx.state.services.uploads;
        let upload = fx.upload(THREE_CONTACTS).await;
        assert_eq!(upload.row_count, 3);

        let again = "email,first_name\nbob@example.com,Bob\ndee@example.com,Dee\n";
        let (upload, report) = uploads.ingest(fx.user_id, upload.id, again.as_bytes()).await.unwrap();
        assert_eq!((report.inserted, report.duplicates), (1, 1));

        let (upload, report) = uploads.ingest(fx.user_id, upload.id, again.as_bytes()).await.unwrap();
        assert_eq!((report.inserted, report.duplicates), (0, 2));

        let (_, stored) = uploads.list_contacts(fx.user_id, upload.id, 0, 100).await.unwrap();
        assert_eq!(stored, 4);
        assert_eq!(i64::from(upload.row_count), stored);
        assert_eq!(report.row_count, 4);
    }

    #[tokio::test]
    async fn concurrent_creates_respect_the_plan_cap() {
        let Some(fx) = Fixture::new().await else { return };
        let uploads = fx.state.services.uploads.clone();

        let attempts = (0..5).map(|n| {
            let uploads = uploads.clone();
            let user_id = fx.user_id;
            tokio::spawn(async move {
                uploads
                    .create(user_id, format!("{}.csv", n), format!("blobs/{}", n), None)
                    .await
            })
        });
        let mut created = 0;
        for attempt in attempts.collect::<Vec<_>>() {
            match attempt.await.unwrap() {
                Ok(_) => created += 1,
                Err(AppError::PaymentRequired { limit, .. }) => assert_eq!(limit, 2),
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }

        assert_eq!(created, 2);
        assert_eq!(uploads.list(fx.user_id, 0, 10).await.unwrap().1, 2);
    }
}

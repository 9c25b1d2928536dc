//! PostgreSQL fixtures for tests that need a live database. Those tests run
//! only when `MAILFLOW_TEST_DATABASE_URL` is set and return early otherwise.
//! Every fixture works under a fresh user id, so tests can share a database.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::Pool;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::config::Settings;
use crate::db::{AsyncDbPool, run_migrations};
use crate::models::{Campaign, Template, Upload};
use crate::repositories::Repositories;
use crate::services::{CampaignDraft, MailTransport, OutgoingMail, TemplateInput, TransportError};
use crate::state::AppState;

pub(crate) const DATABASE_URL_VAR: &str = "MAILFLOW_TEST_DATABASE_URL";

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// A pool on the test database with migrations applied, or `None` when no
/// database is configured.
pub(crate) async fn test_pool() -> Option<AsyncDbPool> {
    let Ok(url) = std::env::var(DATABASE_URL_VAR) else {
        eprintln!("{} is not set, skipping database test", DATABASE_URL_VAR);
        return None;
    };
    MIGRATED
        .get_or_try_init(|| async { run_migrations(&url).await.map(drop) })
        .await
        .expect("migrations apply");

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
    let pool = Pool::builder()
        .max_size(8)
        .build(manager)
        .await
        .expect("test database reachable");
    Some(pool)
}

/// Records every accepted mail. Addresses in `reject` fail as recipient
/// errors; once `halt_after` mails went out the account fails.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<OutgoingMail>>,
    reject: HashSet<String>,
    halt_after: Option<usize>,
}

impl RecordingTransport {
    pub(crate) fn rejecting(addresses: &[&str]) -> Self {
        Self {
            reject: addresses.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    pub(crate) fn halting_after(sent: usize) -> Self {
        Self {
            halt_after: Some(sent),
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("transport lock").clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        if self.reject.contains(&mail.to) {
            return Err(TransportError::Recipient("mailbox unavailable".into()));
        }
        let mut sent = self.sent.lock().expect("transport lock");
        if self.halt_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(TransportError::Account("token revoked".into()));
        }
        sent.push(mail.clone());
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub state: AppState,
    pub repos: Repositories,
    pub transport: Arc<RecordingTransport>,
    pub user_id: Uuid,
}

impl Fixture {
    pub(crate) async fn new() -> Option<Self> {
        Self::with_transport(RecordingTransport::default()).await
    }

    pub(crate) async fn with_transport(transport: RecordingTransport) -> Option<Self> {
        let pool = test_pool().await?;
        let transport = Arc::new(transport);
        let state = AppState::new(pool.clone(), &Settings::default(), transport.clone());
        Some(Self {
            state,
            repos: Repositories::new(pool),
            transport,
            user_id: Uuid::new_v4(),
        })
    }

    pub(crate) async fn upload(&self, csv: &str) -> Upload {
        let (upload, _) = self
            .state
            .services
            .uploads
            .create(
                self.user_id,
                "contacts.csv".into(),
                format!("blobs/{}", Uuid::new_v4()),
                Some(csv.to_string()),
            )
            .await
            .expect("upload created");
        upload
    }

    pub(crate) async fn template(&self) -> Template {
        self.state
            .services
            .templates
            .create(
                self.user_id,
                TemplateInput {
                    name: "welcome".into(),
                    subject: "Hi {{ first_name }}".into(),
                    html: "<p>Hello {{ first_name }}</p>".into(),
                    text: "Hello {{ first_name }}".into(),
                },
            )
            .await
            .expect("template created")
    }

    /// A draft campaign over `upload` with its own template and account.
    pub(crate) async fn campaign(&self, upload: &Upload) -> Campaign {
        let template = self.template().await;
        let account = self
            .state
            .services
            .accounts
            .register(self.user_id, "sender@example.com")
            .await
            .expect("account registered");
        self.state
            .services
            .campaigns
            .create(
                self.user_id,
                CampaignDraft {
                    name: "spring".into(),
                    template_id: Some(template.id),
                    upload_id: Some(upload.id),
                    google_account_id: Some(account.id),
                },
            )
            .await
            .expect("campaign created")
    }

    /// A running campaign with one pending recipient per subscribed contact.
    pub(crate) async fn launched(&self, upload: &Upload) -> Campaign {
        let campaign = self.campaign(upload).await;
        self.state
            .services
            .campaigns
            .launch(self.user_id, campaign.id)
            .await
            .expect("campaign launched")
    }
}

pub(crate) const THREE_CONTACTS: &str =
    "email,first_name\nann@example.com,Ann\nbob@example.com,Bob\ncy@example.com,Cy\n";

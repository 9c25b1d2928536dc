use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use jiff::SignedDuration;
use jiff_diesel::Timestamp;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::domain::{contact_variables, render, render_html};
use crate::error::AppResult;
use crate::models::{Campaign, CampaignRecipient, CampaignStatus, Contact, Template};
use crate::repositories::{
    CampaignRepository, Delivery, RecipientHandler, UploadRepository, UserRepository, now,
};
use crate::services::CampaignService;

use super::transport::{MailTransport, OutgoingMail, TransportError};

/// Result of one dispatch pass over a single campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub sent: usize,
    pub failed: usize,
    /// Another pass already held this campaign
    pub skipped: bool,
    pub completed: bool,
    /// Why the campaign was paused, if it was
    pub paused: Option<String>,
}

/// Totals of one [`Dispatcher::tick`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub launched: usize,
    pub campaigns: usize,
    pub sent: usize,
    pub failed: usize,
    pub completed: usize,
}

pub(crate) fn classify(result: Result<(), TransportError>) -> Delivery {
    match result {
        Ok(()) => Delivery::Sent,
        Err(TransportError::Recipient(reason)) => Delivery::Failed(reason),
        Err(TransportError::Account(reason)) => Delivery::Halt(reason),
    }
}

/// Claims older than this were never settled.
fn claim_cutoff(timeout_secs: u64) -> AppResult<Timestamp> {
    let age = SignedDuration::from_secs(i64::try_from(timeout_secs).unwrap_or(i64::MAX));
    let cutoff = jiff::Timestamp::now()
        .checked_sub(age)
        .map_err(anyhow::Error::from)?;
    Ok(cutoff.into())
}

/// Renders the body for one recipient. The subject was fixed at launch.
pub(crate) fn compose(
    recipient: &CampaignRecipient,
    contact: &Contact,
    template: &Template,
    from_account: &str,
) -> OutgoingMail {
    let data = contact_variables(&contact.email, &contact.fields);
    OutgoingMail {
        campaign_id: recipient.campaign_id,
        recipient_id: recipient.id,
        from_account: from_account.to_string(),
        to: recipient.email.clone(),
        subject: recipient.rendered_subject.clone(),
        html: render_html(&template.html, &data),
        text: render(&template.text, &data),
    }
}

struct CampaignMailer {
    transport: Arc<dyn MailTransport>,
    uploads: UploadRepository,
    template: Template,
    from_account: String,
    pacing: Duration,
    started: AtomicBool,
}

#[async_trait]
impl RecipientHandler for CampaignMailer {
    async fn deliver(&self, recipient: &CampaignRecipient) -> Delivery {
        let contact = match self.uploads.find_contact(recipient.contact_id).await {
            Ok(Some(contact)) => contact,
            Ok(None) => return Delivery::Failed("Contact no longer exists".to_string()),
            Err(e) => return Delivery::Halt(format!("Failed to load contact: {}", e)),
        };
        if contact.unsubscribed {
            return Delivery::Failed("Contact unsubscribed".to_string());
        }

        if self.started.swap(true, Ordering::Relaxed) && !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }

        let mail = compose(recipient, &contact, &self.template, &self.from_account);
        let delivery = classify(self.transport.send(&mail).await);
        if let Delivery::Failed(reason) = &delivery {
            tracing::debug!(recipient_id = %recipient.id, reason = %reason, "Recipient failed");
        }
        delivery
    }
}

/// Drives running campaigns: claims pending recipients in batches and hands
/// them to the transport. One pass per campaign at a time in this process;
/// `SKIP LOCKED` claims keep separate processes apart.
#[derive(Clone)]
pub struct Dispatcher {
    campaigns: CampaignService,
    repo: CampaignRepository,
    uploads: UploadRepository,
    users: UserRepository,
    transport: Arc<dyn MailTransport>,
    config: DispatchConfig,
    in_flight: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        campaigns: CampaignService,
        repo: CampaignRepository,
        uploads: UploadRepository,
        users: UserRepository,
        transport: Arc<dyn MailTransport>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            campaigns,
            repo,
            uploads,
            users,
            transport,
            config,
            in_flight: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stops claiming new batches. A batch already claimed finishes first.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Launches due scheduled campaigns, then runs every running one.
    /// Failures are logged per campaign and do not stop the tick.
    pub async fn tick(&self) -> AppResult<TickReport> {
        let mut report = TickReport::default();
        if self.is_shut_down() {
            return Ok(report);
        }

        for campaign in self.repo.list_due(now()).await? {
            let campaign_id = campaign.id;
            match self.campaigns.launch_campaign(campaign).await {
                Ok(_) => report.launched += 1,
                Err(e) => {
                    tracing::warn!(%campaign_id, error = %e, "Scheduled launch failed")
                }
            }
        }

        for campaign in self.repo.list_by_status(CampaignStatus::Running).await? {
            let campaign_id = campaign.id;
            match self.run_campaign(campaign).await {
                Ok(run) if run.skipped => {}
                Ok(run) => {
                    report.campaigns += 1;
                    report.sent += run.sent;
                    report.failed += run.failed;
                    report.completed += usize::from(run.completed);
                }
                Err(e) => tracing::error!(%campaign_id, error = %e, "Dispatch failed"),
            }
        }

        if report.campaigns > 0 || report.launched > 0 {
            tracing::info!(
                launched = report.launched,
                campaigns = report.campaigns,
                sent = report.sent,
                failed = report.failed,
                completed = report.completed,
                "Dispatch tick finished"
            );
        }
        Ok(report)
    }

    /// Sends pending recipients of one running campaign until it drains,
    /// leaves `running`, or the sending account fails.
    pub async fn run_campaign(&self, campaign: Campaign) -> AppResult<RunReport> {
        let campaign_id = campaign.id;
        let lock = self.in_flight.entry(campaign_id).or_default().clone();
        let result = match lock.try_lock() {
            Ok(_guard) => self.run_locked(campaign).await,
            Err(_) => Ok(RunReport {
                skipped: true,
                ..RunReport::default()
            }),
        };
        drop(lock);

        // Only the map's own handle left means no pass holds or waits on it
        self.in_flight
            .remove_if(&campaign_id, |_, held| Arc::strong_count(held) == 1);
        result
    }

    async fn run_locked(&self, campaign: Campaign) -> AppResult<RunReport> {
        let mut report = RunReport::default();
        if campaign.status != CampaignStatus::Running {
            return Ok(report);
        }

        let Some(handler) = self.mailer_for(&campaign).await? else {
            let reason = "Template or sending account is missing".to_string();
            self.pause(campaign.id, &reason).await?;
            report.paused = Some(reason);
            return Ok(report);
        };

        let stale = self
            .repo
            .fail_stale_claims(campaign.id, claim_cutoff(self.config.claim_timeout_secs)?)
            .await?;
        if stale > 0 {
            tracing::warn!(
                campaign_id = %campaign.id,
                recipients = stale,
                "Failed recipients whose delivery outcome was never recorded"
            );
            report.failed += stale;
        }

        loop {
            if self.is_shut_down() {
                break;
            }
            let batch = self
                .repo
                .deliver_batch(campaign.id, self.config.batch_size, &handler)
                .await?;
            report.sent += batch.sent;
            report.failed += batch.failed;

            if let Some(reason) = batch.halted {
                self.pause(campaign.id, &reason).await?;
                report.paused = Some(reason);
                break;
            }
            if batch.interrupted {
                break;
            }
            if batch.claimed < self.config.batch_size as usize {
                report.completed = self.campaigns.complete_if_drained(campaign.id).await?.is_some();
                break;
            }
        }

        Ok(report)
    }

    /// `None` when the template or sending account row is gone. Lookup
    /// failures are errors, not a reason to pause.
    async fn mailer_for(&self, campaign: &Campaign) -> AppResult<Option<CampaignMailer>> {
        let (Some(template_id), Some(account_id)) =
            (campaign.template_id, campaign.google_account_id)
        else {
            return Ok(None);
        };
        let Some(template) = self.campaigns.find_template(template_id).await? else {
            return Ok(None);
        };
        let Some(account) = self.users.find_google_account(account_id).await? else {
            return Ok(None);
        };

        Ok(Some(CampaignMailer {
            transport: Arc::clone(&self.transport),
            uploads: self.uploads.clone(),
            template,
            from_account: account.email,
            pacing: Duration::from_millis(self.config.pacing_ms),
            started: AtomicBool::new(false),
        }))
    }

    async fn pause(&self, campaign_id: Uuid, reason: &str) -> AppResult<()> {
        let current = self.campaigns.find(campaign_id).await?;
        if current.status == CampaignStatus::Running {
            self.campaigns.pause_campaign(current).await?;
        }
        tracing::warn!(%campaign_id, reason = %reason, "Campaign paused by dispatcher");
        Ok(())
    }
}

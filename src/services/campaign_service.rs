//! Campaign lifecycle, snapshots, dry runs and exports.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{
    CampaignAction, LaunchRefs, RenderedMessage, Transition, contact_variables, render,
    render_message, transition,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    Campaign, CampaignStatus, NewCampaign, RecipientStats, Template, UpdateCampaign,
};
use crate::repositories::{
    CampaignRepository, TemplateRepository, UploadRepository, UserRepository,
};
use crate::services::{PlanService, Resource, ensure_owner};

/// Fields a campaign is created with.
#[derive(Debug, Clone, Default)]
pub struct CampaignDraft {
    pub name: String,
    pub template_id: Option<Uuid>,
    pub upload_id: Option<Uuid>,
    pub google_account_id: Option<Uuid>,
}

/// One previewed recipient.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct DryRunEntry {
    pub contact_id: Uuid,
    pub email: String,
    #[serde(flatten)]
    pub message: RenderedMessage,
}

fn stale(campaign_id: Uuid) -> AppError {
    AppError::bad_request(format!(
        "Campaign {} changed state concurrently, reload and retry",
        campaign_id
    ))
}

#[derive(Clone)]
pub struct CampaignService {
    campaigns: CampaignRepository,
    templates: TemplateRepository,
    uploads: UploadRepository,
    users: UserRepository,
    plans: PlanService,
}

impl CampaignService {
    pub fn new(
        campaigns: CampaignRepository,
        templates: TemplateRepository,
        uploads: UploadRepository,
        users: UserRepository,
        plans: PlanService,
    ) -> Self {
        Self {
            campaigns,
            templates,
            uploads,
            users,
            plans,
        }
    }

    pub async fn create(&self, user_id: Uuid, draft: CampaignDraft) -> AppResult<Campaign> {
        let cap = self
            .plans
            .ensure_can_create(user_id, Resource::Campaigns)
            .await?;
        self.check_refs(user_id, draft.template_id, draft.upload_id, draft.google_account_id)
            .await?;

        let campaign = self
            .campaigns
            .create(
                NewCampaign {
                    user_id,
                    name: draft.name,
                    template_id: draft.template_id,
                    upload_id: draft.upload_id,
                    google_account_id: draft.google_account_id,
                },
                cap.limit,
            )
            .await?
            .ok_or_else(|| self.plans.limit_reached(user_id, cap))?;
        self.plans.invalidate_usage(user_id).await;
        tracing::info!(campaign_id = %campaign.id, "Campaign created");
        Ok(campaign)
    }

    pub async fn get(&self, user_id: Uuid, campaign_id: Uuid) -> AppResult<Campaign> {
        let campaign = self.find(campaign_id).await?;
        let owner = campaign.user_id;
        ensure_owner(campaign, owner, user_id, "campaign")
    }

    pub(crate) async fn find(&self, campaign_id: Uuid) -> AppResult<Campaign> {
        self.campaigns
            .find_by_id(campaign_id)
            .await?
            .ok_or_else(|| AppError::not_found("campaign", campaign_id))
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Campaign>, i64)> {
        self.campaigns.list_by_user(user_id, offset, limit).await
    }

    /// Edits a draft. Cleared references are passed as `Some(None)`.
    pub async fn update(
        &self,
        user_id: Uuid,
        campaign_id: Uuid,
        changes: UpdateCampaign,
    ) -> AppResult<Campaign> {
        let campaign = self.get(user_id, campaign_id).await?;
        if campaign.status != CampaignStatus::Draft {
            return Err(AppError::bad_request(format!(
                "Only draft campaigns can be edited, this one is {}",
                campaign.status
            )));
        }
        if changes.name.is_none()
            && changes.template_id.is_none()
            && changes.upload_id.is_none()
            && changes.google_account_id.is_none()
        {
            return Ok(campaign);
        }
        self.check_refs(
            user_id,
            changes.template_id.flatten(),
            changes.upload_id.flatten(),
            changes.google_account_id.flatten(),
        )
        .await?;

        self.campaigns
            .update_draft(campaign_id, changes)
            .await?
            .ok_or_else(|| stale(campaign_id))
    }

    pub async fn delete(&self, user_id: Uuid, campaign_id: Uuid) -> AppResult<()> {
        self.get(user_id, campaign_id).await?;
        self.campaigns.delete(campaign_id).await?;
        self.plans.invalidate_usage(user_id).await;
        tracing::info!(%campaign_id, "Campaign deleted");
        Ok(())
    }

    pub async fn launch(&self, user_id: Uuid, campaign_id: Uuid) -> AppResult<Campaign> {
        let campaign = self.get(user_id, campaign_id).await?;
        self.launch_campaign(campaign).await
    }

    /// Runs the launch transition. The recipient snapshot is only taken when
    /// leaving draft or scheduled; later launches resume or do nothing.
    pub(crate) async fn launch_campaign(&self, campaign: Campaign) -> AppResult<Campaign> {
        let from = campaign.status;
        match transition(from, CampaignAction::Launch)? {
            Transition::Unchanged => Ok(campaign),
            Transition::To {
                status,
                snapshot: false,
            } => self
                .campaigns
                .transition(campaign.id, from, status)
                .await?
                .ok_or_else(|| stale(campaign.id)),
            Transition::To { snapshot: true, .. } => self.snapshot_and_start(campaign).await,
        }
    }

    async fn snapshot_and_start(&self, campaign: Campaign) -> AppResult<Campaign> {
        let refs = LaunchRefs::require(
            campaign.template_id,
            campaign.upload_id,
            campaign.google_account_id,
        )?;
        let template = self.template_for(refs.template_id).await?;
        if self.uploads.find_by_id(refs.upload_id).await?.is_none() {
            return Err(AppError::bad_request("Campaign upload no longer exists"));
        }

        let subject = template.subject;
        let (launched, snapshotted) = self
            .campaigns
            .launch_with_snapshot(campaign.id, campaign.status, refs.upload_id, |contact| {
                render(&subject, &contact_variables(&contact.email, &contact.fields))
            })
            .await?
            .ok_or_else(|| stale(campaign.id))?;

        tracing::info!(
            campaign_id = %launched.id,
            recipients = snapshotted,
            "Campaign launched"
        );

        if self.campaigns.count_unsettled(launched.id).await? == 0 {
            return Ok(self.complete_if_drained(launched.id).await?.unwrap_or(launched));
        }
        Ok(launched)
    }

    pub async fn pause(&self, user_id: Uuid, campaign_id: Uuid) -> AppResult<Campaign> {
        let campaign = self.get(user_id, campaign_id).await?;
        self.pause_campaign(campaign).await
    }

    pub(crate) async fn pause_campaign(&self, campaign: Campaign) -> AppResult<Campaign> {
        let from = campaign.status;
        match transition(from, CampaignAction::Pause)? {
            Transition::Unchanged => Ok(campaign),
            Transition::To { status, .. } => {
                let paused = self
                    .campaigns
                    .transition(campaign.id, from, status)
                    .await?
                    .ok_or_else(|| stale(campaign.id))?;
                tracing::info!(campaign_id = %paused.id, "Campaign paused");
                Ok(paused)
            }
        }
    }

    /// Resumes a paused campaign. Recipients are not touched.
    pub async fn run(&self, user_id: Uuid, campaign_id: Uuid) -> AppResult<Campaign> {
        let campaign = self.get(user_id, campaign_id).await?;
        let from = campaign.status;
        match transition(from, CampaignAction::Run)? {
            Transition::Unchanged => Ok(campaign),
            Transition::To { status, .. } => {
                if self.campaigns.recipient_stats(campaign_id).await?.total == 0 {
                    return Err(AppError::bad_request(
                        "Campaign has no recipients; launch it first",
                    ));
                }
                self.campaigns
                    .transition(campaign_id, from, status)
                    .await?
                    .ok_or_else(|| stale(campaign_id))
            }
        }
    }

    pub async fn schedule(
        &self,
        user_id: Uuid,
        campaign_id: Uuid,
        at: jiff::Timestamp,
    ) -> AppResult<Campaign> {
        if at <= jiff::Timestamp::now() {
            return Err(AppError::Validation {
                field: "scheduled_at".to_string(),
                reason: "Must be in the future".to_string(),
            });
        }
        let campaign = self.get(user_id, campaign_id).await?;
        let from = campaign.status;
        transition(from, CampaignAction::Schedule)?;
        LaunchRefs::require(
            campaign.template_id,
            campaign.upload_id,
            campaign.google_account_id,
        )?;

        let scheduled = self
            .campaigns
            .schedule(campaign_id, from, at.into())
            .await?
            .ok_or_else(|| stale(campaign_id))?;
        tracing::info!(%campaign_id, scheduled_at = %at, "Campaign scheduled");
        Ok(scheduled)
    }

    /// Completes a running campaign once every recipient is settled. Returns the
    /// completed campaign, or `None` if it was left as is.
    pub(crate) async fn complete_if_drained(&self, campaign_id: Uuid) -> AppResult<Option<Campaign>> {
        let campaign = self.find(campaign_id).await?;
        if campaign.status != CampaignStatus::Running
            || self.campaigns.count_unsettled(campaign_id).await? > 0
        {
            return Ok(None);
        }

        let Transition::To { status, .. } =
            transition(campaign.status, CampaignAction::Complete)?
        else {
            return Ok(None);
        };
        let completed = self
            .campaigns
            .transition(campaign_id, campaign.status, status)
            .await?;
        if let Some(done) = &completed {
            tracing::info!(campaign_id = %done.id, "Campaign completed");
        }
        Ok(completed)
    }

    /// Renders the first `limit` eligible contacts without creating
    /// recipients or sending anything.
    pub async fn dry_run(
        &self,
        user_id: Uuid,
        campaign_id: Uuid,
        limit: i64,
    ) -> AppResult<Vec<DryRunEntry>> {
        let campaign = self.get(user_id, campaign_id).await?;
        let (Some(template_id), Some(upload_id)) = (campaign.template_id, campaign.upload_id)
        else {
            return Err(AppError::bad_request(
                "Dry run needs a template and an upload",
            ));
        };
        let template = self.template_for(template_id).await?;

        let contacts = self.uploads.eligible_contacts(upload_id, Some(limit)).await?;
        Ok(contacts
            .into_iter()
            .map(|contact| {
                let data = contact_variables(&contact.email, &contact.fields);
                DryRunEntry {
                    contact_id: contact.id,
                    email: contact.email,
                    message: render_message(&template.subject, &template.html, &template.text, &data),
                }
            })
            .collect())
    }

    pub async fn stats(&self, user_id: Uuid, campaign_id: Uuid) -> AppResult<RecipientStats> {
        self.get(user_id, campaign_id).await?;
        self.campaigns.recipient_stats(campaign_id).await
    }

    /// Recipient report as CSV: email, subject, status, error, sent_at.
    pub async fn export_csv(&self, user_id: Uuid, campaign_id: Uuid) -> AppResult<Vec<u8>> {
        self.get(user_id, campaign_id).await?;
        let recipients = self.campaigns.list_recipients(campaign_id).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["email", "subject", "status", "error", "sent_at"])?;
        for r in &recipients {
            let sent_at = r.sent_at.map(|t| t.to_jiff().to_string()).unwrap_or_default();
            writer.write_record([
                r.email.as_str(),
                r.rendered_subject.as_str(),
                r.status.as_str(),
                r.error.as_deref().unwrap_or_default(),
                sent_at.as_str(),
            ])?;
        }
        writer.into_inner().map_err(|e| AppError::Internal {
            source: anyhow::anyhow!("Failed to flush CSV export: {}", e),
        })
    }

    pub(crate) async fn template_for(&self, template_id: Uuid) -> AppResult<Template> {
        self.find_template(template_id)
            .await?
            .ok_or_else(|| AppError::bad_request("Campaign template no longer exists"))
    }

    /// `None` only when the template row is gone; lookup errors propagate.
    pub(crate) async fn find_template(&self, template_id: Uuid) -> AppResult<Option<Template>> {
        self.templates.find_by_id(template_id).await
    }

    /// Referenced template, upload and account must belong to the caller.
    async fn check_refs(
        &self,
        user_id: Uuid,
        template_id: Option<Uuid>,
        upload_id: Option<Uuid>,
        google_account_id: Option<Uuid>,
    ) -> AppResult<()> {
        if let Some(id) = template_id {
            let template = self
                .templates
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found("template", id))?;
            ensure_owner((), template.user_id, user_id, "template")?;
        }
        if let Some(id) = upload_id {
            let upload = self
                .uploads
                .find_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found("upload", id))?;
            ensure_owner((), upload.user_id, user_id, "upload")?;
        }
        if let Some(id) = google_account_id {
            let account = self
                .users
                .find_google_account(id)
                .await?
                .ok_or_else(|| AppError::not_found("google_account", id))?;
            ensure_owner((), account.user_id, user_id, "google account")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, THREE_CONTACTS};

    #[tokio::test]
    async fn second_launch_keeps_one_recipient_per_contact() {
        let Some(fx) = Fixture::new().await else { return };
        let campaigns = &fx.state.services.campaigns;
        let draft = fx.campaign(&fx.upload(THREE_CONTACTS).await).await;

        let first = campaigns.launch(fx.user_id, draft.id).await.unwrap();
        let second = campaigns.launch(fx.user_id, draft.id).await.unwrap();
        assert_eq!(first.status, CampaignStatus::Running);
        assert_eq!(second.status, CampaignStatus::Running);
        assert_eq!(
            second.started_at.map(|t| t.to_jiff()),
            first.started_at.map(|t| t.to_jiff())
        );

        let stats = campaigns.stats(fx.user_id, draft.id).await.unwrap();
        assert_eq!((stats.total, stats.pending), (3, 3));
    }

    #[tokio::test]
    async fn launch_subjects_are_rendered_per_contact() {
        let Some(fx) = Fixture::new().await else { return };
        let campaign = fx.launched(&fx.upload(THREE_CONTACTS).await).await;

        let recipients = fx.repos.campaigns.list_recipients(campaign.id).await.unwrap();
        let ann = recipients.iter().find(|r| r.email == "ann@example.com").unwrap();
        assert_eq!(ann.rendered_subject, "Hi Ann");
    }

    #[tokio::test]
    async fn launch_with_no_subscribed_contacts_completes_at_once() {
        let Some(fx) = Fixture::new().await else { return };
        let uploads = &fx.state.services.uploads;
        let upload = fx.upload(THREE_CONTACTS).await;
        let (contacts, _) = uploads.list_contacts(fx.user_id, upload.id, 0, 10).await.unwrap();
        for contact in &contacts {
            uploads.unsubscribe(fx.user_id, contact.id).await.unwrap();
        }

        let campaign = fx.launched(&upload).await;
        assert_eq!(campaign.status, CampaignStatus::Completed);
        assert!(campaign.completed_at.is_some());
    }

    #[tokio::test]
    async fn pause_and_run_leave_recipients_alone() {
        let Some(fx) = Fixture::new().await else { return };
        let campaigns = &fx.state.services.campaigns;
        let campaign = fx.launched(&fx.upload(THREE_CONTACTS).await).await;

        let paused = campaigns.pause(fx.user_id, campaign.id).await.unwrap();
        assert_eq!(paused.status, CampaignStatus::Paused);
        let resumed = campaigns.run(fx.user_id, campaign.id).await.unwrap();
        assert_eq!(resumed.status, CampaignStatus::Running);
        assert_eq!(campaigns.stats(fx.user_id, campaign.id).await.unwrap().pending, 3);
    }

    #[tokio::test]
    async fn only_drafts_can_be_edited() {
        let Some(fx) = Fixture::new().await else { return };
        let campaigns = &fx.state.services.campaigns;
        let campaign = fx.launched(&fx.upload(THREE_CONTACTS).await).await;

        let changes = UpdateCampaign {
            name: Some("renamed".into()),
            ..UpdateCampaign::default()
        };
        assert!(matches!(
            campaigns.update(fx.user_id, campaign.id, changes).await,
            Err(AppError::BadRequest { .. })
        ));
    }

    #[tokio::test]
    async fn other_users_cannot_see_the_campaign() {
        let Some(fx) = Fixture::new().await else { return };
        let campaign = fx.campaign(&fx.upload(THREE_CONTACTS).await).await;

        assert!(matches!(
            fx.state.services.campaigns.get(Uuid::new_v4(), campaign.id).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn delete_removes_campaign_and_recipients() {
        let Some(fx) = Fixture::new().await else { return };
        let campaigns = &fx.state.services.campaigns;
        let campaign = fx.launched(&fx.upload(THREE_CONTACTS).await).await;

        campaigns.delete(fx.user_id, campaign.id).await.unwrap();
        assert!(matches!(
            campaigns.get(fx.user_id, campaign.id).await,
            Err(AppError::NotFound { .. })
        ));
        assert!(fx.repos.campaigns.list_recipients(campaign.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn export_lists_every_recipient() {
        let Some(fx) = Fixture::new().await else { return };
        let campaign = fx.launched(&fx.upload(THREE_CONTACTS).await).await;

        let csv = fx.state.services.campaigns.export_csv(fx.user_id, campaign.id).await.unwrap();
        let text = String::from_utf8(csv).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("email,subject,status,error,sent_at"));
        assert_eq!(lines.filter(|l| l.ends_with(",pending,,")).count(), 3);
    }
}

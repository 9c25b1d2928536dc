use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Campaign, CampaignStatus, UpdateCampaign};
use crate::services::CampaignDraft;

const DEFAULT_DRY_RUN: u32 = 5;

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    #[schema(example = "Spring launch")]
    pub name: String,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    #[serde(default)]
    pub upload_id: Option<Uuid>,
    #[serde(default)]
    pub google_account_id: Option<Uuid>,
}

impl From<CreateCampaignRequest> for CampaignDraft {
    fn from(req: CreateCampaignRequest) -> Self {
        CampaignDraft {
            name: req.name,
            template_id: req.template_id,
            upload_id: req.upload_id,
            google_account_id: req.google_account_id,
        }
    }
}

/// Draft edits. Omitted fields are kept; `null` clears a reference.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCampaignRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub template_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub upload_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, format = Uuid)]
    pub google_account_id: Option<Option<Uuid>>,
}

impl From<UpdateCampaignRequest> for UpdateCampaign {
    fn from(req: UpdateCampaignRequest) -> Self {
        UpdateCampaign {
            name: req.name,
            template_id: req.template_id,
            upload_id: req.upload_id,
            google_account_id: req.google_account_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ScheduleCampaignRequest {
    /// When the dispatcher should launch the campaign
    #[schema(value_type = String, format = DateTime, example = "2026-05-01T09:00:00Z")]
    pub scheduled_at: jiff::Timestamp,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct DryRunParams {
    /// Contacts to render (default 5)
    #[validate(range(min = 1, max = 50, message = "limit must be between 1 and 50"))]
    #[param(minimum = 1, maximum = 50, example = 5)]
    pub limit: Option<u32>,
}

impl DryRunParams {
    pub fn limit(&self) -> i64 {
        i64::from(self.limit.unwrap_or(DEFAULT_DRY_RUN))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CampaignResponse {
    pub id: Uuid,
    pub name: String,
    pub template_id: Option<Uuid>,
    pub upload_id: Option<Uuid>,
    pub google_account_id: Option<Uuid>,
    pub status: CampaignStatus,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub scheduled_at: Option<jiff::Timestamp>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: jiff::Timestamp,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub started_at: Option<jiff::Timestamp>,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub completed_at: Option<jiff::Timestamp>,
}

impl From<Campaign> for CampaignResponse {
    fn from(c: Campaign) -> Self {
        Self {
            id: c.id,
            name: c.name,
            template_id: c.template_id,
            upload_id: c.upload_id,
            google_account_id: c.google_account_id,
            status: c.status,
            scheduled_at: c.scheduled_at.map(|t| t.to_jiff()),
            created_at: c.created_at.to_jiff(),
            started_at: c.started_at.map(|t| t.to_jiff()),
            completed_at: c.completed_at.map(|t| t.to_jiff()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_tells_null_from_absent() {
        let id = Uuid::new_v4();
        let req: UpdateCampaignRequest = serde_json::from_str(&format!(
            r#"{{"template_id": null, "upload_id": "{}"}}"#,
            id
        ))
        .unwrap();
        let changes = UpdateCampaign::from(req);
        assert_eq!(changes.template_id, Some(None));
        assert_eq!(changes.upload_id, Some(Some(id)));
        assert_eq!(changes.google_account_id, None);
        assert_eq!(changes.name, None);
    }

    #[test]
    fn dry_run_limit_defaults_to_five() {
        assert_eq!(DryRunParams::default().limit(), 5);
        let params = DryRunParams { limit: Some(51) };
        assert!(params.validate().is_err());
    }

    #[test]
    fn schedule_parses_rfc3339() {
        let req: ScheduleCampaignRequest =
            serde_json::from_str(r#"{"scheduled_at": "2030-01-02T03:04:05Z"}"#).unwrap();
        assert_eq!(req.scheduled_at.as_second(), 1_893_553_445);
    }
}

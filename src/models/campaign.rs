use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use jiff_diesel::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum, utoipa::ToSchema,
)]
#[db_enum(existing_type_path = "crate::schema::sql_types::CampaignStatus")]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Running,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Scheduled => "scheduled",
            CampaignStatus::Running => "running",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DbEnum, utoipa::ToSchema,
)]
#[db_enum(existing_type_path = "crate::schema::sql_types::RecipientStatus")]
#[serde(rename_all = "lowercase")]
pub enum RecipientStatus {
    Pending,
    /// Claimed by a dispatcher; the send is in progress or its outcome
    /// could not be recorded
    Sending,
    Sent,
    Failed,
}

impl RecipientStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientStatus::Pending => "pending",
            RecipientStatus::Sending => "sending",
            RecipientStatus::Sent => "sent",
            RecipientStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::campaigns)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub template_id: Option<Uuid>,
    pub upload_id: Option<Uuid>,
    pub google_account_id: Option<Uuid>,
    pub status: CampaignStatus,
    pub scheduled_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::campaigns)]
pub struct NewCampaign {
    pub user_id: Uuid,
    pub name: String,
    pub template_id: Option<Uuid>,
    pub upload_id: Option<Uuid>,
    pub google_account_id: Option<Uuid>,
}

/// Draft edits. `None` keeps the column; `Some(None)` clears a reference.
#[derive(Debug, AsChangeset, Clone, Default)]
#[diesel(table_name = crate::schema::campaigns)]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub template_id: Option<Option<Uuid>>,
    pub upload_id: Option<Option<Uuid>>,
    pub google_account_id: Option<Option<Uuid>>,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = crate::schema::campaign_recipients)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CampaignRecipient {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub email: String,
    pub rendered_subject: String,
    pub status: RecipientStatus,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub claimed_at: Option<Timestamp>,
    pub sent_at: Option<Timestamp>,
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = crate::schema::campaign_recipients)]
pub struct NewCampaignRecipient {
    pub campaign_id: Uuid,
    pub contact_id: Uuid,
    pub email: String,
    pub rendered_subject: String,
}

/// Recipient counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RecipientStats {
    pub total: i64,
    pub pending: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
}

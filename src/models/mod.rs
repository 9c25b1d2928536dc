mod campaign;
mod template;
mod upload;
mod user;

pub use campaign::{
    Campaign, CampaignRecipient, CampaignStatus, NewCampaign, NewCampaignRecipient,
    RecipientStats, RecipientStatus, UpdateCampaign,
};
pub use template::{NewTemplate, Template, TemplateContent, TemplateVersion};
pub use upload::{Contact, NewContact, NewUpload, Upload};
pub use user::{GoogleAccount, NewGoogleAccount, User, UserPlan};

use serde::{Deserialize, Serialize};

/// Resources a user currently holds, compared against plan limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Usage {
    pub uploads: i64,
    pub templates: i64,
    pub campaigns: i64,
}

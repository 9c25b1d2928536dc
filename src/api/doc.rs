use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub const UPLOAD_TAG: &str = "Uploads";
pub const CONTACT_TAG: &str = "Contacts";
pub const TEMPLATE_TAG: &str = "Templates";
pub const CAMPAIGN_TAG: &str = "Campaigns";
pub const ACCOUNT_TAG: &str = "Accounts";
pub const HEALTH_TAG: &str = "Health";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Mailflow",
        description = "Contact lists, templates and email campaigns",
    ),
    modifiers(&SecurityAddon),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
            crate::models::CampaignStatus,
            crate::models::RecipientStatus,
        )
    ),
    tags(
        (name = UPLOAD_TAG, description = "CSV uploads and contact ingestion"),
        (name = CONTACT_TAG, description = "Individual contacts"),
        (name = TEMPLATE_TAG, description = "Versioned email templates and previews"),
        (name = CAMPAIGN_TAG, description = "Campaign lifecycle, dry runs and reports"),
        (name = ACCOUNT_TAG, description = "Sending accounts and plan usage"),
        (name = HEALTH_TAG, description = "Health check endpoints"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer Token Authentication"))
                        .build(),
                ),
            )
        }
    }
}

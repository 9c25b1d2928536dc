//! Request and response bodies of the HTTP API.

mod account;
mod campaign;
mod error;
mod health;
mod pagination;
mod template;
mod upload;

pub use account::{CreateGoogleAccountRequest, GoogleAccountResponse, PlanResponse};
pub use campaign::{
    CampaignResponse, CreateCampaignRequest, DryRunParams, ScheduleCampaignRequest,
    UpdateCampaignRequest,
};
pub use error::ErrorResponse;
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use pagination::{PagedResponse, PaginationMeta, PaginationParams};
pub use template::{
    PreviewRequest, PreviewResponse, TemplateRequest, TemplateResponse, TemplateVersionResponse,
};
pub use upload::{ContactResponse, CreateUploadRequest, UploadResponse};

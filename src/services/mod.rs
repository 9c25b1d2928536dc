//! Business rules over the repositories.

mod account_service;
mod campaign_service;
pub mod dispatch;
mod plan_service;
mod template_service;
mod upload_service;

pub use account_service::AccountService;
pub use campaign_service::{CampaignDraft, CampaignService, DryRunEntry};
pub use dispatch::{
    Dispatcher, LogTransport, MailTransport, OutgoingMail, RunReport, TickReport, TransportError,
};
pub use plan_service::{PlanCap, PlanService, Resource, check_limit};
pub use template_service::{TemplateInput, TemplateService};
pub use upload_service::{IngestReport, UploadService};

use std::sync::Arc;

use uuid::Uuid;

use crate::cache::PlanCache;
use crate::config::{DispatchConfig, PlansConfig};
use crate::error::{AppError, AppResult};
use crate::repositories::Repositories;

/// Every service, built once and shared through `AppState`.
#[derive(Clone)]
pub struct Services {
    pub plans: PlanService,
    pub accounts: AccountService,
    pub uploads: UploadService,
    pub templates: TemplateService,
    pub campaigns: CampaignService,
    pub dispatcher: Dispatcher,
}

impl Services {
    pub fn new(
        repos: Repositories,
        plan_cache: PlanCache,
        plans: PlansConfig,
        dispatch: DispatchConfig,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        let plan_service = PlanService::new(
            repos.users.clone(),
            repos.uploads.clone(),
            repos.templates.clone(),
            repos.campaigns.clone(),
            plan_cache,
            plans,
        );
        let campaigns = CampaignService::new(
            repos.campaigns.clone(),
            repos.templates.clone(),
            repos.uploads.clone(),
            repos.users.clone(),
            plan_service.clone(),
        );

        Self {
            accounts: AccountService::new(repos.users.clone()),
            uploads: UploadService::new(repos.uploads.clone(), plan_service.clone()),
            templates: TemplateService::new(repos.templates, plan_service.clone()),
            dispatcher: Dispatcher::new(
                campaigns.clone(),
                repos.campaigns,
                repos.uploads.clone(),
                repos.users.clone(),
                transport,
                dispatch,
            ),
            campaigns,
            plans: plan_service,
        }
    }
}

/// Returns `entity` if `user_id` owns it, `Forbidden` otherwise.
pub(crate) fn ensure_owner<T>(entity: T, owner: Uuid, user_id: Uuid, what: &str) -> AppResult<T> {
    if owner == user_id {
        Ok(entity)
    } else {
        Err(AppError::Forbidden {
            message: format!("You do not have access to this {}", what),
        })
    }
}

//! Plan tiers, usage counts and limit enforcement.

use uuid::Uuid;

use crate::cache::PlanCache;
use crate::config::{PlanLimits, PlansConfig};
use crate::error::{AppError, AppResult};
use crate::models::{Usage, UserPlan};
use crate::repositories::{
    CampaignRepository, TemplateRepository, UploadRepository, UserRepository,
};

/// Resources capped per plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Uploads,
    Templates,
    Campaigns,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Uploads => "uploads",
            Resource::Templates => "templates",
            Resource::Campaigns => "campaigns",
        }
    }

    fn limit(&self, limits: &PlanLimits) -> Option<i64> {
        match self {
            Resource::Uploads => limits.max_uploads,
            Resource::Templates => limits.max_templates,
            Resource::Campaigns => limits.max_campaigns,
        }
    }

    fn used(&self, usage: &Usage) -> i64 {
        match self {
            Resource::Uploads => usage.uploads,
            Resource::Templates => usage.templates,
            Resource::Campaigns => usage.campaigns,
        }
    }
}

/// A resource limit taken from the caller's plan. Repositories count again
/// under a per-user lock when inserting, so concurrent creates cannot both
/// slip under the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanCap {
    pub plan: UserPlan,
    pub resource: Resource,
    /// `None` is unlimited
    pub limit: Option<i64>,
}

impl PlanCap {
    pub fn exceeded(&self) -> AppError {
        AppError::PaymentRequired {
            resource: self.resource.as_str().to_string(),
            plan: self.plan.to_string(),
            limit: self.limit.unwrap_or_default(),
        }
    }
}

/// Fails with `PaymentRequired` when one more `resource` would exceed the plan.
pub fn check_limit(
    plan: UserPlan,
    limits: &PlanLimits,
    usage: &Usage,
    resource: Resource,
) -> AppResult<PlanCap> {
    let cap = PlanCap {
        plan,
        resource,
        limit: resource.limit(limits),
    };
    match cap.limit {
        Some(limit) if resource.used(usage) >= limit => Err(cap.exceeded()),
        _ => Ok(cap),
    }
}

#[derive(Clone)]
pub struct PlanService {
    users: UserRepository,
    uploads: UploadRepository,
    templates: TemplateRepository,
    campaigns: CampaignRepository,
    cache: PlanCache,
    plans: PlansConfig,
}

impl PlanService {
    pub fn new(
        users: UserRepository,
        uploads: UploadRepository,
        templates: TemplateRepository,
        campaigns: CampaignRepository,
        cache: PlanCache,
        plans: PlansConfig,
    ) -> Self {
        Self {
            users,
            uploads,
            templates,
            campaigns,
            cache,
            plans,
        }
    }

    pub fn limits(&self, plan: UserPlan) -> &PlanLimits {
        match plan {
            UserPlan::Free => &self.plans.free,
            UserPlan::Pro => &self.plans.pro,
        }
    }

    /// Users without a row are on the free plan.
    pub async fn plan_for(&self, user_id: Uuid) -> AppResult<UserPlan> {
        self.cache
            .plan(user_id, || async {
                Ok(self.users.find_plan(user_id).await?.unwrap_or_default())
            })
            .await
    }

    pub async fn usage_for(&self, user_id: Uuid) -> AppResult<Usage> {
        self.cache
            .usage(user_id, || async {
                Ok(Usage {
                    uploads: self.uploads.count_by_user(user_id).await?,
                    templates: self.templates.count_by_user(user_id).await?,
                    campaigns: self.campaigns.count_by_user(user_id).await?,
                })
            })
            .await
    }

    /// Checks the cached usage against the plan and returns the cap the
    /// insert must enforce again.
    pub async fn ensure_can_create(&self, user_id: Uuid, resource: Resource) -> AppResult<PlanCap> {
        let plan = self.plan_for(user_id).await?;
        let usage = self.usage_for(user_id).await?;
        check_limit(plan, self.limits(plan), &usage, resource)
            .map_err(|e| self.refused(user_id, plan, resource, e))
    }

    /// Error for an insert that found the cap already reached.
    pub fn limit_reached(&self, user_id: Uuid, cap: PlanCap) -> AppError {
        self.refused(user_id, cap.plan, cap.resource, cap.exceeded())
    }

    fn refused(&self, user_id: Uuid, plan: UserPlan, resource: Resource, error: AppError) -> AppError {
        tracing::info!(%user_id, %plan, resource = resource.as_str(), "Plan limit reached");
        error
    }

    pub async fn invalidate_usage(&self, user_id: Uuid) {
        self.cache.invalidate_usage(user_id).await;
    }
}

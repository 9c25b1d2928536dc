//! Versioned templates and ad-hoc previews.

use uuid::Uuid;

use crate::domain::{RenderedMessage, Variables, render_message, template_variables};
use crate::error::{AppError, AppResult};
use crate::models::{NewTemplate, Template, TemplateContent, TemplateVersion};
use crate::repositories::TemplateRepository;
use crate::services::{PlanService, Resource, ensure_owner};

/// Editable template content.
#[derive(Debug, Clone)]
pub struct TemplateInput {
    pub name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl TemplateInput {
    fn variables(&self) -> Vec<String> {
        template_variables(&self.subject, &self.html, &self.text)
    }
}

#[derive(Clone)]
pub struct TemplateService {
    repo: TemplateRepository,
    plans: PlanService,
}

impl TemplateService {
    pub fn new(repo: TemplateRepository, plans: PlanService) -> Self {
        Self { repo, plans }
    }

    pub async fn create(&self, user_id: Uuid, input: TemplateInput) -> AppResult<Template> {
        let cap = self
            .plans
            .ensure_can_create(user_id, Resource::Templates)
            .await?;

        let variables = input.variables();
        let template = self
            .repo
            .create(
                NewTemplate {
                    user_id,
                    name: input.name,
                    subject: input.subject,
                    html: input.html,
                    text: input.text,
                    variables,
                },
                cap.limit,
            )
            .await?
            .ok_or_else(|| self.plans.limit_reached(user_id, cap))?;
        self.plans.invalidate_usage(user_id).await;
        tracing::info!(template_id = %template.id, "Template created");
        Ok(template)
    }

    pub async fn get(&self, user_id: Uuid, template_id: Uuid) -> AppResult<Template> {
        let template = self
            .repo
            .find_by_id(template_id)
            .await?
            .ok_or_else(|| AppError::not_found("template", template_id))?;
        let owner = template.user_id;
        ensure_owner(template, owner, user_id, "template")
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<Template>, i64)> {
        self.repo.list_by_user(user_id, offset, limit).await
    }

    /// Appends a new version; earlier versions stay untouched.
    pub async fn update(
        &self,
        user_id: Uuid,
        template_id: Uuid,
        input: TemplateInput,
    ) -> AppResult<Template> {
        self.get(user_id, template_id).await?;

        let variables = input.variables();
        let template = self
            .repo
            .append_version(
                template_id,
                TemplateContent {
                    name: input.name,
                    subject: input.subject,
                    html: input.html,
                    text: input.text,
                    variables,
                },
            )
            .await?;
        tracing::info!(%template_id, version = template.version, "Template versioned");
        Ok(template)
    }

    pub async fn versions(&self, user_id: Uuid, template_id: Uuid) -> AppResult<Vec<TemplateVersion>> {
        self.get(user_id, template_id).await?;
        self.repo.list_versions(template_id).await
    }

    pub async fn delete(&self, user_id: Uuid, template_id: Uuid) -> AppResult<()> {
        self.get(user_id, template_id).await?;
        self.repo.delete(template_id).await?;
        self.plans.invalidate_usage(user_id).await;
        tracing::info!(%template_id, "Template deleted");
        Ok(())
    }

    /// Renders unsaved content against sample data.
    pub fn preview(&self, input: &TemplateInput, data: &Variables) -> (RenderedMessage, Vec<String>) {
        (
            render_message(&input.subject, &input.html, &input.text, data),
            input.variables(),
        )
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::domain::RenderedMessage;
use crate::models::{Template, TemplateVersion};
use crate::services::TemplateInput;

/// Body for creating a template or appending a version to one.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct TemplateRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    #[schema(example = "Spring promo")]
    pub name: String,

    #[validate(length(min = 1, max = 998, message = "Subject must be 1-998 characters"))]
    #[schema(example = "Hi {{ first_name }}")]
    pub subject: String,

    #[serde(default)]
    #[schema(example = "<p>Hello {{ first_name }}</p>")]
    pub html: String,

    #[serde(default)]
    pub text: String,
}

impl From<TemplateRequest> for TemplateInput {
    fn from(req: TemplateRequest) -> Self {
        TemplateInput {
            name: req.name,
            subject: req.subject,
            html: req.html,
            text: req.text,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateResponse {
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    /// Placeholders in order of first appearance
    pub variables: Vec<String>,
    pub version: i32,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: jiff::Timestamp,
    #[schema(value_type = String, format = DateTime)]
    pub updated_at: jiff::Timestamp,
}

impl From<Template> for TemplateResponse {
    fn from(t: Template) -> Self {
        Self {
            id: t.id,
            name: t.name,
            subject: t.subject,
            html: t.html,
            text: t.text,
            variables: t.variables,
            version: t.version,
            created_at: t.created_at.to_jiff(),
            updated_at: t.updated_at.to_jiff(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TemplateVersionResponse {
    pub version: i32,
    pub name: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub variables: Vec<String>,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: jiff::Timestamp,
}

impl From<TemplateVersion> for TemplateVersionResponse {
    fn from(v: TemplateVersion) -> Self {
        Self {
            version: v.version,
            name: v.name,
            subject: v.subject,
            html: v.html,
            text: v.text,
            variables: v.variables,
            created_at: v.created_at.to_jiff(),
        }
    }
}

/// Unsaved content plus sample values.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PreviewRequest {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    #[schema(example = json!({"first_name": "John"}))]
    pub data: HashMap<String, String>,
}

impl PreviewRequest {
    pub fn input(&self) -> TemplateInput {
        TemplateInput {
            name: String::new(),
            subject: self.subject.clone(),
            html: self.html.clone(),
            text: self.text.clone(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewResponse {
    #[serde(flatten)]
    pub message: RenderedMessage,
    pub variables: Vec<String>,
}

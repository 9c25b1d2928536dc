use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Contact, Upload};
use crate::services::IngestReport;

/// Registers an upload. `csv` may carry the file body inline; otherwise send
/// it later to `POST /api/uploads/{id}/contacts`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUploadRequest {
    #[validate(length(min = 1, max = 255, message = "Filename must be 1-255 characters"))]
    #[schema(example = "leads.csv")]
    pub filename: String,

    #[validate(length(min = 1, max = 1024, message = "Blob key must be 1-1024 characters"))]
    #[schema(example = "uploads/2026/leads.csv")]
    pub blob_key: String,

    #[serde(default)]
    pub csv: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub blob_key: String,
    pub columns: Vec<String>,
    pub row_count: i32,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: jiff::Timestamp,
    /// Present when the request carried a CSV body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest: Option<IngestReport>,
}

impl From<Upload> for UploadResponse {
    fn from(upload: Upload) -> Self {
        Self {
            id: upload.id,
            filename: upload.filename,
            blob_key: upload.blob_key,
            columns: upload.column_names,
            row_count: upload.row_count,
            created_at: upload.created_at.to_jiff(),
            ingest: None,
        }
    }
}

impl UploadResponse {
    pub fn with_ingest(mut self, report: Option<IngestReport>) -> Self {
        self.ingest = report;
        self
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ContactResponse {
    pub id: Uuid,
    pub upload_id: Uuid,
    pub email: String,
    pub unsubscribed: bool,
    /// The CSV row keyed by header
    #[schema(value_type = Object)]
    pub fields: JsonValue,
    #[schema(value_type = String, format = DateTime)]
    pub created_at: jiff::Timestamp,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            upload_id: contact.upload_id,
            email: contact.email,
            unsubscribed: contact.unsubscribed,
            fields: contact.fields,
            created_at: contact.created_at.to_jiff(),
        }
    }
}

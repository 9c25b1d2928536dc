//! Uploads and their contacts.

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use uuid::Uuid;

use crate::api::doc::{CONTACT_TAG, UPLOAD_TAG};
use crate::api::dto::{
    ContactResponse, CreateUploadRequest, PagedResponse, PaginationParams, UploadResponse,
};
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::services::IngestReport;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

pub fn upload_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_uploads, create_upload))
        .routes(routes!(get_upload, delete_upload))
        .routes(routes!(list_contacts, ingest_contacts))
}

pub fn contact_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(unsubscribe_contact))
}

/// POST /api/uploads - Register an upload, optionally with its CSV inline
#[utoipa::path(
    post,
    path = "/",
    tag = UPLOAD_TAG,
    request_body = CreateUploadRequest,
    responses(
        (status = 201, description = "Upload created", body = UploadResponse),
        (status = 402, description = "Upload limit reached for the plan", body = crate::api::dto::ErrorResponse),
        (status = 422, description = "CSV has no email column", body = crate::api::dto::ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn create_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateUploadRequest>,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let (upload, report) = state
        .services
        .uploads
        .create(user.user_id, req.filename, req.blob_key, req.csv)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::from(upload).with_ingest(report)),
    ))
}

/// GET /api/uploads - List the caller's uploads
#[utoipa::path(
    get,
    path = "/",
    tag = UPLOAD_TAG,
    params(PaginationParams),
    responses((status = 200, description = "Uploads by page", body = PagedResponse<UploadResponse>)),
    security(("bearerAuth" = []))
)]
async fn list_uploads(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedQuery(params): ValidatedQuery<PaginationParams>,
) -> AppResult<Json<PagedResponse<UploadResponse>>> {
    let (uploads, total) = state
        .services
        .uploads
        .list(user.user_id, params.offset(), params.limit())
        .await?;
    Ok(Json(
        PagedResponse::new(uploads, &params, total).map(UploadResponse::from),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = UPLOAD_TAG,
    params(("id" = Uuid, Path, description = "Upload ID")),
    responses(
        (status = 200, description = "Upload found", body = UploadResponse),
        (status = 404, description = "Upload not found")
    ),
    security(("bearerAuth" = []))
)]
async fn get_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UploadResponse>> {
    let upload = state.services.uploads.get(user.user_id, id).await?;
    Ok(Json(UploadResponse::from(upload)))
}

/// DELETE /api/uploads/{id} - Delete the upload, its contacts, and every
/// campaign built on it with their recipients
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = UPLOAD_TAG,
    params(("id" = Uuid, Path, description = "Upload ID")),
    responses(
        (status = 204, description = "Upload and dependents deleted"),
        (status = 404, description = "Upload not found")
    ),
    security(("bearerAuth" = []))
)]
async fn delete_upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.uploads.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/uploads/{id}/contacts - Parse a CSV body into contacts
#[utoipa::path(
    post,
    path = "/{id}/contacts",
    tag = UPLOAD_TAG,
    params(("id" = Uuid, Path, description = "Upload ID")),
    request_body(content = String, content_type = "text/csv", description = "CSV with a header row"),
    responses(
        (status = 200, description = "Ingest summary", body = IngestReport),
        (status = 422, description = "CSV has no email column or cannot be read")
    ),
    security(("bearerAuth" = []))
)]
async fn ingest_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<IngestReport>> {
    let (_, report) = state.services.uploads.ingest(user.user_id, id, &body).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/{id}/contacts",
    tag = UPLOAD_TAG,
    params(("id" = Uuid, Path, description = "Upload ID"), PaginationParams),
    responses((status = 200, description = "Contacts by page", body = PagedResponse<ContactResponse>)),
    security(("bearerAuth" = []))
)]
async fn list_contacts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ValidatedQuery(params): ValidatedQuery<PaginationParams>,
) -> AppResult<Json<PagedResponse<ContactResponse>>> {
    let (contacts, total) = state
        .services
        .uploads
        .list_contacts(user.user_id, id, params.offset(), params.limit())
        .await?;
    Ok(Json(
        PagedResponse::new(contacts, &params, total).map(ContactResponse::from),
    ))
}

/// POST /api/contacts/{id}/unsubscribe - Exclude a contact from future launches
#[utoipa::path(
    post,
    path = "/{id}/unsubscribe",
    tag = CONTACT_TAG,
    params(("id" = Uuid, Path, description = "Contact ID")),
    responses(
        (status = 200, description = "Contact unsubscribed", body = ContactResponse),
        (status = 404, description = "Contact not found")
    ),
    security(("bearerAuth" = []))
)]
async fn unsubscribe_contact(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ContactResponse>> {
    let contact = state.services.uploads.unsubscribe(user.user_id, id).await?;
    Ok(Json(ContactResponse::from(contact)))
}

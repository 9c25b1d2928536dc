//! Versioned templates and previews.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use uuid::Uuid;

use crate::api::doc::TEMPLATE_TAG;
use crate::api::dto::{
    PagedResponse, PaginationParams, PreviewRequest, PreviewResponse, TemplateRequest,
    TemplateResponse, TemplateVersionResponse,
};
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

pub fn template_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_templates, create_template))
        .routes(routes!(preview_template))
        .routes(routes!(get_template, update_template, delete_template))
        .routes(routes!(list_versions))
}

#[utoipa::path(
    post,
    path = "/",
    tag = TEMPLATE_TAG,
    request_body = TemplateRequest,
    responses(
        (status = 201, description = "Template created at version 1", body = TemplateResponse),
        (status = 402, description = "Template limit reached for the plan", body = crate::api::dto::ErrorResponse)
    ),
    security(("bearerAuth" = []))
)]
async fn create_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<TemplateRequest>,
) -> AppResult<(StatusCode, Json<TemplateResponse>)> {
    let template = state
        .services
        .templates
        .create(user.user_id, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(TemplateResponse::from(template))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = TEMPLATE_TAG,
    params(PaginationParams),
    responses((status = 200, description = "Templates by page", body = PagedResponse<TemplateResponse>)),
    security(("bearerAuth" = []))
)]
async fn list_templates(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedQuery(params): ValidatedQuery<PaginationParams>,
) -> AppResult<Json<PagedResponse<TemplateResponse>>> {
    let (templates, total) = state
        .services
        .templates
        .list(user.user_id, params.offset(), params.limit())
        .await?;
    Ok(Json(
        PagedResponse::new(templates, &params, total).map(TemplateResponse::from),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = TEMPLATE_TAG,
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 200, description = "Current version", body = TemplateResponse),
        (status = 404, description = "Template not found")
    ),
    security(("bearerAuth" = []))
)]
async fn get_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TemplateResponse>> {
    let template = state.services.templates.get(user.user_id, id).await?;
    Ok(Json(TemplateResponse::from(template)))
}

/// PUT /api/templates/{id} - Save the content as a new version
#[utoipa::path(
    put,
    path = "/{id}",
    tag = TEMPLATE_TAG,
    params(("id" = Uuid, Path, description = "Template ID")),
    request_body = TemplateRequest,
    responses(
        (status = 200, description = "New version saved", body = TemplateResponse),
        (status = 404, description = "Template not found")
    ),
    security(("bearerAuth" = []))
)]
async fn update_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<TemplateRequest>,
) -> AppResult<Json<TemplateResponse>> {
    let template = state
        .services
        .templates
        .update(user.user_id, id, req.into())
        .await?;
    Ok(Json(TemplateResponse::from(template)))
}

/// DELETE /api/templates/{id} - Delete a template and its history. Campaigns
/// that used it keep their recipients but lose the reference.
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = TEMPLATE_TAG,
    params(("id" = Uuid, Path, description = "Template ID")),
    responses(
        (status = 204, description = "Template deleted"),
        (status = 404, description = "Template not found")
    ),
    security(("bearerAuth" = []))
)]
async fn delete_template(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.templates.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/{id}/versions",
    tag = TEMPLATE_TAG,
    params(("id" = Uuid, Path, description = "Template ID")),
    responses((status = 200, description = "Versions, newest first", body = Vec<TemplateVersionResponse>)),
    security(("bearerAuth" = []))
)]
async fn list_versions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<TemplateVersionResponse>>> {
    let versions = state.services.templates.versions(user.user_id, id).await?;
    Ok(Json(
        versions
            .into_iter()
            .map(TemplateVersionResponse::from)
            .collect(),
    ))
}

/// POST /api/templates/preview - Render unsaved content against sample data
#[utoipa::path(
    post,
    path = "/preview",
    tag = TEMPLATE_TAG,
    request_body = PreviewRequest,
    responses((status = 200, description = "Rendered message", body = PreviewResponse)),
    security(("bearerAuth" = []))
)]
async fn preview_template(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<PreviewRequest>,
) -> AppResult<Json<PreviewResponse>> {
    let (message, variables) = state.services.templates.preview(&req.input(), &req.data);
    Ok(Json(PreviewResponse { message, variables }))
}

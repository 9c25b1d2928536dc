//! Campaign CRUD, lifecycle actions, dry runs and reports.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use uuid::Uuid;

use crate::api::doc::CAMPAIGN_TAG;
use crate::api::dto::{
    CampaignResponse, CreateCampaignRequest, DryRunParams, PagedResponse, PaginationParams,
    ScheduleCampaignRequest, UpdateCampaignRequest,
};
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::RecipientStats;
use crate::services::DryRunEntry;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

pub fn campaign_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_campaigns, create_campaign))
        .routes(routes!(get_campaign, update_campaign, delete_campaign))
        .routes(routes!(launch_campaign))
        .routes(routes!(pause_campaign))
        .routes(routes!(run_campaign))
        .routes(routes!(schedule_campaign))
        .routes(routes!(dry_run_campaign))
        .routes(routes!(campaign_stats))
        .routes(routes!(export_campaign))
}

#[utoipa::path(
    post,
    path = "/",
    tag = CAMPAIGN_TAG,
    request_body = CreateCampaignRequest,
    responses(
        (status = 201, description = "Draft campaign created", body = CampaignResponse),
        (status = 402, description = "Campaign limit reached for the plan", body = crate::api::dto::ErrorResponse),
        (status = 403, description = "A referenced template, upload or account belongs to someone else")
    ),
    security(("bearerAuth" = []))
)]
async fn create_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateCampaignRequest>,
) -> AppResult<(StatusCode, Json<CampaignResponse>)> {
    let campaign = state
        .services
        .campaigns
        .create(user.user_id, req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(CampaignResponse::from(campaign))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = CAMPAIGN_TAG,
    params(PaginationParams),
    responses((status = 200, description = "Campaigns by page", body = PagedResponse<CampaignResponse>)),
    security(("bearerAuth" = []))
)]
async fn list_campaigns(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedQuery(params): ValidatedQuery<PaginationParams>,
) -> AppResult<Json<PagedResponse<CampaignResponse>>> {
    let (campaigns, total) = state
        .services
        .campaigns
        .list(user.user_id, params.offset(), params.limit())
        .await?;
    Ok(Json(
        PagedResponse::new(campaigns, &params, total).map(CampaignResponse::from),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign found", body = CampaignResponse),
        (status = 404, description = "Campaign not found")
    ),
    security(("bearerAuth" = []))
)]
async fn get_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CampaignResponse>> {
    let campaign = state.services.campaigns.get(user.user_id, id).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// PUT /api/campaigns/{id} - Edit a draft
#[utoipa::path(
    put,
    path = "/{id}",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    request_body = UpdateCampaignRequest,
    responses(
        (status = 200, description = "Draft updated", body = CampaignResponse),
        (status = 400, description = "Campaign is no longer a draft")
    ),
    security(("bearerAuth" = []))
)]
async fn update_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateCampaignRequest>,
) -> AppResult<Json<CampaignResponse>> {
    let campaign = state
        .services
        .campaigns
        .update(user.user_id, id, req.into())
        .await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 204, description = "Campaign and recipients deleted"),
        (status = 404, description = "Campaign not found")
    ),
    security(("bearerAuth" = []))
)]
async fn delete_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.campaigns.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/campaigns/{id}/launch - Snapshot recipients and start sending.
/// Relaunching never adds recipients twice.
#[utoipa::path(
    post,
    path = "/{id}/launch",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign running, or completed if nobody was eligible", body = CampaignResponse),
        (status = 400, description = "Missing template, upload or account, or campaign already completed")
    ),
    security(("bearerAuth" = []))
)]
async fn launch_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CampaignResponse>> {
    let campaign = state.services.campaigns.launch(user.user_id, id).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

#[utoipa::path(
    post,
    path = "/{id}/pause",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign paused", body = CampaignResponse),
        (status = 400, description = "Campaign is not running")
    ),
    security(("bearerAuth" = []))
)]
async fn pause_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CampaignResponse>> {
    let campaign = state.services.campaigns.pause(user.user_id, id).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

#[utoipa::path(
    post,
    path = "/{id}/run",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "Campaign resumed", body = CampaignResponse),
        (status = 400, description = "Campaign is not paused or has no recipients")
    ),
    security(("bearerAuth" = []))
)]
async fn run_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<CampaignResponse>> {
    let campaign = state.services.campaigns.run(user.user_id, id).await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

#[utoipa::path(
    post,
    path = "/{id}/schedule",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    request_body = ScheduleCampaignRequest,
    responses(
        (status = 200, description = "Campaign scheduled", body = CampaignResponse),
        (status = 400, description = "Time is in the past or campaign already launched")
    ),
    security(("bearerAuth" = []))
)]
async fn schedule_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ScheduleCampaignRequest>,
) -> AppResult<Json<CampaignResponse>> {
    let campaign = state
        .services
        .campaigns
        .schedule(user.user_id, id, req.scheduled_at)
        .await?;
    Ok(Json(CampaignResponse::from(campaign)))
}

/// POST /api/campaigns/{id}/dry-run - Render the first N eligible contacts
/// without creating recipients or sending
#[utoipa::path(
    post,
    path = "/{id}/dry-run",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID"), DryRunParams),
    responses(
        (status = 200, description = "Rendered previews", body = Vec<DryRunEntry>),
        (status = 400, description = "Campaign has no template or upload")
    ),
    security(("bearerAuth" = []))
)]
async fn dry_run_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ValidatedQuery(params): ValidatedQuery<DryRunParams>,
) -> AppResult<Json<Vec<DryRunEntry>>> {
    let entries = state
        .services
        .campaigns
        .dry_run(user.user_id, id, params.limit())
        .await?;
    Ok(Json(entries))
}

#[utoipa::path(
    get,
    path = "/{id}/stats",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses((status = 200, description = "Recipient counts by status", body = RecipientStats)),
    security(("bearerAuth" = []))
)]
async fn campaign_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecipientStats>> {
    let stats = state.services.campaigns.stats(user.user_id, id).await?;
    Ok(Json(stats))
}

/// GET /api/campaigns/{id}/export - Recipient report as CSV
#[utoipa::path(
    get,
    path = "/{id}/export",
    tag = CAMPAIGN_TAG,
    params(("id" = Uuid, Path, description = "Campaign ID")),
    responses(
        (status = 200, description = "email,subject,status,error,sent_at", content_type = "text/csv", body = String)
    ),
    security(("bearerAuth" = []))
)]
async fn export_campaign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let csv = state.services.campaigns.export_csv(user.user_id, id).await?;
    let headers = [
        (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"campaign-{}.csv\"", id),
        ),
    ];
    Ok((headers, csv))
}

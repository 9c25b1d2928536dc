//! Sending accounts and the caller's plan.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use uuid::Uuid;

use crate::api::doc::ACCOUNT_TAG;
use crate::api::dto::{CreateGoogleAccountRequest, GoogleAccountResponse, PlanResponse};
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::ValidatedJson;

pub fn google_account_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_accounts, create_account))
        .routes(routes!(get_account))
}

pub fn me_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(get_plan))
}

/// POST /api/google-accounts - Register a sending account already authorized
/// elsewhere. Registering the same address twice returns the existing row.
#[utoipa::path(
    post,
    path = "/",
    tag = ACCOUNT_TAG,
    request_body = CreateGoogleAccountRequest,
    responses(
        (status = 201, description = "Account registered", body = GoogleAccountResponse),
        (status = 400, description = "Invalid email")
    ),
    security(("bearerAuth" = []))
)]
async fn create_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateGoogleAccountRequest>,
) -> AppResult<(StatusCode, Json<GoogleAccountResponse>)> {
    let account = state
        .services
        .accounts
        .register(user.user_id, &req.email)
        .await?;
    Ok((StatusCode::CREATED, Json(GoogleAccountResponse::from(account))))
}

#[utoipa::path(
    get,
    path = "/",
    tag = ACCOUNT_TAG,
    responses((status = 200, description = "Sending accounts", body = Vec<GoogleAccountResponse>)),
    security(("bearerAuth" = []))
)]
async fn list_accounts(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<GoogleAccountResponse>>> {
    let accounts = state.services.accounts.list(user.user_id).await?;
    Ok(Json(
        accounts.into_iter().map(GoogleAccountResponse::from).collect(),
    ))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = ACCOUNT_TAG,
    params(("id" = Uuid, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Sending account", body = GoogleAccountResponse),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
async fn get_account(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GoogleAccountResponse>> {
    let account = state.services.accounts.get(user.user_id, id).await?;
    Ok(Json(GoogleAccountResponse::from(account)))
}

/// GET /api/me/plan - Plan tier, limits and usage
#[utoipa::path(
    get,
    path = "/plan",
    tag = ACCOUNT_TAG,
    responses((status = 200, description = "Current plan", body = PlanResponse)),
    security(("bearerAuth" = []))
)]
async fn get_plan(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<PlanResponse>> {
    let plans = &state.services.plans;
    let plan = plans.plan_for(user.user_id).await?;
    let usage = plans.usage_for(user.user_id).await?;
    Ok(Json(PlanResponse {
        plan,
        limits: plans.limits(plan).clone(),
        usage,
    }))
}

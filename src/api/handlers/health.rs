//! Liveness, readiness and component health. These routes sit outside
//! authentication.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::Json};
use diesel_async::RunQueryDsl;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::HEALTH_TAG;
use crate::api::dto::{ComponentHealth, HealthResponse, HealthStatus};
use crate::state::AppState;

pub fn health_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health_check))
        .routes(routes!(readiness_check))
        .routes(routes!(liveness_check))
}

/// Database connectivity plus whether the dispatch scheduler is running.
/// A stopped scheduler only degrades the service.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy or degraded", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse)
    ),
    tag = HEALTH_TAG
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();
    checks.insert("database".to_string(), check_database(&state).await);
    checks.insert("dispatch".to_string(), check_dispatch(&state));

    let response = HealthResponse::from_checks(env!("CARGO_PKG_VERSION"), checks);
    let status = match response.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(response))
}

#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Database is unreachable")
    ),
    tag = HEALTH_TAG
)]
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match check_database(&state).await.status {
        HealthStatus::Healthy => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[utoipa::path(
    get,
    path = "/health/live",
    responses((status = 200, description = "Service is alive")),
    tag = HEALTH_TAG
)]
pub async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

async fn check_database(state: &AppState) -> ComponentHealth {
    let started = Instant::now();
    let health = match state.db_pool.get().await {
        Ok(mut conn) => match diesel::sql_query("SELECT 1").execute(&mut conn).await {
            Ok(_) => ComponentHealth::new(HealthStatus::Healthy, "Connected"),
            Err(e) => ComponentHealth::new(HealthStatus::Unhealthy, format!("Query failed: {}", e)),
        },
        Err(e) => {
            ComponentHealth::new(HealthStatus::Unhealthy, format!("Connection failed: {}", e))
        }
    };
    health.timed(started.elapsed())
}

fn check_dispatch(state: &AppState) -> ComponentHealth {
    if state.dispatch_running() {
        ComponentHealth::new(HealthStatus::Healthy, "Scheduler running")
    } else {
        ComponentHealth::new(HealthStatus::Degraded, "Scheduler not running")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn liveness_needs_no_dependencies() {
        assert_eq!(liveness_check().await, StatusCode::OK);
    }
}

//! Router assembly: protected `/api` groups, public health checks, the
//! OpenAPI document and the middleware stack.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers;
use crate::api::middleware::{
    auth_middleware, global_error_handler, logging_middleware, request_id_middleware,
};
use crate::config::settings::ServerConfig;
use crate::state::AppState;

pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

fn api_routes(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .nest("/api/uploads", handlers::uploads::upload_routes())
        .nest("/api/contacts", handlers::uploads::contact_routes())
        .nest("/api/templates", handlers::templates::template_routes())
        .nest("/api/campaigns", handlers::campaigns::campaign_routes())
        .nest("/api/google-accounts", handlers::accounts::google_account_routes())
        .nest("/api/me", handlers::accounts::me_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Builds the application router.
///
/// Layers run outermost first: request id, logging, CORS, compression, the
/// JSON error fallback, then the timeout and body limit closest to handlers.
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let (router, openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(api_routes(&state))
        .merge(handlers::health::health_routes())
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, openapi))
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(server.request_timeout),
        ))
        .layer(middleware::from_fn(global_error_handler))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, header};
    use diesel_async::AsyncPgConnection;
    use diesel_async::pooled_connection::AsyncDieselConnectionManager;
    use diesel_async::pooled_connection::bb8::Pool;
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::Settings;
    use crate::services::LogTransport;
    use crate::utils::jwt::generate_token;

    const SECRET: &str = "router-test-secret-with-at-least-32-chars";

    // The pool never connects; these requests are all answered before a
    // handler touches the database.
    fn app() -> Router {
        let mut settings = Settings::default();
        settings.jwt.secret = SECRET.to_string();
        let manager =
            AsyncDieselConnectionManager::<AsyncPgConnection>::new("postgres://localhost/unused");
        let pool = Pool::builder().build_unchecked(manager);
        let state = AppState::new(pool, &settings, Arc::new(LogTransport));
        create_router(state, &settings.server)
    }

    fn bearer() -> String {
        let token = generate_token(Uuid::new_v4(), None, SECRET, 1).unwrap();
        format!("Bearer {}", token)
    }

    async fn json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn liveness_is_public() {
        let response = app()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let response = app()
            .oneshot(
                Request::get("/api/campaigns")
                    .header("x-request-id", "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json(response).await;
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert_eq!(body["request_id"], "abc");
    }

    #[tokio::test]
    async fn invalid_path_id_is_a_json_bad_request() {
        let response = app()
            .oneshot(
                Request::get("/api/campaigns/not-a-uuid")
                    .header(header::AUTHORIZATION, bearer())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_the_service() {
        let response = app()
            .oneshot(
                Request::post("/api/campaigns")
                    .header(header::AUTHORIZATION, bearer())
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"name\": "))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn openapi_lists_campaign_actions() {
        let response = app()
            .oneshot(Request::get(OPENAPI_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json(response).await;
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/campaigns/{id}/launch"));
        assert!(paths.contains_key("/api/campaigns/{id}/dry-run"));
        assert!(paths.contains_key("/api/me/plan"));
    }
}

//! `AppError` to HTTP response mapping and the JSON fallback for errors
//! produced outside handlers (unknown routes, body limits, timeouts).

use axum::{
    Json,
    extract::Request,
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use super::RequestId;
use crate::api::dto::ErrorResponse;
use crate::error::AppError;

/// Marks a response rendered from an `AppError` so the fallback layer can
/// attach the request id without re-parsing the body.
#[derive(Debug, Clone)]
struct RenderedError(ErrorResponse);

pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Duplicate { .. } => StatusCode::CONFLICT,
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => StatusCode::BAD_REQUEST,
        AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::PaymentRequired { .. } => StatusCode::PAYMENT_REQUIRED,
        AppError::UnprocessableContent { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::ConnectionPool { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn error_to_code(error: &AppError) -> &'static str {
    match error {
        AppError::NotFound { .. } => "NOT_FOUND",
        AppError::Duplicate { .. } => "DUPLICATE_ENTRY",
        AppError::Validation { .. } | AppError::ValidationErrors { .. } => "VALIDATION_ERROR",
        AppError::BadRequest { .. } => "BAD_REQUEST",
        AppError::PaymentRequired { .. } => "PAYMENT_REQUIRED",
        AppError::UnprocessableContent { .. } => "UNPROCESSABLE_CONTENT",
        AppError::Unauthorized { .. } => "UNAUTHORIZED",
        AppError::Forbidden { .. } => "FORBIDDEN",
        AppError::Database { .. } => "DATABASE_ERROR",
        AppError::Configuration { .. } => "CONFIGURATION_ERROR",
        AppError::ConnectionPool { .. } => "SERVICE_UNAVAILABLE",
        AppError::Internal { .. } => "INTERNAL_ERROR",
    }
}

/// Builds the client-facing body. Server-side failures never expose their
/// source.
pub fn error_body(error: &AppError) -> ErrorResponse {
    let code = error_to_code(error);
    match error {
        AppError::NotFound {
            entity,
            field,
            value,
        }
        | AppError::Duplicate {
            entity,
            field,
            value,
        } => ErrorResponse::new(code, error.to_string()).with_details(json!({
            "entity": entity,
            "field": field,
            "value": value,
        })),
        AppError::Validation { field, reason } => ErrorResponse::new(code, error.to_string())
            .with_details(json!({ "field": field, "reason": reason })),
        AppError::ValidationErrors { errors } => {
            ErrorResponse::new(code, error.to_string()).with_details(json!({ "errors": errors }))
        }
        AppError::PaymentRequired {
            resource,
            plan,
            limit,
        } => ErrorResponse::new(code, error.to_string()).with_details(json!({
            "resource": resource,
            "plan": plan,
            "limit": limit,
        })),
        AppError::BadRequest { message }
        | AppError::UnprocessableContent { message }
        | AppError::Unauthorized { message }
        | AppError::Forbidden { message } => ErrorResponse::new(code, message.clone()),
        AppError::Database { operation, .. } => {
            ErrorResponse::new(code, format!("Database operation failed: {}", operation))
        }
        AppError::Configuration { key, .. } => {
            ErrorResponse::new(code, format!("Configuration error: {}", key))
        }
        AppError::ConnectionPool { .. } => {
            ErrorResponse::new(code, "Database connection unavailable")
        }
        AppError::Internal { .. } => ErrorResponse::new(code, "An internal error occurred"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = error_body(&self);
        let mut response = (status, Json(body.clone())).into_response();
        response.extensions_mut().insert(RenderedError(body));
        response
    }
}

fn fallback_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "BAD_REQUEST",
        StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::REQUEST_TIMEOUT => "REQUEST_TIMEOUT",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
        StatusCode::SERVICE_UNAVAILABLE => "SERVICE_UNAVAILABLE",
        s if s.is_server_error() => "INTERNAL_ERROR",
        _ => "UNKNOWN_ERROR",
    }
}

/// Ensures every 4xx/5xx leaves as `{error, code, request_id}` JSON.
pub async fn global_error_handler(request: Request, next: Next) -> Response {
    let request_id = request.extensions().get::<RequestId>().map(|r| r.0.clone());
    let response = next.run(request).await;

    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    if let Some(RenderedError(body)) = response.extensions().get::<RenderedError>().cloned() {
        let body = match &request_id {
            Some(id) => body.with_request_id(id),
            None => body,
        };
        let (mut parts, _) = response.into_parts();
        parts.headers.remove(header::CONTENT_LENGTH);
        return (parts, Json(body)).into_response();
    }

    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));
    if is_json {
        return response;
    }

    let (_, body) = response.into_parts();
    let original = axum::body::to_bytes(body, 64 * 1024)
        .await
        .map(|b| String::from_utf8_lossy(&b).trim().to_string())
        .unwrap_or_default();
    let message = if original.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    } else {
        original
    };

    let mut body = ErrorResponse::new(fallback_code(status), message);
    if let Some(id) = &request_id {
        body = body.with_request_id(id);
    }
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, middleware, routing::get};
    use tower::ServiceExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn plan_limit_is_payment_required() {
        let error = AppError::PaymentRequired {
            resource: "uploads".to_string(),
            plan: "free".to_string(),
            limit: 2,
        };
        assert_eq!(error_to_status_code(&error), StatusCode::PAYMENT_REQUIRED);
        let body = error_body(&error);
        assert_eq!(body.code, "PAYMENT_REQUIRED");
        assert_eq!(body.details.unwrap()["limit"], 2);
    }

    #[test]
    fn status_codes_by_variant() {
        let cases = [
            (AppError::not_found("campaign", "x"), StatusCode::NOT_FOUND),
            (AppError::bad_request("no"), StatusCode::BAD_REQUEST),
            (
                AppError::UnprocessableContent {
                    message: "no email column".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::Forbidden {
                    message: "not yours".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::ConnectionPool {
                    source: anyhow::anyhow!("pool timed out"),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error_to_status_code(&error), status, "{:?}", error);
        }
    }

    #[test]
    fn internal_details_are_hidden() {
        let error = AppError::Internal {
            source: anyhow::anyhow!("secret connection string"),
        };
        let body = error_body(&error);
        assert_eq!(body.error, "An internal error occurred");
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn app_error_response_is_json_with_error_field() {
        let response = AppError::bad_request("Cannot pause a draft").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Cannot pause a draft");
        assert_eq!(json["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn fallback_converts_plain_errors_and_adds_request_id() {
        let app = Router::new()
            .route(
                "/boom",
                get(|| async { (StatusCode::PAYLOAD_TOO_LARGE, "too big") }),
            )
            .route(
                "/typed",
                get(|| async { Err::<(), _>(AppError::not_found("upload", "1")) }),
            )
            .layer(middleware::from_fn(global_error_handler))
            .layer(middleware::from_fn(super::super::request_id_middleware));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/boom")
                    .header("x-request-id", "req-7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["error"], "too big");
        assert_eq!(json["code"], "PAYLOAD_TOO_LARGE");
        assert_eq!(json["request_id"], "req-7");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/typed")
                    .header("x-request-id", "req-8")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["request_id"], "req-8");
        assert_eq!(json["details"]["entity"], "upload");
    }
}

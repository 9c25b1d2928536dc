//! One span per request, correlated by request id.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{Instrument, Level, info, span};

use super::RequestId;

/// Logs method, path, status and latency inside an `http_request` span.
/// `user_id` is filled in by the auth layer once the caller is known.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let span = span!(
        Level::INFO,
        "http_request",
        method = %method,
        path = %path,
        request_id = %request_id,
        user_id = tracing::field::Empty,
    );

    async move {
        let start = Instant::now();
        let response = next.run(request).await;
        let status = response.status();

        info!(
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Request finished"
        );
        response
    }
    .instrument(span)
    .await
}

//! Error response DTOs.

use serde::Serialize;
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[schema(example = json!({
    "error": "Plan limit reached: at most 2 uploads on the free plan",
    "code": "PAYMENT_REQUIRED",
    "details": {"resource": "uploads", "plan": "free", "limit": 2}
}))]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,
    /// Stable machine-readable code
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.to_string(),
            details: None,
            request_id: None,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    /// Adds request ID to the error response for correlation.
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn optional_fields_are_omitted() {
        let body = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "gone")).unwrap();
        assert_eq!(body, json!({"error": "gone", "code": "NOT_FOUND"}));
    }

    #[test]
    fn details_and_request_id_are_serialized() {
        let body = ErrorResponse::new("BAD_REQUEST", "nope")
            .with_details(json!({"field": "name"}))
            .with_request_id("req-1");
        let value = serde_json::to_value(body).unwrap();
        assert_eq!(value["details"]["field"], "name");
        assert_eq!(value["request_id"], "req-1");
    }
}

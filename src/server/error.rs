//! JSON error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Body of every non-2xx JSON response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Short, user-facing message
    pub error: String,

    /// Underlying cause, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// An error returned by a handler before any response body was written
#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    /// Create an error with a status and message
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                details: None,
            },
        }
    }

    /// 400
    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// 500
    pub fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    /// 503
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error)
    }

    /// Attach the underlying cause
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                "[Server] {} {}: {}",
                self.status.as_u16(),
                self.body.error,
                self.body.details.as_deref().unwrap_or("")
            );
        } else {
            tracing::debug!("[Server] {} {}", self.status.as_u16(), self.body.error);
        }
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "Messages array is required".into(),
            details: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"error": "Messages array is required"})
        );

        let err = ApiError::internal("Failed to get response from AI").with_details("connection refused");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::to_value(&err.body).unwrap(),
            json!({"error": "Failed to get response from AI", "details": "connection refused"})
        );
    }

    #[test]
    fn test_into_response_status() {
        let response = ApiError::unavailable("Algolia MCP server not available").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

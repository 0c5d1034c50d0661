use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::detect::DetectError;
use crate::rules::RuleError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// The entity exists but is not in a state that allows the transition.
    #[error("{0}")]
    Conflict(String),

    #[error("metric source failed: {0}")]
    Upstream(String),

    #[error("metric source timed out: {0}")]
    UpstreamTimeout(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            ApiError::UpstreamTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

impl From<RuleError> for ApiError {
    fn from(e: RuleError) -> Self {
        match e {
            RuleError::NotFound(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<DetectError> for ApiError {
    fn from(e: DetectError) -> Self {
        match e {
            DetectError::Timeout { .. } => ApiError::UpstreamTimeout(e.to_string()),
            DetectError::Gateway { .. } => ApiError::Upstream(e.to_string()),
            DetectError::RangeOutOfBounds { .. } => ApiError::BadRequest(e.to_string()),
            // Not surfaced by the engine, which turns these into empty results
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

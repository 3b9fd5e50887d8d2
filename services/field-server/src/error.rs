//! Mapping of engine errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use field_common::FieldError;

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    /// True when the failure was an unreachable source rather than bad data.
    #[serde(default)]
    pub source_unreachable: bool,
}

/// A [`FieldError`] returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub FieldError);

impl From<FieldError> for ApiError {
    fn from(err: FieldError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        metrics::counter!("field_request_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = ErrorResponse {
            status: status.as_u16(),
            error: self.0.to_string(),
            source_unreachable: self.0.is_source_unreachable(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

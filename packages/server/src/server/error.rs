//! HTTP mapping for [`ApiError`].
//!
//! The single place where error variants become status codes, envelopes and
//! headers. Every error response has the shape:
//!
//! ```json
//! { "error": { "code", "message", "details"?, "request_id", "timestamp",
//!              "documentation_url" } }
//! ```

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::common::errors::DOCS_BASE_URL;
use crate::common::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub documentation_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Build the full error response, echoing the request id when known.
pub fn error_response(error: &ApiError, request_id: Option<String>) -> Response {
    let code = error.code();
    let request_id = request_id.unwrap_or_else(|| Uuid::new_v4().to_string());

    warn!(
        code = code,
        request_id = %request_id,
        message = %error,
        "request failed"
    );

    let body = ErrorBody {
        error: ErrorDetail {
            code: code.to_string(),
            message: error.to_string(),
            details: error.details(),
            request_id,
            timestamp: Utc::now(),
            documentation_url: format!("{DOCS_BASE_URL}/{code}"),
        },
    };

    let status = StatusCode::from_u16(error.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(body)).into_response();

    if let Some(retry_after) = error.retry_after() {
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }

    response
}

/// An [`ApiError`] paired with the request id it should echo.
pub struct ApiFailure {
    pub error: ApiError,
    pub request_id: Option<String>,
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        error_response(&self.error, self.request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error_response(&self, None)
    }
}

impl<E> From<E> for ApiFailure
where
    E: Into<ApiError>,
{
    fn from(error: E) -> Self {
        Self {
            error: error.into(),
            request_id: None,
        }
    }
}

//! API error taxonomy.
//!
//! All failures that can reach a client are variants of [`ApiError`]. Services
//! return it directly and the HTTP layer maps it to a response envelope in one
//! place (`server::error`), so no handler invents its own status codes.

use serde_json::{json, Value};
use thiserror::Error;

use crate::domains::auth::UserTier;
use crate::domains::jobs::JobStatus;

/// Pricing page surfaced in tier/quota error details.
pub const UPGRADE_URL: &str = "https://platform.dreammachine.dev/pricing";

/// Base URL for per-error documentation links.
pub const DOCS_BASE_URL: &str = "https://docs.dreammachine.dev/errors";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No authentication credentials provided")]
    MissingCredentials,

    #[error("{}", reason.as_deref().unwrap_or("Invalid API key provided"))]
    InvalidApiKey { reason: Option<String> },

    #[error("This operation requires {required} tier or higher")]
    InsufficientTier {
        current: UserTier,
        required: UserTier,
        details: Option<Value>,
    },

    #[error("{message}")]
    PermissionDenied {
        message: String,
        details: Option<Value>,
    },

    #[error("{quota_type} quota exceeded ({used}/{limit})")]
    QuotaExceeded {
        quota_type: &'static str,
        limit: i64,
        used: i64,
    },

    #[error("Rate limit exceeded: {limit} requests per {window_seconds}s")]
    RateLimited {
        limit: u32,
        window_seconds: u64,
        retry_after: i64,
        tier: UserTier,
    },

    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    #[error("{message}")]
    InvalidPrompt { message: String },

    #[error("Job '{job_id}' not found")]
    JobNotFound { job_id: String },

    #[error("Job cannot be cancelled (current status: {current_status})")]
    JobNotCancellable {
        job_id: String,
        current_status: JobStatus,
    },

    #[error("Video '{video_id}' not found")]
    VideoNotFound { video_id: String },

    #[error("The processing queue is full, please try again later")]
    QueueFull,

    #[error("The requested model '{model}' is currently unavailable")]
    ModelUnavailable { model: String },

    #[error("The request violates our content policy")]
    ContentPolicyViolation,

    #[error("Video generation timed out")]
    GenerationTimeout,

    #[error("An internal error occurred")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Machine-readable error code carried in the response envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingCredentials => "AUTH_MISSING_CREDENTIALS",
            ApiError::InvalidApiKey { .. } => "AUTH_INVALID_KEY",
            ApiError::InsufficientTier { .. } => "AUTH_INSUFFICIENT_TIER",
            ApiError::PermissionDenied { .. } => "AUTH_PERMISSION_DENIED",
            ApiError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::InvalidPrompt { .. } => "INVALID_PROMPT",
            ApiError::JobNotFound { .. } => "JOB_NOT_FOUND",
            ApiError::JobNotCancellable { .. } => "JOB_CANCELLED",
            ApiError::VideoNotFound { .. } => "VIDEO_NOT_FOUND",
            ApiError::QueueFull => "QUEUE_FULL",
            ApiError::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            ApiError::ContentPolicyViolation => "CONTENT_POLICY_VIOLATION",
            ApiError::GenerationTimeout => "GENERATION_TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::MissingCredentials | ApiError::InvalidApiKey { .. } => 401,
            ApiError::InsufficientTier { .. } | ApiError::PermissionDenied { .. } => 403,
            ApiError::QuotaExceeded { .. } | ApiError::RateLimited { .. } => 429,
            ApiError::Validation { .. } | ApiError::InvalidPrompt { .. } => 400,
            ApiError::JobNotFound { .. } | ApiError::VideoNotFound { .. } => 404,
            ApiError::JobNotCancellable { .. } => 409,
            ApiError::QueueFull | ApiError::ModelUnavailable { .. } => 503,
            ApiError::ContentPolicyViolation => 422,
            ApiError::GenerationTimeout => 504,
            ApiError::Internal(_) => 500,
        }
    }

    /// Structured details attached to the envelope, if any.
    pub fn details(&self) -> Option<Value> {
        match self {
            ApiError::InsufficientTier {
                current,
                required,
                details,
            } => {
                let mut base = json!({
                    "current_tier": current,
                    "required_tier": required,
                    "upgrade_url": UPGRADE_URL,
                });
                if let (Some(base_map), Some(Value::Object(extra))) =
                    (base.as_object_mut(), details.as_ref())
                {
                    for (key, value) in extra {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
                Some(base)
            }
            ApiError::PermissionDenied { details, .. } => details.clone(),
            ApiError::QuotaExceeded {
                quota_type,
                limit,
                used,
            } => Some(json!({
                "quota_type": quota_type,
                "limit": limit,
                "used": used,
                "upgrade_url": UPGRADE_URL,
            })),
            ApiError::RateLimited {
                limit,
                window_seconds,
                retry_after,
                tier,
            } => Some(json!({
                "limit": limit,
                "window": format!("{window_seconds}s"),
                "retry_after": retry_after,
                "tier": tier,
                "upgrade_url": UPGRADE_URL,
            })),
            ApiError::Validation { details, .. } => details.clone(),
            ApiError::JobNotFound { job_id } => Some(json!({ "job_id": job_id })),
            ApiError::JobNotCancellable {
                job_id,
                current_status,
            } => Some(json!({
                "job_id": job_id,
                "current_status": current_status,
            })),
            ApiError::VideoNotFound { video_id } => Some(json!({ "video_id": video_id })),
            ApiError::ModelUnavailable { model } => Some(json!({ "model": model })),
            _ => None,
        }
    }

    /// Seconds the client should wait before retrying, for 429 responses.
    pub fn retry_after(&self) -> Option<i64> {
        match self {
            ApiError::RateLimited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingCredentials.status(), 401);
        assert_eq!(
            ApiError::InsufficientTier {
                current: UserTier::Free,
                required: UserTier::Developer,
                details: None,
            }
            .status(),
            403
        );
        assert_eq!(
            ApiError::QuotaExceeded {
                quota_type: "daily",
                limit: 500,
                used: 500,
            }
            .status(),
            429
        );
        assert_eq!(ApiError::QueueFull.status(), 503);
        assert_eq!(ApiError::GenerationTimeout.status(), 504);
    }

    #[test]
    fn test_insufficient_tier_details_merge() {
        let error = ApiError::InsufficientTier {
            current: UserTier::Developer,
            required: UserTier::Pro,
            details: Some(json!({ "requested_duration": 60, "max_duration": 30 })),
        };
        let details = error.details().unwrap();
        assert_eq!(details["current_tier"], "developer");
        assert_eq!(details["required_tier"], "pro");
        assert_eq!(details["requested_duration"], 60);
        assert_eq!(details["upgrade_url"], UPGRADE_URL);
    }

    #[test]
    fn test_rate_limited_retry_after() {
        let error = ApiError::RateLimited {
            limit: 10,
            window_seconds: 60,
            retry_after: 42,
            tier: UserTier::Free,
        };
        assert_eq!(error.retry_after(), Some(42));
        assert_eq!(error.details().unwrap()["window"], "60s");
    }

    #[test]
    fn test_internal_hides_cause() {
        let error = ApiError::Internal(anyhow::anyhow!("connection pool exhausted"));
        assert_eq!(error.code(), "INTERNAL_ERROR");
        assert_eq!(error.to_string(), "An internal error occurred");
    }
}

//! Account endpoint response schemas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use crate::common::ApiError;
use crate::domains::auth::UserTier;

/// Reporting period for usage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsagePeriod {
    Daily,
    Monthly,
}

impl FromStr for UsagePeriod {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "daily" => Ok(UsagePeriod::Daily),
            "monthly" => Ok(UsagePeriod::Monthly),
            other => Err(ApiError::Validation {
                message: format!("period must be 'daily' or 'monthly', got '{other}'"),
                details: Some(serde_json::json!({ "field": "period" })),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub user_id: String,
    pub email: String,
    pub tier: UserTier,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageResponse {
    pub user_id: String,
    pub tier: UserTier,
    pub period: UsagePeriod,
    pub requests_made: i64,
    pub videos_generated: u64,
    pub total_duration_seconds: f64,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

/// Quota snapshot. The `daily_quota` fields are JSON values because
/// unlimited tiers report the string `"unlimited"` instead of a number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaResponse {
    pub user_id: String,
    pub tier: UserTier,
    pub rate_limit: Value,
    pub daily_quota: Value,
    pub concurrent_jobs: Value,
    pub max_video_duration: u32,
    pub can_generate: bool,
    pub can_batch_generate: bool,
}

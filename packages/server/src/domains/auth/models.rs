//! User identity and subscription tiers.
//!
//! Tiers parameterise everything the control plane enforces: rate limit,
//! daily quota, concurrency, maximum video duration, queue weight and feature
//! gates. The table is static configuration, not data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier. Ordering matters: later variants satisfy
/// minimum-tier checks for earlier ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Free,
    Developer,
    Pro,
    Enterprise,
}

impl UserTier {
    /// Static configuration for this tier.
    pub fn config(&self) -> &'static TierConfig {
        match self {
            UserTier::Free => &FREE_TIER,
            UserTier::Developer => &DEVELOPER_TIER,
            UserTier::Pro => &PRO_TIER,
            UserTier::Enterprise => &ENTERPRISE_TIER,
        }
    }
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserTier::Free => "free",
            UserTier::Developer => "developer",
            UserTier::Pro => "pro",
            UserTier::Enterprise => "enterprise",
        };
        f.write_str(name)
    }
}

/// Per-tier limits and feature gates.
#[derive(Debug, Clone, Copy)]
pub struct TierConfig {
    pub rate_limit_per_minute: u32,
    /// Requests per day; `-1` means unlimited.
    pub daily_quota: i64,
    pub max_concurrent_jobs: usize,
    /// Longest video this tier may request, in seconds.
    pub max_video_duration: u32,
    pub queue_priority_weight: u32,
    pub can_generate: bool,
    pub can_batch_generate: bool,
}

pub static FREE_TIER: TierConfig = TierConfig {
    rate_limit_per_minute: 10,
    daily_quota: 100,
    max_concurrent_jobs: 0,
    max_video_duration: 0,
    queue_priority_weight: 0,
    can_generate: false,
    can_batch_generate: false,
};

pub static DEVELOPER_TIER: TierConfig = TierConfig {
    rate_limit_per_minute: 30,
    daily_quota: 500,
    max_concurrent_jobs: 3,
    max_video_duration: 30,
    queue_priority_weight: 1,
    can_generate: true,
    can_batch_generate: false,
};

pub static PRO_TIER: TierConfig = TierConfig {
    rate_limit_per_minute: 100,
    daily_quota: 5000,
    max_concurrent_jobs: 10,
    max_video_duration: 120,
    queue_priority_weight: 5,
    can_generate: true,
    can_batch_generate: true,
};

pub static ENTERPRISE_TIER: TierConfig = TierConfig {
    rate_limit_per_minute: 1000,
    daily_quota: -1,
    max_concurrent_jobs: 100,
    max_video_duration: 300,
    queue_priority_weight: 10,
    can_generate: true,
    can_batch_generate: true,
};

/// API user. Immutable after creation in this design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub tier: UserTier,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(UserTier::Free < UserTier::Developer);
        assert!(UserTier::Developer < UserTier::Pro);
        assert!(UserTier::Pro < UserTier::Enterprise);
    }

    #[test]
    fn test_tier_table() {
        assert!(!UserTier::Free.config().can_generate);
        assert_eq!(UserTier::Developer.config().max_video_duration, 30);
        assert_eq!(UserTier::Pro.config().rate_limit_per_minute, 100);
        assert_eq!(UserTier::Enterprise.config().daily_quota, -1);
        assert!(!UserTier::Developer.config().can_batch_generate);
        assert!(UserTier::Pro.config().can_batch_generate);
    }

    #[test]
    fn test_tier_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&UserTier::Enterprise).unwrap(),
            "\"enterprise\""
        );
    }
}

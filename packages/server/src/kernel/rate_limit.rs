//! Sliding-window-log rate limiting.
//!
//! One window per (user, endpoint): individual request timestamps live in the
//! shared store and are garbage-collected on every check, so the limit holds
//! over any 60-second span rather than calendar minutes.
//!
//! Degradation policy: if the shared store is unreachable the limiter fails
//! OPEN — the request is admitted and the failure logged at WARN. Admission
//! availability is preferred over limiter correctness here; anything stricter
//! would turn a store outage into a full API outage.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::domains::auth::{User, UserTier};

use super::store::{unix_now, AtomicStore, MemoryStore, RateLimitDecision, RedisStore};

/// Window length for every tier.
pub const WINDOW_SECONDS: u64 = 60;

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp at which the window frees up.
    pub reset_at: i64,
    pub window_seconds: u64,
}

impl RateLimitResult {
    /// Seconds until the limit resets, clamped at zero.
    pub fn retry_after(&self) -> i64 {
        (self.reset_at - unix_now() as i64).max(0)
    }
}

/// Read-only per-user limiter state, for dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitSnapshot {
    pub user_id: String,
    pub tier: UserTier,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: i64,
    pub is_rate_limited: bool,
}

pub struct RateLimitService {
    shared: Option<Arc<RedisStore>>,
    fallback: MemoryStore,
}

impl RateLimitService {
    pub fn new(shared: Option<Arc<RedisStore>>) -> Self {
        Self {
            shared,
            fallback: MemoryStore::new(),
        }
    }

    fn key(user_id: &str, endpoint: &str) -> String {
        format!("rate_limit:{user_id}:{endpoint}")
    }

    fn from_decision(decision: RateLimitDecision, limit: u32) -> RateLimitResult {
        RateLimitResult {
            allowed: decision.allowed,
            limit,
            remaining: decision.remaining,
            reset_at: decision.reset_at,
            window_seconds: WINDOW_SECONDS,
        }
    }

    fn fail_open(limit: u32, now: f64) -> RateLimitResult {
        RateLimitResult {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(1),
            reset_at: (now + WINDOW_SECONDS as f64) as i64,
            window_seconds: WINDOW_SECONDS,
        }
    }

    /// Check the caller's window and record this request if admitted.
    pub async fn check_and_increment(
        &self,
        user_id: &str,
        tier: UserTier,
        endpoint: &str,
    ) -> RateLimitResult {
        let limit = tier.config().rate_limit_per_minute;
        let key = Self::key(user_id, endpoint);
        let now = unix_now();
        let request_id = Uuid::new_v4().to_string();

        if let Some(shared) = &self.shared {
            return match shared
                .rate_limit_check(&key, WINDOW_SECONDS, limit, now, &request_id)
                .await
            {
                Ok(decision) => Self::from_decision(decision, limit),
                Err(error) => {
                    warn!(
                        user_id = %user_id,
                        endpoint = %endpoint,
                        error = %error,
                        "rate limit check failed, allowing request"
                    );
                    Self::fail_open(limit, now)
                }
            };
        }

        match self
            .fallback
            .rate_limit_check(&key, WINDOW_SECONDS, limit, now, &request_id)
            .await
        {
            Ok(decision) => Self::from_decision(decision, limit),
            Err(_) => Self::fail_open(limit, now),
        }
    }

    /// Current window state without recording a request.
    pub async fn get_current_usage(
        &self,
        user_id: &str,
        tier: UserTier,
        endpoint: &str,
    ) -> RateLimitResult {
        let limit = tier.config().rate_limit_per_minute;
        let key = Self::key(user_id, endpoint);
        let now = unix_now();

        let count = if let Some(shared) = &self.shared {
            match shared.rate_limit_usage(&key, WINDOW_SECONDS, now).await {
                Ok(count) => count,
                Err(error) => {
                    warn!(user_id = %user_id, error = %error, "rate limit usage read failed");
                    self.fallback
                        .rate_limit_usage(&key, WINDOW_SECONDS, now)
                        .await
                        .unwrap_or(0)
                }
            }
        } else {
            self.fallback
                .rate_limit_usage(&key, WINDOW_SECONDS, now)
                .await
                .unwrap_or(0)
        };

        RateLimitResult {
            allowed: (count as u32) < limit,
            limit,
            remaining: limit.saturating_sub(count as u32),
            reset_at: (now + WINDOW_SECONDS as f64) as i64,
            window_seconds: WINDOW_SECONDS,
        }
    }

    /// Read-only snapshots for a set of users (dashboard view).
    pub async fn snapshot_all(&self, users: &[User]) -> Vec<RateLimitSnapshot> {
        let mut snapshots = Vec::with_capacity(users.len());
        for user in users {
            let result = self.get_current_usage(&user.id, user.tier, "default").await;
            snapshots.push(RateLimitSnapshot {
                user_id: user.id.clone(),
                tier: user.tier,
                limit: result.limit,
                remaining: result.remaining,
                reset_at: result.reset_at,
                is_rate_limited: result.remaining == 0,
            });
        }
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_enforced_per_user() {
        let limiter = RateLimitService::new(None);

        // Free tier: 10 requests per window
        for i in 0..10 {
            let result = limiter
                .check_and_increment("user_free_001", UserTier::Free, "default")
                .await;
            assert!(result.allowed, "request {i} should pass");
            assert_eq!(result.remaining, 9 - i);
        }

        let denied = limiter
            .check_and_increment("user_free_001", UserTier::Free, "default")
            .await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert!(denied.retry_after() >= 0);

        // A different user is untouched
        let other = limiter
            .check_and_increment("user_dev_001", UserTier::Developer, "default")
            .await;
        assert!(other.allowed);
        assert_eq!(other.limit, 30);
    }

    #[tokio::test]
    async fn test_endpoints_tracked_separately() {
        let limiter = RateLimitService::new(None);
        for _ in 0..10 {
            limiter
                .check_and_increment("user_free_001", UserTier::Free, "/v1/account")
                .await;
        }
        let other_endpoint = limiter
            .check_and_increment("user_free_001", UserTier::Free, "/v1/videos")
            .await;
        assert!(other_endpoint.allowed);
    }

    #[tokio::test]
    async fn test_usage_read_does_not_consume() {
        let limiter = RateLimitService::new(None);
        limiter
            .check_and_increment("user_dev_001", UserTier::Developer, "default")
            .await;

        for _ in 0..5 {
            let usage = limiter
                .get_current_usage("user_dev_001", UserTier::Developer, "default")
                .await;
            assert_eq!(usage.remaining, 29);
        }
    }

    #[tokio::test]
    async fn test_snapshot_all() {
        let limiter = RateLimitService::new(None);
        let auth = crate::domains::auth::AuthService::new();
        let users = auth.all_users();

        limiter
            .check_and_increment("user_free_001", UserTier::Free, "default")
            .await;

        let snapshots = limiter.snapshot_all(&users).await;
        assert_eq!(snapshots.len(), 4);
        let free = snapshots
            .iter()
            .find(|s| s.user_id == "user_free_001")
            .unwrap();
        assert_eq!(free.remaining, 9);
        assert!(!free.is_rate_limited);
    }
}

//! Account, usage and quota reporting.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde_json::json;

use crate::domains::auth::User;
use crate::domains::jobs::Job;
use crate::kernel::rate_limit::RateLimitService;
use crate::kernel::storage::StorageManager;

use super::models::{AccountResponse, QuotaResponse, UsagePeriod, UsageResponse};

pub struct AccountService {
    storage: Arc<StorageManager>,
    rate_limiter: Arc<RateLimitService>,
}

impl AccountService {
    pub fn new(storage: Arc<StorageManager>, rate_limiter: Arc<RateLimitService>) -> Self {
        Self {
            storage,
            rate_limiter,
        }
    }

    pub fn get_account(&self, user: &User) -> AccountResponse {
        AccountResponse {
            user_id: user.id.clone(),
            email: user.email.clone(),
            tier: user.tier,
            created_at: user.created_at,
            is_active: user.is_active,
        }
    }

    /// Usage statistics for the requested period.
    pub async fn get_usage(&self, user: &User, period: UsagePeriod) -> UsageResponse {
        let now = Utc::now();
        let (requests_made, period_start, period_end) = match period {
            UsagePeriod::Daily => {
                let start = start_of_day(now);
                (
                    self.storage.usage.daily(&user.id).await,
                    start,
                    start + Duration::days(1),
                )
            }
            UsagePeriod::Monthly => {
                let start = start_of_month(now);
                (
                    self.storage.usage.monthly(&user.id).await,
                    start,
                    next_month(start),
                )
            }
        };

        let detail = self.storage.usage.details_for(&user.id);

        UsageResponse {
            user_id: user.id.clone(),
            tier: user.tier,
            period,
            requests_made,
            videos_generated: detail.videos_generated,
            total_duration_seconds: detail.total_duration_seconds,
            period_start,
            period_end,
        }
    }

    /// Current quota status across all enforcement dimensions.
    pub async fn get_quota(&self, user: &User) -> QuotaResponse {
        let tier_config = user.tier.config();

        let rate_limit = self
            .rate_limiter
            .get_current_usage(&user.id, user.tier, "default")
            .await;

        let daily_used = self.storage.usage.daily(&user.id).await;
        let daily_limit = tier_config.daily_quota;

        let active_jobs = self
            .storage
            .jobs
            .count(|job: &Job| job.user_id == user.id && !job.status.is_terminal());

        let daily_quota = if daily_limit > 0 {
            json!({
                "limit": daily_limit,
                "used": daily_used,
                "remaining": (daily_limit - daily_used).max(0),
            })
        } else {
            json!({
                "limit": "unlimited",
                "used": daily_used,
                "remaining": "unlimited",
            })
        };

        QuotaResponse {
            user_id: user.id.clone(),
            tier: user.tier,
            rate_limit: json!({
                "limit": rate_limit.limit,
                "remaining": rate_limit.remaining,
                "reset": rate_limit.reset_at,
                "window_seconds": rate_limit.window_seconds,
            }),
            daily_quota,
            concurrent_jobs: json!({
                "limit": tier_config.max_concurrent_jobs,
                "active": active_jobs,
                "available": tier_config.max_concurrent_jobs.saturating_sub(active_jobs),
            }),
            max_video_duration: tier_config.max_video_duration,
            can_generate: tier_config.can_generate,
            can_batch_generate: tier_config.can_batch_generate,
        }
    }
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), at.day(), 0, 0, 0)
        .single()
        .unwrap_or(at)
}

fn start_of_month(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(at)
}

fn next_month(start: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if start.month() == 12 {
        (start.year() + 1, 1)
    } else {
        (start.year(), start.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .unwrap_or(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::AuthService;

    fn fixtures() -> (Arc<StorageManager>, AccountService, AuthService) {
        let storage = Arc::new(StorageManager::new(None));
        let limiter = Arc::new(RateLimitService::new(None));
        let account = AccountService::new(storage.clone(), limiter);
        (storage, account, AuthService::new())
    }

    #[tokio::test]
    async fn test_usage_reports_counters_and_detail() {
        let (storage, account, auth) = fixtures();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        storage.record_usage(&dev.id, 1, 12.0).await;
        storage.record_usage(&dev.id, 1, 18.0).await;

        let usage = account.get_usage(&dev, UsagePeriod::Daily).await;
        assert_eq!(usage.requests_made, 2);
        assert_eq!(usage.videos_generated, 2);
        assert!((usage.total_duration_seconds - 30.0).abs() < f64::EPSILON);
        assert_eq!(usage.period_end - usage.period_start, Duration::days(1));
    }

    #[tokio::test]
    async fn test_quota_for_limited_tier() {
        let (storage, account, auth) = fixtures();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        storage.record_usage(&dev.id, 1, 10.0).await;

        let quota = account.get_quota(&dev).await;
        assert_eq!(quota.daily_quota["limit"], 500);
        assert_eq!(quota.daily_quota["used"], 1);
        assert_eq!(quota.daily_quota["remaining"], 499);
        assert_eq!(quota.concurrent_jobs["limit"], 3);
        assert!(quota.can_generate);
        assert!(!quota.can_batch_generate);
    }

    #[tokio::test]
    async fn test_quota_for_unlimited_tier() {
        let (_, account, auth) = fixtures();
        let enterprise = auth.validate_api_key("enterprise_test_key").unwrap();

        let quota = account.get_quota(&enterprise).await;
        assert_eq!(quota.daily_quota["limit"], "unlimited");
        assert_eq!(quota.daily_quota["remaining"], "unlimited");
        assert_eq!(quota.max_video_duration, 300);
    }

    #[test]
    fn test_month_rollover() {
        let december = Utc.with_ymd_and_hms(2026, 12, 15, 10, 0, 0).unwrap();
        let start = start_of_month(december);
        let end = next_month(start);
        assert_eq!(end.year(), 2027);
        assert_eq!(end.month(), 1);
    }
}

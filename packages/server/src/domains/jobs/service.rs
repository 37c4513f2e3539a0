//! Job admission and lifecycle management.
//!
//! Admission runs a fixed gauntlet (feature gate, duration, daily quota,
//! concurrency) and the first failure aborts the request. A job's priority
//! is derived from the owner's tier at admission and never changes; its
//! status only moves along the lifecycle table in `models`.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::common::pagination::PageParams;
use crate::common::ApiError;
use crate::domains::auth::{User, UserTier};
use crate::kernel::scheduler::SchedulerService;
use crate::kernel::storage::StorageManager;

use super::models::{GenerationRequest, Job, JobStatus};

pub struct JobService {
    storage: Arc<StorageManager>,
    scheduler: Arc<SchedulerService>,
}

impl JobService {
    pub fn new(storage: Arc<StorageManager>, scheduler: Arc<SchedulerService>) -> Self {
        Self { storage, scheduler }
    }

    /// Admit and enqueue a generation request.
    ///
    /// Checks run in order; each failure aborts immediately:
    /// 1. the tier can generate at all,
    /// 2. the requested duration fits the tier,
    /// 3. daily quota has headroom,
    /// 4. concurrent-job headroom.
    pub async fn create_job(&self, request: &GenerationRequest, user: &User) -> Result<Job, ApiError> {
        let tier_config = user.tier.config();

        if !tier_config.can_generate {
            return Err(ApiError::InsufficientTier {
                current: user.tier,
                required: UserTier::Developer,
                details: None,
            });
        }

        if request.duration > tier_config.max_video_duration {
            let required = if request.duration <= 120 {
                UserTier::Pro
            } else {
                UserTier::Enterprise
            };
            return Err(ApiError::InsufficientTier {
                current: user.tier,
                required,
                details: Some(json!({
                    "requested_duration": request.duration,
                    "max_duration": tier_config.max_video_duration,
                })),
            });
        }

        let daily_used = self.storage.usage.daily(&user.id).await;
        if tier_config.daily_quota > 0 && daily_used >= tier_config.daily_quota {
            return Err(ApiError::QuotaExceeded {
                quota_type: "daily",
                limit: tier_config.daily_quota,
                used: daily_used,
            });
        }

        let active = self.count_active_jobs(&user.id);
        if active >= tier_config.max_concurrent_jobs {
            return Err(ApiError::QuotaExceeded {
                quota_type: "concurrent_jobs",
                limit: tier_config.max_concurrent_jobs as i64,
                used: active as i64,
            });
        }

        let priority = SchedulerService::priority_for_tier(user.tier);
        let mut job = Job::from_request(request, &user.id, priority);
        self.storage.jobs.insert(&job.id, job.clone());

        // A rejected enqueue (queue bound) must not leave a PENDING orphan
        // counting against the user's concurrency
        let position = match self.scheduler.enqueue_job(&job).await {
            Ok(position) => position,
            Err(error) => {
                self.storage.jobs.remove(&job.id);
                return Err(error);
            }
        };

        job.status = JobStatus::Queued;
        job.queued_at = Some(Utc::now());
        job.queue_position = Some(position.position);
        job.estimated_wait_seconds = Some(position.estimated_wait_seconds);
        self.storage.jobs.update(&job.id, job.clone());

        info!(
            job_id = %job.id,
            user_id = %user.id,
            priority = %priority,
            position = position.position,
            "job created"
        );

        Ok(job)
    }

    /// Non-terminal jobs currently held by a user.
    pub fn count_active_jobs(&self, user_id: &str) -> usize {
        self.storage
            .jobs
            .count(|job| job.user_id == user_id && !job.status.is_terminal())
    }

    /// Fetch a job, enforcing ownership.
    pub fn get_job(&self, job_id: &str, user: &User) -> Result<Job, ApiError> {
        let job = self.storage.jobs.get(job_id).ok_or(ApiError::JobNotFound {
            job_id: job_id.to_string(),
        })?;

        if job.user_id != user.id {
            return Err(ApiError::PermissionDenied {
                message: "You don't have permission to access this job".to_string(),
                details: Some(json!({ "job_id": job_id })),
            });
        }

        Ok(job)
    }

    /// Owner-scoped listing, newest first, optional status filter.
    pub fn list_jobs(
        &self,
        user: &User,
        params: PageParams,
        status: Option<JobStatus>,
    ) -> (Vec<Job>, usize) {
        let params = params.normalized();
        self.storage.jobs.page(
            |job| {
                job.user_id == user.id && status.map_or(true, |wanted| job.status == wanted)
            },
            |job| job.created_at,
            true,
            params.offset(),
            params.limit(),
        )
    }

    /// Cancel a job if its current status allows it.
    ///
    /// For QUEUED jobs the queue removal is best-effort: a worker may have
    /// raced the dequeue, in which case the status transition still wins and
    /// the worker's own transition will be rejected.
    pub async fn cancel_job(&self, job_id: &str, user: &User) -> Result<Job, ApiError> {
        let mut job = self.get_job(job_id, user)?;

        if !job.status.can_transition(JobStatus::Cancelled) {
            return Err(ApiError::JobNotCancellable {
                job_id: job_id.to_string(),
                current_status: job.status,
            });
        }

        if job.status == JobStatus::Queued {
            self.scheduler.cancel_job(&job).await;
        }

        job.status = JobStatus::Cancelled;
        job.completed_at = Some(Utc::now());
        job.queue_position = None;
        job.estimated_wait_seconds = None;
        self.storage.jobs.update(job_id, job.clone());

        info!(job_id = %job_id, "job cancelled");

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::AuthService;
    use crate::kernel::queue::PriorityQueue;
    use crate::domains::jobs::QueuePriority;

    fn service() -> (Arc<StorageManager>, JobService, AuthService) {
        let storage = Arc::new(StorageManager::new(None));
        let scheduler = Arc::new(SchedulerService::new(
            Arc::new(PriorityQueue::new(None)),
            None,
        ));
        let job_service = JobService::new(storage.clone(), scheduler);
        (storage, job_service, AuthService::new())
    }

    fn request(duration: u32) -> GenerationRequest {
        serde_json::from_value(json!({ "prompt": "sunset", "duration": duration })).unwrap()
    }

    #[tokio::test]
    async fn test_free_tier_cannot_generate() {
        let (_, jobs, auth) = service();
        let free = auth.validate_api_key("free_test_key").unwrap();

        let error = jobs.create_job(&request(10), &free).await.unwrap_err();
        assert_eq!(error.code(), "AUTH_INSUFFICIENT_TIER");
        let details = error.details().unwrap();
        assert_eq!(details["required_tier"], "developer");
    }

    #[tokio::test]
    async fn test_duration_gate_names_required_tier() {
        let (_, jobs, auth) = service();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        let error = jobs.create_job(&request(60), &dev).await.unwrap_err();
        let details = error.details().unwrap();
        assert_eq!(details["required_tier"], "pro");
        assert_eq!(details["max_duration"], 30);

        let error = jobs.create_job(&request(200), &dev).await.unwrap_err();
        assert_eq!(error.details().unwrap()["required_tier"], "enterprise");
    }

    #[tokio::test]
    async fn test_successful_admission_queues_job() {
        let (storage, jobs, auth) = service();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        let job = jobs.create_job(&request(10), &dev).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.priority, QueuePriority::Normal);
        assert_eq!(job.queue_position, Some(1));
        assert!(job.queued_at.is_some());

        let stored = storage.jobs.get(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let (_, jobs, auth) = service();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        // Developer tier allows 3 concurrent jobs
        for _ in 0..3 {
            jobs.create_job(&request(10), &dev).await.unwrap();
        }
        let error = jobs.create_job(&request(10), &dev).await.unwrap_err();
        assert_eq!(error.code(), "QUOTA_EXCEEDED");
        let details = error.details().unwrap();
        assert_eq!(details["quota_type"], "concurrent_jobs");
        assert_eq!(details["limit"], 3);
    }

    #[tokio::test]
    async fn test_cancel_queued_job() {
        let (_, jobs, auth) = service();
        let dev = auth.validate_api_key("dev_test_key").unwrap();

        let job = jobs.create_job(&request(10), &dev).await.unwrap();
        let cancelled = jobs.cancel_job(&job.id, &dev).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());

        // Terminal: a second cancel conflicts
        let error = jobs.cancel_job(&job.id, &dev).await.unwrap_err();
        assert_eq!(error.code(), "JOB_CANCELLED");
    }

    #[tokio::test]
    async fn test_ownership_enforced() {
        let (_, jobs, auth) = service();
        let dev = auth.validate_api_key("dev_test_key").unwrap();
        let free = auth.validate_api_key("free_test_key").unwrap();

        let job = jobs.create_job(&request(10), &dev).await.unwrap();
        let error = jobs.get_job(&job.id, &free).unwrap_err();
        assert_eq!(error.code(), "AUTH_PERMISSION_DENIED");

        let error = jobs.cancel_job(&job.id, &free).await.unwrap_err();
        assert_eq!(error.code(), "AUTH_PERMISSION_DENIED");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let (_, jobs, auth) = service();
        let dev = auth.validate_api_key("dev_test_key").unwrap();
        let error = jobs.get_job("job_missing", &dev).unwrap_err();
        assert_eq!(error.code(), "JOB_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_jobs_filters_and_pages() {
        let (_, jobs, auth) = service();
        let dev = auth.validate_api_key("dev_test_key").unwrap();
        let pro = auth.validate_api_key("pro_test_key").unwrap();

        for _ in 0..3 {
            jobs.create_job(&request(10), &dev).await.unwrap();
        }
        jobs.create_job(&request(10), &pro).await.unwrap();

        let (page, total) = jobs.list_jobs(&dev, PageParams::default(), None);
        assert_eq!(total, 3);
        assert_eq!(page.len(), 3);
        assert!(page.iter().all(|job| job.user_id == dev.id));

        let (page, total) = jobs.list_jobs(&dev, PageParams::default(), Some(JobStatus::Failed));
        assert_eq!(total, 0);
        assert!(page.is_empty());
    }
}

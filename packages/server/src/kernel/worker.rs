//! Background worker that drives queued jobs to a terminal state.
//!
//! One worker task per process. The loop is poll -> process -> repeat:
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► SchedulerService::dequeue_next (weighted fair)
//!     ├─► QUEUED -> PROCESSING (validated transition)
//!     ├─► VideoGenerator::generate
//!     └─► COMPLETED (+video, +usage) or FAILED (+error)
//! ```
//!
//! Stopping is cooperative: the stop flag is checked between iterations, so
//! an in-flight job always runs to completion and reaches a terminal state
//! before the loop exits. Jobs are processed strictly sequentially within
//! one worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tracing::{info, warn};

use crate::domains::jobs::{Job, JobStatus};

use super::generator::VideoGenerator;
use super::scheduler::SchedulerService;
use super::storage::StorageManager;

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long to wait when no jobs are available.
    pub poll_interval: Duration,
}

impl WorkerConfig {
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            poll_interval: Duration::from_secs_f64(seconds.max(0.0)),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

pub struct JobWorker {
    storage: Arc<StorageManager>,
    scheduler: Arc<SchedulerService>,
    generator: Arc<dyn VideoGenerator>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl JobWorker {
    pub fn new(
        storage: Arc<StorageManager>,
        scheduler: Arc<SchedulerService>,
        generator: Arc<dyn VideoGenerator>,
    ) -> Self {
        Self::with_config(storage, scheduler, generator, WorkerConfig::default())
    }

    pub fn with_config(
        storage: Arc<StorageManager>,
        scheduler: Arc<SchedulerService>,
        generator: Arc<dyn VideoGenerator>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            storage,
            scheduler,
            generator,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for requesting a stop from outside the task.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Run until a stop is requested.
    pub async fn run(self) -> Result<()> {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "job worker starting"
        );

        loop {
            if self.is_shutdown_requested() {
                break;
            }

            match self.scheduler.dequeue_next().await {
                Some(job_id) => self.process_job(&job_id).await,
                None => tokio::time::sleep(self.config.poll_interval).await,
            }
        }

        info!("job worker stopped");
        Ok(())
    }

    /// Process one job immediately (tests).
    pub async fn process_single(&self, job_id: &str) {
        self.process_job(job_id).await;
    }

    async fn process_job(&self, job_id: &str) {
        let Some(mut job) = self.storage.jobs.get(job_id) else {
            warn!(job_id = %job_id, "dequeued job not found in storage");
            return;
        };

        if !apply_transition(&mut job, JobStatus::Processing) {
            return;
        }
        job.started_at = Some(Utc::now());
        job.queue_position = None;
        job.estimated_wait_seconds = None;
        self.storage.jobs.update(job_id, job.clone());

        match self.generator.generate(&job).await {
            Ok(video) => {
                let video_id = video.id.clone();
                let video_duration = video.duration;
                self.storage.videos.insert(&video_id, video);

                if apply_transition(&mut job, JobStatus::Completed) {
                    job.video_id = Some(video_id.clone());
                    job.progress = Some(1.0);
                    job.completed_at = Some(Utc::now());
                    self.storage.jobs.update(job_id, job.clone());
                }

                self.storage
                    .record_usage(&job.user_id, 1, video_duration)
                    .await;

                info!(job_id = %job_id, video_id = %video_id, "job completed");
            }
            Err(error) => {
                if apply_transition(&mut job, JobStatus::Failed) {
                    job.error = Some(error.to_string());
                    job.completed_at = Some(Utc::now());
                    self.storage.jobs.update(job_id, job);
                }
                warn!(job_id = %job_id, error = %error, "job failed");
            }
        }
    }
}

/// Apply a lifecycle transition if the state machine allows it.
fn apply_transition(job: &mut Job, to: JobStatus) -> bool {
    if !job.status.can_transition(to) {
        warn!(
            job_id = %job.id,
            from = %job.status,
            to = %to,
            "invalid job transition"
        );
        return false;
    }
    job.status = to;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::UserTier;
    use crate::domains::jobs::GenerationRequest;
    use crate::kernel::generator::MockVideoGenerator;
    use crate::kernel::queue::PriorityQueue;

    fn fixtures(generator: MockVideoGenerator) -> (Arc<StorageManager>, JobWorker) {
        let storage = Arc::new(StorageManager::new(None));
        let scheduler = Arc::new(SchedulerService::new(
            Arc::new(PriorityQueue::new(None)),
            None,
        ));
        let worker = JobWorker::new(storage.clone(), scheduler, Arc::new(generator));
        (storage, worker)
    }

    fn queued_job(storage: &StorageManager) -> Job {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "sunset", "duration": 10}"#).unwrap();
        let mut job = Job::from_request(
            &request,
            "user_dev_001",
            SchedulerService::priority_for_tier(UserTier::Developer),
        );
        job.status = JobStatus::Queued;
        job.queued_at = Some(Utc::now());
        storage.jobs.insert(&job.id, job.clone());
        job
    }

    #[tokio::test]
    async fn test_successful_job_reaches_completed() {
        let (storage, worker) = fixtures(MockVideoGenerator::instant());
        let job = queued_job(&storage);

        worker.process_single(&job.id).await;

        let done = storage.jobs.get(&job.id).unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, Some(1.0));
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());

        let video_id = done.video_id.unwrap();
        let video = storage.videos.get(&video_id).unwrap();
        assert_eq!(video.owner_id, "user_dev_001");

        assert_eq!(storage.usage.daily("user_dev_001").await, 1);
    }

    #[tokio::test]
    async fn test_generator_failure_reaches_failed() {
        let (storage, worker) = fixtures(MockVideoGenerator::instant().with_failure_rate(1.0));
        let job = queued_job(&storage);

        worker.process_single(&job.id).await;

        let failed = storage.jobs.get(&job.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error.as_deref().unwrap().contains("Simulated"));
        assert!(failed.completed_at.is_some());
        assert!(failed.video_id.is_none());

        // Failed generations never count against usage
        assert_eq!(storage.usage.daily("user_dev_001").await, 0);
    }

    #[tokio::test]
    async fn test_non_queued_job_is_skipped() {
        let (storage, worker) = fixtures(MockVideoGenerator::instant());
        let mut job = queued_job(&storage);
        job.status = JobStatus::Cancelled;
        storage.jobs.insert(&job.id, job.clone());

        worker.process_single(&job.id).await;

        assert_eq!(storage.jobs.get(&job.id).unwrap().status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_missing_job_is_ignored() {
        let (_storage, worker) = fixtures(MockVideoGenerator::instant());
        worker.process_single("job_missing").await;
    }

    #[tokio::test]
    async fn test_loop_drains_queue_and_stops() {
        let storage = Arc::new(StorageManager::new(None));
        let scheduler = Arc::new(SchedulerService::new(
            Arc::new(PriorityQueue::new(None)),
            None,
        ));
        let worker = JobWorker::with_config(
            storage.clone(),
            scheduler.clone(),
            Arc::new(MockVideoGenerator::instant()),
            WorkerConfig {
                poll_interval: Duration::from_millis(5),
            },
        );
        let shutdown = worker.shutdown_handle();

        let job = queued_job(&storage);
        scheduler.enqueue_job(&job).await.unwrap();

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.store(true, Ordering::SeqCst);
        handle.await.unwrap().unwrap();

        assert_eq!(storage.jobs.get(&job.id).unwrap().status, JobStatus::Completed);
    }
}

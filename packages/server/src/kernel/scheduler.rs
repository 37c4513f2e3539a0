//! Scheduling orchestration over the priority queue.
//!
//! Thin layer: maps tiers to priorities, applies the optional backlog bound,
//! and re-estimates waits on position reads. Holds no state of its own.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::common::ApiError;
use crate::domains::auth::UserTier;
use crate::domains::jobs::{Job, QueuePriority};

use super::queue::{PriorityQueue, QueuePosition};

pub struct SchedulerService {
    queue: Arc<PriorityQueue>,
    max_queue_depth: Option<usize>,
}

impl SchedulerService {
    pub fn new(queue: Arc<PriorityQueue>, max_queue_depth: Option<usize>) -> Self {
        Self {
            queue,
            max_queue_depth,
        }
    }

    /// Queue priority for a tier. FREE never reaches the scheduler (it
    /// cannot generate), so anything unrecognised lands in the normal queue.
    pub fn priority_for_tier(tier: UserTier) -> QueuePriority {
        match tier {
            UserTier::Enterprise => QueuePriority::Critical,
            UserTier::Pro => QueuePriority::High,
            _ => QueuePriority::Normal,
        }
    }

    /// Enqueue an admitted job, enforcing the backlog bound when configured.
    pub async fn enqueue_job(&self, job: &Job) -> Result<QueuePosition, ApiError> {
        if let Some(max_depth) = self.max_queue_depth {
            let backlog = self.queue.total_len().await as usize;
            if backlog >= max_depth {
                return Err(ApiError::QueueFull);
            }
        }

        let position = self.queue.enqueue(&job.id, job.priority).await;
        info!(
            job_id = %job.id,
            priority = %job.priority,
            position = position.position,
            "job enqueued"
        );
        Ok(position)
    }

    /// Best-effort removal of a cancelled job from its queue. `false` means a
    /// worker already raced the dequeue; the caller proceeds either way.
    pub async fn cancel_job(&self, job: &Job) -> bool {
        let removed = self.queue.remove(&job.id, job.priority).await;
        if removed {
            info!(job_id = %job.id, "job removed from queue");
        }
        removed
    }

    /// Next job to process, per weighted fair queuing.
    pub async fn dequeue_next(&self) -> Option<String> {
        let job_id = self.queue.dequeue().await;
        if let Some(id) = &job_id {
            debug!(job_id = %id, "job dequeued");
        }
        job_id
    }

    /// Current position with a fresh wait estimate, or `None` if the job has
    /// left its queue.
    pub async fn position_of(&self, job: &Job) -> Option<QueuePosition> {
        let position = self.queue.position(&job.id, job.priority).await?;
        let estimated_wait_seconds = self.queue.estimate_wait(position, job.priority).await;
        Some(QueuePosition {
            position,
            priority: job.priority,
            estimated_wait_seconds,
        })
    }

    /// Queue lengths by priority plus the total backlog.
    pub async fn stats(&self) -> (HashMap<QueuePriority, u64>, u64) {
        let lengths = self.queue.lengths().await;
        let total = lengths.values().sum();
        (lengths, total)
    }

    /// Direct access for dashboard snapshots (queue contents).
    pub fn queue(&self) -> &Arc<PriorityQueue> {
        &self.queue
    }
}

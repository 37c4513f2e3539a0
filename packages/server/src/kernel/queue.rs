//! Three-level priority queue with weighted fair dequeue.
//!
//! One FIFO queue per priority (`queue:critical`, `queue:high`,
//! `queue:normal`), ordered by enqueue timestamp. Dequeue draws a bucket at
//! random in proportion to the weights 10:5:1 and falls back to strict
//! priority order when the drawn bucket is empty, so no non-empty queue is
//! ever starved.
//!
//! Shared-store failures degrade per call: the operation is retried against
//! the in-process queue and logged at WARN.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tracing::warn;

use crate::domains::jobs::QueuePriority;

use super::store::{unix_now, AtomicStore, MemoryStore, QueueEntry, RedisStore};

/// Assumed per-job processing time used by wait estimates.
const ESTIMATED_PROCESSING_SECONDS: f64 = 30.0;

/// Sum of the fair-queuing weights (10 + 5 + 1).
const TOTAL_WEIGHT: u32 = 16;

/// A job's place in its queue plus the wait estimate derived from it.
#[derive(Debug, Clone, Copy)]
pub struct QueuePosition {
    /// 1-indexed position within the priority's queue.
    pub position: u64,
    pub priority: QueuePriority,
    pub estimated_wait_seconds: u64,
}

pub struct PriorityQueue {
    shared: Option<Arc<RedisStore>>,
    local: MemoryStore,
}

impl PriorityQueue {
    pub fn new(shared: Option<Arc<RedisStore>>) -> Self {
        Self {
            shared,
            local: MemoryStore::new(),
        }
    }

    /// Add a job to its priority's queue. FIFO within the queue: the score is
    /// the wall clock at call time.
    pub async fn enqueue(&self, job_id: &str, priority: QueuePriority) -> QueuePosition {
        let key = priority.queue_key();
        let score = unix_now();

        let position = if let Some(shared) = &self.shared {
            match shared.queue_push(key, job_id, score).await {
                Ok(position) => position,
                Err(error) => {
                    warn!(job_id = %job_id, error = %error, "shared store enqueue failed, using local queue");
                    self.local.queue_push(key, job_id, score).await.unwrap_or(1)
                }
            }
        } else {
            self.local.queue_push(key, job_id, score).await.unwrap_or(1)
        };

        let estimated_wait_seconds = self.estimate_wait(position, priority).await;
        QueuePosition {
            position,
            priority,
            estimated_wait_seconds,
        }
    }

    /// Dequeue the next job using weighted fair queuing.
    ///
    /// Returns `None` only when all three queues are empty.
    pub async fn dequeue(&self) -> Option<String> {
        let draw = rand::thread_rng().gen_range(1..=TOTAL_WEIGHT);

        let mut cumulative = 0;
        for priority in QueuePriority::ALL {
            cumulative += priority.weight();
            if draw <= cumulative {
                if let Some(job_id) = self.pop_from(priority).await {
                    return Some(job_id);
                }
                break;
            }
        }

        // Drawn bucket was empty: take the first non-empty queue in
        // priority order so a job is always served while any queue has work.
        for priority in QueuePriority::ALL {
            if let Some(job_id) = self.pop_from(priority).await {
                return Some(job_id);
            }
        }

        None
    }

    async fn pop_from(&self, priority: QueuePriority) -> Option<String> {
        let key = priority.queue_key();
        if let Some(shared) = &self.shared {
            match shared.queue_pop(key).await {
                Ok(member) => return member,
                Err(error) => {
                    warn!(priority = %priority, error = %error, "shared store dequeue failed, using local queue");
                }
            }
        }
        self.local.queue_pop(key).await.unwrap_or(None)
    }

    /// Current 1-indexed position of a job, or `None` once dequeued/removed.
    pub async fn position(&self, job_id: &str, priority: QueuePriority) -> Option<u64> {
        let key = priority.queue_key();
        if let Some(shared) = &self.shared {
            match shared.queue_rank(key, job_id).await {
                Ok(rank) => return rank,
                Err(error) => {
                    warn!(job_id = %job_id, error = %error, "shared store rank failed, using local queue");
                }
            }
        }
        self.local.queue_rank(key, job_id).await.unwrap_or(None)
    }

    /// Remove a job from its queue; `false` if it was no longer there.
    pub async fn remove(&self, job_id: &str, priority: QueuePriority) -> bool {
        let key = priority.queue_key();
        if let Some(shared) = &self.shared {
            match shared.queue_remove(key, job_id).await {
                Ok(removed) => return removed,
                Err(error) => {
                    warn!(job_id = %job_id, error = %error, "shared store remove failed, using local queue");
                }
            }
        }
        self.local.queue_remove(key, job_id).await.unwrap_or(false)
    }

    /// Length of each priority's queue.
    pub async fn lengths(&self) -> HashMap<QueuePriority, u64> {
        let mut lengths = HashMap::new();
        for priority in QueuePriority::ALL {
            lengths.insert(priority, self.len_of(priority).await);
        }
        lengths
    }

    async fn len_of(&self, priority: QueuePriority) -> u64 {
        let key = priority.queue_key();
        if let Some(shared) = &self.shared {
            match shared.queue_len(key).await {
                Ok(len) => return len,
                Err(error) => {
                    warn!(priority = %priority, error = %error, "shared store length failed, using local queue");
                }
            }
        }
        self.local.queue_len(key).await.unwrap_or(0)
    }

    /// Total backlog across all priorities.
    pub async fn total_len(&self) -> u64 {
        self.lengths().await.values().sum()
    }

    /// Up to `limit` queued jobs for one priority, oldest first.
    pub async fn entries(&self, priority: QueuePriority, limit: usize) -> Vec<QueueEntry> {
        let key = priority.queue_key();
        if let Some(shared) = &self.shared {
            match shared.queue_entries(key, limit).await {
                Ok(entries) => return entries,
                Err(error) => {
                    warn!(priority = %priority, error = %error, "shared store entries failed, using local queue");
                }
            }
        }
        self.local.queue_entries(key, limit).await.unwrap_or_default()
    }

    /// Wait estimate for a job at `position` in `priority`.
    ///
    /// Higher-priority backlogs count fractionally, reflecting the share of
    /// dequeues they draw on average under 10:5:1 fair queuing.
    pub async fn estimate_wait(&self, position: u64, priority: QueuePriority) -> u64 {
        let lengths = self.lengths().await;
        let critical = *lengths.get(&QueuePriority::Critical).unwrap_or(&0) as f64;
        let high = *lengths.get(&QueuePriority::High).unwrap_or(&0) as f64;

        let ahead = position.saturating_sub(1) as f64;
        let effective = match priority {
            QueuePriority::Critical => ahead,
            QueuePriority::High => ahead + 0.5 * critical,
            QueuePriority::Normal => ahead + 0.3 * critical + 0.15 * high,
        };

        (effective * ESTIMATED_PROCESSING_SECONDS) as u64
    }
}

//! Video generation behind a trait so the worker never knows which backend
//! produced a video. Only the mock backend exists in this design.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::domains::jobs::Job;
use crate::domains::videos::{Video, VideoStatus};

/// Failure modes of a generation attempt. These become the job's terminal
/// error message; they are never surfaced directly to an HTTP response.
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("{message}")]
    Failed { message: String },

    #[error("generation timed out")]
    Timeout,
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, job: &Job) -> Result<Video, GeneratorError>;
}

/// Simulates generation with realistic pacing and an injectable failure rate.
pub struct MockVideoGenerator {
    /// Probability of a simulated failure per job.
    failure_rate: f64,
    /// Seconds of wall-clock work per second of requested video.
    seconds_per_video_second: f64,
}

impl MockVideoGenerator {
    pub fn new() -> Self {
        Self {
            failure_rate: 0.05,
            seconds_per_video_second: 0.5,
        }
    }

    /// Deterministic, instant generator for tests.
    pub fn instant() -> Self {
        Self {
            failure_rate: 0.0,
            seconds_per_video_second: 0.0,
        }
    }

    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = failure_rate;
        self
    }
}

impl Default for MockVideoGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoGenerator for MockVideoGenerator {
    async fn generate(&self, job: &Job) -> Result<Video, GeneratorError> {
        // Pace the simulated work off the requested duration, with jitter
        let base_seconds = job.duration as f64 * self.seconds_per_video_second;
        let variance = rand::thread_rng().gen_range(0.8..=1.2);
        let processing_seconds = base_seconds * variance;

        info!(
            job_id = %job.id,
            estimated_seconds = processing_seconds,
            "starting generation"
        );

        // Work happens in chunks so cancellation and progress hooks have
        // natural suspension points
        let chunks = 10;
        let chunk = Duration::from_secs_f64(processing_seconds / chunks as f64);
        for _ in 0..chunks {
            tokio::time::sleep(chunk).await;
        }

        let roll: f64 = rand::thread_rng().gen();
        if roll < self.failure_rate {
            return Err(GeneratorError::Failed {
                message: "Simulated generation failure".to_string(),
            });
        }

        let video_id = Video::new_id();
        let title = if job.prompt.is_empty() {
            "Generated Video".to_string()
        } else {
            job.prompt.chars().take(50).collect()
        };

        Ok(Video {
            id: video_id.clone(),
            title,
            description: Some(job.prompt.clone()),
            duration: job.duration as f64,
            resolution: job.resolution,
            aspect_ratio: job.aspect_ratio,
            style: job.style,
            status: VideoStatus::Ready,
            url: Some(format!(
                "https://storage.dreammachine.dev/videos/{video_id}.mp4"
            )),
            thumbnail_url: Some(format!(
                "https://storage.dreammachine.dev/thumbs/{video_id}.jpg"
            )),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            owner_id: job.user_id.clone(),
            job_id: Some(job.id.clone()),
            metadata: HashMap::new(),
        })
    }
}

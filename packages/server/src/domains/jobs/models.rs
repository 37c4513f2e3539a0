//! Job model, lifecycle state machine and generation request schemas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::common::ApiError;
use crate::domains::videos::{AspectRatio, Resolution, VideoStyle};

// ============================================================================
// Status & priority
// ============================================================================

/// Job processing status.
///
/// Transitions are restricted to the table encoded in [`JobStatus::can_transition`];
/// COMPLETED, FAILED, CANCELLED and EXPIRED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl JobStatus {
    /// Whether `self -> to` is a legal lifecycle transition.
    pub fn can_transition(self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Queued)
                | (Pending, Cancelled)
                | (Queued, Processing)
                | (Queued, Cancelled)
                | (Queued, Expired)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::Expired
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Expired => "expired",
        };
        f.write_str(name)
    }
}

/// Priority level a job is queued at. Fixed at admission from the
/// owner's tier and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
    Critical,
    High,
    Normal,
}

impl QueuePriority {
    /// All priorities in dequeue walk order (highest first).
    pub const ALL: [QueuePriority; 3] = [
        QueuePriority::Critical,
        QueuePriority::High,
        QueuePriority::Normal,
    ];

    /// Backing-store key for this priority's queue.
    pub fn queue_key(self) -> &'static str {
        match self {
            QueuePriority::Critical => "queue:critical",
            QueuePriority::High => "queue:high",
            QueuePriority::Normal => "queue:normal",
        }
    }

    /// Weighted-fair-queuing weight.
    pub fn weight(self) -> u32 {
        match self {
            QueuePriority::Critical => 10,
            QueuePriority::High => 5,
            QueuePriority::Normal => 1,
        }
    }
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueuePriority::Critical => "critical",
            QueuePriority::High => "high",
            QueuePriority::Normal => "normal",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Job model
// ============================================================================

/// Video generation job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub priority: QueuePriority,

    // Request details
    pub prompt: String,
    /// Requested duration in seconds.
    pub duration: u32,
    pub resolution: Resolution,
    pub style: Option<VideoStyle>,
    pub aspect_ratio: AspectRatio,
    pub model: String,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub request_metadata: HashMap<String, Value>,

    // Queue info
    pub queue_position: Option<u64>,
    pub estimated_wait_seconds: Option<u64>,

    /// Progress in [0, 1] once processing starts.
    pub progress: Option<f64>,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    // Result
    pub video_id: Option<String>,
    pub error: Option<String>,

    // Retry handling
    pub retry_count: u32,
    pub max_retries: u32,
}

impl Job {
    /// Allocate a fresh job id (`job_` + 12 hex chars).
    pub fn new_id() -> String {
        format!("job_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
    }

    /// Build a PENDING job from an admitted generation request.
    pub fn from_request(request: &GenerationRequest, user_id: &str, priority: QueuePriority) -> Self {
        Self {
            id: Self::new_id(),
            user_id: user_id.to_string(),
            status: JobStatus::Pending,
            priority,
            prompt: request.prompt.clone(),
            duration: request.duration,
            resolution: request.resolution,
            style: request.style,
            aspect_ratio: request.aspect_ratio,
            model: request.model.clone(),
            webhook_url: request.webhook_url.clone(),
            request_metadata: request.metadata.clone().unwrap_or_default(),
            queue_position: None,
            estimated_wait_seconds: None,
            progress: None,
            created_at: Utc::now(),
            queued_at: None,
            started_at: None,
            completed_at: None,
            video_id: None,
            error: None,
            retry_count: 0,
            max_retries: 3,
        }
    }
}

/// API-facing projection of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u64>,
    /// ISO-8601 duration, e.g. `PT1M30S`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobResponse {
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            queue_position: job.queue_position,
            estimated_wait: job.estimated_wait_seconds.map(format_iso_duration),
            progress: job.progress,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            video_id: job.video_id.clone(),
            error: job.error.clone(),
        }
    }
}

/// Render seconds as an ISO-8601 duration (`PT<m>M<s>S`).
fn format_iso_duration(seconds: u64) -> String {
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    format!("PT{minutes}M{seconds}S")
}

// ============================================================================
// Generation requests
// ============================================================================

const MAX_PROMPT_LEN: usize = 2000;
const MAX_DURATION: u32 = 300;
const MAX_BATCH_SIZE: usize = 10;

/// Substrings rejected by the content filter, matched case-insensitively.
const PROHIBITED_TERMS: [&str; 3] = ["explicit", "violence", "harmful"];

/// Request body for `POST /v1/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default = "default_duration")]
    pub duration: u32,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub style: Option<VideoStyle>,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, Value>>,
}

fn default_duration() -> u32 {
    10
}

fn default_model() -> String {
    "dream-machine-1.5".to_string()
}

impl GenerationRequest {
    /// Validate field constraints and the content filter.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.prompt.is_empty() || self.prompt.len() > MAX_PROMPT_LEN {
            return Err(ApiError::Validation {
                message: format!("prompt must be between 1 and {MAX_PROMPT_LEN} characters"),
                details: Some(serde_json::json!({ "field": "prompt" })),
            });
        }

        let lowered = self.prompt.to_lowercase();
        for term in PROHIBITED_TERMS {
            if lowered.contains(term) {
                return Err(ApiError::InvalidPrompt {
                    message: format!("Prompt contains prohibited content: {term}"),
                });
            }
        }

        if self.duration == 0 || self.duration > MAX_DURATION {
            return Err(ApiError::Validation {
                message: format!("duration must be between 1 and {MAX_DURATION} seconds"),
                details: Some(serde_json::json!({ "field": "duration" })),
            });
        }

        Ok(())
    }
}

/// Request body for `POST /v1/generate/batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGenerationRequest {
    pub requests: Vec<GenerationRequest>,
}

impl BatchGenerationRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.requests.is_empty() || self.requests.len() > MAX_BATCH_SIZE {
            return Err(ApiError::Validation {
                message: format!("batch must contain between 1 and {MAX_BATCH_SIZE} requests"),
                details: Some(serde_json::json!({ "field": "requests" })),
            });
        }
        for request in &self.requests {
            request.validate()?;
        }
        Ok(())
    }
}

/// Response body for a batch submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGenerationResponse {
    pub job_ids: Vec<String>,
    pub total_queued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str, duration: u32) -> GenerationRequest {
        GenerationRequest {
            prompt: prompt.to_string(),
            duration,
            resolution: Resolution::default(),
            style: None,
            aspect_ratio: AspectRatio::default(),
            model: default_model(),
            webhook_url: None,
            metadata: None,
        }
    }

    #[test]
    fn test_transition_table() {
        use JobStatus::*;
        assert!(Pending.can_transition(Queued));
        assert!(Pending.can_transition(Cancelled));
        assert!(Queued.can_transition(Processing));
        assert!(Queued.can_transition(Cancelled));
        assert!(Queued.can_transition(Expired));
        assert!(Processing.can_transition(Completed));
        assert!(Processing.can_transition(Failed));

        assert!(!Pending.can_transition(Processing));
        assert!(!Processing.can_transition(Cancelled));
        assert!(!Completed.can_transition(Failed));
        assert!(!Cancelled.can_transition(Queued));
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Expired.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }

    #[test]
    fn test_priority_weights() {
        assert_eq!(QueuePriority::Critical.weight(), 10);
        assert_eq!(QueuePriority::High.weight(), 5);
        assert_eq!(QueuePriority::Normal.weight(), 1);
    }

    #[test]
    fn test_prompt_content_filter() {
        assert!(request("a calm sunset over water", 10).validate().is_ok());
        let error = request("a Violence scene", 10).validate().unwrap_err();
        assert_eq!(error.code(), "INVALID_PROMPT");
    }

    #[test]
    fn test_prompt_length_bounds() {
        let error = request("", 10).validate().unwrap_err();
        assert_eq!(error.code(), "VALIDATION_ERROR");
        let long = "x".repeat(2001);
        assert!(request(&long, 10).validate().is_err());
    }

    #[test]
    fn test_duration_bounds() {
        assert!(request("sunset", 300).validate().is_ok());
        assert!(request("sunset", 0).validate().is_err());
        assert!(request("sunset", 301).validate().is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        let batch = BatchGenerationRequest {
            requests: vec![request("sunset", 10); 11],
        };
        assert!(batch.validate().is_err());

        let batch = BatchGenerationRequest {
            requests: vec![request("sunset", 10); 2],
        };
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn test_iso_duration_rendering() {
        assert_eq!(format_iso_duration(90), "PT1M30S");
        assert_eq!(format_iso_duration(0), "PT0M0S");
        assert_eq!(format_iso_duration(3600), "PT60M0S");
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: GenerationRequest =
            serde_json::from_str(r#"{"prompt": "sunset"}"#).unwrap();
        assert_eq!(request.duration, 10);
        assert_eq!(request.resolution, Resolution::Hd1080);
        assert_eq!(request.aspect_ratio, AspectRatio::Wide);
        assert_eq!(request.model, "dream-machine-1.5");
    }

    #[test]
    fn test_job_response_wait_rendering() {
        let generation = request("sunset", 10);
        let mut job = Job::from_request(&generation, "user_dev_001", QueuePriority::Normal);
        job.estimated_wait_seconds = Some(90);
        let response = JobResponse::from_job(&job);
        assert_eq!(response.estimated_wait.as_deref(), Some("PT1M30S"));
    }
}

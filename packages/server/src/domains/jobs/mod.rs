pub mod models;
pub mod service;

pub use models::{
    BatchGenerationRequest, BatchGenerationResponse, GenerationRequest, Job, JobResponse,
    JobStatus, QueuePriority,
};
pub use service::JobService;

//! Infrastructure: shared store, rate limiting, queuing, scheduling,
//! storage, generation and the background worker.

pub mod generator;
pub mod queue;
pub mod rate_limit;
pub mod scheduler;
pub mod scripts;
pub mod storage;
pub mod store;
pub mod worker;

pub use generator::{MockVideoGenerator, VideoGenerator};
pub use queue::{PriorityQueue, QueuePosition};
pub use rate_limit::{RateLimitResult, RateLimitService, RateLimitSnapshot};
pub use scheduler::SchedulerService;
pub use storage::{MemoryCollection, StorageManager, UsageDetail, UsageLedger};
pub use store::{AtomicStore, MemoryStore, RedisStore, StoreError};
pub use worker::{JobWorker, WorkerConfig};

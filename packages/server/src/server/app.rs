//! Application state and router assembly.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::domains::account::AccountService;
use crate::domains::auth::AuthService;
use crate::domains::jobs::JobService;
use crate::domains::videos::VideoService;
use crate::kernel::queue::PriorityQueue;
use crate::kernel::rate_limit::RateLimitService;
use crate::kernel::scheduler::SchedulerService;
use crate::kernel::storage::StorageManager;
use crate::kernel::store::RedisStore;

use super::middleware::admission::{admission_middleware, exposed_headers};
use super::routes::dashboard::DashboardHub;
use super::routes::{account, admin, dashboard, generate, health, jobs, videos};

/// Shared application state. Every service is constructed once at startup
/// and passed down explicitly; tests build their own instances wholesale.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<AuthService>,
    pub storage: Arc<StorageManager>,
    pub rate_limiter: Arc<RateLimitService>,
    pub scheduler: Arc<SchedulerService>,
    pub jobs: Arc<JobService>,
    pub videos: Arc<VideoService>,
    pub account: Arc<AccountService>,
    pub dashboard: Arc<DashboardHub>,
    pub redis: Option<Arc<RedisStore>>,
}

impl AppState {
    /// Wire up the full service graph over an optional shared store.
    pub fn new(config: Config, redis: Option<Arc<RedisStore>>) -> Self {
        let auth = Arc::new(AuthService::new());
        let storage = Arc::new(StorageManager::new(redis.clone()));
        let rate_limiter = Arc::new(RateLimitService::new(redis.clone()));
        let queue = Arc::new(PriorityQueue::new(redis.clone()));
        let scheduler = Arc::new(SchedulerService::new(queue, config.queue_max_depth));
        let jobs = Arc::new(JobService::new(storage.clone(), scheduler.clone()));
        let videos = Arc::new(VideoService::new(storage.clone()));
        let account = Arc::new(AccountService::new(storage.clone(), rate_limiter.clone()));

        Self {
            config: Arc::new(config),
            auth,
            storage,
            rate_limiter,
            scheduler,
            jobs,
            videos,
            account,
            dashboard: Arc::new(DashboardHub::new()),
            redis,
        }
    }
}

/// Build the Axum application router.
///
/// Versioned API under the configured prefix; health, root and the dashboard
/// socket at the top level. The admission middleware wraps everything and
/// decides per-path whether to enforce.
pub fn build_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(exposed_headers());

    let api = Router::new()
        .route("/generate", post(generate::generate_video))
        .route("/generate/batch", post(generate::batch_generate_videos))
        .route("/generate/models", get(generate::list_models))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:job_id", get(jobs::get_job).delete(jobs::cancel_job))
        .route("/videos", get(videos::list_videos))
        .route(
            "/videos/:video_id",
            get(videos::get_video).delete(videos::delete_video),
        )
        .route("/videos/:video_id/stream", get(videos::get_video_stream))
        .route("/account", get(account::get_account))
        .route("/account/usage", get(account::get_usage))
        .route("/account/quota", get(account::get_quota))
        .route("/admin/dashboard", get(admin::get_dashboard))
        .route("/admin/queue-stats", get(admin::get_queue_stats))
        .route("/admin/rate-limits", get(admin::get_rate_limits))
        .route("/admin/active-jobs", get(admin::get_active_jobs))
        .route("/admin/users", get(admin::get_users));

    let api_prefix = state.config.api_prefix.clone();

    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/ws/dashboard", get(dashboard::websocket_dashboard))
        .nest(&api_prefix, api)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admission_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

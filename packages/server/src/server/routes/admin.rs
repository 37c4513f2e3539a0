//! Admin REST projections of the dashboard state.
//!
//! Same data the push channel streams, exposed for plain HTTP consumers.
//! Like the dashboard socket, these carry no tenant data beyond what the
//! static test users expose and require no key.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::domains::jobs::{JobStatus, QueuePriority};
use crate::server::app::AppState;

use super::dashboard::{dashboard_snapshot, truncate_prompt};

/// `GET /v1/admin/dashboard` — everything in one call.
pub async fn get_dashboard(State(state): State<AppState>) -> Json<Value> {
    Json(dashboard_snapshot(&state).await)
}

/// `GET /v1/admin/queue-stats` — per-queue lengths and contents, enriched
/// with job details.
pub async fn get_queue_stats(State(state): State<AppState>) -> Json<Value> {
    let (lengths, total) = state.scheduler.stats().await;

    let mut queues = serde_json::Map::new();
    for priority in QueuePriority::ALL {
        let entries = state.scheduler.queue().entries(priority, 50).await;
        let jobs: Vec<Value> = entries
            .iter()
            .map(|entry| {
                let mut value = json!({
                    "job_id": entry.member,
                    "enqueued_at": entry.score,
                });
                if let Some(job) = state.storage.jobs.get(&entry.member) {
                    value["user_id"] = json!(job.user_id);
                    value["prompt"] = json!(truncate_prompt(&job.prompt, 30));
                    value["priority"] = json!(job.priority);
                }
                value
            })
            .collect();

        queues.insert(
            priority.to_string(),
            json!({
                "length": lengths.get(&priority).copied().unwrap_or(0),
                "weight": priority.weight(),
                "jobs": jobs,
            }),
        );
    }

    Json(json!({
        "queues": queues,
        "total_jobs": total,
    }))
}

/// `GET /v1/admin/rate-limits` — limiter state per known user.
pub async fn get_rate_limits(State(state): State<AppState>) -> Json<Value> {
    let users = state.auth.all_users();
    let snapshots = state.rate_limiter.snapshot_all(&users).await;

    let by_user: serde_json::Map<String, Value> = snapshots
        .into_iter()
        .map(|snapshot| {
            (
                snapshot.user_id.clone(),
                serde_json::to_value(&snapshot).unwrap_or(Value::Null),
            )
        })
        .collect();

    Json(Value::Object(by_user))
}

/// `GET /v1/admin/active-jobs` — jobs currently in PROCESSING.
pub async fn get_active_jobs(State(state): State<AppState>) -> Json<Value> {
    let (processing, total) = state.storage.jobs.page(
        |job| job.status == JobStatus::Processing,
        |job| job.started_at,
        true,
        0,
        50,
    );

    let active_jobs: Vec<Value> = processing
        .iter()
        .map(|job| {
            json!({
                "job_id": job.id,
                "user_id": job.user_id,
                "priority": job.priority,
                "started_at": job.started_at,
                "progress": job.progress.unwrap_or(0.0),
                "prompt": truncate_prompt(&job.prompt, 50),
                "duration": job.duration,
            })
        })
        .collect();

    Json(json!({
        "active_jobs": active_jobs,
        "total_active": total,
    }))
}

/// `GET /v1/admin/users` — the static test users and their tier limits.
pub async fn get_users(State(state): State<AppState>) -> Json<Value> {
    let users: Vec<Value> = state
        .auth
        .all_users()
        .iter()
        .map(|user| {
            let tier_config = user.tier.config();
            json!({
                "api_key": user.api_key,
                "user_id": user.id,
                "email": user.email,
                "tier": user.tier,
                "rate_limit_per_minute": tier_config.rate_limit_per_minute,
                "daily_quota": tier_config.daily_quota,
                "can_generate": tier_config.can_generate,
                "can_batch_generate": tier_config.can_batch_generate,
                "max_video_duration": tier_config.max_video_duration,
            })
        })
        .collect();

    Json(json!({ "users": users }))
}

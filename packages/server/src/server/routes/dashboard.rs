//! Live operational view: the `/ws/dashboard` push channel and the snapshot
//! it streams.
//!
//! Each observer gets its own 1 Hz loop: a `connected` frame on accept, a
//! full `update` immediately after, then one `update` per second until the
//! socket errors, at which point the subscription tears down. No auth — the
//! dashboard is an operational surface, not a tenant one.

use std::collections::VecDeque;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domains::auth::{User, UserTier};
use crate::domains::jobs::QueuePriority;
use crate::server::app::AppState;

/// Ring capacity for the recent-request log.
const MAX_RECENT_REQUESTS: usize = 100;

/// Queue contents shown per priority.
const MAX_QUEUE_JOBS: usize = 50;

/// Non-terminal jobs shown.
const MAX_ACTIVE_JOBS: usize = 50;

/// One admitted request, as seen by the admission middleware.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub user_id: Option<String>,
    pub tier: Option<UserTier>,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl RequestRecord {
    pub fn new(
        method: &str,
        path: &str,
        status: u16,
        user: Option<&User>,
        request_id: Uuid,
    ) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            status,
            user_id: user.map(|u| u.id.clone()),
            tier: user.map(|u| u.tier),
            request_id: request_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Holds the last-100 request ring feeding the dashboard.
pub struct DashboardHub {
    recent_requests: Mutex<VecDeque<RequestRecord>>,
}

impl DashboardHub {
    pub fn new() -> Self {
        Self {
            recent_requests: Mutex::new(VecDeque::with_capacity(MAX_RECENT_REQUESTS)),
        }
    }

    /// Push a request record, evicting the oldest past capacity.
    pub fn record_request(&self, record: RequestRecord) {
        let mut requests = self.recent_requests.lock();
        requests.push_front(record);
        requests.truncate(MAX_RECENT_REQUESTS);
    }

    /// Most recent requests, newest first.
    pub fn recent_requests(&self) -> Vec<RequestRecord> {
        self.recent_requests.lock().iter().cloned().collect()
    }
}

impl Default for DashboardHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Full dashboard state: queues, per-user limiter snapshots, live jobs and
/// the request ring.
pub async fn dashboard_snapshot(state: &AppState) -> Value {
    let lengths = state.scheduler.queue().lengths().await;
    let mut queues = serde_json::Map::new();
    let mut total_queued = 0u64;
    for priority in QueuePriority::ALL {
        let entries = state
            .scheduler
            .queue()
            .entries(priority, MAX_QUEUE_JOBS)
            .await;
        let length = *lengths.get(&priority).unwrap_or(&0);
        total_queued += length;

        queues.insert(
            priority.to_string(),
            json!({
                "length": length,
                "weight": priority.weight(),
                "jobs": entries
                    .iter()
                    .map(|entry| json!({
                        "job_id": entry.member,
                        "enqueued_at": entry.score,
                    }))
                    .collect::<Vec<_>>(),
            }),
        );
    }

    let users = state.auth.all_users();
    let snapshots = state.rate_limiter.snapshot_all(&users).await;
    let rate_limits: serde_json::Map<String, Value> = snapshots
        .into_iter()
        .map(|snapshot| {
            (
                snapshot.user_id.clone(),
                serde_json::to_value(&snapshot).unwrap_or(Value::Null),
            )
        })
        .collect();

    let (active, _) = state.storage.jobs.page(
        |job| !job.status.is_terminal(),
        |job| job.created_at,
        true,
        0,
        MAX_ACTIVE_JOBS,
    );
    let active_jobs: Vec<Value> = active
        .iter()
        .map(|job| {
            json!({
                "job_id": job.id,
                "user_id": job.user_id,
                "status": job.status,
                "priority": job.priority,
                "created_at": job.created_at,
                "started_at": job.started_at,
                "progress": job.progress,
                "prompt": truncate_prompt(&job.prompt, 50),
            })
        })
        .collect();

    json!({
        "queues": queues,
        "total_queued": total_queued,
        "rate_limits": rate_limits,
        "active_jobs": active_jobs,
        "recent_requests": state.dashboard.recent_requests(),
    })
}

pub fn truncate_prompt(prompt: &str, max_chars: usize) -> String {
    if prompt.chars().count() > max_chars {
        let prefix: String = prompt.chars().take(max_chars).collect();
        format!("{prefix}...")
    } else {
        prompt.to_string()
    }
}

pub async fn websocket_dashboard(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_dashboard(socket, state))
}

async fn handle_dashboard(mut socket: WebSocket, state: AppState) {
    info!("dashboard client connected");

    let connected = json!({
        "type": "connected",
        "timestamp": Utc::now(),
    });
    if send_json(&mut socket, &connected).await.is_err() {
        return;
    }

    // Initial full state, then one update per second
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    loop {
        let update = json!({
            "type": "update",
            "data": dashboard_snapshot(&state).await,
            "timestamp": Utc::now(),
        });
        if send_json(&mut socket, &update).await.is_err() {
            debug!("dashboard send failed, closing subscription");
            break;
        }
        ticker.tick().await;
    }

    info!("dashboard client disconnected");
}

async fn send_json(socket: &mut WebSocket, value: &Value) -> Result<(), axum::Error> {
    socket.send(Message::Text(value.to_string())).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: usize) -> RequestRecord {
        RequestRecord {
            method: "GET".to_string(),
            path: format!("/v1/account/{index}"),
            status: 200,
            user_id: None,
            tier: None,
            request_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_request_ring_caps_at_100() {
        let hub = DashboardHub::new();
        for i in 0..150 {
            hub.record_request(record(i));
        }

        let recent = hub.recent_requests();
        assert_eq!(recent.len(), 100);
        // Newest first
        assert_eq!(recent[0].path, "/v1/account/149");
        assert_eq!(recent[99].path, "/v1/account/50");
    }

    #[test]
    fn test_truncate_prompt() {
        assert_eq!(truncate_prompt("short", 50), "short");
        let long = "y".repeat(60);
        let truncated = truncate_prompt(&long, 50);
        assert_eq!(truncated.len(), 53);
        assert!(truncated.ends_with("..."));
    }
}

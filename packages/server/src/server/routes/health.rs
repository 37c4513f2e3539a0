//! Health and root info endpoints. Neither requires a key.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::server::app::AppState;

pub const SERVICE_NAME: &str = "Dream Machine Platform API";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub components: HashMap<String, Value>,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut components = HashMap::new();

    // Responding at all means the API itself is up
    components.insert("api".to_string(), json!({ "status": "up", "latency_ms": 0 }));

    let redis_health = match &state.redis {
        Some(redis) => match redis.ping_latency_ms().await {
            Ok(latency) => json!({
                "status": "up",
                "latency_ms": (latency * 100.0).round() / 100.0,
            }),
            Err(error) => json!({
                "status": "error",
                "error": error.to_string(),
                "latency_ms": null,
            }),
        },
        None => json!({ "status": "disconnected", "latency_ms": null }),
    };
    components.insert("redis".to_string(), redis_health);

    components.insert(
        "storage".to_string(),
        json!({ "status": "up", "latency_ms": 0, "type": "in-memory" }),
    );

    // Disconnected Redis degrades to the in-process fallback, so it does not
    // count against overall health
    let all_up = components.values().all(|component| {
        matches!(
            component["status"].as_str(),
            Some("up") | Some("disconnected")
        )
    });

    Json(HealthResponse {
        status: if all_up { "healthy" } else { "degraded" }.to_string(),
        version: VERSION.to_string(),
        components,
        timestamp: Utc::now(),
    })
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "name": SERVICE_NAME,
        "version": VERSION,
        "health": "/health",
        "dashboard": "/ws/dashboard",
    }))
}

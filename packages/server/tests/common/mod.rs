//! Shared test harness: an in-process server over a fresh service graph.
//!
//! The worker is disabled and no Redis is attached, so every suite runs
//! against the in-process store with full control over job lifecycles.

use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;

use api_core::domains::videos::{AspectRatio, Resolution, Video, VideoStatus};
use api_core::server::{build_app, AppState};
use api_core::Config;

pub const FREE_KEY: &str = "free_test_key";
pub const DEV_KEY: &str = "dev_test_key";
pub const PRO_KEY: &str = "pro_test_key";
pub const ENTERPRISE_KEY: &str = "enterprise_test_key";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

/// Fresh app with rate limiting on and the worker off.
pub fn spawn_app() -> TestApp {
    spawn_app_with(|_| {})
}

/// Fresh app with config tweaks applied before wiring.
pub fn spawn_app_with(configure: impl FnOnce(&mut Config)) -> TestApp {
    let mut config = Config {
        worker_enabled: false,
        ..Config::default()
    };
    configure(&mut config);

    let state = AppState::new(config, None);
    let server = TestServer::new(build_app(state.clone())).expect("router should build");
    TestApp { server, state }
}

pub fn api_key(key: &'static str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-api-key"),
        HeaderValue::from_static(key),
    )
}

/// Minimal valid generation body.
pub fn generation_body(prompt: &str, duration: u32) -> Value {
    json!({ "prompt": prompt, "duration": duration })
}

/// Error code from the standard envelope.
pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

/// Insert a READY video owned by `owner_id`; returns its id.
pub fn seed_ready_video(state: &AppState, owner_id: &str) -> String {
    let id = Video::new_id();
    let video = Video {
        id: id.clone(),
        title: "seeded video".to_string(),
        description: Some("a seeded test video".to_string()),
        duration: 10.0,
        resolution: Resolution::Hd1080,
        aspect_ratio: AspectRatio::Wide,
        style: None,
        status: VideoStatus::Ready,
        url: Some(format!("https://storage.dreammachine.dev/videos/{id}.mp4")),
        thumbnail_url: Some(format!("https://storage.dreammachine.dev/thumbs/{id}.jpg")),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        owner_id: owner_id.to_string(),
        job_id: None,
        metadata: HashMap::new(),
    };
    state.storage.videos.insert(&id, video);
    id
}

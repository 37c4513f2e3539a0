//! Video resource endpoints. All owner-scoped.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::common::pagination::{PageParams, Paginated};
use crate::domains::videos::{Video, VideoStatus};
use crate::server::app::AppState;
use crate::server::error::ApiFailure;
use crate::server::extract::{CurrentUser, RequestId};

/// Mock stream URLs stay valid this long, in seconds.
const STREAM_URL_TTL_SECONDS: u64 = 3600;

#[derive(Debug, Deserialize)]
pub struct VideoListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<VideoStatus>,
}

impl VideoListQuery {
    fn page_params(&self) -> PageParams {
        let defaults = PageParams::default();
        PageParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
        .normalized()
    }
}

/// `GET /v1/videos` — the caller's videos, newest first.
pub async fn list_videos(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<VideoListQuery>,
) -> Json<Paginated<Video>> {
    let params = query.page_params();
    let (videos, total) = state.videos.list_videos(&user, params, query.status);
    Json(Paginated::new(videos, total, params))
}

/// `GET /v1/videos/{video_id}`.
pub async fn get_video(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, ApiFailure> {
    let video = state
        .videos
        .get_video(&video_id, &user)
        .map_err(|error| request_id.attach(error))?;
    Ok(Json(video))
}

/// `GET /v1/videos/{video_id}/stream` — URL for a READY video.
pub async fn get_video_stream(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
) -> Result<Json<Value>, ApiFailure> {
    let stream_url = state
        .videos
        .get_stream_url(&video_id, &user)
        .map_err(|error| request_id.attach(error))?;

    Ok(Json(json!({
        "video_id": video_id,
        "stream_url": stream_url,
        "expires_in": STREAM_URL_TTL_SECONDS,
    })))
}

/// `DELETE /v1/videos/{video_id}` — permanent.
pub async fn delete_video(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Path(video_id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    state
        .videos
        .delete_video(&video_id, &user)
        .map_err(|error| request_id.attach(error))?;
    Ok(StatusCode::NO_CONTENT)
}

//! Job tracking endpoints. All owner-scoped.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::common::pagination::{PageParams, Paginated};
use crate::domains::jobs::{JobResponse, JobStatus};
use crate::server::app::AppState;
use crate::server::error::ApiFailure;
use crate::server::extract::{CurrentUser, RequestId};

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<JobStatus>,
}

impl JobListQuery {
    fn page_params(&self) -> PageParams {
        let defaults = PageParams::default();
        PageParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
        .normalized()
    }
}

/// `GET /v1/jobs` — the caller's jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<JobListQuery>,
) -> Json<Paginated<JobResponse>> {
    let params = query.page_params();
    let (jobs, total) = state.jobs.list_jobs(&user, params, query.status);
    let items = jobs.iter().map(JobResponse::from_job).collect();
    Json(Paginated::new(items, total, params))
}

/// `GET /v1/jobs/{job_id}` — status, queue position, result.
pub async fn get_job(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiFailure> {
    let job = state
        .jobs
        .get_job(&job_id, &user)
        .map_err(|error| request_id.attach(error))?;
    Ok(Json(JobResponse::from_job(&job)))
}

/// `DELETE /v1/jobs/{job_id}` — cancel while the lifecycle still allows it.
pub async fn cancel_job(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiFailure> {
    let job = state
        .jobs
        .cancel_job(&job_id, &user)
        .await
        .map_err(|error| request_id.attach(error))?;
    Ok(Json(JobResponse::from_job(&job)))
}

//! Generation endpoints: single submit, batch submit, model catalog.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::common::ApiError;
use crate::domains::auth::UserTier;
use crate::domains::jobs::{
    BatchGenerationRequest, BatchGenerationResponse, GenerationRequest, JobResponse,
};
use crate::server::app::AppState;
use crate::server::error::ApiFailure;
use crate::server::extract::{CurrentUser, RequestId};

/// Known model ids. Requests naming anything else are rejected before
/// admission.
const KNOWN_MODELS: [&str; 2] = ["dream-machine-1.5", "dream-machine-1.0"];

fn check_model(model: &str) -> Result<(), ApiError> {
    if KNOWN_MODELS.contains(&model) {
        Ok(())
    } else {
        Err(ApiError::ModelUnavailable {
            model: model.to_string(),
        })
    }
}

/// `POST /v1/generate` — admit and queue one job. Developer tier and up.
pub async fn generate_video(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Json(request): Json<GenerationRequest>,
) -> Result<(StatusCode, Json<JobResponse>), ApiFailure> {
    let admit = async {
        request.validate()?;
        check_model(&request.model)?;
        state.auth.require_tier(&user, UserTier::Developer)?;
        state.jobs.create_job(&request, &user).await
    };

    let job = admit.await.map_err(|error| request_id.attach(error))?;
    Ok((StatusCode::ACCEPTED, Json(JobResponse::from_job(&job))))
}

/// `POST /v1/generate/batch` — up to 10 jobs in one call. Pro tier and up.
pub async fn batch_generate_videos(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Json(batch): Json<BatchGenerationRequest>,
) -> Result<(StatusCode, Json<BatchGenerationResponse>), ApiFailure> {
    let admit = async {
        state.auth.require_tier(&user, UserTier::Pro)?;
        batch.validate()?;

        let mut job_ids = Vec::with_capacity(batch.requests.len());
        for request in &batch.requests {
            check_model(&request.model)?;
            let job = state.jobs.create_job(request, &user).await?;
            job_ids.push(job.id);
        }
        Ok::<_, ApiError>(job_ids)
    };

    let job_ids = admit.await.map_err(|error| request_id.attach(error))?;
    let total_queued = job_ids.len();
    Ok((
        StatusCode::ACCEPTED,
        Json(BatchGenerationResponse {
            job_ids,
            total_queued,
        }),
    ))
}

/// `GET /v1/generate/models` — static catalog; any valid key.
pub async fn list_models(
    CurrentUser(_user): CurrentUser,
) -> Json<Value> {
    Json(json!({
        "models": [
            {
                "id": "dream-machine-1.5",
                "name": "Dream Machine 1.5",
                "description": "Latest generation model with improved quality and coherence",
                "max_duration": 300,
                "supported_resolutions": ["480p", "720p", "1080p", "4k"],
                "supported_styles": [
                    "cinematic",
                    "anime",
                    "realistic",
                    "artistic",
                    "documentary",
                ],
                "default": true,
            },
            {
                "id": "dream-machine-1.0",
                "name": "Dream Machine 1.0",
                "description": "Original Dream Machine model",
                "max_duration": 120,
                "supported_resolutions": ["480p", "720p", "1080p"],
                "supported_styles": ["cinematic", "realistic"],
                "default": false,
            },
        ],
    }))
}

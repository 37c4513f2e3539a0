//! Account, usage and quota endpoints.

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::domains::account::{AccountResponse, QuotaResponse, UsagePeriod, UsageResponse};
use crate::server::app::AppState;
use crate::server::error::ApiFailure;
use crate::server::extract::{CurrentUser, RequestId};

/// `GET /v1/account`.
pub async fn get_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<AccountResponse> {
    Json(state.account.get_account(&user))
}

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub period: Option<String>,
}

/// `GET /v1/account/usage?period=daily|monthly`.
pub async fn get_usage(
    State(state): State<AppState>,
    request_id: RequestId,
    CurrentUser(user): CurrentUser,
    Query(query): Query<UsageQuery>,
) -> Result<Json<UsageResponse>, ApiFailure> {
    let period = query
        .period
        .as_deref()
        .unwrap_or("daily")
        .parse::<UsagePeriod>()
        .map_err(|error| request_id.attach(error))?;

    Ok(Json(state.account.get_usage(&user, period).await))
}

/// `GET /v1/account/quota`.
pub async fn get_quota(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<QuotaResponse> {
    Json(state.account.get_quota(&user).await)
}

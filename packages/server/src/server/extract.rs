//! Request extractors: correlation id and the authenticated caller.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::common::ApiError;
use crate::domains::auth::User;

use super::app::AppState;
use super::error::ApiFailure;

/// Correlation id minted by the admission middleware and echoed on the
/// response as `X-Request-ID`.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Pair an error with this request's id for the response envelope.
    pub fn attach(&self, error: ApiError) -> ApiFailure {
        ApiFailure {
            error,
            request_id: Some(self.0.to_string()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Present whenever the middleware ran; mint one otherwise (tests
        // hitting handlers directly).
        Ok(parts
            .extensions
            .get::<RequestId>()
            .copied()
            .unwrap_or_else(|| RequestId(Uuid::new_v4())))
    }
}

/// The authenticated user, resolved from the `X-API-Key` header.
///
/// Auth errors surface here rather than in the middleware, so unauthenticated
/// requests to open endpoints (health, dashboard) never fail early.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiFailure;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|rid| rid.0.to_string());

        let api_key = parts
            .headers
            .get("x-api-key")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiFailure {
                error: ApiError::MissingCredentials,
                request_id: request_id.clone(),
            })?;

        let user = state.auth.validate_api_key(api_key).map_err(|error| ApiFailure {
            error,
            request_id: request_id.clone(),
        })?;

        Ok(CurrentUser(user))
    }
}

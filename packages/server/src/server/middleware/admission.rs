//! Admission middleware: request correlation + rate-limit enforcement.
//!
//! Runs on every request. Mints the request id, enforces the caller's
//! sliding-window limit, and stamps the rate-limit headers on whatever the
//! downstream handler returns. Requests without a valid key pass through so
//! the endpoint can surface the precise auth error; they consume no window.

use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Response as HttpResponse};
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;
use uuid::Uuid;

use crate::common::ApiError;
use crate::kernel::rate_limit::RateLimitResult;
use crate::server::app::AppState;
use crate::server::error::error_response;
use crate::server::extract::RequestId;
use crate::server::routes::dashboard::RequestRecord;

/// Paths never subject to rate limiting.
const EXCLUDED_PATHS: [&str; 4] = ["/health", "/docs", "/redoc", "/openapi.json"];

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_RATELIMIT_WINDOW: HeaderName = HeaderName::from_static("x-ratelimit-window");
const X_RATELIMIT_POLICY: HeaderName = HeaderName::from_static("x-ratelimit-policy");

pub async fn admission_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = Uuid::new_v4();
    request.extensions_mut().insert(RequestId(request_id));

    let path = request.uri().path().to_string();
    let method = request.method().to_string();

    if EXCLUDED_PATHS.contains(&path.as_str()) || !state.config.rate_limit_enabled {
        let mut response = next.run(request).await;
        set_request_id(&mut response, request_id);
        return response;
    }

    // No key or an invalid key: forward untouched. The endpoint surfaces the
    // auth error and nothing is charged against any window.
    let Some(api_key) = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
    else {
        let mut response = next.run(request).await;
        set_request_id(&mut response, request_id);
        return response;
    };

    let Ok(user) = state.auth.validate_api_key(&api_key) else {
        let mut response = next.run(request).await;
        set_request_id(&mut response, request_id);
        return response;
    };

    let result = state
        .rate_limiter
        .check_and_increment(&user.id, user.tier, &path)
        .await;

    if !result.allowed {
        warn!(
            user_id = %user.id,
            path = %path,
            request_id = %request_id,
            "rate limit exceeded"
        );

        let error = ApiError::RateLimited {
            limit: result.limit,
            window_seconds: result.window_seconds,
            retry_after: result.retry_after(),
            tier: user.tier,
        };
        let mut response = error_response(&error, Some(request_id.to_string()));
        add_rate_limit_headers(&mut response, &result);
        set_request_id(&mut response, request_id);

        state.dashboard.record_request(RequestRecord::new(
            &method,
            &path,
            response.status().as_u16(),
            Some(&user),
            request_id,
        ));
        return response;
    }

    let mut response = next.run(request).await;
    add_rate_limit_headers(&mut response, &result);
    set_request_id(&mut response, request_id);

    state.dashboard.record_request(RequestRecord::new(
        &method,
        &path,
        response.status().as_u16(),
        Some(&user),
        request_id,
    ));

    response
}

fn set_request_id<B>(response: &mut HttpResponse<B>, request_id: Uuid) {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
}

fn add_rate_limit_headers<B>(response: &mut HttpResponse<B>, result: &RateLimitResult) {
    let headers = response.headers_mut();
    let pairs = [
        (X_RATELIMIT_LIMIT, result.limit.to_string()),
        (X_RATELIMIT_REMAINING, result.remaining.to_string()),
        (X_RATELIMIT_RESET, result.reset_at.to_string()),
        (X_RATELIMIT_WINDOW, result.window_seconds.to_string()),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
    headers.insert(X_RATELIMIT_POLICY, HeaderValue::from_static("sliding-window"));
}

/// Header names exposed through CORS so browser dashboards can read them.
pub fn exposed_headers() -> [HeaderName; 7] {
    [
        X_REQUEST_ID,
        X_RATELIMIT_LIMIT,
        X_RATELIMIT_REMAINING,
        X_RATELIMIT_RESET,
        X_RATELIMIT_WINDOW,
        X_RATELIMIT_POLICY,
        header::RETRY_AFTER,
    ]
}

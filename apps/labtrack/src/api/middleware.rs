//! # Middleware Module
//!
//! Rate limiting for the Labtrack HTTP API.
//!
//! ## Configuration
//!
//! - `LABTRACK_RATE_LIMIT`: Requests per second (default: 100, 0 disables)

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default rate limit in requests per second.
const DEFAULT_RATE_LIMIT: u32 = 100;

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a global rate limiter; zero falls back to the default.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second)
        .or(NonZeroU32::new(DEFAULT_RATE_LIMIT))
        .unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Read `LABTRACK_RATE_LIMIT`, defaulting to 100.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("LABTRACK_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_RATE_LIMIT)
}

/// Returns 429 Too Many Requests once the global budget is spent.
///
/// The rejection is retryable and carries `Retry-After: 1`, since the
/// quota refills every second.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.check().is_ok() {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
    let body = ErrorResponse::rejected("rate_limited", "Too Many Requests", true);
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

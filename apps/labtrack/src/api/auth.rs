//! # Authentication Module
//!
//! API key gate for the Labtrack HTTP API.
//!
//! Learner identity is established upstream; this gate only keeps the
//! service itself from being called by anyone who is not the trusted front end.
//!
//! ## Configuration
//!
//! - `LABTRACK_API_KEY`: If set, all requests (except /health) require this key
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <your-api-key>
//! ```

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

/// Get API key from environment variable.
///
/// Returns `Some(key)` if `LABTRACK_API_KEY` is set and non-empty,
/// `None` otherwise (disabling authentication).
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("LABTRACK_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Compare two keys in time independent of where they differ.
///
/// Both sides are padded to the same length so `ct_eq` always covers the
/// same number of bytes.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

fn unauthorized() -> Response {
    let body = ErrorResponse::rejected("unauthorized", "Missing or invalid API key", false);
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

/// API key authentication middleware.
///
/// If `LABTRACK_API_KEY` is set:
/// - `/health` is always allowed (for load balancer health checks)
/// - All other endpoints require `Authorization: Bearer <key>`
pub async fn api_key_auth_middleware(request: Request<Body>, next: Next) -> Response {
    let Some(expected) = get_api_key_from_env() else {
        return next.run(request).await;
    };

    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = auth_header else {
        tracing::warn!(
            event = "auth_failure",
            reason = "missing_authorization_header",
            "Missing Authorization header"
        );
        return unauthorized();
    };

    // Support both "Bearer <key>" and raw "<key>" formats
    let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
    if !keys_match(provided.as_bytes(), expected.as_bytes()) {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            path = %request.uri().path(),
            "Authentication failed: invalid API key"
        );
        return unauthorized();
    }

    next.run(request).await
}

//! # Labtrack HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /labs` - Catalog listing
//! - `GET /labs/{lab_id}` - One lab and its quiz (no answers)
//! - `GET /learners/{user_id}/dashboard` - Progress across the catalog
//! - `GET /learners/{user_id}/labs/{lab_id}` - Current record
//! - `POST /learners/{user_id}/labs/{lab_id}/transition` - Apply a stage transition
//! - `GET /learners/{user_id}/labs/{lab_id}/certificate` - Certificate eligibility
//! - `POST /learners/{user_id}/labs/{lab_id}/certificate` - Issue and render the certificate
//!
//! The `user_id` path segment is trusted: the identity provider in front of
//! this service has already authenticated the learner.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `LABTRACK_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all
//!   (default: localhost only)
//! - `LABTRACK_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `LABTRACK_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::get_api_key_from_env;
pub use handlers::{ApiError, status_for};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    CertificateResponse, DashboardResponse, EligibilityResponse, ErrorResponse, HealthResponse,
    LabDetailResponse, LabListResponse, ProgressResponse, PublicQuestion, TransitionResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use labtrack_core::{
    CertificateRenderer, DigestCertificateRenderer, LabtrackError, ProgressionEngine,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (64 KB); the largest body is a quiz submission.
const MAX_BODY_SIZE: usize = 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the engine and the certificate renderer.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProgressionEngine>,
    pub renderer: Arc<dyn CertificateRenderer>,
}

impl AppState {
    /// Create app state with the digest certificate renderer.
    #[must_use]
    pub fn new(engine: ProgressionEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            renderer: Arc::new(DigestCertificateRenderer),
        }
    }

    /// Replace the certificate renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn CertificateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `LABTRACK_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode)
/// - If not set: defaults to localhost only
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("LABTRACK_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (LABTRACK_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in LABTRACK_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No LABTRACK_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - global request budget (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set LABTRACK_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/labs", get(handlers::list_labs_handler))
        .route("/labs/{lab_id}", get(handlers::get_lab_handler))
        .route(
            "/learners/{user_id}/dashboard",
            get(handlers::dashboard_handler),
        )
        .route(
            "/learners/{user_id}/labs/{lab_id}",
            get(handlers::progress_handler),
        )
        .route(
            "/learners/{user_id}/labs/{lab_id}/transition",
            post(handlers::transition_handler),
        )
        .route(
            "/learners/{user_id}/labs/{lab_id}/certificate",
            get(handlers::eligibility_handler).post(handlers::issue_certificate_handler),
        );

    // Authentication runs last on the request
    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and serve until Ctrl+C.
pub async fn run_server(addr: &str, engine: ProgressionEngine) -> Result<(), LabtrackError> {
    let router = create_router(AppState::new(engine));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LabtrackError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Labtrack HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LabtrackError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// TESTS
// =============================================================================

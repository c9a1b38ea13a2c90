//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Engine calls may block on the progress store, so they run on the
//! blocking thread pool rather than on the async workers.

use super::{
    AppState,
    types::{
        CertificateResponse, DashboardResponse, EligibilityResponse, ErrorResponse,
        HealthResponse, LabDetailResponse, LabListResponse, ProgressResponse, TransitionResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use labtrack_core::{
    CertificateGate, LabId, LabtrackError, TransitionEvent, TransitionRequest, UserId,
};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// A core error on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LabtrackError);

impl From<LabtrackError> for ApiError {
    fn from(err: LabtrackError) -> Self {
        Self(err)
    }
}

/// HTTP status for each core error.
pub fn status_for(err: &LabtrackError) -> StatusCode {
    match err {
        LabtrackError::NotFound { .. } => StatusCode::NOT_FOUND,
        LabtrackError::MalformedSubmission(_) | LabtrackError::InvalidIdentifier(_) => {
            StatusCode::BAD_REQUEST
        }
        LabtrackError::StageGuardViolation { .. } => StatusCode::CONFLICT,
        LabtrackError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        LabtrackError::RenderFailed(_) => StatusCode::BAD_GATEWAY,
        LabtrackError::InvalidCatalog(_)
        | LabtrackError::SerializationError(_)
        | LabtrackError::InvalidConfig(_)
        | LabtrackError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error_kind = self.0.kind(), "request failed: {}", self.0);
        }
        (status, Json(ErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Run a blocking engine call off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, LabtrackError>
where
    F: FnOnce() -> Result<T, LabtrackError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LabtrackError::StoreUnavailable(format!("worker task failed: {}", e)))?
}

fn parse_ids(user: String, lab: String) -> Result<(UserId, LabId), LabtrackError> {
    Ok((UserId::new(user)?, LabId::lookup(lab)?))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// CATALOG HANDLERS
// =============================================================================

/// List the catalog.
pub async fn list_labs_handler(State(state): State<AppState>) -> Json<LabListResponse> {
    let catalog = state.engine.catalog();
    let categories = catalog
        .by_category()
        .into_iter()
        .map(|(category, labs)| {
            let ids = labs.into_iter().map(|lab| lab.id.to_string()).collect();
            (category, ids)
        })
        .collect();

    Json(LabListResponse {
        count: catalog.len(),
        labs: catalog.list(),
        categories,
    })
}

/// Show one lab and its quiz, without answers.
pub async fn get_lab_handler(
    State(state): State<AppState>,
    Path(lab_id): Path<String>,
) -> ApiResult<LabDetailResponse> {
    let lab = LabId::lookup(lab_id)?;
    let definition = state.engine.catalog().get(&lab)?;
    Ok(Json(LabDetailResponse::from(definition)))
}

// =============================================================================
// PROGRESS HANDLERS
// =============================================================================

/// A learner's progress across the catalog.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<DashboardResponse> {
    let user = UserId::new(user_id)?;
    let engine = state.engine.clone();
    let lookup = user.clone();
    let dashboard = blocking(move || engine.dashboard(&lookup)).await?;
    Ok(Json(DashboardResponse {
        user: user.to_string(),
        dashboard,
    }))
}

/// Current record for one lab.
pub async fn progress_handler(
    State(state): State<AppState>,
    Path((user_id, lab_id)): Path<(String, String)>,
) -> ApiResult<ProgressResponse> {
    let (user, lab) = parse_ids(user_id, lab_id)?;
    let engine = state.engine.clone();
    let (u, l) = (user.clone(), lab.clone());
    let record = blocking(move || engine.progress(&u, &l)).await?;
    Ok(Json(ProgressResponse {
        user: user.to_string(),
        lab: lab.to_string(),
        stage: record.stage,
        record,
    }))
}

// =============================================================================
// TRANSITION HANDLER
// =============================================================================

/// Apply a stage transition.
///
/// A body that does not decode as a transition event is a malformed
/// submission. `issue_certificate` goes through the certificate gate so the
/// renderer is invoked exactly as on the certificate endpoint.
pub async fn transition_handler(
    State(state): State<AppState>,
    Path((user_id, lab_id)): Path<(String, String)>,
    body: Result<Json<TransitionEvent>, JsonRejection>,
) -> ApiResult<TransitionResponse> {
    let (user, lab) = parse_ids(user_id, lab_id)?;
    let Json(event) =
        body.map_err(|rejection| LabtrackError::MalformedSubmission(rejection.body_text()))?;

    let engine = state.engine.clone();
    let renderer = state.renderer.clone();
    let (u, l, e) = (user.clone(), lab.clone(), event.clone());
    let result = blocking(move || match e {
        TransitionEvent::IssueCertificate => {
            let issued = CertificateGate::new(&engine).issue(&u, &l, renderer.as_ref())?;
            Ok(TransitionResponse::issued(u.as_str(), l.as_str(), issued))
        }
        other => {
            let request = TransitionRequest::new(u.clone(), l.clone(), other.clone());
            let outcome = engine.apply(&request)?;
            Ok(TransitionResponse::new(u.as_str(), l.as_str(), &other, outcome))
        }
    })
    .await;

    match result {
        Ok(response) => {
            tracing::info!(
                user = %user,
                lab = %lab,
                event = event.name(),
                stage = %response.stage,
                changed = response.changed,
                "transition applied"
            );
            Ok(Json(response))
        }
        Err(err) => {
            match &err {
                LabtrackError::StageGuardViolation { required, current } => tracing::info!(
                    user = %user,
                    lab = %lab,
                    event = event.name(),
                    required = %required,
                    current = %current,
                    "transition rejected by guard"
                ),
                LabtrackError::StoreUnavailable(reason) => tracing::error!(
                    user = %user,
                    lab = %lab,
                    event = event.name(),
                    "progress store unavailable: {}",
                    reason
                ),
                other => tracing::debug!(
                    user = %user,
                    lab = %lab,
                    event = event.name(),
                    "transition refused: {}",
                    other
                ),
            }
            Err(ApiError(err))
        }
    }
}

// =============================================================================
// CERTIFICATE HANDLERS
// =============================================================================

/// Whether the learner may receive the certificate.
pub async fn eligibility_handler(
    State(state): State<AppState>,
    Path((user_id, lab_id)): Path<(String, String)>,
) -> ApiResult<EligibilityResponse> {
    let (user, lab) = parse_ids(user_id, lab_id)?;
    let engine = state.engine.clone();
    let (u, l) = (user.clone(), lab.clone());
    let (eligible, record) = blocking(move || {
        let eligible = CertificateGate::new(&engine).is_eligible(&u, &l)?;
        Ok((eligible, engine.progress(&u, &l)?))
    })
    .await?;

    Ok(Json(EligibilityResponse {
        user: user.to_string(),
        lab: lab.to_string(),
        eligible,
        stage: record.stage,
        certificate_issued: record.certificate_issued,
    }))
}

/// Issue and render the certificate.
pub async fn issue_certificate_handler(
    State(state): State<AppState>,
    Path((user_id, lab_id)): Path<(String, String)>,
) -> ApiResult<CertificateResponse> {
    let (user, lab) = parse_ids(user_id, lab_id)?;
    let engine = state.engine.clone();
    let renderer = state.renderer.clone();
    let (u, l) = (user.clone(), lab.clone());
    let issued = blocking(move || {
        CertificateGate::new(&engine).issue(&u, &l, renderer.as_ref())
    })
    .await
    .inspect_err(|err| {
        if let LabtrackError::StageGuardViolation { required, current } = err {
            tracing::info!(
                user = %user,
                lab = %lab,
                required = %required,
                current = %current,
                "certificate refused"
            );
        }
    })?;

    tracing::info!(
        user = %user,
        lab = %lab,
        reference = %issued.artifact.reference,
        "certificate issued"
    );
    Ok(Json(CertificateResponse::new(
        user.as_str(),
        lab.as_str(),
        issued.artifact,
        issued.record,
    )))
}

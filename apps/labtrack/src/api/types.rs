//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use labtrack_core::{
    CertificateArtifact, IssuedCertificate, LabDefinition, LabSummary, LabtrackError,
    LearnerDashboard, ProgressRecord, QuizResult, Stage, Timestamp, TransitionEvent,
    TransitionOutcome,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    /// Machine-readable error tag, e.g. `stage_guard_violation`.
    pub error_kind: String,
    /// For guard violations: the stage the request needed.
    pub required_stage: Option<Stage>,
    /// For guard violations: the stage the record is at.
    pub current_stage: Option<Stage>,
    pub retryable: bool,
}

impl From<&LabtrackError> for ErrorResponse {
    fn from(err: &LabtrackError) -> Self {
        let (required_stage, current_stage) = match err {
            LabtrackError::StageGuardViolation { required, current } => {
                (Some(*required), Some(*current))
            }
            _ => (None, None),
        };
        Self {
            success: false,
            error: err.to_string(),
            error_kind: err.kind().to_string(),
            required_stage,
            current_stage,
            retryable: err.is_retryable(),
        }
    }
}

impl ErrorResponse {
    /// A request turned away by the HTTP layer before reaching the engine.
    pub fn rejected(error_kind: &str, error: &str, retryable: bool) -> Self {
        Self {
            success: false,
            error: error.to_string(),
            error_kind: error_kind.to_string(),
            required_stage: None,
            current_stage: None,
            retryable,
        }
    }
}

// =============================================================================
// CATALOG RESPONSES
// =============================================================================

/// Catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabListResponse {
    pub count: usize,
    pub labs: Vec<LabSummary>,
    /// Lab ids per category, catalog order within each.
    pub categories: BTreeMap<String, Vec<String>>,
}

/// A quiz question as shown before answering: no answer, no explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub prompt: String,
    pub choices: Vec<String>,
}

/// One lab with its public quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabDetailResponse {
    pub lab: LabSummary,
    /// Markdown reading for the theory stage.
    pub theory: String,
    pub questions: Vec<PublicQuestion>,
}

impl From<&LabDefinition> for LabDetailResponse {
    fn from(definition: &LabDefinition) -> Self {
        Self {
            lab: definition.summary(),
            theory: definition.theory.clone(),
            questions: definition
                .questions
                .iter()
                .map(|q| PublicQuestion {
                    prompt: q.prompt.clone(),
                    choices: q.choices.clone(),
                })
                .collect(),
        }
    }
}

// =============================================================================
// PROGRESS RESPONSES
// =============================================================================

/// Current record for one (learner, lab) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub user: String,
    pub lab: String,
    pub stage: Stage,
    pub record: ProgressRecord,
}

/// A learner's dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub user: String,
    #[serde(flatten)]
    pub dashboard: LearnerDashboard,
}

/// Result of a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub success: bool,
    pub user: String,
    pub lab: String,
    pub event: String,
    pub stage: Stage,
    /// False when the transition was already satisfied.
    pub changed: bool,
    pub record: ProgressRecord,
    /// Present for `submit_quiz` only.
    pub quiz: Option<QuizResult>,
    /// Renderer reference; present for `issue_certificate` only.
    pub certificate: Option<String>,
}

impl TransitionResponse {
    pub fn new(
        user: &str,
        lab: &str,
        event: &TransitionEvent,
        outcome: TransitionOutcome,
    ) -> Self {
        Self {
            success: true,
            user: user.to_string(),
            lab: lab.to_string(),
            event: event.name().to_string(),
            stage: outcome.record.stage,
            changed: outcome.changed,
            record: outcome.record,
            quiz: outcome.quiz,
            certificate: None,
        }
    }

    /// Response for an `issue_certificate` that went through the gate.
    pub fn issued(user: &str, lab: &str, issued: IssuedCertificate) -> Self {
        Self {
            success: true,
            user: user.to_string(),
            lab: lab.to_string(),
            event: TransitionEvent::IssueCertificate.name().to_string(),
            stage: issued.record.stage,
            changed: issued.changed,
            record: issued.record,
            quiz: None,
            certificate: Some(issued.artifact.reference),
        }
    }
}

// =============================================================================
// CERTIFICATE RESPONSES
// =============================================================================

/// Certificate eligibility check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub user: String,
    pub lab: String,
    pub eligible: bool,
    pub stage: Stage,
    pub certificate_issued: bool,
}

/// An issued certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateResponse {
    pub success: bool,
    pub user: String,
    pub lab: String,
    /// Opaque artifact reference from the renderer.
    pub reference: String,
    pub issued_at: Option<Timestamp>,
    pub record: ProgressRecord,
}

impl CertificateResponse {
    pub fn new(
        user: &str,
        lab: &str,
        artifact: CertificateArtifact,
        record: ProgressRecord,
    ) -> Self {
        Self {
            success: true,
            user: user.to_string(),
            lab: lab.to_string(),
            reference: artifact.reference,
            issued_at: record.certificate_issued_at,
            record,
        }
    }
}

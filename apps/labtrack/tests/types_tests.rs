//! Unit tests for API types serialization/deserialization.

#![allow(clippy::unwrap_used, clippy::panic)]

use labtrack::api::{
    CertificateResponse, ErrorResponse, HealthResponse, LabDetailResponse, TransitionResponse,
};
use labtrack_core::{
    CertificateArtifact, LabCatalog, LabId, LabtrackError, ProgressRecord, Stage, Timestamp,
    TransitionEvent, TransitionOutcome,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// ERROR RESPONSE TESTS
// =============================================================================

#[test]
fn test_error_response_for_guard_violation() {
    let err = LabtrackError::StageGuardViolation {
        required: Stage::QuizPassed,
        current: Stage::TheoryViewed,
    };
    let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();

    assert_eq!(json["success"], false);
    assert_eq!(json["error_kind"], "stage_guard_violation");
    assert_eq!(json["required_stage"], "quiz_passed");
    assert_eq!(json["current_stage"], "theory_viewed");
    assert_eq!(json["retryable"], false);
}

#[test]
fn test_error_response_store_unavailable_is_retryable() {
    let err = LabtrackError::StoreUnavailable("disk full".to_string());
    let response = ErrorResponse::from(&err);

    assert!(response.retryable);
    assert!(response.required_stage.is_none());
    assert!(response.error.contains("disk full"));
}

// =============================================================================
// TRANSITION EVENT TESTS
// =============================================================================

#[test]
fn test_transition_event_deserialization() {
    let view: TransitionEvent = serde_json::from_str(r#"{"event":"view_theory"}"#).unwrap();
    assert_eq!(view, TransitionEvent::ViewTheory);

    let quiz: TransitionEvent =
        serde_json::from_str(r#"{"event":"submit_quiz","answers":[1,0,2]}"#).unwrap();
    assert_eq!(
        quiz,
        TransitionEvent::SubmitQuiz {
            answers: vec![1, 0, 2]
        }
    );
}

#[test]
fn test_transition_event_rejects_unknown_and_incomplete() {
    assert!(serde_json::from_str::<TransitionEvent>(r#"{"event":"skip"}"#).is_err());
    assert!(serde_json::from_str::<TransitionEvent>(r#"{"event":"submit_quiz"}"#).is_err());
    assert!(
        serde_json::from_str::<TransitionEvent>(r#"{"event":"submit_quiz","answers":[-1]}"#)
            .is_err()
    );
}

#[test]
fn test_transition_response_shape() {
    let record = ProgressRecord {
        stage: Stage::TheoryViewed,
        revision: 1,
        ..ProgressRecord::default()
    };
    let outcome = TransitionOutcome {
        record,
        quiz: None,
        changed: true,
    };
    let response =
        TransitionResponse::new("alice", "bb84", &TransitionEvent::ViewTheory, outcome);
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["event"], "view_theory");
    assert_eq!(json["stage"], "theory_viewed");
    assert_eq!(json["changed"], true);
    assert!(json["quiz"].is_null());
    assert!(json["certificate"].is_null());
    assert_eq!(json["record"]["revision"], 1);
}

// =============================================================================
// CATALOG AND CERTIFICATE TESTS
// =============================================================================

#[test]
fn test_lab_detail_has_no_answers() {
    let catalog = LabCatalog::builtin().unwrap();
    let lab = catalog.get(&LabId::new("tele").unwrap()).unwrap();
    let json = serde_json::to_value(LabDetailResponse::from(lab)).unwrap();

    assert!(json["theory"].as_str().unwrap().contains("Bell measurement"));

    let first = &json["questions"][0];
    assert!(first.get("prompt").is_some());
    assert!(first.get("choices").is_some());
    assert!(first.get("correct").is_none());
    assert!(first.get("explanation").is_none());
}

#[test]
fn test_certificate_response_carries_issue_time() {
    let record = ProgressRecord {
        stage: Stage::CertificateIssued,
        passed: true,
        certificate_issued: true,
        certificate_issued_at: Some(Timestamp(42)),
        ..ProgressRecord::default()
    };
    let artifact = CertificateArtifact {
        reference: "ltrk-cert-abc".to_string(),
    };
    let response = CertificateResponse::new("alice", "bb84", artifact, record);

    assert_eq!(response.issued_at, Some(Timestamp(42)));
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["reference"], "ltrk-cert-abc");
    assert_eq!(json["issued_at"], 42);
}

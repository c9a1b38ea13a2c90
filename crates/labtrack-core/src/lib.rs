//! # labtrack-core
//!
//! The Lab Progression & Assessment Engine for Labtrack - THE LOGIC.
//!
//! This crate owns the per-learner, per-lab progression state machine:
//! a learner cannot reach the interactive exercise or the certificate of a
//! lab without first passing that lab's quiz, and the recorded progress is
//! durable, monotonic and safe under concurrent requests.
//!
//! ## Components
//!
//! - [`LabCatalog`]: immutable, validated lab definitions (`catalog`)
//! - [`QuizEngine`]: pure quiz scoring (`quiz`)
//! - [`ProgressStore`]: keyed record storage with compare-and-put (`storage`)
//! - [`ProgressionEngine`]: the stage state machine (`engine`)
//! - [`CertificateGate`]: eligibility in front of the renderer (`certificate`)
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the only writer of progress records
//! - Uses integer arithmetic for every score and threshold
//! - Has NO async, NO network dependencies (pure Rust)
//! - Treats identity, exercise execution and certificate rendering as
//!   external capabilities

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod certificate;
pub mod engine;
pub mod formats;
pub mod primitives;
pub mod progress;
pub mod quiz;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{LabId, LabtrackError, Score, Stage, Timestamp, UserId};

// =============================================================================
// RE-EXPORTS: Catalog and Scoring
// =============================================================================

pub use catalog::{Difficulty, LabCatalog, LabDefinition, LabSummary, QuizQuestion};
pub use quiz::{QuestionOutcome, QuizEngine, QuizResult, QuizSubmission};

// =============================================================================
// RE-EXPORTS: Progression
// =============================================================================

pub use engine::{
    Clock, FixedClock, ProgressionEngine, SystemClock, TransitionEvent, TransitionOutcome,
    TransitionRequest,
};
pub use progress::{LabProgress, LearnerDashboard, ProgressRecord, QuizAttempt};
pub use storage::{MemoryProgressStore, ProgressStore, RedbProgressStore};

// =============================================================================
// RE-EXPORTS: Certificates
// =============================================================================

#[cfg(feature = "crypto-hash")]
pub use certificate::DigestCertificateRenderer;
pub use certificate::{
    CertificateArtifact, CertificateGate, CertificateRenderer, CertificateRequest,
    IssuedCertificate,
};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{RecordHeader, record_from_bytes, record_to_bytes};

//! # Progression Engine
//!
//! The per-(learner, lab) stage state machine.
//!
//! Every transition is a read-modify-write of one [`ProgressRecord`]:
//! 1. Resolve the lab in the catalog (unknown lab fails before any store access)
//! 2. Validate the request payload (quiz answers are scored up front)
//! 3. Read the current record, check the guard, merge the change
//! 4. Write back with `compare_and_put` against the revision that was read
//!
//! Step 3 and 4 repeat when another writer changed the record in between, so
//! the merge is always computed from the freshest record and concurrent
//! requests for the same key can never lose a pass or lower a best score.
//!
//! ## Transitions
//!
//! | Event | Guard | Result |
//! |-------|-------|--------|
//! | `view_theory` | none | at least `TheoryViewed` |
//! | `submit_quiz` | `TheoryViewed` reached | `QuizPassed` when passing |
//! | `complete_exercise` | `QuizPassed` reached | `ExerciseCompleted` |
//! | `issue_certificate` | `ExerciseCompleted` reached and passed | `CertificateIssued` |
//!
//! A transition that is already satisfied succeeds without writing.

use crate::primitives::MAX_TRANSITION_ATTEMPTS;
use crate::{
    LabCatalog, LabId, LabtrackError, LearnerDashboard, ProgressRecord, ProgressStore, QuizEngine,
    QuizResult, QuizSubmission, Stage, Timestamp, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

// =============================================================================
// CLOCK
// =============================================================================

/// Source of transition timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in whole seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| Timestamp(d.as_secs()))
            .unwrap_or_default()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

// =============================================================================
// REQUESTS AND OUTCOMES
// =============================================================================

/// A requested stage transition and its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransitionEvent {
    ViewTheory,
    SubmitQuiz { answers: Vec<usize> },
    CompleteExercise,
    IssueCertificate,
}

impl TransitionEvent {
    /// Stable event name, as used on the wire.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ViewTheory => "view_theory",
            Self::SubmitQuiz { .. } => "submit_quiz",
            Self::CompleteExercise => "complete_exercise",
            Self::IssueCertificate => "issue_certificate",
        }
    }
}

/// Inbound transition request for one (learner, lab) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub user: UserId,
    pub lab: LabId,
    #[serde(flatten)]
    pub event: TransitionEvent,
}

impl TransitionRequest {
    #[must_use]
    pub fn new(user: UserId, lab: LabId, event: TransitionEvent) -> Self {
        Self { user, lab, event }
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    /// The record as stored after the transition.
    pub record: ProgressRecord,
    /// Present for `submit_quiz` only.
    pub quiz: Option<QuizResult>,
    /// False when the transition was already satisfied and nothing was written.
    pub changed: bool,
}

// =============================================================================
// ENGINE
// =============================================================================

/// The stage state machine over a catalog and a progress store.
///
/// The engine is the only writer of progress records. It holds no mutable
/// state of its own and can be shared across threads behind an `Arc`.
pub struct ProgressionEngine {
    catalog: Arc<LabCatalog>,
    store: Arc<dyn ProgressStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ProgressionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionEngine")
            .field("labs", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl ProgressionEngine {
    /// Create an engine using the system clock.
    pub fn new(catalog: Arc<LabCatalog>, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            catalog,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the timestamp source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The catalog this engine enforces.
    pub fn catalog(&self) -> &LabCatalog {
        &self.catalog
    }

    /// Dispatch a transition request.
    pub fn apply(&self, request: &TransitionRequest) -> Result<TransitionOutcome, LabtrackError> {
        match &request.event {
            TransitionEvent::ViewTheory => self.view_theory(&request.user, &request.lab),
            TransitionEvent::SubmitQuiz { answers } => self.submit_quiz(&QuizSubmission::new(
                request.user.clone(),
                request.lab.clone(),
                answers.clone(),
            )),
            TransitionEvent::CompleteExercise => {
                self.complete_exercise(&request.user, &request.lab)
            }
            TransitionEvent::IssueCertificate => {
                self.issue_certificate(&request.user, &request.lab)
            }
        }
    }

    /// Mark the theory as viewed. Always permitted; never regresses.
    pub fn view_theory(
        &self,
        user: &UserId,
        lab: &LabId,
    ) -> Result<TransitionOutcome, LabtrackError> {
        self.catalog.get(lab)?;
        let now = self.clock.now();
        self.transition(user, lab, |record| {
            if record.has_reached(Stage::TheoryViewed) {
                return Ok(false);
            }
            record.advance_to(Stage::TheoryViewed, now);
            Ok(true)
        })
    }

    /// Score a quiz attempt and merge it into the record.
    ///
    /// Retakes are allowed at any stage after the theory; a lower retake is
    /// kept as the last attempt but never lowers the best score or clears
    /// the pass flag.
    pub fn submit_quiz(
        &self,
        submission: &QuizSubmission,
    ) -> Result<TransitionOutcome, LabtrackError> {
        let definition = self.catalog.get(&submission.lab)?;
        let result = QuizEngine::score(definition, submission)?;
        let now = self.clock.now();

        let mut outcome = self.transition(&submission.user, &submission.lab, |record| {
            require(record, Stage::TheoryViewed)?;
            record.record_attempt(&result, now);
            Ok(true)
        })?;
        outcome.quiz = Some(result);
        Ok(outcome)
    }

    /// Mark the interactive exercise as completed.
    pub fn complete_exercise(
        &self,
        user: &UserId,
        lab: &LabId,
    ) -> Result<TransitionOutcome, LabtrackError> {
        self.catalog.get(lab)?;
        let now = self.clock.now();
        self.transition(user, lab, |record| {
            if record.has_reached(Stage::ExerciseCompleted) {
                return Ok(false);
            }
            require(record, Stage::QuizPassed)?;
            record.advance_to(Stage::ExerciseCompleted, now);
            Ok(true)
        })
    }

    /// Move the record to `CertificateIssued`.
    ///
    /// This only records the issuance; rendering is done by
    /// [`CertificateGate::issue`](crate::CertificateGate::issue).
    pub fn issue_certificate(
        &self,
        user: &UserId,
        lab: &LabId,
    ) -> Result<TransitionOutcome, LabtrackError> {
        self.catalog.get(lab)?;
        let now = self.clock.now();
        self.transition(user, lab, |record| {
            if record.certificate_issued {
                return Ok(false);
            }
            require(record, Stage::ExerciseCompleted)?;
            if !record.passed {
                return Err(LabtrackError::StageGuardViolation {
                    required: Stage::QuizPassed,
                    current: record.stage,
                });
            }
            record.advance_to(Stage::CertificateIssued, now);
            Ok(true)
        })
    }

    /// Current record for a pair; an absent record reads as `NotStarted`.
    pub fn progress(&self, user: &UserId, lab: &LabId) -> Result<ProgressRecord, LabtrackError> {
        self.catalog.get(lab)?;
        Ok(self.store.get(user, lab)?.unwrap_or_default())
    }

    /// A learner's progress across the whole catalog.
    pub fn dashboard(&self, user: &UserId) -> Result<LearnerDashboard, LabtrackError> {
        let records = self.store.list_for_user(user)?;
        Ok(LearnerDashboard::from_records(&self.catalog, records))
    }

    /// Read-modify-write loop over one key.
    ///
    /// `step` checks the guard and mutates the record, returning whether
    /// anything changed. An error or `false` from `step` ends the loop
    /// without writing.
    fn transition<F>(
        &self,
        user: &UserId,
        lab: &LabId,
        mut step: F,
    ) -> Result<TransitionOutcome, LabtrackError>
    where
        F: FnMut(&mut ProgressRecord) -> Result<bool, LabtrackError>,
    {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let current = self.store.get(user, lab)?;
            let expected = current.as_ref().map(|r| r.revision);
            let mut record = current.unwrap_or_default();

            if !step(&mut record)? {
                return Ok(TransitionOutcome {
                    record,
                    quiz: None,
                    changed: false,
                });
            }

            record.revision = record.revision.saturating_add(1);
            if self.store.compare_and_put(user, lab, expected, &record)? {
                return Ok(TransitionOutcome {
                    record,
                    quiz: None,
                    changed: true,
                });
            }
        }

        Err(LabtrackError::StoreUnavailable(format!(
            "gave up on {}/{} after {} conflicting writes",
            user, lab, MAX_TRANSITION_ATTEMPTS
        )))
    }
}

/// Guard: the record must have reached `required`.
fn require(record: &ProgressRecord, required: Stage) -> Result<(), LabtrackError> {
    if record.has_reached(required) {
        Ok(())
    } else {
        Err(LabtrackError::StageGuardViolation {
            required,
            current: record.stage,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

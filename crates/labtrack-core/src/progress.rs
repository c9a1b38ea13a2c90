//! # Progress Records
//!
//! The persisted state of one learner in one lab, and the monotonic merge
//! rules applied to it.
//!
//! ## Invariants
//!
//! - `certificate_issued` implies `passed`
//! - `passed` implies `best_score >= threshold`
//! - `passed` is sticky: no later attempt resets it
//! - `best_score` never decreases
//! - `stage` never regresses
//!
//! Absence of a record is equivalent to [`ProgressRecord::default`], the
//! `NotStarted` record.

use crate::{LabCatalog, LabId, LabSummary, QuizResult, Score, Stage, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of one quiz attempt; the only part of a result that is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub score: Score,
    pub passed: bool,
    pub at: Timestamp,
}

/// Progression state of a (learner, lab) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub stage: Stage,
    /// Best quiz score ever achieved.
    pub best_score: Score,
    /// Sticky pass flag.
    pub passed: bool,
    pub certificate_issued: bool,
    /// When the certificate was first issued.
    pub certificate_issued_at: Option<Timestamp>,
    /// Most recent attempt, which may be lower than `best_score`.
    pub last_attempt: Option<QuizAttempt>,
    pub attempts: u32,
    pub updated_at: Timestamp,
    /// Write counter; the store compares it to detect concurrent writers.
    pub revision: u64,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            stage: Stage::NotStarted,
            best_score: Score::ZERO,
            passed: false,
            certificate_issued: false,
            certificate_issued_at: None,
            last_attempt: None,
            attempts: 0,
            updated_at: Timestamp::default(),
            revision: 0,
        }
    }
}

impl ProgressRecord {
    /// Whether the record has reached `stage` or any later stage.
    #[must_use]
    pub fn has_reached(&self, stage: Stage) -> bool {
        self.stage >= stage
    }

    /// Fold a quiz result into this record.
    ///
    /// Best score only rises, the pass flag only turns on, and the stage only
    /// advances (to `QuizPassed`, when the record first passes).
    pub fn record_attempt(&mut self, result: &QuizResult, now: Timestamp) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_attempt = Some(QuizAttempt {
            score: result.score,
            passed: result.passed,
            at: now,
        });
        self.best_score = self.best_score.max(result.score);
        if result.passed {
            self.passed = true;
        }
        if self.passed && self.stage < Stage::QuizPassed {
            self.stage = Stage::QuizPassed;
        }
        self.updated_at = now;
    }

    /// Advance to `stage` if the record is behind it. Never moves backwards.
    pub fn advance_to(&mut self, stage: Stage, now: Timestamp) {
        if self.stage < stage {
            self.stage = stage;
        }
        if stage == Stage::CertificateIssued && !self.certificate_issued {
            self.certificate_issued = true;
            self.certificate_issued_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Check the record invariants against a lab's threshold.
    #[must_use]
    pub fn is_consistent(&self, threshold: Score) -> bool {
        let certificate_ok = !self.certificate_issued || self.passed;
        let pass_ok = !self.passed || self.best_score >= threshold;
        let stage_ok = !self.has_reached(Stage::QuizPassed) || self.passed;
        let issued_ok = self.certificate_issued == (self.stage == Stage::CertificateIssued);
        certificate_ok && pass_ok && stage_ok && issued_ok
    }
}

// =============================================================================
// DASHBOARD
// =============================================================================

/// One catalog lab with the learner's record for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabProgress {
    pub lab: LabSummary,
    pub record: ProgressRecord,
}

/// A learner's progress across the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerDashboard {
    pub total: usize,
    /// Certificate issued.
    pub completed: usize,
    /// Opened but no certificate yet.
    pub in_progress: usize,
    pub not_started: usize,
    /// Every catalog lab in catalog order.
    pub labs: Vec<LabProgress>,
}

impl LearnerDashboard {
    /// Combine the catalog with a learner's stored records.
    ///
    /// Records for labs absent from the catalog are ignored.
    #[must_use]
    pub fn from_records(
        catalog: &LabCatalog,
        mut records: BTreeMap<LabId, ProgressRecord>,
    ) -> Self {
        let mut dashboard = Self {
            total: catalog.len(),
            completed: 0,
            in_progress: 0,
            not_started: 0,
            labs: Vec::with_capacity(catalog.len()),
        };

        for lab in catalog.iter() {
            let record = records.remove(&lab.id).unwrap_or_default();
            if record.certificate_issued {
                dashboard.completed = dashboard.completed.saturating_add(1);
            } else if record.has_reached(Stage::TheoryViewed) {
                dashboard.in_progress = dashboard.in_progress.saturating_add(1);
            } else {
                dashboard.not_started = dashboard.not_started.saturating_add(1);
            }
            dashboard.labs.push(LabProgress {
                lab: lab.summary(),
                record,
            });
        }

        dashboard
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn result(score_bps: u16, passed: bool) -> QuizResult {
        QuizResult {
            correct_count: 0,
            question_count: 10,
            score: Score::from_bps(score_bps).expect("score"),
            passed,
            outcomes: Vec::new(),
        }
    }

    #[test]
    fn failing_attempt_keeps_stage() {
        let mut record = ProgressRecord {
            stage: Stage::TheoryViewed,
            ..ProgressRecord::default()
        };
        record.record_attempt(&result(5000, false), Timestamp(10));

        assert_eq!(record.stage, Stage::TheoryViewed);
        assert!(!record.passed);
        assert_eq!(record.best_score.bps(), 5000);
        assert_eq!(record.attempts, 1);
    }

    #[test]
    fn pass_is_sticky_and_best_score_monotonic() {
        let mut record = ProgressRecord {
            stage: Stage::TheoryViewed,
            ..ProgressRecord::default()
        };
        record.record_attempt(&result(8000, true), Timestamp(10));
        record.record_attempt(&result(3000, false), Timestamp(20));

        assert!(record.passed);
        assert_eq!(record.stage, Stage::QuizPassed);
        assert_eq!(record.best_score.bps(), 8000);
        assert_eq!(record.last_attempt.map(|a| a.score.bps()), Some(3000));
        assert_eq!(record.attempts, 2);
        assert!(record.is_consistent(Score::DEFAULT_THRESHOLD));
    }

    #[test]
    fn retake_after_exercise_does_not_regress_stage() {
        let mut record = ProgressRecord {
            stage: Stage::ExerciseCompleted,
            passed: true,
            best_score: Score::from_bps(7000).expect("score"),
            ..ProgressRecord::default()
        };
        record.record_attempt(&result(9000, true), Timestamp(30));
        assert_eq!(record.stage, Stage::ExerciseCompleted);
        assert_eq!(record.best_score.bps(), 9000);
    }

    #[test]
    fn certificate_timestamp_is_kept_on_reissue() {
        let mut record = ProgressRecord {
            stage: Stage::ExerciseCompleted,
            passed: true,
            best_score: Score::FULL,
            ..ProgressRecord::default()
        };
        record.advance_to(Stage::CertificateIssued, Timestamp(100));
        record.advance_to(Stage::CertificateIssued, Timestamp(200));

        assert!(record.certificate_issued);
        assert_eq!(record.certificate_issued_at, Some(Timestamp(100)));
        assert_eq!(record.updated_at, Timestamp(200));
        assert!(record.is_consistent(Score::DEFAULT_THRESHOLD));
    }

    #[test]
    fn inconsistent_record_is_detected() {
        let record = ProgressRecord {
            stage: Stage::CertificateIssued,
            certificate_issued: true,
            passed: false,
            ..ProgressRecord::default()
        };
        assert!(!record.is_consistent(Score::DEFAULT_THRESHOLD));
    }

    #[test]
    fn dashboard_counts_over_catalog() {
        let catalog = LabCatalog::builtin().expect("catalog");
        let mut records = BTreeMap::new();
        records.insert(
            LabId::new("bb84").expect("id"),
            ProgressRecord {
                stage: Stage::CertificateIssued,
                passed: true,
                certificate_issued: true,
                best_score: Score::FULL,
                ..ProgressRecord::default()
            },
        );
        records.insert(
            LabId::new("tele").expect("id"),
            ProgressRecord {
                stage: Stage::TheoryViewed,
                ..ProgressRecord::default()
            },
        );
        records.insert(LabId::new("retired").expect("id"), ProgressRecord::default());

        let dashboard = LearnerDashboard::from_records(&catalog, records);
        assert_eq!(dashboard.total, 14);
        assert_eq!(dashboard.completed, 1);
        assert_eq!(dashboard.in_progress, 1);
        assert_eq!(dashboard.not_started, 12);
        assert_eq!(dashboard.labs.len(), 14);
    }
}

//! # Quiz Engine
//!
//! Pure scoring of a learner's answers against a lab's question set.
//!
//! Scoring has no side effects and touches no storage: identical inputs
//! always produce an identical [`QuizResult`], so it can be tested in
//! isolation from the progress store.

use crate::{LabDefinition, LabId, LabtrackError, Score, UserId};
use serde::{Deserialize, Serialize};

/// A learner's answers for one lab, aligned by position to its questions.
///
/// Transient: only the summary of the resulting score is ever persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub user: UserId,
    pub lab: LabId,
    /// Selected choice index for each question, in question order.
    pub answers: Vec<usize>,
}

impl QuizSubmission {
    /// Create a new submission.
    #[must_use]
    pub fn new(user: UserId, lab: LabId, answers: Vec<usize>) -> Self {
        Self { user, lab, answers }
    }
}

/// Correctness of a single answer, with the feedback shown to the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub selected: usize,
    pub correct_choice: usize,
    pub is_correct: bool,
    pub explanation: String,
}

/// Outcome of scoring one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResult {
    pub correct_count: usize,
    pub question_count: usize,
    pub score: Score,
    /// `score >= threshold`, compared exactly.
    pub passed: bool,
    pub outcomes: Vec<QuestionOutcome>,
}

/// Stateless quiz scorer.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuizEngine;

impl QuizEngine {
    /// Score a submission against a lab definition.
    ///
    /// # Errors
    ///
    /// Returns `LabtrackError::MalformedSubmission` if:
    /// - The submission names a different lab
    /// - The answer count differs from the question count
    /// - A selected index is outside the question's choices
    ///
    /// No partial result is produced in any of these cases.
    pub fn score(
        lab: &LabDefinition,
        submission: &QuizSubmission,
    ) -> Result<QuizResult, LabtrackError> {
        if submission.lab != lab.id {
            return Err(LabtrackError::MalformedSubmission(format!(
                "submission is for lab '{}', scored against '{}'",
                submission.lab, lab.id
            )));
        }
        Self::score_answers(lab, &submission.answers)
    }

    /// Score a bare answer sequence against a lab definition.
    pub fn score_answers(
        lab: &LabDefinition,
        answers: &[usize],
    ) -> Result<QuizResult, LabtrackError> {
        let question_count = lab.questions.len();
        if answers.len() != question_count {
            return Err(LabtrackError::MalformedSubmission(format!(
                "expected {} answers, got {}",
                question_count,
                answers.len()
            )));
        }

        let mut outcomes = Vec::with_capacity(question_count);
        let mut correct_count: usize = 0;

        for (i, (question, &selected)) in lab.questions.iter().zip(answers).enumerate() {
            if selected >= question.choices.len() {
                return Err(LabtrackError::MalformedSubmission(format!(
                    "answer {} selects choice {} but question has {} choices",
                    i.saturating_add(1),
                    selected,
                    question.choices.len()
                )));
            }
            let is_correct = selected == question.correct;
            if is_correct {
                correct_count = correct_count.saturating_add(1);
            }
            outcomes.push(QuestionOutcome {
                selected,
                correct_choice: question.correct,
                is_correct,
                explanation: question.explanation.clone(),
            });
        }

        Ok(QuizResult {
            correct_count,
            question_count,
            score: Score::from_counts(correct_count, question_count),
            passed: lab.threshold.is_met_by(correct_count, question_count),
            outcomes,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

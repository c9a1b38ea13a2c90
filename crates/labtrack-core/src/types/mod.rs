//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the Labtrack engine:
//! - Identifiers (`LabId`, `UserId`)
//! - Fixed-point scores (`Score`) and timestamps (`Timestamp`)
//! - The persisted progression stages (`Stage`)
//! - Error types (`LabtrackError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (scores are basis points, never floats)
//! - Implement `Ord` for deterministic ordering in `BTreeMap`/`BTreeSet`

use crate::primitives::{
    DEFAULT_PASS_THRESHOLD_BPS, MAX_LAB_ID_LENGTH, MAX_USER_ID_LENGTH, SCORE_SCALE,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a lab in the catalog.
///
/// Lab ids are short slugs: lowercase ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabId(String);

impl LabId {
    /// Create a lab id, validating its shape.
    pub fn new(id: impl Into<String>) -> Result<Self, LabtrackError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_LAB_ID_LENGTH {
            return Err(LabtrackError::InvalidIdentifier(format!(
                "lab id must be 1..={} bytes, got {}",
                MAX_LAB_ID_LENGTH,
                id.len()
            )));
        }
        let valid = id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
        if !valid {
            return Err(LabtrackError::InvalidIdentifier(format!(
                "lab id '{}' contains characters outside [a-z0-9_-]",
                id
            )));
        }
        Ok(Self(id))
    }

    /// Parse a lab id named by an incoming request.
    ///
    /// A malformed id cannot name any catalog lab, so it is reported as
    /// `NotFound` rather than `InvalidIdentifier`.
    pub fn lookup(id: impl Into<String>) -> Result<Self, LabtrackError> {
        let id = id.into();
        Self::new(id.as_str()).map_err(|_| LabtrackError::NotFound { kind: "lab", id })
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque learner identity, as returned by the identity provider.
///
/// The engine never interprets it beyond requiring it to be non-empty,
/// bounded, and free of control characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create a user id, validating its bounds.
    pub fn new(id: impl Into<String>) -> Result<Self, LabtrackError> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_USER_ID_LENGTH {
            return Err(LabtrackError::InvalidIdentifier(format!(
                "user id must be 1..={} bytes, got {}",
                MAX_USER_ID_LENGTH,
                id.len()
            )));
        }
        if id.chars().any(char::is_control) {
            return Err(LabtrackError::InvalidIdentifier(
                "user id contains control characters".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SCORE (fixed-point fraction)
// =============================================================================

/// A fraction in `[0, 1]` stored as basis points (`0..=10000`).
///
/// Used both for quiz scores and for passing thresholds, so that the pass
/// decision is an exact integer comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Score(u16);

impl Score {
    /// Score of zero.
    pub const ZERO: Score = Score(0);

    /// Score of one (100%).
    pub const FULL: Score = Score(SCORE_SCALE);

    /// Passing threshold for labs that do not declare one (70%).
    pub const DEFAULT_THRESHOLD: Score = Score(DEFAULT_PASS_THRESHOLD_BPS);

    /// Create a score from basis points. Returns `None` above 10000.
    #[must_use]
    pub const fn from_bps(bps: u16) -> Option<Self> {
        if bps > SCORE_SCALE {
            None
        } else {
            Some(Self(bps))
        }
    }

    /// Score for `correct` out of `total`, rounded down to a basis point.
    ///
    /// A zero `total` yields `Score::ZERO`; callers guarantee `total > 0`.
    #[must_use]
    pub fn from_counts(correct: usize, total: usize) -> Self {
        if total == 0 {
            return Self::ZERO;
        }
        let correct = correct.min(total) as u64;
        let bps = correct.saturating_mul(SCORE_SCALE as u64) / total as u64;
        Self(bps as u16)
    }

    /// Raw basis points.
    #[must_use]
    pub const fn bps(self) -> u16 {
        self.0
    }

    /// Whether `correct / total >= self`, compared exactly (closed lower bound).
    #[must_use]
    pub fn is_met_by(self, correct: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        (correct as u64).saturating_mul(SCORE_SCALE as u64)
            >= (self.0 as u64).saturating_mul(total as u64)
    }
}

impl fmt::Display for Score {
    /// Renders as a percentage with two decimals, e.g. `70.00%`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Score {
    type Err = LabtrackError;

    /// Parse a decimal fraction such as `"0.7"`, `"0.70"`, `"1"` or `"0.8125"`.
    ///
    /// At most four fractional digits are accepted; anything above 1 is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LabtrackError::InvalidCatalog(format!("invalid fraction '{}'", s));
        let trimmed = s.trim();
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > 4 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let whole: u16 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };

        let mut frac_bps: u16 = 0;
        for (i, digit) in frac.bytes().enumerate() {
            let place = 10u16.pow(3 - i as u32);
            frac_bps = frac_bps.saturating_add(u16::from(digit - b'0').saturating_mul(place));
        }

        let bps = whole
            .checked_mul(SCORE_SCALE)
            .and_then(|w| w.checked_add(frac_bps))
            .ok_or_else(invalid)?;
        Self::from_bps(bps).ok_or_else(invalid)
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Seconds since the Unix epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Get the raw seconds value.
    #[must_use]
    pub const fn seconds(self) -> u64 {
        self.0
    }
}

// =============================================================================
// STAGE
// =============================================================================

/// Persisted progression stage of a (learner, lab) pair.
///
/// Stages are totally ordered; a record's stage never moves backwards.
/// Taking the quiz is a request, not a state: there is no persisted
/// "quiz in progress" stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotStarted,
    TheoryViewed,
    QuizPassed,
    ExerciseCompleted,
    CertificateIssued,
}

impl Stage {
    /// Human-readable stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::NotStarted => "Not Started",
            Stage::TheoryViewed => "Theory Viewed",
            Stage::QuizPassed => "Quiz Passed",
            Stage::ExerciseCompleted => "Exercise Completed",
            Stage::CertificateIssued => "Certificate Issued",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Labtrack engine.
///
/// - No silent failures
/// - Every rejected transition carries a reason distinguishable from success
/// - The engine never panics; all errors are recoverable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabtrackError {
    /// The named lab (or learner) does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A quiz submission does not line up with the lab's question set.
    #[error("Malformed submission: {0}")]
    MalformedSubmission(String),

    /// A transition was requested before its predecessor stage was reached.
    #[error("Stage guard violation: requires {required}, record is at {current}")]
    StageGuardViolation { required: Stage, current: Stage },

    /// The progress store failed or could not complete the write. Retryable.
    #[error("Progress store unavailable: {0}")]
    StoreUnavailable(String),

    /// The catalog source failed validation at load time.
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// A lab or user identifier is malformed.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The external certificate renderer failed.
    #[error("Certificate rendering failed: {0}")]
    RenderFailed(String),

    /// A configuration file could not be parsed or holds an invalid value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred outside the progress store.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl LabtrackError {
    /// Shorthand for an unknown lab.
    pub fn lab_not_found(lab: &LabId) -> Self {
        Self::NotFound {
            kind: "lab",
            id: lab.as_str().to_string(),
        }
    }

    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Stable machine-readable tag for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::MalformedSubmission(_) => "malformed_submission",
            Self::StageGuardViolation { .. } => "stage_guard_violation",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::InvalidCatalog(_) => "invalid_catalog",
            Self::InvalidIdentifier(_) => "invalid_identifier",
            Self::SerializationError(_) => "serialization_error",
            Self::RenderFailed(_) => "render_failed",
            Self::InvalidConfig(_) => "invalid_config",
            Self::IoError(_) => "io_error",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_id_rejects_uppercase_and_spaces() {
        assert!(LabId::new("bb84").is_ok());
        assert!(LabId::new("ghz_state").is_ok());
        assert!(LabId::new("BB84").is_err());
        assert!(LabId::new("bb 84").is_err());
        assert!(LabId::new("").is_err());
    }

    #[test]
    fn requested_lab_with_bad_shape_is_not_found() {
        assert_eq!(LabId::lookup("bb84").expect("lookup").as_str(), "bb84");
        assert_eq!(
            LabId::lookup("Bell State"),
            Err(LabtrackError::NotFound {
                kind: "lab",
                id: "Bell State".to_string()
            })
        );
        assert!(matches!(
            LabId::lookup("BB84"),
            Err(LabtrackError::NotFound { .. })
        ));
    }

    #[test]
    fn user_id_is_opaque_but_bounded() {
        assert!(UserId::new("64f1c0ffee").is_ok());
        assert!(UserId::new("alice@example.org").is_ok());
        assert!(UserId::new("").is_err());
        assert!(UserId::new("a\nb").is_err());
        assert!(UserId::new("x".repeat(MAX_USER_ID_LENGTH + 1)).is_err());
    }

    #[test]
    fn score_from_counts_rounds_down() {
        assert_eq!(Score::from_counts(7, 10).bps(), 7000);
        assert_eq!(Score::from_counts(2, 3).bps(), 6666);
        assert_eq!(Score::from_counts(5, 5), Score::FULL);
        assert_eq!(Score::from_counts(0, 0), Score::ZERO);
    }

    #[test]
    fn threshold_is_closed_lower_bound() {
        let threshold = Score::from_bps(7000).expect("valid");
        assert!(threshold.is_met_by(7, 10));
        assert!(!threshold.is_met_by(6, 10));
        // 2/3 is just below 0.6667 but above 0.6666
        let two_thirds = Score::from_bps(6667).expect("valid");
        assert!(!two_thirds.is_met_by(2, 3));
    }

    #[test]
    fn score_parses_decimal_fractions() {
        assert_eq!("0.70".parse::<Score>().expect("parse").bps(), 7000);
        assert_eq!("0.7".parse::<Score>().expect("parse").bps(), 7000);
        assert_eq!("1".parse::<Score>().expect("parse"), Score::FULL);
        assert_eq!("1.0".parse::<Score>().expect("parse"), Score::FULL);
        assert_eq!(".8125".parse::<Score>().expect("parse").bps(), 8125);
        assert_eq!("0".parse::<Score>().expect("parse"), Score::ZERO);
    }

    #[test]
    fn score_rejects_out_of_range_fractions() {
        assert!("1.01".parse::<Score>().is_err());
        assert!("2".parse::<Score>().is_err());
        assert!("-0.5".parse::<Score>().is_err());
        assert!("0.12345".parse::<Score>().is_err());
        assert!("abc".parse::<Score>().is_err());
        assert!(".".parse::<Score>().is_err());
    }

    #[test]
    fn score_display() {
        assert_eq!(Score::from_counts(8, 10).to_string(), "80.00%");
        assert_eq!(Score::from_counts(2, 3).to_string(), "66.66%");
    }

    #[test]
    fn stage_ordering() {
        assert!(Stage::NotStarted < Stage::TheoryViewed);
        assert!(Stage::TheoryViewed < Stage::QuizPassed);
        assert!(Stage::QuizPassed < Stage::ExerciseCompleted);
        assert!(Stage::ExerciseCompleted < Stage::CertificateIssued);
    }

    #[test]
    fn only_store_failures_are_retryable() {
        assert!(LabtrackError::StoreUnavailable("down".into()).is_retryable());
        assert!(
            !LabtrackError::StageGuardViolation {
                required: Stage::QuizPassed,
                current: Stage::TheoryViewed,
            }
            .is_retryable()
        );
    }
}

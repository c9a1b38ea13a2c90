//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Labtrack engine.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Fixed-point scale for scores and thresholds: 1.0 == 10000 basis points.
pub const SCORE_SCALE: u16 = 10_000;

/// Passing threshold used by labs that do not declare one (0.70).
pub const DEFAULT_PASS_THRESHOLD_BPS: u16 = 7_000;

/// Magic bytes for the Labtrack progress record header.
///
/// - Record Header = Magic Bytes ("LTRK") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"LTRK";

/// Current record serialization format version.
///
/// Increment this when making breaking changes to `ProgressRecord`.
pub const FORMAT_VERSION: u8 = 1;

/// Number of read-modify-write attempts a transition makes before giving up.
///
/// Each attempt is one read plus one compare-and-put; a conflict means another
/// writer committed to the same key in between. Bounded so that no transition
/// blocks indefinitely.
pub const MAX_TRANSITION_ATTEMPTS: usize = 16;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a lab id in bytes.
pub const MAX_LAB_ID_LENGTH: usize = 64;

/// Maximum length of a user id in bytes.
pub const MAX_USER_ID_LENGTH: usize = 128;

/// Maximum number of questions in a single lab quiz.
pub const MAX_QUESTIONS_PER_LAB: usize = 200;

/// Maximum number of choices for one question.
pub const MAX_CHOICES_PER_QUESTION: usize = 16;

/// Maximum number of labs in one catalog.
pub const MAX_CATALOG_LABS: usize = 1_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_is_seventy_percent() {
        assert_eq!(DEFAULT_PASS_THRESHOLD_BPS, 7_000);
        assert!(DEFAULT_PASS_THRESHOLD_BPS <= SCORE_SCALE);
    }

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"LTRK");
    }
}

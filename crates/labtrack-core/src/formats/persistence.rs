//! # Persistence Format
//!
//! Binary encoding of a [`ProgressRecord`] at rest.
//!
//! Format: Header (5 bytes) + postcard-serialized record.
//! - 4 bytes: Magic ("LTRK")
//! - 1 byte: Version
//!
//! The header and payload size are checked before the payload is decoded,
//! so a corrupted value surfaces as `SerializationError` rather than as a
//! partially decoded record.

use crate::{LabtrackError, ProgressRecord, primitives};

/// Maximum payload size of a single encoded record.
///
/// Records are small and fixed-shape; anything larger is corruption.
pub const MAX_RECORD_PAYLOAD_SIZE: usize = 4 * 1024;

/// Header size in bytes.
const HEADER_SIZE: usize = 5;

// =============================================================================
// RECORD HEADER
// =============================================================================

/// The header that precedes every stored record.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl RecordHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), LabtrackError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(LabtrackError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(LabtrackError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LabtrackError> {
        if bytes.len() < HEADER_SIZE {
            return Err(LabtrackError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for RecordHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a record to bytes (header + payload).
pub fn record_to_bytes(record: &ProgressRecord) -> Result<Vec<u8>, LabtrackError> {
    let payload = postcard::to_stdvec(record)
        .map_err(|e| LabtrackError::SerializationError(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE.saturating_add(payload.len()));
    bytes.extend_from_slice(&RecordHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a record from bytes, validating header and size first.
pub fn record_from_bytes(bytes: &[u8]) -> Result<ProgressRecord, LabtrackError> {
    let header = RecordHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[HEADER_SIZE..];
    if payload.len() > MAX_RECORD_PAYLOAD_SIZE {
        return Err(LabtrackError::SerializationError(format!(
            "Record payload {} bytes exceeds maximum {}",
            payload.len(),
            MAX_RECORD_PAYLOAD_SIZE
        )));
    }

    postcard::from_bytes(payload).map_err(|e| LabtrackError::SerializationError(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QuizAttempt, Score, Stage, Timestamp};

    #[test]
    fn encoded_record_starts_with_header() {
        let bytes = record_to_bytes(&ProgressRecord::default()).expect("encode");
        assert_eq!(&bytes[0..4], b"LTRK");
        assert_eq!(bytes[4], primitives::FORMAT_VERSION);
    }

    #[test]
    fn decodes_what_it_encodes() {
        let record = ProgressRecord {
            stage: Stage::QuizPassed,
            best_score: Score::from_bps(8000).expect("score"),
            passed: true,
            last_attempt: Some(QuizAttempt {
                score: Score::from_bps(8000).expect("score"),
                passed: true,
                at: Timestamp(1_700_000_000),
            }),
            attempts: 2,
            updated_at: Timestamp(1_700_000_000),
            revision: 3,
            ..ProgressRecord::default()
        };
        let bytes = record_to_bytes(&record).expect("encode");
        assert_eq!(record_from_bytes(&bytes).expect("decode"), record);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = record_to_bytes(&ProgressRecord::default()).expect("encode");
        bytes[0] = b'X';
        assert!(matches!(
            record_from_bytes(&bytes),
            Err(LabtrackError::SerializationError(_))
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = record_to_bytes(&ProgressRecord::default()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION.wrapping_add(1);
        assert!(record_from_bytes(&bytes).is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        assert!(record_from_bytes(b"LTR").is_err());
        let bytes = record_to_bytes(&ProgressRecord::default()).expect("encode");
        assert!(record_from_bytes(&bytes[..HEADER_SIZE]).is_err());
    }
}

//! # Certificate Gate
//!
//! Eligibility policy in front of the external certificate renderer.
//!
//! The gate never renders anything itself. It records the issuance through
//! the [`ProgressionEngine`], then hands the learner, the lab metadata and
//! the completion timestamp to a [`CertificateRenderer`]. The artifact
//! reference the renderer returns is passed back to the caller and not
//! stored.

use crate::{
    LabId, LabSummary, LabtrackError, ProgressRecord, ProgressionEngine, Score, Stage, Timestamp,
    UserId,
};
use serde::{Deserialize, Serialize};

/// Everything a renderer gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub user: UserId,
    pub lab: LabSummary,
    pub best_score: Score,
    /// First issuance time; unchanged on re-issue.
    pub completed_at: Timestamp,
}

/// Opaque reference to a rendered certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateArtifact {
    pub reference: String,
}

/// Capability that turns a completion into a certificate artifact.
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, request: &CertificateRequest) -> Result<CertificateArtifact, LabtrackError>;
}

/// A certificate that was issued and rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCertificate {
    pub record: ProgressRecord,
    pub artifact: CertificateArtifact,
    /// False when the certificate had already been issued.
    pub changed: bool,
}

/// Policy layer deciding whether a learner may receive a certificate.
#[derive(Debug, Clone, Copy)]
pub struct CertificateGate<'a> {
    engine: &'a ProgressionEngine,
}

impl<'a> CertificateGate<'a> {
    #[must_use]
    pub fn new(engine: &'a ProgressionEngine) -> Self {
        Self { engine }
    }

    /// Whether the learner has passed the lab's quiz.
    ///
    /// Read-only. Fails with `NotFound` for a lab absent from the catalog.
    pub fn is_eligible(&self, user: &UserId, lab: &LabId) -> Result<bool, LabtrackError> {
        Ok(self.engine.progress(user, lab)?.passed)
    }

    /// Issue the certificate and render it.
    ///
    /// The issuance is recorded before rendering. If the renderer fails the
    /// record stays at `CertificateIssued` and a later call renders again.
    pub fn issue(
        &self,
        user: &UserId,
        lab: &LabId,
        renderer: &dyn CertificateRenderer,
    ) -> Result<IssuedCertificate, LabtrackError> {
        let outcome = self.engine.issue_certificate(user, lab)?;
        let record = outcome.record;
        if !record.passed {
            return Err(LabtrackError::StageGuardViolation {
                required: Stage::QuizPassed,
                current: record.stage,
            });
        }

        let summary = self.engine.catalog().get(lab)?.summary();
        let request = CertificateRequest {
            user: user.clone(),
            lab: summary,
            best_score: record.best_score,
            completed_at: record.certificate_issued_at.unwrap_or(record.updated_at),
        };
        let artifact = renderer.render(&request)?;
        Ok(IssuedCertificate {
            record,
            artifact,
            changed: outcome.changed,
        })
    }
}

// =============================================================================
// DIGEST RENDERER
// =============================================================================

/// Renderer that derives a stable reference from the certificate contents.
///
/// The same completion always yields the same reference, so re-issuing is
/// idempotent from the caller's point of view.
///
/// # Requires
///
/// This renderer is only available with the `crypto-hash` feature enabled.
#[cfg(feature = "crypto-hash")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestCertificateRenderer;

#[cfg(feature = "crypto-hash")]
impl CertificateRenderer for DigestCertificateRenderer {
    fn render(&self, request: &CertificateRequest) -> Result<CertificateArtifact, LabtrackError> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(request.user.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(request.lab.id.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&request.best_score.bps().to_le_bytes());
        hasher.update(&request.completed_at.seconds().to_le_bytes());
        Ok(CertificateArtifact {
            reference: format!("ltrk-cert-{}", hasher.finalize().to_hex()),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

// =============================================================================
// EvidenceExtractor — turns a raw evidence artifact into structured fields
// =============================================================================
//
// A second async collaborator trait alongside `Store`, same `async_trait`
// shape as `vault/execution.rs`'s `ExecutionAdapter`. The engine never
// inspects an artifact's raw reference itself — extraction (parsing an
// invoice PDF, resolving a webhook payload, OCR'ing a screenshot) is out of
// scope and delegated entirely to whatever implementation is wired in.
// =============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Extracted, EvidenceArtifact};

#[async_trait]
pub trait EvidenceExtractor: Send + Sync {
    /// Pull structured fields (amounts, dates, entities, flags) out of an
    /// evidence artifact's raw reference. Any failure is reported through the
    /// ordinary `Result` channel as `EngineError::Extraction`, never panics.
    async fn extract(&self, artifact: &EvidenceArtifact) -> Result<Extracted>;
}

/// Extractor that performs no parsing and returns the artifact untouched.
/// Useful for tests and for evidence types (e.g. `manual_review_note`) that
/// carry no extractable structure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExtractor;

#[async_trait]
impl EvidenceExtractor for NoopExtractor {
    async fn extract(&self, _artifact: &EvidenceArtifact) -> Result<Extracted> {
        Ok(Extracted::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EvidenceType, VerificationTier};
    use chrono::Utc;

    #[tokio::test]
    async fn noop_extractor_returns_empty() {
        let extractor = NoopExtractor;
        let artifact = EvidenceArtifact {
            id: "e1".into(),
            subject_id: "s1".into(),
            action_id: None,
            evidence_type: EvidenceType::ManualReviewNote,
            reference: "ref".into(),
            extracted: None,
            tier: VerificationTier::Unverified,
            confidence: 0.5,
            created_at: Utc::now(),
        };
        let extracted = extractor.extract(&artifact).await.unwrap();
        assert!(extracted.flags.is_empty());
        assert!(extracted.amounts.is_none());
    }
}

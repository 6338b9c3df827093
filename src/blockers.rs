// =============================================================================
// BlockerEngine — five named rules gating trust in a subject's score
// =============================================================================
//
// Each rule evaluates independently against the current feature set and the
// delta pass's top movers — no actions, no verification states, nothing but
// what the features themselves (and their raw flags) say — fires at most
// once per call, and is appended in declaration order. Same shape as
// `risk.rs`'s four circuit breakers, generalised from a single pass/fail gate
// to a list of simultaneously-active blocking factors with message and
// fix-path.
// =============================================================================

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::feature_algebra::freshness;
use crate::model::{BlockerSeverity, BlockingFactor, Feature, FeatureContribution, FeatureId};

/// Below this mean verification over [`FeatureId::IDENTITY`] the identity
/// claim counts as unverified.
const IDENTITY_VERIFICATION_FLOOR: f64 = 0.35;

/// Below this freshness a weight-2-or-above feature opens a `recency_gap`.
const RECENCY_FRESHNESS_FLOOR: f64 = 0.4;

/// Feature weight at or above which staleness can open `recency_gap`.
const RECENCY_WEIGHT_FLOOR: f64 = 2.0;

/// A top-mover whose verification stayed below this, with a swing past
/// [`EVIDENCE_DELTA_FLOOR`], counts as insufficiently evidenced.
const EVIDENCE_VERIFICATION_FLOOR: f64 = 0.35;
const EVIDENCE_DELTA_FLOOR: f64 = 1.5;

const INCONSISTENT_CLAIMS_FLAG: &str = "inconsistent_claims";
const MISSING_REQUIRED_CONNECTOR_FLAG: &str = "missing_required_connector";

pub struct BlockerInputs<'a> {
    pub features: &'a std::collections::HashMap<FeatureId, Feature>,
    pub top_movers: &'a [FeatureContribution],
    pub as_of: DateTime<Utc>,
}

/// Evaluate all five rules against `inputs`, returning the active blockers in
/// declaration order. A rule that does not apply contributes nothing; a rule
/// never contributes more than one [`BlockingFactor`].
pub fn evaluate(inputs: &BlockerInputs<'_>, config: &EngineConfig) -> Vec<BlockingFactor> {
    let mut blockers = Vec::new();

    if let Some(b) = identity_not_verified(inputs) {
        blockers.push(b);
    }
    if let Some(b) = evidence_insufficient(inputs) {
        blockers.push(b);
    }
    if let Some(b) = recency_gap(inputs, config) {
        blockers.push(b);
    }
    if let Some(b) = inconsistency_detected(inputs) {
        blockers.push(b);
    }
    if let Some(b) = missing_required_connectors(inputs) {
        blockers.push(b);
    }

    blockers
}

fn identity_not_verified(inputs: &BlockerInputs<'_>) -> Option<BlockingFactor> {
    let verifications: Vec<f64> = FeatureId::IDENTITY
        .iter()
        .map(|id| inputs.features.get(id).map(|f| f.verification).unwrap_or(0.0))
        .collect();
    let mean = verifications.iter().sum::<f64>() / verifications.len() as f64;

    if mean >= IDENTITY_VERIFICATION_FLOOR {
        return None;
    }

    Some(BlockingFactor {
        blocker_id: crate::model::BlockerId::IdentityNotVerified,
        severity: BlockerSeverity::Hard,
        message: format!(
            "mean identity verification ({mean:.2}) is below the {IDENTITY_VERIFICATION_FLOOR:.2} floor"
        ),
        fix_path: "connect an identity-verifying connector (e.g. stripe, hubspot) for the affected features".into(),
        affected_features: FeatureId::IDENTITY.to_vec(),
    })
}

fn evidence_insufficient(inputs: &BlockerInputs<'_>) -> Option<BlockingFactor> {
    let affected: Vec<FeatureId> = inputs
        .top_movers
        .iter()
        .filter(|c| c.next.verification < EVIDENCE_VERIFICATION_FLOOR && c.delta.abs() > EVIDENCE_DELTA_FLOOR)
        .map(|c| c.feature_id)
        .collect();

    if affected.is_empty() {
        return None;
    }

    Some(BlockingFactor {
        blocker_id: crate::model::BlockerId::EvidenceInsufficient,
        severity: BlockerSeverity::Soft,
        message: format!(
            "{} top-moving feature(s) swung sharply without enough verification to back it up",
            affected.len()
        ),
        fix_path: "submit the outstanding evidence listed in each action's verification plan".into(),
        affected_features: affected,
    })
}

fn recency_gap(inputs: &BlockerInputs<'_>, config: &EngineConfig) -> Option<BlockingFactor> {
    let half_life = config.effective_half_life();

    let any_weighty_stale = inputs.features.values().any(|f| {
        f.weight >= RECENCY_WEIGHT_FLOOR && freshness(f.measured_at, inputs.as_of, half_life) < RECENCY_FRESHNESS_FLOOR
    });
    if !any_weighty_stale {
        return None;
    }

    let stale: Vec<FeatureId> = inputs
        .features
        .values()
        .filter(|f| freshness(f.measured_at, inputs.as_of, half_life) < RECENCY_FRESHNESS_FLOOR)
        .map(|f| f.feature_id)
        .collect();

    Some(BlockingFactor {
        blocker_id: crate::model::BlockerId::RecencyGap,
        severity: BlockerSeverity::Soft,
        message: format!(
            "{} feature(s) have not been refreshed recently enough to stay fresh",
            stale.len()
        ),
        fix_path: "submit a new measurement or supporting action for the affected features".into(),
        affected_features: stale,
    })
}

fn inconsistency_detected(inputs: &BlockerInputs<'_>) -> Option<BlockingFactor> {
    let flagged: Vec<FeatureId> = inputs
        .features
        .values()
        .filter(|f| f.raw.flags.iter().any(|flag| flag == INCONSISTENT_CLAIMS_FLAG))
        .map(|f| f.feature_id)
        .collect();

    if flagged.is_empty() {
        return None;
    }

    Some(BlockingFactor {
        blocker_id: crate::model::BlockerId::InconsistencyDetected,
        severity: BlockerSeverity::Hard,
        message: format!("{} feature(s) carry an unresolved inconsistent-claims flag", flagged.len()),
        fix_path: "resolve the inconsistency by confirming or retracting the affected action(s)".into(),
        affected_features: flagged,
    })
}

fn missing_required_connectors(inputs: &BlockerInputs<'_>) -> Option<BlockingFactor> {
    let flagged: Vec<FeatureId> = inputs
        .features
        .values()
        .filter(|f| f.raw.flags.iter().any(|flag| flag == MISSING_REQUIRED_CONNECTOR_FLAG))
        .map(|f| f.feature_id)
        .collect();

    if flagged.is_empty() {
        return None;
    }

    Some(BlockingFactor {
        blocker_id: crate::model::BlockerId::MissingRequiredConnectors,
        severity: BlockerSeverity::Soft,
        message: format!("{} feature(s) are missing a required connector integration", flagged.len()),
        fix_path: "connect the integration(s) named in the action's verification plan".into(),
        affected_features: flagged,
    })
}

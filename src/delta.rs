// =============================================================================
// DeltaComputer — per-feature contribution deltas, totals, top-movers
// =============================================================================
//
// Pure, deterministic, time-free beyond the single `as_of` instant both
// sides are evaluated at: given the same two feature maps and the same
// `as_of`, the output is byte-identical. Structured the way
// `signals/weighted_score.rs`'s `WeightedScorer::score` builds up a vector of
// per-signal contributions before reducing to a total, generalised to a
// two-sided (prev/next) comparison.
// =============================================================================

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::config::EngineConfig;
use crate::feature_algebra::resolve_parts;
use crate::model::{ChangeReason, DeltaResult, Feature, FeatureContribution, FeatureId, FeatureParts};

const CHANGE_EPSILON: f64 = 0.05;
const WEIGHT_EPSILON: f64 = 1e-6;

fn parts_for(feature: Option<&Feature>, as_of: DateTime<Utc>, half_life_days: f64) -> FeatureParts {
    match feature {
        Some(f) => resolve_parts(f, as_of, half_life_days),
        None => FeatureParts::ZERO,
    }
}

fn change_reasons(
    prev: Option<&Feature>,
    next: Option<&Feature>,
    prev_parts: FeatureParts,
    next_parts: FeatureParts,
) -> Vec<ChangeReason> {
    match (prev, next) {
        (None, Some(_)) => vec![ChangeReason::NewFeatureAdded],
        (Some(_), None) => vec![ChangeReason::FeatureRemoved],
        (Some(_), Some(_)) => {
            let mut reasons = Vec::new();
            if (next_parts.norm - prev_parts.norm).abs() > CHANGE_EPSILON {
                reasons.push(ChangeReason::SignalStrengthChanged);
            }
            if (next_parts.confidence - prev_parts.confidence).abs() > CHANGE_EPSILON {
                reasons.push(ChangeReason::ConfidenceChanged);
            }
            if (next_parts.verification - prev_parts.verification).abs() > CHANGE_EPSILON {
                reasons.push(ChangeReason::VerificationChanged);
            }
            if (next_parts.freshness - prev_parts.freshness).abs() > CHANGE_EPSILON {
                reasons.push(ChangeReason::FreshnessChanged);
            }
            if (next_parts.weight - prev_parts.weight).abs() > WEIGHT_EPSILON {
                reasons.push(ChangeReason::WeightChanged);
            }
            reasons
        }
        (None, None) => Vec::new(),
    }
}

/// Compute the full delta decomposition between `prev_features` (frozen at
/// `prev_as_of`, the prior snapshot's own `as_of`) and `next_features`
/// (evaluated at `next_as_of`, normally "now"). Evaluating each side at its
/// own instant is what lets `deltaTotal` move from freshness decay alone,
/// even when not a single feature row changed between snapshots.
pub fn compute(
    prev_features: &HashMap<FeatureId, Feature>,
    prev_as_of: DateTime<Utc>,
    next_features: &HashMap<FeatureId, Feature>,
    next_as_of: DateTime<Utc>,
    config: &EngineConfig,
) -> DeltaResult {
    let half_life = config.effective_half_life();

    let mut ids: BTreeSet<FeatureId> = BTreeSet::new();
    ids.extend(prev_features.keys().copied());
    ids.extend(next_features.keys().copied());

    let mut contributions: Vec<FeatureContribution> = ids
        .into_iter()
        .map(|feature_id| {
            let prev = prev_features.get(&feature_id);
            let next = next_features.get(&feature_id);
            let prev_parts = parts_for(prev, prev_as_of, half_life);
            let next_parts = parts_for(next, next_as_of, half_life);
            let delta = next_parts.contribution - prev_parts.contribution;
            let reasons = change_reasons(prev, next, prev_parts, next_parts);

            FeatureContribution {
                feature_id,
                prev: prev_parts,
                next: next_parts,
                delta,
                reasons,
            }
        })
        .collect();

    // Deterministic order: by feature_id (BTreeSet already sorted it going in,
    // `contributions` preserves that insertion order).
    let prev_total_raw: f64 = contributions.iter().map(|c| c.prev.contribution).sum();
    let next_total_raw: f64 = contributions.iter().map(|c| c.next.contribution).sum();
    let prev_total = prev_total_raw.clamp(config.clamp_min, config.clamp_max);
    let next_total = next_total_raw.clamp(config.clamp_min, config.clamp_max);
    let delta_total = next_total - prev_total;

    // Top movers: sort a copy by |delta| descending, tie-break by feature_id
    // lexicographic (Display order), stable.
    let mut by_magnitude = contributions.clone();
    by_magnitude.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.feature_id.to_string().cmp(&b.feature_id.to_string()))
    });
    let top_movers = by_magnitude.into_iter().take(config.top_n).collect();

    // contributions[] uses the same sorted-by-|delta| order as top_movers.
    contributions.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.feature_id.to_string().cmp(&b.feature_id.to_string()))
    });

    DeltaResult {
        prev_total,
        next_total,
        delta_total,
        contributions,
        top_movers,
    }
}

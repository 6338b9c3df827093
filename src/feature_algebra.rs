// =============================================================================
// FeatureAlgebra — pure math: freshness decay, contribution, verification
// tiers. No I/O, no time source beyond the two instants it's handed.
// =============================================================================
//
// The half-life decay shape mirrors `signals/signal_decay.rs`'s
// `SignalDecayManager` (`(-elapsed * ln(2) / half_life).exp()`), generalised
// from a single "strength" scalar to the five-factor contribution formula
// below.
// =============================================================================

use chrono::{DateTime, Utc};

use crate::model::{Feature, FeatureParts, VerificationTier};

/// Clamp `x` to `[0, 1]`.
pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// `fresh(updatedAt, asOf, halfLife) = clamp01(exp(-ln(2) * ageDays / halfLife))`.
/// `ageDays` is clamped non-negative; `halfLife` is floored at `1e-6`.
pub fn freshness(updated_at: DateTime<Utc>, as_of: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = (as_of - updated_at).num_milliseconds() as f64 / 86_400_000.0;
    let age_days = age_days.max(0.0);
    let half_life = half_life_days.max(1e-6);
    clamp01((-std::f64::consts::LN_2 * age_days / half_life).exp())
}

/// The five resolved factors plus contribution, for a feature row present at
/// `as_of`. `weight` is taken as-is (not clamped); the rest are clamped to
/// `[0,1]` individually before multiplying.
pub fn resolve_parts(feature: &Feature, as_of: DateTime<Utc>, half_life_days: f64) -> FeatureParts {
    let weight = feature.weight;
    let norm = clamp01(feature.norm);
    let confidence = clamp01(feature.confidence);
    let verification = clamp01(feature.verification);
    let fresh = freshness(feature.measured_at, as_of, half_life_days);
    let contribution = weight * norm * confidence * verification * fresh;

    FeatureParts {
        weight,
        norm,
        confidence,
        verification,
        freshness: fresh,
        contribution,
    }
}

/// Verification multiplier for a tier; callers normally go through
/// `EngineConfig::verification_multiplier` so config overrides win, this is
/// the fallback table itself.
pub fn default_verification_multiplier(tier: VerificationTier) -> f64 {
    match tier {
        VerificationTier::Unverified => 0.20,
        VerificationTier::SoftVerified => 0.45,
        VerificationTier::Verified => 0.85,
        VerificationTier::Trusted => 1.0,
    }
}

/// Tier from a verification scalar (strict thresholds, lower-bound
/// inclusive). `trusted` is never inferred — only reachable by the
/// caller-driven `upgradeVerification` path.
pub fn tier_from_verification(verification: f64) -> VerificationTier {
    if verification >= 0.85 {
        VerificationTier::Verified
    } else if verification >= 0.45 {
        VerificationTier::SoftVerified
    } else {
        VerificationTier::Unverified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeatureId;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn freshness_is_one_at_zero_age() {
        let t = now();
        assert!((freshness(t, t, 14.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn freshness_is_half_at_exactly_half_life() {
        let t = now();
        let as_of = t + Duration::days(14);
        assert!((freshness(t, as_of, 14.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn freshness_monotonicity_law() {
        let t = now();
        let fresher = freshness(t, t + Duration::days(1), 14.0);
        let staler = freshness(t, t + Duration::days(5), 14.0);
        assert!(fresher > staler);
    }

    #[test]
    fn freshness_never_negative_for_future_measured_at() {
        // measured_at after as_of would make age negative; spec clamps ageDays >= 0.
        let t = now();
        let as_of = t - Duration::days(3);
        assert!((freshness(t, as_of, 14.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn contribution_matches_half_life_seed_scenario() {
        // Seed scenario 4: measured_at = now - 14d, norm=1, weight=1, confidence=1, verification=1.
        let t = now();
        let feature = Feature {
            subject_id: "s1".into(),
            feature_id: FeatureId::Traction,
            measured_at: t - Duration::days(14),
            raw: Default::default(),
            norm: 1.0,
            weight: 1.0,
            confidence: 1.0,
            verification: 1.0,
            verification_tier: VerificationTier::Verified,
            evidence_refs: vec![],
        };
        let parts = resolve_parts(&feature, t, 14.0);
        assert!((parts.contribution - 0.5).abs() < 1e-6);
    }

    #[test]
    fn contribution_bounded_by_weight() {
        let t = now();
        let feature = Feature::defaulted("s1", FeatureId::Traction, t);
        let parts = resolve_parts(&feature, t, 14.0);
        assert!(parts.contribution >= 0.0);
        assert!(parts.contribution <= parts.weight);
    }

    #[test]
    fn tier_thresholds_are_lower_bound_inclusive() {
        assert_eq!(tier_from_verification(0.85), VerificationTier::Verified);
        assert_eq!(tier_from_verification(0.8499), VerificationTier::SoftVerified);
        assert_eq!(tier_from_verification(0.45), VerificationTier::SoftVerified);
        assert_eq!(tier_from_verification(0.4499), VerificationTier::Unverified);
    }

    #[test]
    fn tier_verification_consistency_law() {
        for tier in [
            VerificationTier::Unverified,
            VerificationTier::SoftVerified,
            VerificationTier::Verified,
        ] {
            let v = default_verification_multiplier(tier);
            assert_eq!(tier_from_verification(v), tier);
        }
        // `trusted` is not inferable from its multiplier (1.0 maps to `verified`).
        assert_eq!(
            tier_from_verification(default_verification_multiplier(VerificationTier::Trusted)),
            VerificationTier::Verified
        );
    }
}

// =============================================================================
// SnapshotStore — append-only recompute producing exactly one new snapshot
// =============================================================================
//
// `recompute` is the one place that reads the current feature set, runs the
// delta and blocker passes, and appends an immutable `ScoreSnapshot`. It never
// mutates a prior snapshot and never leaves a half-written one behind: the
// append either lands as a whole new row or the call fails with no store
// mutation at all (`InMemoryStore::append_snapshot`'s predecessor check is
// the concurrency guard).
// =============================================================================

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::blockers::{self, BlockerInputs};
use crate::config::EngineConfig;
use crate::delta;
use crate::error::Result;
use crate::feature_algebra::resolve_parts;
use crate::model::{AggregateMeans, BlockerId, BlockingFactor, ScoreSnapshot, Trigger};
use crate::store::Store;

fn aggregate_means(
    features: &std::collections::HashMap<crate::model::FeatureId, crate::model::Feature>,
    as_of: DateTime<Utc>,
    half_life_days: f64,
) -> AggregateMeans {
    if features.is_empty() {
        return AggregateMeans {
            avg_confidence: 0.5,
            avg_verification: 0.2,
            avg_freshness: 1.0,
        };
    }
    let n = features.len() as f64;
    let mut sum_confidence = 0.0;
    let mut sum_verification = 0.0;
    let mut sum_freshness = 0.0;
    for feature in features.values() {
        let parts = resolve_parts(feature, as_of, half_life_days);
        sum_confidence += parts.confidence;
        sum_verification += parts.verification;
        sum_freshness += parts.freshness;
    }
    AggregateMeans {
        avg_confidence: sum_confidence / n,
        avg_verification: sum_verification / n,
        avg_freshness: sum_freshness / n,
    }
}

/// Idempotently refresh the active-blocker projection: every blocker id in
/// `current` is upserted active, every previously-active row not in
/// `current` is upserted resolved. Safe to call twice with the same inputs.
async fn refresh_active_blockers(
    store: &dyn Store,
    subject_id: &str,
    current: &[BlockingFactor],
    as_of: DateTime<Utc>,
) -> Result<()> {
    let previously_active = store.list_active_blockers(subject_id).await?;
    let current_ids: std::collections::HashSet<BlockerId> = current.iter().map(|b| b.blocker_id).collect();

    for blocker in current {
        store
            .upsert_active_blocker(crate::model::ActiveBlockerRow {
                subject_id: subject_id.to_string(),
                blocker_id: blocker.blocker_id,
                severity: blocker.severity,
                message: blocker.message.clone(),
                fix_path: blocker.fix_path.clone(),
                affected_features: blocker.affected_features.clone(),
                is_active: true,
                updated_at: as_of,
                resolved_at: None,
            })
            .await?;
    }

    for row in previously_active {
        if row.is_active && !current_ids.contains(&row.blocker_id) {
            store
                .upsert_active_blocker(crate::model::ActiveBlockerRow {
                    is_active: false,
                    resolved_at: Some(as_of),
                    updated_at: as_of,
                    ..row
                })
                .await?;
        }
    }

    Ok(())
}

/// Recompute and append a new snapshot for `subject_id`.
///
/// `canonical_delta` is the already-computed adjustment to apply on top of
/// the previous snapshot's `canonical_total` (the GOD-adjustment formula
/// lives in the verification orchestrator, not here); pass `0.0` for
/// a plain system recompute that only moves the fast Signal score.
pub async fn recompute(
    store: &dyn Store,
    config: &EngineConfig,
    subject_id: &str,
    trigger: Trigger,
    as_of: DateTime<Utc>,
    canonical_delta: f64,
) -> Result<ScoreSnapshot> {
    let current_features = store.latest_features(subject_id).await?;
    let prev_snapshot = store.latest_snapshot(subject_id).await?;
    let prev_features = prev_snapshot
        .as_ref()
        .map(|s| s.features.clone())
        .unwrap_or_default();
    // A fresh subject has no prior instant to freeze at; fall back to `as_of`
    // so the first recompute's delta is purely feature-driven.
    let prev_as_of = prev_snapshot.as_ref().map(|s| s.as_of).unwrap_or(as_of);
    let prev_canonical = prev_snapshot.as_ref().map(|s| s.canonical_total).unwrap_or(0.0);
    let prev_snapshot_id = prev_snapshot.as_ref().map(|s| s.id.clone());

    let half_life = config.effective_half_life();
    let delta_result = delta::compute(&prev_features, prev_as_of, &current_features, as_of, config);

    let blocker_inputs = BlockerInputs {
        features: &current_features,
        top_movers: &delta_result.top_movers,
        as_of,
    };
    let blockers = blockers::evaluate(&blocker_inputs, config);

    let means = aggregate_means(&current_features, as_of, half_life);

    // `canonical_delta` is the only thing that ever moves Canonical — a plain
    // system sweep or a provisional lift always passes `0.0` here, so
    // `canonical_total` lands exactly on `prev_canonical` for those triggers.
    // Any hard-blocker penalty is folded into `canonical_delta` by the caller
    // (see `verification::orchestrator::god_adjustment`) rather than applied
    // unconditionally here, or every recompute — not just a verified lift —
    // would erode Canonical.
    let signal_total = delta_result.next_total;
    let canonical_total = (prev_canonical + canonical_delta).clamp(config.clamp_min, config.clamp_max);

    let snapshot = ScoreSnapshot {
        id: Uuid::new_v4().to_string(),
        subject_id: subject_id.to_string(),
        as_of,
        features: current_features,
        signal_total,
        canonical_total,
        means,
        delta: delta_result,
        blockers: blockers.clone(),
        trigger,
        prev_snapshot_id,
    };

    store.append_snapshot(snapshot.clone()).await?;
    refresh_active_blockers(store, subject_id, &blockers, as_of).await?;

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Feature, FeatureId};
    use crate::store::memory::InMemoryStore;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn first_recompute_has_no_predecessor() {
        let store = InMemoryStore::new();
        store
            .append_feature(Feature::defaulted("s1", FeatureId::Traction, t0()))
            .await
            .unwrap();
        let config = EngineConfig::default();
        let snap = recompute(&store, &config, "s1", Trigger::System, t0(), 0.0).await.unwrap();
        assert!(snap.prev_snapshot_id.is_none());
        assert_eq!(snap.canonical_total, 0.0);
    }

    #[tokio::test]
    async fn chained_recompute_links_prev_snapshot_id() {
        let store = InMemoryStore::new();
        store
            .append_feature(Feature::defaulted("s1", FeatureId::Traction, t0()))
            .await
            .unwrap();
        let config = EngineConfig::default();
        let first = recompute(&store, &config, "s1", Trigger::System, t0(), 0.0).await.unwrap();
        let second = recompute(&store, &config, "s1", Trigger::System, t0() + chrono::Duration::days(1), 0.0)
            .await
            .unwrap();
        assert_eq!(second.prev_snapshot_id, Some(first.id));
    }

    #[tokio::test]
    async fn canonical_total_only_moves_by_explicit_delta() {
        let store = InMemoryStore::new();
        let config = EngineConfig::default();
        // Verified identity features so no hard blocker penalises canonical_total.
        store
            .append_feature({
                let mut f = Feature::defaulted("s1", FeatureId::Traction, t0());
                f.verification = 0.9;
                f
            })
            .await
            .unwrap();
        store
            .append_feature({
                let mut f = Feature::defaulted("s1", FeatureId::FounderVelocity, t0());
                f.verification = 0.9;
                f
            })
            .await
            .unwrap();
        let first = recompute(&store, &config, "s1", Trigger::System, t0(), 5.0).await.unwrap();
        assert_eq!(first.canonical_total, 5.0);
        let second = recompute(&store, &config, "s1", Trigger::System, t0() + chrono::Duration::days(1), 0.0)
            .await
            .unwrap();
        assert_eq!(second.canonical_total, 5.0);
    }

    #[tokio::test]
    async fn active_blocker_projection_resolves_when_blocker_clears() {
        let store = InMemoryStore::new();
        let config = EngineConfig::default();
        // No identity features at all -> identity_not_verified fires.
        let first = recompute(&store, &config, "s1", Trigger::System, t0(), 0.0).await.unwrap();
        assert!(!first.blockers.is_empty());
        let active = store.list_active_blockers("s1").await.unwrap();
        assert!(!active.is_empty());

        // Add verified identity features -> blocker should clear next recompute.
        store
            .append_feature({
                let mut f = Feature::defaulted("s1", FeatureId::Traction, t0());
                f.verification = 0.9;
                f
            })
            .await
            .unwrap();
        store
            .append_feature({
                let mut f = Feature::defaulted("s1", FeatureId::FounderVelocity, t0());
                f.verification = 0.9;
                f
            })
            .await
            .unwrap();
        recompute(&store, &config, "s1", Trigger::System, t0() + chrono::Duration::days(1), 0.0)
            .await
            .unwrap();
        let active = store.list_active_blockers("s1").await.unwrap();
        assert!(active.iter().all(|b| b.blocker_id != BlockerId::IdentityNotVerified));
    }
}

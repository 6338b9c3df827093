// =============================================================================
// VerificationOrchestrator — the founder-action / evidence state machine
// =============================================================================
//
// Drives `pending -> provisional_applied -> verified`, with a parallel
// inconsistency path. Every state change is followed by exactly one
// `snapshot_store::recompute` call so the Signal/Canonical pair never drifts
// out of sync with the underlying feature rows.
// =============================================================================

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{action_feature_map, EngineConfig};
use crate::error::{EngineError, Result};
use crate::extractor::EvidenceExtractor;
use crate::feature_algebra::tier_from_verification;
use crate::model::{
    ActionEvent, ActionFields, ActionStatus, ActionSubmission, ActionType, DeltaResult, EvidenceArtifact,
    EvidenceSubmission, Feature, FeatureContribution, FeatureId, ImpactGuess, InconsistencyResolution, NextSteps,
    RawPayload, ScoreSnapshot, Trigger, VerificationState, VerificationTier,
};
use crate::snapshot_store;
use crate::store::Store;

use super::matching;
use super::plan;

const INCONSISTENT_CLAIMS_FLAG: &str = "inconsistent_claims";

/// Fixed additive verification boost granted per evidence type on a match,
/// independent of match score or confidence.
fn verification_boost(evidence_type: crate::model::EvidenceType) -> f64 {
    use crate::model::EvidenceType as E;
    match evidence_type {
        E::OauthConnector => 0.30,
        E::WebhookEvent => 0.25,
        E::DocumentUpload => 0.20,
        E::BankTransaction => 0.35,
        E::PublicLink => 0.10,
        E::Screenshot => 0.05,
        E::EmailProof => 0.10,
        E::ManualReviewNote => 0.15,
    }
}

/// Fixed verification boost applied on a resolved inconsistency.
const INCONSISTENCY_RESOLUTION_BOOST: f64 = 0.20;

pub struct SubmitActionInput {
    pub subject_id: String,
    pub actor: Option<String>,
    pub action_type: ActionType,
    pub title: String,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
    pub impact_guess: ImpactGuess,
    pub fields: ActionFields,
}

pub struct SubmitEvidenceInput {
    pub subject_id: String,
    pub action_id: Option<String>,
    pub evidence_type: crate::model::EvidenceType,
    pub reference: String,
    pub confidence: f64,
}

pub struct VerificationOrchestrator<'a> {
    store: &'a dyn Store,
    extractor: &'a dyn EvidenceExtractor,
    config: &'a EngineConfig,
}

impl<'a> VerificationOrchestrator<'a> {
    pub fn new(store: &'a dyn Store, extractor: &'a dyn EvidenceExtractor, config: &'a EngineConfig) -> Self {
        Self { store, extractor, config }
    }

    /// Intake a founder-claimed action: derive its plan, persist it as
    /// `pending`, and attempt an immediate provisional lift. Intake itself
    /// (plan derivation + the initial `upsert_action`) either fully succeeds
    /// or returns an error with nothing written; the provisional lift that
    /// follows is a best-effort second step — if it fails the action is left
    /// `pending` and a later `submitEvidence`/retry can still bring it to
    /// `provisional_applied`.
    pub async fn submit_action(&self, input: SubmitActionInput, now: DateTime<Utc>) -> Result<ActionSubmission> {
        let verification_plan = plan::derive(input.action_type, input.impact_guess, &input.fields);
        let deadline = input.occurred_at + chrono::Duration::days(verification_plan.verification_window_days);
        let next_steps = NextSteps {
            requirements: verification_plan.requirements.clone(),
            deadline,
        };

        let action = ActionEvent {
            id: Uuid::new_v4().to_string(),
            subject_id: input.subject_id.clone(),
            actor: input.actor,
            action_type: input.action_type,
            title: input.title,
            details: input.details,
            occurred_at: input.occurred_at,
            submitted_at: now,
            impact_guess: input.impact_guess,
            fields: input.fields,
            verification_plan,
            status: ActionStatus::Pending,
            provisional_delta_id: None,
            verified_delta_id: None,
        };
        self.store.upsert_action(action.clone()).await?;

        let initial_state = VerificationState {
            action_id: action.id.clone(),
            current_verification: 0.2,
            tier: VerificationTier::Unverified,
            satisfied: false,
            missing: action.verification_plan.requirements.clone(),
            matched_evidence_ids: vec![],
            notes: vec![],
        };
        self.store.upsert_verification_state(initial_state).await?;

        match self.apply_provisional_lift(&action, now).await {
            Ok((updated, snapshot)) => Ok(ActionSubmission { action: updated, snapshot, next_steps }),
            Err(err) => {
                warn!(action_id = %action.id, error = %err, "provisional lift failed, action left pending");
                let snapshot = snapshot_store::recompute(
                    self.store,
                    self.config,
                    &action.subject_id,
                    Trigger::ActionEvent { action_id: action.id.clone() },
                    now,
                    0.0,
                )
                .await?;
                Ok(ActionSubmission { action, snapshot, next_steps })
            }
        }
    }

    async fn apply_provisional_lift(&self, action: &ActionEvent, now: DateTime<Utc>) -> Result<(ActionEvent, ScoreSnapshot)> {
        let impact_multiplier = self.config.provisional_multiplier(action.impact_guess);
        let base_lift = 0.05 * impact_multiplier;

        for feature_id in action_feature_map(action.action_type) {
            self.lift_feature_additive(&action.subject_id, feature_id, base_lift, 0.05, super::PROVISIONAL_VERIFICATION_CAP, now)
                .await?;
        }

        let snapshot = snapshot_store::recompute(
            self.store,
            self.config,
            &action.subject_id,
            Trigger::ActionEvent { action_id: action.id.clone() },
            now,
            0.0,
        )
        .await?;

        let mut updated = action.clone();
        updated.status = ActionStatus::ProvisionalApplied;
        updated.provisional_delta_id = Some(snapshot.id.clone());
        self.store.upsert_action(updated.clone()).await?;
        info!(action_id = %action.id, snapshot_id = %snapshot.id, "provisional lift applied");
        Ok((updated, snapshot))
    }

    /// Provisional-lift feature rewrite: `newNorm = clamp01(prev.norm +
    /// norm_lift)`, `newVerification = min(verification_cap, prev.verification
    /// + verification_step)`.
    async fn lift_feature_additive(
        &self,
        subject_id: &str,
        feature_id: FeatureId,
        norm_lift: f64,
        verification_step: f64,
        verification_cap: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let current = self.store.latest_features(subject_id).await?;
        let existing = current.get(&feature_id);
        let new_norm = (existing.map(|f| f.norm).unwrap_or(0.0) + norm_lift).clamp(0.0, 1.0);
        let new_verification = (existing.map(|f| f.verification).unwrap_or(0.2) + verification_step).min(verification_cap);
        let feature = Feature {
            subject_id: subject_id.to_string(),
            feature_id,
            measured_at: now,
            raw: existing.map(|f| f.raw.clone()).unwrap_or_default(),
            norm: new_norm,
            weight: existing.map(|f| f.weight).unwrap_or_else(|| self.config.feature_weight(feature_id)),
            confidence: existing.map(|f| f.confidence).unwrap_or(0.5),
            verification: new_verification,
            verification_tier: tier_from_verification(new_verification),
            evidence_refs: existing.map(|f| f.evidence_refs.clone()).unwrap_or_default(),
        };
        self.store.append_feature(feature).await
    }

    /// Verified-lift feature rewrite: `newNorm = clamp01(prev.norm +
    /// baseLift)`, `newVerification = verificationMultiplier(tier)` (set
    /// directly, not added).
    async fn lift_feature_verified(&self, subject_id: &str, feature_id: FeatureId, base_lift: f64, tier: VerificationTier, now: DateTime<Utc>) -> Result<()> {
        let current = self.store.latest_features(subject_id).await?;
        let existing = current.get(&feature_id);
        let new_norm = (existing.map(|f| f.norm).unwrap_or(0.0) + base_lift).clamp(0.0, 1.0);
        let new_verification = self.config.verification_multiplier(tier);
        let feature = Feature {
            subject_id: subject_id.to_string(),
            feature_id,
            measured_at: now,
            raw: existing.map(|f| f.raw.clone()).unwrap_or_default(),
            norm: new_norm,
            weight: existing.map(|f| f.weight).unwrap_or_else(|| self.config.feature_weight(feature_id)),
            confidence: existing.map(|f| f.confidence).unwrap_or(0.5),
            verification: new_verification,
            verification_tier: tier_from_verification(new_verification),
            evidence_refs: existing.map(|f| f.evidence_refs.clone()).unwrap_or_default(),
        };
        self.store.append_feature(feature).await
    }

    /// Submit evidence, extract its structured fields, match it against
    /// outstanding actions (or use the caller's explicit `action_id`
    /// directly, bypassing the matcher), and update every matched action's
    /// verification state. Any state that becomes satisfied triggers its
    /// verified lift. A failure during a verified lift leaves that one
    /// action `provisional_applied` (unchanged) and is safe to retry since
    /// the lift computation is deterministic; it does not affect the other
    /// matched actions.
    pub async fn submit_evidence(&self, input: SubmitEvidenceInput, now: DateTime<Utc>) -> Result<EvidenceSubmission> {
        let mut artifact = EvidenceArtifact {
            id: Uuid::new_v4().to_string(),
            subject_id: input.subject_id.clone(),
            action_id: input.action_id.clone(),
            evidence_type: input.evidence_type,
            reference: input.reference,
            extracted: None,
            tier: VerificationTier::Unverified,
            confidence: input.confidence,
            created_at: now,
        };
        artifact.extracted = match self.extractor.extract(&artifact).await {
            Ok(extracted) => Some(extracted),
            Err(err) => {
                warn!(evidence_id = %artifact.id, error = %err, "extraction failed, matching against raw artifact only");
                None
            }
        };
        self.store.append_evidence(artifact.clone()).await?;

        let matched: Vec<ActionEvent> = match &input.action_id {
            Some(explicit_id) => vec![self.store.get_action(explicit_id).await?],
            None => {
                let actions = self.store.list_actions(&input.subject_id).await?;
                matching::matched_actions(&actions, &artifact, now).into_iter().cloned().collect()
            }
        };

        let mut matched_actions = Vec::with_capacity(matched.len());
        let mut updates = Vec::with_capacity(matched.len());
        for action in matched {
            let state = self.update_verification_state(&action, &artifact, now).await?;

            let mut final_action = action.clone();
            if state.satisfied && action.status != ActionStatus::Verified {
                match self.apply_verified_lift(&action, &state, now).await {
                    Ok(_snapshot) => {
                        final_action = self.store.get_action(&action.id).await?;
                    }
                    Err(err) => {
                        warn!(action_id = %action.id, error = %err, "verified lift failed, action left provisional_applied");
                    }
                }
            }
            matched_actions.push(final_action);
            updates.push(state);
        }

        Ok(EvidenceSubmission { evidence: artifact, matched_actions, verification_updates: updates })
    }

    /// Apply the fixed per-evidence-type additive boost to `action`'s
    /// verification state (§4.5.2), striking any requirement this evidence
    /// discharges from `missing`.
    async fn update_verification_state(&self, action: &ActionEvent, artifact: &EvidenceArtifact, _now: DateTime<Utc>) -> Result<VerificationState> {
        let mut state = self
            .store
            .get_verification_state(&action.id)
            .await?
            .unwrap_or_else(|| VerificationState {
                action_id: action.id.clone(),
                current_verification: 0.2,
                tier: VerificationTier::Unverified,
                satisfied: false,
                missing: action.verification_plan.requirements.clone(),
                matched_evidence_ids: vec![],
                notes: vec![],
            });

        state.matched_evidence_ids.push(artifact.id.clone());
        state.current_verification = (state.current_verification + verification_boost(artifact.evidence_type)).clamp(0.0, 1.0);
        state.tier = tier_from_verification(state.current_verification);
        state
            .missing
            .retain(|req| !matching::exact_requirement_match(req, artifact));
        state.satisfied = state.missing.is_empty() && state.current_verification >= action.verification_plan.target_verification;

        self.store.upsert_verification_state(state.clone()).await?;
        Ok(state)
    }

    async fn apply_verified_lift(&self, action: &ActionEvent, state: &VerificationState, now: DateTime<Utc>) -> Result<ScoreSnapshot> {
        let impact_multiplier = match action.impact_guess {
            ImpactGuess::Low => 0.5,
            ImpactGuess::Medium => 1.0,
            ImpactGuess::High => 1.5,
        };
        let verification_multiplier = self.config.verification_multiplier(state.tier);
        let base_lift = 0.10 * impact_multiplier * verification_multiplier;

        for feature_id in action_feature_map(action.action_type) {
            self.lift_feature_verified(&action.subject_id, feature_id, base_lift, state.tier, now).await?;
        }

        // Preview the delta the lift just produced, without appending a
        // snapshot, so the GOD adjustment can be folded into the single
        // `recompute` call below rather than requiring a second one.
        let prev_snapshot = self.store.latest_snapshot(&action.subject_id).await?;
        let prev_features = prev_snapshot.as_ref().map(|s| s.features.clone()).unwrap_or_default();
        let prev_as_of = prev_snapshot.as_ref().map(|s| s.as_of).unwrap_or(now);
        let current_features = self.store.latest_features(&action.subject_id).await?;
        let preview = crate::delta::compute(&prev_features, prev_as_of, &current_features, now, self.config);
        let blocker_inputs = crate::blockers::BlockerInputs {
            features: &current_features,
            top_movers: &preview.top_movers,
            as_of: now,
        };
        let hard_blockers = crate::blockers::evaluate(&blocker_inputs, self.config)
            .iter()
            .filter(|b| b.severity == crate::model::BlockerSeverity::Hard)
            .count();
        let canonical_delta = god_adjustment(self.config, &preview)
            - self.config.god_weights.penalty_per_blocker * hard_blockers as f64;

        let snapshot = snapshot_store::recompute(
            self.store,
            self.config,
            &action.subject_id,
            Trigger::ActionEvent { action_id: action.id.clone() },
            now,
            canonical_delta,
        )
        .await?;

        let mut updated = action.clone();
        updated.status = ActionStatus::Verified;
        updated.verified_delta_id = Some(snapshot.id.clone());
        self.store.upsert_action(updated).await?;
        info!(action_id = %action.id, snapshot_id = %snapshot.id, "verified lift applied");
        Ok(snapshot)
    }

    /// Explicit, caller-driven verification escalation (e.g. a human reviewer
    /// promoting an action to `trusted`) — `trusted` can never be reached any
    /// other way.
    pub async fn upgrade_verification(&self, action_id: &str, tier: VerificationTier, now: DateTime<Utc>) -> Result<ScoreSnapshot> {
        let action = self.store.get_action(action_id).await?;
        let mut state = self
            .store
            .get_verification_state(action_id)
            .await?
            .ok_or_else(|| EngineError::StateNotFound(action_id.to_string()))?;

        let multiplier = self.config.verification_multiplier(tier);
        state.current_verification = state.current_verification.max(multiplier);
        state.tier = tier;
        state.satisfied = state.missing.is_empty() && state.current_verification >= action.verification_plan.target_verification;
        self.store.upsert_verification_state(state.clone()).await?;

        if action.status != ActionStatus::Verified {
            return self.apply_verified_lift(&action, &state, now).await;
        }

        match &action.verified_delta_id {
            Some(snapshot_id) => self.store.get_snapshot(&action.subject_id, snapshot_id).await,
            None => self
                .store
                .latest_snapshot(&action.subject_id)
                .await?
                .ok_or_else(|| EngineError::SnapshotNotFound(action.subject_id.clone())),
        }
    }

    /// Resolve a flagged inconsistency: append the evidence id (if any) to
    /// the matched list, apply the fixed `+0.20` verification boost, recompute
    /// tier, append a resolution note, and clear the `inconsistent_claims`
    /// flag on the action's governing features (so the corresponding hard
    /// blocker actually clears on the next recompute, since features are
    /// append-only and blockers read `raw.flags`). If the state is now
    /// satisfied, perform the verified lift; otherwise just recompute so the
    /// cleared flag and boosted verification are reflected.
    pub async fn resolve_inconsistency(
        &self,
        action_id: &str,
        explanation: String,
        evidence_id: Option<String>,
        verifier_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<InconsistencyResolution> {
        let action = self.store.get_action(action_id).await?;
        let mut state = self
            .store
            .get_verification_state(action_id)
            .await?
            .ok_or_else(|| EngineError::StateNotFound(action_id.to_string()))?;

        if let Some(evidence_id) = evidence_id {
            state.matched_evidence_ids.push(evidence_id);
        }
        state.current_verification = (state.current_verification + INCONSISTENCY_RESOLUTION_BOOST).clamp(0.0, 1.0);
        state.tier = tier_from_verification(state.current_verification);
        state.notes.push(format!("inconsistency resolved: {explanation}"));
        if let Some(verifier_notes) = verifier_notes {
            state.notes.push(verifier_notes);
        }
        state.satisfied = state.missing.is_empty() && state.current_verification >= action.verification_plan.target_verification;
        self.store.upsert_verification_state(state.clone()).await?;

        self.clear_inconsistency_flags(&action, now).await?;

        let snapshot = if state.satisfied && action.status != ActionStatus::Verified {
            self.apply_verified_lift(&action, &state, now).await?
        } else {
            snapshot_store::recompute(
                self.store,
                self.config,
                &action.subject_id,
                Trigger::InconsistencyResolution { action_id: action.id.clone() },
                now,
                0.0,
            )
            .await?
        };

        let action = self.store.get_action(action_id).await?;
        Ok(InconsistencyResolution { action, state, snapshot: Some(snapshot) })
    }

    /// Rewrite every feature named in `action`'s governing map, stripping
    /// `inconsistent_claims` from its flags if present. A no-op append (new
    /// row identical but for `measured_at`) for features that never carried
    /// the flag keeps this simple at the cost of a few redundant rows.
    async fn clear_inconsistency_flags(&self, action: &ActionEvent, now: DateTime<Utc>) -> Result<()> {
        let current = self.store.latest_features(&action.subject_id).await?;
        for feature_id in action_feature_map(action.action_type) {
            let Some(existing) = current.get(&feature_id) else { continue };
            if !existing.raw.flags.iter().any(|f| f == INCONSISTENT_CLAIMS_FLAG) {
                continue;
            }
            let mut flags = existing.raw.flags.clone();
            flags.retain(|f| f != INCONSISTENT_CLAIMS_FLAG);
            let feature = Feature {
                measured_at: now,
                raw: RawPayload {
                    flags,
                    extra: existing.raw.extra.clone(),
                },
                ..existing.clone()
            };
            self.store.append_feature(feature).await?;
        }
        Ok(())
    }
}

fn delta_for(contributions: &[FeatureContribution], feature_id: FeatureId) -> f64 {
    contributions.iter().find(|c| c.feature_id == feature_id).map(|c| c.delta).unwrap_or(0.0)
}

/// The Canonical/GOD adjustment: a weighted blend of the Signal move itself
/// plus the two features most load-bearing for trust (`traction`,
/// `investor_intent`), computed unconditionally from the preview delta —
/// not gated on whether this particular action's feature map happens to
/// touch those two features.
fn god_adjustment(config: &EngineConfig, delta_result: &DeltaResult) -> f64 {
    let delta_signal = delta_result.next_total - delta_result.prev_total;
    let delta_traction = delta_for(&delta_result.contributions, FeatureId::Traction);
    let delta_investor_intent = delta_for(&delta_result.contributions, FeatureId::InvestorIntent);

    config.god_weights.signal * delta_signal
        + config.god_weights.traction * delta_traction
        + config.god_weights.investor_intent * delta_investor_intent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::NoopExtractor;
    use crate::model::{Extracted, ExtractedAmounts, ExtractedEntities};
    use crate::store::memory::InMemoryStore;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    struct StubExtractor;

    #[async_trait::async_trait]
    impl EvidenceExtractor for StubExtractor {
        async fn extract(&self, artifact: &EvidenceArtifact) -> crate::error::Result<Extracted> {
            Ok(Extracted {
                flags: vec![],
                amounts: Some(ExtractedAmounts { usd: Some(5000.0) }),
                dates: None,
                entities: Some(ExtractedEntities {
                    customer: Some("Acme".into()),
                }),
            })
        }
    }

    #[tokio::test]
    async fn submit_action_applies_provisional_lift_and_returns_next_steps() {
        let store = InMemoryStore::new();
        let extractor = NoopExtractor;
        let config = EngineConfig::default();
        let orchestrator = VerificationOrchestrator::new(&store, &extractor, &config);

        let submission = orchestrator
            .submit_action(
                SubmitActionInput {
                    subject_id: "s1".into(),
                    actor: None,
                    action_type: ActionType::Revenue,
                    title: "closed acme".into(),
                    details: "".into(),
                    occurred_at: t0(),
                    impact_guess: ImpactGuess::Medium,
                    fields: ActionFields {
                        mrr_delta_usd: Some(5000.0),
                        customer_name: Some("Acme".into()),
                        extra: Default::default(),
                    },
                },
                t0(),
            )
            .await
            .unwrap();

        assert_eq!(submission.action.status, ActionStatus::ProvisionalApplied);
        assert!(!submission.next_steps.requirements.is_empty());
        assert_eq!(submission.snapshot.subject_id, "s1");
        let features = store.latest_features("s1").await.unwrap();
        let traction = features.get(&FeatureId::Traction).unwrap();
        assert!(traction.verification <= super::super::PROVISIONAL_VERIFICATION_CAP);
        // baseLift = 0.05 * 0.25 (medium) = 0.0125
        assert!((traction.norm - 0.0125).abs() < 1e-9);
    }

    #[tokio::test]
    async fn submit_evidence_matches_by_explicit_action_id_and_can_trigger_verified_lift() {
        let store = InMemoryStore::new();
        let extractor = StubExtractor;
        let config = EngineConfig::default();
        let orchestrator = VerificationOrchestrator::new(&store, &extractor, &config);

        let submission = orchestrator
            .submit_action(
                SubmitActionInput {
                    subject_id: "s1".into(),
                    actor: None,
                    action_type: ActionType::Revenue,
                    title: "closed acme".into(),
                    details: "".into(),
                    occurred_at: t0(),
                    impact_guess: ImpactGuess::Medium,
                    fields: ActionFields {
                        mrr_delta_usd: Some(5000.0),
                        customer_name: Some("Acme".into()),
                        extra: Default::default(),
                    },
                },
                t0(),
            )
            .await
            .unwrap();
        let action = submission.action;

        let evidence1 = orchestrator
            .submit_evidence(
                SubmitEvidenceInput {
                    subject_id: "s1".into(),
                    action_id: Some(action.id.clone()),
                    evidence_type: crate::model::EvidenceType::OauthConnector,
                    reference: "stripe://acct_1".into(),
                    confidence: 1.0,
                },
                t0() + chrono::Duration::days(1),
            )
            .await
            .unwrap();

        let updates = evidence1.verification_updates;
        assert_eq!(updates.len(), 1);
        assert_eq!(evidence1.matched_actions.len(), 1);
        // 0.2 seed + 0.30 oauth boost = 0.50
        assert!((updates[0].current_verification - 0.50).abs() < 1e-9);
        assert_eq!(updates[0].tier, VerificationTier::SoftVerified);
        assert!(!updates[0].satisfied); // upload:invoice still missing

        let evidence2 = orchestrator
            .submit_evidence(
                SubmitEvidenceInput {
                    subject_id: "s1".into(),
                    action_id: Some(action.id.clone()),
                    evidence_type: crate::model::EvidenceType::DocumentUpload,
                    reference: "invoice.pdf".into(),
                    confidence: 1.0,
                },
                t0() + chrono::Duration::days(2),
            )
            .await
            .unwrap();

        let updates2 = evidence2.verification_updates;
        // 0.50 + 0.20 document_upload = 0.70, requirements now emptied.
        assert!((updates2[0].current_verification - 0.70).abs() < 1e-9);
        assert!(updates2[0].satisfied);
        assert_eq!(evidence2.matched_actions[0].status, ActionStatus::Verified);

        let updated_action = store.get_action(&action.id).await.unwrap();
        assert_eq!(updated_action.status, ActionStatus::Verified);
        let snapshot = store.latest_snapshot("s1").await.unwrap().unwrap();
        assert!(snapshot.canonical_total > 0.0);
    }

    #[tokio::test]
    async fn submit_evidence_without_explicit_action_id_uses_matcher() {
        let store = InMemoryStore::new();
        let extractor = StubExtractor;
        let config = EngineConfig::default();
        let orchestrator = VerificationOrchestrator::new(&store, &extractor, &config);

        let submission = orchestrator
            .submit_action(
                SubmitActionInput {
                    subject_id: "s1".into(),
                    actor: None,
                    action_type: ActionType::Revenue,
                    title: "closed acme".into(),
                    details: "".into(),
                    occurred_at: t0(),
                    impact_guess: ImpactGuess::Medium,
                    fields: ActionFields {
                        mrr_delta_usd: Some(5000.0),
                        customer_name: Some("Acme".into()),
                        extra: Default::default(),
                    },
                },
                t0(),
            )
            .await
            .unwrap();
        let action = submission.action;

        let evidence = orchestrator
            .submit_evidence(
                SubmitEvidenceInput {
                    subject_id: "s1".into(),
                    action_id: None,
                    evidence_type: crate::model::EvidenceType::BankTransaction,
                    reference: "bank-ref".into(),
                    confidence: 1.0,
                },
                t0() + chrono::Duration::days(1),
            )
            .await
            .unwrap();

        assert_eq!(evidence.verification_updates.len(), 1);
        assert_eq!(evidence.verification_updates[0].action_id, action.id);
        assert_eq!(evidence.matched_actions.len(), 1);
        assert_eq!(evidence.matched_actions[0].id, action.id);
    }

    #[tokio::test]
    async fn resolve_inconsistency_applies_fixed_boost_and_clears_feature_flag() {
        let store = InMemoryStore::new();
        let extractor = NoopExtractor;
        let config = EngineConfig::default();
        let orchestrator = VerificationOrchestrator::new(&store, &extractor, &config);

        let submission = orchestrator
            .submit_action(
                SubmitActionInput {
                    subject_id: "s1".into(),
                    actor: None,
                    action_type: ActionType::Other,
                    title: "t".into(),
                    details: "".into(),
                    occurred_at: t0(),
                    impact_guess: ImpactGuess::Low,
                    fields: ActionFields::default(),
                },
                t0(),
            )
            .await
            .unwrap();
        let action = submission.action;

        // Flag the governing feature as carrying an inconsistent claim.
        let features = store.latest_features("s1").await.unwrap();
        let founder_velocity = features.get(&FeatureId::FounderVelocity).unwrap().clone();
        let mut flagged = founder_velocity.clone();
        flagged.measured_at = t0() + chrono::Duration::hours(1);
        flagged.raw = RawPayload {
            flags: vec![INCONSISTENT_CLAIMS_FLAG.to_string()],
            extra: Default::default(),
        };
        store.append_feature(flagged).await.unwrap();

        let before = store.get_verification_state(&action.id).await.unwrap().unwrap();
        let resolution = orchestrator
            .resolve_inconsistency(&action.id, "reviewed source doc".into(), None, Some("looks fine".into()), t0() + chrono::Duration::days(1))
            .await
            .unwrap();
        assert!(resolution.snapshot.is_some());

        let after = store.get_verification_state(&resolution.action.id).await.unwrap().unwrap();
        assert!((after.current_verification - (before.current_verification + 0.20)).abs() < 1e-9);
        assert!(after.notes.iter().any(|n| n.contains("reviewed source doc")));
        assert!(after.notes.iter().any(|n| n == "looks fine"));
        assert_eq!(resolution.state.current_verification, after.current_verification);

        let features_after = store.latest_features("s1").await.unwrap();
        assert!(!features_after[&FeatureId::FounderVelocity]
            .raw
            .flags
            .iter()
            .any(|f| f == INCONSISTENT_CLAIMS_FLAG));
    }
}

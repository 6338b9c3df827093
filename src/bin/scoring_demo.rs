// =============================================================================
// scoring_demo — runs two seed scenarios against an in-memory store
// =============================================================================
//
// Same shape as the teacher's own entry point: wire a subscriber, build the
// runtime pieces, drive a couple of representative flows, print what
// happened. Not meant to be a server — there is no HTTP surface here, just a
// narrated walk through `Engine`'s public operations.
// =============================================================================

use std::sync::Arc;

use chrono::Utc;
use scoring_engine::clock::SystemClock;
use scoring_engine::config::EngineConfig;
use scoring_engine::extractor::NoopExtractor;
use scoring_engine::model::{ActionFields, ActionType, EvidenceType, ImpactGuess};
use scoring_engine::store::memory::InMemoryStore;
use scoring_engine::verification::{SubmitActionInput, SubmitEvidenceInput};
use scoring_engine::Engine;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let engine = Engine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(NoopExtractor),
        Arc::new(SystemClock),
        EngineConfig::default(),
    );

    info!("scenario 1: a founder submits a revenue claim, no evidence yet");
    let submission = engine
        .submit_action(SubmitActionInput {
            subject_id: "acme-startup".into(),
            actor: Some("founder@acme.co".into()),
            action_type: ActionType::Revenue,
            title: "Closed Globex as a paying customer".into(),
            details: "$8k/mo annual contract".into(),
            occurred_at: Utc::now(),
            impact_guess: ImpactGuess::Medium,
            fields: ActionFields {
                mrr_delta_usd: Some(8000.0),
                customer_name: Some("Globex".into()),
                extra: Default::default(),
            },
        }, CancellationToken::new())
        .await?;
    let action = submission.action;
    info!(status = %action.status, next_steps = ?submission.next_steps.requirements, "action intake complete");
    info!(
        signal = submission.snapshot.signal_total,
        canonical = submission.snapshot.canonical_total,
        blockers = submission.snapshot.blockers.len(),
        "post-provisional snapshot"
    );

    info!("scenario 2: a bank transaction matching the claim arrives");
    let evidence = engine
        .submit_evidence(SubmitEvidenceInput {
            subject_id: "acme-startup".into(),
            action_id: Some(action.id.clone()),
            evidence_type: EvidenceType::BankTransaction,
            reference: "stripe://ch_123".into(),
            confidence: 0.95,
        }, CancellationToken::new())
        .await?;
    for state in &evidence.verification_updates {
        info!(tier = %state.tier, verification = state.current_verification, satisfied = state.satisfied, "verification state after evidence");
    }

    let snapshot = engine.latest_snapshot("acme-startup").await?.expect("snapshot after submit_evidence");
    info!(signal = snapshot.signal_total, canonical = snapshot.canonical_total, "post-verification snapshot");

    for mover in &snapshot.delta.top_movers {
        info!(feature = %mover.feature_id, delta = mover.delta, reasons = ?mover.reasons, "top mover");
    }

    Ok(())
}

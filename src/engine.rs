// =============================================================================
// Engine — the public facade wiring config, store, extractor, and clock
// =============================================================================
//
// Every public method takes a per-subject lock before touching the store, so
// two calls racing on the same subject serialize rather than interleaving
// reads and snapshot appends. Locks are striped over a fixed shard count
// (same trade-off `app_state.rs` makes with its per-subsystem `RwLock`s:
// one global collection would be simpler but would serialize unrelated
// subjects against each other for no reason).
// =============================================================================

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::extractor::EvidenceExtractor;
use crate::model::{ActionSubmission, EvidenceSubmission, InconsistencyResolution, ScoreSnapshot, Trigger, VerificationTier};
use crate::snapshot_store;
use crate::store::Store;
use crate::verification::{SubmitActionInput, SubmitEvidenceInput, VerificationOrchestrator};

const SHARD_COUNT: usize = 64;

fn shard_for(subject_id: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    subject_id.hash(&mut hasher);
    (hasher.finish() as usize) % SHARD_COUNT
}

pub struct Engine {
    store: Arc<dyn Store>,
    extractor: Arc<dyn EvidenceExtractor>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    shards: Vec<Mutex<()>>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, extractor: Arc<dyn EvidenceExtractor>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Mutex::new(())).collect();
        Self {
            store,
            extractor,
            clock,
            config,
            shards,
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn orchestrator(&self) -> VerificationOrchestrator<'_> {
        VerificationOrchestrator::new(self.store.as_ref(), self.extractor.as_ref(), &self.config)
    }

    /// Race `fut` against `cancel`, the way every public operation is
    /// required to accept a cancellation signal (spec.md §5). Cancellation
    /// only ever wins the race at a suspension point — once `fut` itself has
    /// produced a value there is nothing left to interrupt, so a write that
    /// already landed in the store is never rolled back out from under a
    /// late-arriving cancellation.
    async fn cancellable<T>(cancel: &CancellationToken, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(crate::error::EngineError::Cancelled),
            result = fut => result,
        }
    }

    pub async fn submit_action(&self, input: SubmitActionInput, cancel: CancellationToken) -> Result<ActionSubmission> {
        let subject_id = input.subject_id.clone();
        let _guard = self.shards[shard_for(&subject_id)].lock().await;
        let now = self.now();
        Self::cancellable(&cancel, self.orchestrator().submit_action(input, now)).await
    }

    pub async fn submit_evidence(
        &self,
        input: SubmitEvidenceInput,
        cancel: CancellationToken,
    ) -> Result<EvidenceSubmission> {
        let subject_id = input.subject_id.clone();
        let _guard = self.shards[shard_for(&subject_id)].lock().await;
        let now = self.now();
        Self::cancellable(&cancel, self.orchestrator().submit_evidence(input, now)).await
    }

    pub async fn upgrade_verification(
        &self,
        action_id: &str,
        tier: VerificationTier,
        cancel: CancellationToken,
    ) -> Result<ScoreSnapshot> {
        let action = self.store.get_action(action_id).await?;
        let _guard = self.shards[shard_for(&action.subject_id)].lock().await;
        let now = self.now();
        Self::cancellable(&cancel, self.orchestrator().upgrade_verification(action_id, tier, now)).await
    }

    pub async fn resolve_inconsistency(
        &self,
        action_id: &str,
        explanation: String,
        evidence_id: Option<String>,
        verifier_notes: Option<String>,
        cancel: CancellationToken,
    ) -> Result<InconsistencyResolution> {
        let action = self.store.get_action(action_id).await?;
        let _guard = self.shards[shard_for(&action.subject_id)].lock().await;
        let now = self.now();
        Self::cancellable(
            &cancel,
            self.orchestrator()
                .resolve_inconsistency(action_id, explanation, evidence_id, verifier_notes, now),
        )
        .await
    }

    /// Force a recompute without any action/evidence driving it (e.g. a
    /// scheduled sweep picking up pure freshness decay).
    pub async fn recompute_snapshot(&self, subject_id: &str, cancel: CancellationToken) -> Result<ScoreSnapshot> {
        let _guard = self.shards[shard_for(subject_id)].lock().await;
        let now = self.now();
        Self::cancellable(
            &cancel,
            snapshot_store::recompute(self.store.as_ref(), &self.config, subject_id, Trigger::System, now, 0.0),
        )
        .await
    }

    pub async fn latest_snapshot(&self, subject_id: &str) -> Result<Option<ScoreSnapshot>> {
        self.store.latest_snapshot(subject_id).await
    }

    pub async fn list_snapshots(&self, subject_id: &str) -> Result<Vec<ScoreSnapshot>> {
        self.store.list_snapshots(subject_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::extractor::NoopExtractor;
    use crate::model::{ActionFields, ActionType, ImpactGuess};
    use crate::store::memory::InMemoryStore;

    fn engine() -> Engine {
        let clock = Arc::new(FixedClock::new(
            DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc),
        ));
        Engine::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(NoopExtractor),
            clock,
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn submit_action_then_recompute_roundtrips() {
        let engine = engine();
        let submission = engine
            .submit_action(
                SubmitActionInput {
                    subject_id: "s1".into(),
                    actor: None,
                    action_type: ActionType::Revenue,
                    title: "t".into(),
                    details: "".into(),
                    occurred_at: Utc::now(),
                    impact_guess: ImpactGuess::Medium,
                    fields: ActionFields {
                        mrr_delta_usd: Some(1000.0),
                        customer_name: Some("Acme".into()),
                        extra: Default::default(),
                    },
                },
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(!submission.action.id.is_empty());
        assert_eq!(submission.snapshot.subject_id, "s1");

        let snapshot = engine.latest_snapshot("s1").await.unwrap();
        assert!(snapshot.is_some());

        let manual = engine.recompute_snapshot("s1", CancellationToken::new()).await.unwrap();
        assert_eq!(manual.subject_id, "s1");
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_any_write() {
        let engine = engine();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine
            .recompute_snapshot("s1", cancel)
            .await
            .expect_err("a pre-cancelled token must short-circuit the operation");
        assert_eq!(err.code(), "cancelled");
        assert!(engine.latest_snapshot("s1").await.unwrap().is_none(), "no snapshot should have been appended");
    }

    #[tokio::test]
    async fn different_subjects_do_not_block_each_other() {
        let engine = engine();
        let (a1, _) = tokio::join!(
            engine.recompute_snapshot("s1", CancellationToken::new()),
            engine.recompute_snapshot("s2", CancellationToken::new())
        );
        assert!(a1.is_ok());
    }
}

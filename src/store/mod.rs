// =============================================================================
// Store — the persistence seam the engine is written against
// =============================================================================
//
// Async trait object boundary, same shape as `vault/execution.rs`'s
// `ExecutionAdapter`: the engine only ever talks to `dyn Store`, so a SQL
// table, a KV store, or (for tests) a plain in-memory map are all
// interchangeable behind it. Every write is append-only or a keyed upsert —
// nothing here ever mutates a `ScoreSnapshot` once appended.
// =============================================================================

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ActionEvent, ActiveBlockerRow, EvidenceArtifact, Feature, FeatureId, ScoreSnapshot, VerificationState};

/// Persistence boundary consumed by [`crate::engine::Engine`]. All methods are
/// scoped to a single `subject_id` except the few keyed directly on an
/// artifact's own id.
#[async_trait]
pub trait Store: Send + Sync {
    /// Append a new feature measurement. Never overwrites a prior row for the
    /// same `(subject_id, feature_id, measured_at)`.
    async fn append_feature(&self, feature: Feature) -> Result<()>;

    /// The most recent row per `feature_id` for `subject_id`, i.e. the
    /// feature set `recompute` resolves against.
    async fn latest_features(&self, subject_id: &str) -> Result<HashMap<FeatureId, Feature>>;

    /// Append a new snapshot. `snapshot.prev_snapshot_id` must match the
    /// current head for `subject_id` (`None` if there is no prior snapshot);
    /// a mismatch is a concurrent-write conflict, not overwritten silently.
    async fn append_snapshot(&self, snapshot: ScoreSnapshot) -> Result<()>;

    /// The most recent snapshot for `subject_id`, if any.
    async fn latest_snapshot(&self, subject_id: &str) -> Result<Option<ScoreSnapshot>>;

    /// Every snapshot for `subject_id`, oldest first.
    async fn list_snapshots(&self, subject_id: &str) -> Result<Vec<ScoreSnapshot>>;

    /// Look up one snapshot by id, scoped to `subject_id` (snapshot ids are
    /// never reused across subjects). Used to resolve an action's
    /// `provisional_delta_id`/`verified_delta_id` back into the full
    /// snapshot a result-shape contract promises the caller.
    async fn get_snapshot(&self, subject_id: &str, snapshot_id: &str) -> Result<ScoreSnapshot>;

    /// Insert a brand new action or overwrite an existing one by `id`
    /// (status transitions go through this, not a separate update method).
    async fn upsert_action(&self, action: ActionEvent) -> Result<()>;

    async fn get_action(&self, action_id: &str) -> Result<ActionEvent>;

    async fn list_actions(&self, subject_id: &str) -> Result<Vec<ActionEvent>>;

    /// Insert or replace the verification state for an action.
    async fn upsert_verification_state(&self, state: VerificationState) -> Result<()>;

    async fn get_verification_state(&self, action_id: &str) -> Result<Option<VerificationState>>;

    /// Verification states for every action belonging to `subject_id`.
    async fn list_verification_states(&self, subject_id: &str) -> Result<Vec<VerificationState>>;

    async fn append_evidence(&self, evidence: EvidenceArtifact) -> Result<()>;

    async fn get_evidence(&self, evidence_id: &str) -> Result<EvidenceArtifact>;

    async fn list_evidence(&self, subject_id: &str) -> Result<Vec<EvidenceArtifact>>;

    /// Insert or replace the active-blocker projection row for
    /// `(subject_id, blocker_id)`.
    async fn upsert_active_blocker(&self, row: ActiveBlockerRow) -> Result<()>;

    async fn list_active_blockers(&self, subject_id: &str) -> Result<Vec<ActiveBlockerRow>>;
}

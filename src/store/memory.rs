// =============================================================================
// InMemoryStore — reference Store implementation for tests and the demo
// =============================================================================
//
// Plain `parking_lot::RwLock<HashMap<...>>` tables, the same texture as
// `app_state.rs`'s in-process subsystem state. No I/O, no async suspension
// anywhere inside — the `async fn`s exist purely to satisfy the `Store`
// trait's signature so real backends can suspend at their own boundaries.
// =============================================================================

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{EngineError, Result};
use crate::model::{
    ActionEvent, ActiveBlockerRow, BlockerId, EvidenceArtifact, Feature, FeatureId, ScoreSnapshot, VerificationState,
};

use super::Store;

#[derive(Default)]
pub struct InMemoryStore {
    features: RwLock<HashMap<String, Vec<Feature>>>,
    snapshots: RwLock<HashMap<String, Vec<ScoreSnapshot>>>,
    actions: RwLock<HashMap<String, ActionEvent>>,
    verification_states: RwLock<HashMap<String, VerificationState>>,
    evidence: RwLock<HashMap<String, EvidenceArtifact>>,
    active_blockers: RwLock<HashMap<(String, BlockerId), ActiveBlockerRow>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn append_feature(&self, feature: Feature) -> Result<()> {
        self.features
            .write()
            .entry(feature.subject_id.clone())
            .or_default()
            .push(feature);
        Ok(())
    }

    async fn latest_features(&self, subject_id: &str) -> Result<HashMap<FeatureId, Feature>> {
        let table = self.features.read();
        let mut latest: HashMap<FeatureId, Feature> = HashMap::new();
        if let Some(rows) = table.get(subject_id) {
            for row in rows {
                match latest.get(&row.feature_id) {
                    Some(existing) if existing.measured_at >= row.measured_at => {}
                    _ => {
                        latest.insert(row.feature_id, row.clone());
                    }
                }
            }
        }
        Ok(latest)
    }

    async fn append_snapshot(&self, snapshot: ScoreSnapshot) -> Result<()> {
        let mut table = self.snapshots.write();
        let rows = table.entry(snapshot.subject_id.clone()).or_default();
        let current_head = rows.last().map(|s| s.id.clone());
        if snapshot.prev_snapshot_id != current_head {
            return Err(EngineError::ConcurrentSnapshotConflict {
                expected: snapshot.prev_snapshot_id.clone().unwrap_or_default(),
                actual: current_head.unwrap_or_default(),
            });
        }
        rows.push(snapshot);
        Ok(())
    }

    async fn latest_snapshot(&self, subject_id: &str) -> Result<Option<ScoreSnapshot>> {
        Ok(self.snapshots.read().get(subject_id).and_then(|rows| rows.last().cloned()))
    }

    async fn list_snapshots(&self, subject_id: &str) -> Result<Vec<ScoreSnapshot>> {
        Ok(self.snapshots.read().get(subject_id).cloned().unwrap_or_default())
    }

    async fn get_snapshot(&self, subject_id: &str, snapshot_id: &str) -> Result<ScoreSnapshot> {
        self.snapshots
            .read()
            .get(subject_id)
            .and_then(|rows| rows.iter().find(|s| s.id == snapshot_id).cloned())
            .ok_or_else(|| EngineError::SnapshotNotFound(snapshot_id.to_string()))
    }

    async fn upsert_action(&self, action: ActionEvent) -> Result<()> {
        self.actions.write().insert(action.id.clone(), action);
        Ok(())
    }

    async fn get_action(&self, action_id: &str) -> Result<ActionEvent> {
        self.actions
            .read()
            .get(action_id)
            .cloned()
            .ok_or_else(|| EngineError::ActionNotFound(action_id.to_string()))
    }

    async fn list_actions(&self, subject_id: &str) -> Result<Vec<ActionEvent>> {
        Ok(self
            .actions
            .read()
            .values()
            .filter(|a| a.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn upsert_verification_state(&self, state: VerificationState) -> Result<()> {
        self.verification_states.write().insert(state.action_id.clone(), state);
        Ok(())
    }

    async fn get_verification_state(&self, action_id: &str) -> Result<Option<VerificationState>> {
        Ok(self.verification_states.read().get(action_id).cloned())
    }

    async fn list_verification_states(&self, subject_id: &str) -> Result<Vec<VerificationState>> {
        let actions = self.actions.read();
        Ok(self
            .verification_states
            .read()
            .values()
            .filter(|s| {
                actions
                    .get(&s.action_id)
                    .map(|a| a.subject_id == subject_id)
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn append_evidence(&self, evidence: EvidenceArtifact) -> Result<()> {
        self.evidence.write().insert(evidence.id.clone(), evidence);
        Ok(())
    }

    async fn get_evidence(&self, evidence_id: &str) -> Result<EvidenceArtifact> {
        self.evidence
            .read()
            .get(evidence_id)
            .cloned()
            .ok_or_else(|| EngineError::Store(format!("evidence not found: {evidence_id}")))
    }

    async fn list_evidence(&self, subject_id: &str) -> Result<Vec<EvidenceArtifact>> {
        Ok(self
            .evidence
            .read()
            .values()
            .filter(|e| e.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn upsert_active_blocker(&self, row: ActiveBlockerRow) -> Result<()> {
        self.active_blockers
            .write()
            .insert((row.subject_id.clone(), row.blocker_id), row);
        Ok(())
    }

    async fn list_active_blockers(&self, subject_id: &str) -> Result<Vec<ActiveBlockerRow>> {
        Ok(self
            .active_blockers
            .read()
            .values()
            .filter(|r| r.subject_id == subject_id && r.is_active)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Shared types — the scoring engine's data model
// =============================================================================
//
// Mirrors the closed-set enum style of `types.rs` (`TradingMode`,
// `AccountMode`): every closed set named in the data model is a real Rust
// enum with a `FromStr`/`Display` pair, so "unknown X" is a compile-time
// impossibility for internal code and a single validation error at the one
// place external strings cross the boundary (`submitAction`'s `type` and
// `impact_guess` fields).
// =============================================================================

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// FeatureId — closed, configured set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureId {
    Traction,
    FounderVelocity,
    InvestorIntent,
    MarketBeliefShift,
    CapitalConvergence,
    TeamStrength,
    ProductQuality,
    MarketSize,
}

impl FeatureId {
    pub const ALL: [FeatureId; 8] = [
        Self::Traction,
        Self::FounderVelocity,
        Self::InvestorIntent,
        Self::MarketBeliefShift,
        Self::CapitalConvergence,
        Self::TeamStrength,
        Self::ProductQuality,
        Self::MarketSize,
    ];

    /// The fixed "identity" feature set used by the `identity_not_verified` blocker.
    pub const IDENTITY: [FeatureId; 2] = [Self::Traction, Self::FounderVelocity];
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Traction => "traction",
            Self::FounderVelocity => "founder_velocity",
            Self::InvestorIntent => "investor_intent",
            Self::MarketBeliefShift => "market_belief_shift",
            Self::CapitalConvergence => "capital_convergence",
            Self::TeamStrength => "team_strength",
            Self::ProductQuality => "product_quality",
            Self::MarketSize => "market_size",
        };
        write!(f, "{s}")
    }
}

impl FromStr for FeatureId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "traction" => Ok(Self::Traction),
            "founder_velocity" => Ok(Self::FounderVelocity),
            "investor_intent" => Ok(Self::InvestorIntent),
            "market_belief_shift" => Ok(Self::MarketBeliefShift),
            "capital_convergence" => Ok(Self::CapitalConvergence),
            "team_strength" => Ok(Self::TeamStrength),
            "product_quality" => Ok(Self::ProductQuality),
            "market_size" => Ok(Self::MarketSize),
            other => Err(EngineError::UnknownFeatureId(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// VerificationTier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTier {
    Unverified,
    SoftVerified,
    Verified,
    Trusted,
}

impl Default for VerificationTier {
    fn default() -> Self {
        Self::Unverified
    }
}

impl fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unverified => "unverified",
            Self::SoftVerified => "soft_verified",
            Self::Verified => "verified",
            Self::Trusted => "trusted",
        };
        write!(f, "{s}")
    }
}

impl FromStr for VerificationTier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unverified" => Ok(Self::Unverified),
            "soft_verified" => Ok(Self::SoftVerified),
            "verified" => Ok(Self::Verified),
            "trusted" => Ok(Self::Trusted),
            other => Err(EngineError::UnknownVerificationTier(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionType — closed set. Founder-facing naming sometimes uses synonyms
// (customer_closed, fundraising, product_release) for these same eight
// types; see DESIGN.md for the resolved mapping.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Revenue,
    Product,
    Hiring,
    Funding,
    Partnership,
    Press,
    Milestone,
    Other,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Revenue => "revenue",
            Self::Product => "product",
            Self::Hiring => "hiring",
            Self::Funding => "funding",
            Self::Partnership => "partnership",
            Self::Press => "press",
            Self::Milestone => "milestone",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ActionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revenue" => Ok(Self::Revenue),
            "product" => Ok(Self::Product),
            "hiring" => Ok(Self::Hiring),
            "funding" => Ok(Self::Funding),
            "partnership" => Ok(Self::Partnership),
            "press" => Ok(Self::Press),
            "milestone" => Ok(Self::Milestone),
            "other" => Ok(Self::Other),
            other => Err(EngineError::UnknownActionType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactGuess {
    Low,
    Medium,
    High,
}

impl fmt::Display for ImpactGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ImpactGuess {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(EngineError::UnknownImpactGuess(other.to_string())),
        }
    }
}

/// What caused a `recompute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    System,
    ActionEvent { action_id: String },
    VerificationUpgrade { action_id: String },
    InconsistencyResolution { action_id: String },
}

impl Trigger {
    pub fn label(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::ActionEvent { .. } => "action_event",
            Self::VerificationUpgrade { .. } => "verification_upgrade",
            Self::InconsistencyResolution { .. } => "inconsistency_resolution",
        }
    }

    pub fn reference_id(&self) -> Option<&str> {
        match self {
            Self::System => None,
            Self::ActionEvent { action_id }
            | Self::VerificationUpgrade { action_id }
            | Self::InconsistencyResolution { action_id } => Some(action_id),
        }
    }
}

// ---------------------------------------------------------------------------
// EvidenceType — closed set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    OauthConnector,
    WebhookEvent,
    DocumentUpload,
    BankTransaction,
    PublicLink,
    Screenshot,
    EmailProof,
    ManualReviewNote,
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OauthConnector => "oauth_connector",
            Self::WebhookEvent => "webhook_event",
            Self::DocumentUpload => "document_upload",
            Self::BankTransaction => "bank_transaction",
            Self::PublicLink => "public_link",
            Self::Screenshot => "screenshot",
            Self::EmailProof => "email_proof",
            Self::ManualReviewNote => "manual_review_note",
        };
        write!(f, "{s}")
    }
}

/// Opaque structured payload with a few declared fields the engine inspects,
/// and a pass-through escape hatch for anything else. Used for `Feature::raw`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPayload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Opaque extraction result returned by the `EvidenceExtractor` collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Extracted {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amounts: Option<ExtractedAmounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dates: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<ExtractedEntities>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedAmounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
}

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// The minimal scored fact about a subject, identified by
/// `(subject_id, feature_id, measured_at)`. Append-only: writing a feature
/// never overwrites a prior row, it adds a new one with a later
/// `measured_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub subject_id: String,
    pub feature_id: FeatureId,
    pub measured_at: DateTime<Utc>,
    #[serde(default)]
    pub raw: RawPayload,
    pub norm: f64,
    pub weight: f64,
    pub confidence: f64,
    pub verification: f64,
    pub verification_tier: VerificationTier,
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

impl Feature {
    /// Construct a feature row with sane defaults for any field the
    /// caller does not have an opinion on.
    pub fn defaulted(subject_id: impl Into<String>, feature_id: FeatureId, measured_at: DateTime<Utc>) -> Self {
        Self {
            subject_id: subject_id.into(),
            feature_id,
            measured_at,
            raw: RawPayload::default(),
            norm: 0.0,
            weight: 1.0,
            confidence: 0.5,
            verification: 0.2,
            verification_tier: VerificationTier::Unverified,
            evidence_refs: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-feature contribution parts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeatureParts {
    pub weight: f64,
    pub norm: f64,
    pub confidence: f64,
    pub verification: f64,
    pub freshness: f64,
    pub contribution: f64,
}

impl FeatureParts {
    pub const ZERO: FeatureParts = FeatureParts {
        weight: 0.0,
        norm: 0.0,
        confidence: 0.0,
        verification: 0.0,
        freshness: 0.0,
        contribution: 0.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeReason {
    NewFeatureAdded,
    FeatureRemoved,
    SignalStrengthChanged,
    ConfidenceChanged,
    VerificationChanged,
    FreshnessChanged,
    WeightChanged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature_id: FeatureId,
    pub prev: FeatureParts,
    pub next: FeatureParts,
    pub delta: f64,
    pub reasons: Vec<ChangeReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaResult {
    pub prev_total: f64,
    pub next_total: f64,
    pub delta_total: f64,
    pub contributions: Vec<FeatureContribution>,
    pub top_movers: Vec<FeatureContribution>,
}

// ---------------------------------------------------------------------------
// BlockingFactor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerSeverity {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockerId {
    IdentityNotVerified,
    EvidenceInsufficient,
    RecencyGap,
    InconsistencyDetected,
    MissingRequiredConnectors,
}

impl fmt::Display for BlockerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IdentityNotVerified => "identity_not_verified",
            Self::EvidenceInsufficient => "evidence_insufficient",
            Self::RecencyGap => "recency_gap",
            Self::InconsistencyDetected => "inconsistency_detected",
            Self::MissingRequiredConnectors => "missing_required_connectors",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockingFactor {
    pub blocker_id: BlockerId,
    pub severity: BlockerSeverity,
    pub message: String,
    pub fix_path: String,
    pub affected_features: Vec<FeatureId>,
}

// ---------------------------------------------------------------------------
// ScoreSnapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMeans {
    pub avg_confidence: f64,
    pub avg_verification: f64,
    pub avg_freshness: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub id: String,
    pub subject_id: String,
    pub as_of: DateTime<Utc>,
    pub features: HashMap<FeatureId, Feature>,
    pub signal_total: f64,
    pub canonical_total: f64,
    pub means: AggregateMeans,
    pub delta: DeltaResult,
    pub blockers: Vec<BlockingFactor>,
    pub trigger: Trigger,
    pub prev_snapshot_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Verification plan / state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// e.g. "connect", "upload", "link", "review".
    pub kind: String,
    /// e.g. "stripe", "invoice", "linkedin", "light". Empty for wildcard kinds.
    pub detail: String,
}

impl Requirement {
    pub fn new(kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            detail: detail.into(),
        }
    }

    pub fn label(&self) -> String {
        if self.detail.is_empty() {
            self.kind.clone()
        } else {
            format!("{}:{}", self.kind, self.detail)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationPlan {
    pub requirements: Vec<Requirement>,
    pub target_verification: f64,
    pub verification_window_days: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    ProvisionalApplied,
    Verified,
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::ProvisionalApplied => "provisional_applied",
            Self::Verified => "verified",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrr_delta_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    pub id: String,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub action_type: ActionType,
    pub title: String,
    pub details: String,
    pub occurred_at: DateTime<Utc>,
    pub submitted_at: DateTime<Utc>,
    pub impact_guess: ImpactGuess,
    pub fields: ActionFields,
    pub verification_plan: VerificationPlan,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional_delta_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_delta_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationState {
    pub action_id: String,
    pub current_verification: f64,
    pub tier: VerificationTier,
    pub satisfied: bool,
    pub missing: Vec<Requirement>,
    pub matched_evidence_ids: Vec<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    pub id: String,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    pub evidence_type: EvidenceType,
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted: Option<Extracted>,
    pub tier: VerificationTier,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Active-blocker projection row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveBlockerRow {
    pub subject_id: String,
    pub blocker_id: BlockerId,
    pub severity: BlockerSeverity,
    pub message: String,
    pub fix_path: String,
    pub affected_features: Vec<FeatureId>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Result payload for `submitAction`: the plan's outstanding
/// requirements plus the deadline derived from `occurred_at +
/// verification_window_days`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextSteps {
    pub requirements: Vec<Requirement>,
    pub deadline: DateTime<Utc>,
}

/// Result payload for `submitAction`: the persisted action, the snapshot its
/// intake produced (via a provisional lift, or a plain recompute if the lift
/// itself failed), and the plan's next steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSubmission {
    pub action: ActionEvent,
    pub snapshot: ScoreSnapshot,
    pub next_steps: NextSteps,
}

/// Result payload for `submitEvidence`: the persisted evidence artifact,
/// every action it matched (explicit `action_id` or the matcher), and the
/// resulting verification-state update for each, in the same order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSubmission {
    pub evidence: EvidenceArtifact,
    pub matched_actions: Vec<ActionEvent>,
    pub verification_updates: Vec<VerificationState>,
}

/// Result payload for `resolveInconsistency`: the updated action, its
/// verification state, and the snapshot the resolution produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InconsistencyResolution {
    pub action: ActionEvent,
    pub state: VerificationState,
    pub snapshot: Option<ScoreSnapshot>,
}

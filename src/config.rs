// =============================================================================
// EngineConfig — hot-reloadable scoring parameters with atomic save
// =============================================================================
//
// Every tunable carries `#[serde(default = "...")]` so a config file missing
// new fields still loads, persistence uses an atomic tmp-then-rename write,
// and the engine caches one instance behind a lock, refreshed on external
// signal.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{ActionType, FeatureId, ImpactGuess, VerificationTier};

fn default_half_life_days() -> f64 {
    14.0
}

fn default_clamp_min() -> f64 {
    0.0
}

fn default_clamp_max() -> f64 {
    100.0
}

fn default_top_n() -> usize {
    5
}

fn default_feature_weights() -> HashMap<FeatureId, f64> {
    let mut w = HashMap::new();
    w.insert(FeatureId::Traction, 2.0);
    w.insert(FeatureId::FounderVelocity, 1.5);
    w.insert(FeatureId::InvestorIntent, 1.8);
    w.insert(FeatureId::MarketBeliefShift, 1.0);
    w.insert(FeatureId::CapitalConvergence, 1.2);
    w.insert(FeatureId::TeamStrength, 1.0);
    w.insert(FeatureId::ProductQuality, 1.0);
    w.insert(FeatureId::MarketSize, 0.8);
    w
}

fn default_verification_multipliers() -> HashMap<VerificationTier, f64> {
    let mut m = HashMap::new();
    m.insert(VerificationTier::Unverified, 0.20);
    m.insert(VerificationTier::SoftVerified, 0.45);
    m.insert(VerificationTier::Verified, 0.85);
    m.insert(VerificationTier::Trusted, 1.0);
    m
}

fn default_provisional_multipliers() -> HashMap<ImpactGuess, f64> {
    let mut m = HashMap::new();
    m.insert(ImpactGuess::Low, 0.15);
    m.insert(ImpactGuess::Medium, 0.25);
    m.insert(ImpactGuess::High, 0.35);
    m
}

/// Weights driving the Canonical ("GOD") adjustment formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GodWeights {
    #[serde(default = "default_w_signal")]
    pub signal: f64,
    #[serde(default = "default_w_traction")]
    pub traction: f64,
    #[serde(default = "default_w_investor_intent")]
    pub investor_intent: f64,
    #[serde(default = "default_penalty_per_blocker")]
    pub penalty_per_blocker: f64,
}

fn default_w_signal() -> f64 {
    0.25
}
fn default_w_traction() -> f64 {
    0.35
}
fn default_w_investor_intent() -> f64 {
    0.20
}
fn default_penalty_per_blocker() -> f64 {
    0.5
}

impl Default for GodWeights {
    fn default() -> Self {
        Self {
            signal: default_w_signal(),
            traction: default_w_traction(),
            investor_intent: default_w_investor_intent(),
            penalty_per_blocker: default_penalty_per_blocker(),
        }
    }
}

/// Per-action-type base verification requirements and the features a
/// provisional/verified lift touches. Keyed by [`ActionType`]; see
/// DESIGN.md for how this resolves the action-type naming synonyms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_half_life_days")]
    pub freshness_half_life_days: f64,
    #[serde(default = "default_clamp_min")]
    pub clamp_min: f64,
    #[serde(default = "default_clamp_max")]
    pub clamp_max: f64,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_feature_weights")]
    pub feature_weights: HashMap<FeatureId, f64>,
    #[serde(default = "default_verification_multipliers")]
    pub verification_multipliers: HashMap<VerificationTier, f64>,
    #[serde(default = "default_provisional_multipliers")]
    pub provisional_multipliers: HashMap<ImpactGuess, f64>,
    #[serde(default)]
    pub god_weights: GodWeights,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            freshness_half_life_days: default_half_life_days(),
            clamp_min: default_clamp_min(),
            clamp_max: default_clamp_max(),
            top_n: default_top_n(),
            feature_weights: default_feature_weights(),
            verification_multipliers: default_verification_multipliers(),
            provisional_multipliers: default_provisional_multipliers(),
            god_weights: GodWeights::default(),
        }
    }
}

impl EngineConfig {
    /// Verification multiplier for a tier, falling back to the built-in
    /// default table if the config omits an entry.
    pub fn verification_multiplier(&self, tier: VerificationTier) -> f64 {
        self.verification_multipliers
            .get(&tier)
            .copied()
            .unwrap_or(match tier {
                VerificationTier::Unverified => 0.20,
                VerificationTier::SoftVerified => 0.45,
                VerificationTier::Verified => 0.85,
                VerificationTier::Trusted => 1.0,
            })
    }

    /// Provisional impact multiplier, falling back to the built-in default table.
    pub fn provisional_multiplier(&self, impact: ImpactGuess) -> f64 {
        self.provisional_multipliers
            .get(&impact)
            .copied()
            .unwrap_or(match impact {
                ImpactGuess::Low => 0.15,
                ImpactGuess::Medium => 0.25,
                ImpactGuess::High => 0.35,
            })
    }

    pub fn feature_weight(&self, feature_id: FeatureId) -> f64 {
        self.feature_weights.get(&feature_id).copied().unwrap_or(1.0)
    }

    /// Floors the configured half-life so freshness math never divides toward zero.
    pub fn effective_half_life(&self) -> f64 {
        self.freshness_half_life_days.max(1e-6)
    }

    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read engine config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse engine config from {}", path.display()))?;
        info!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("failed to serialise engine config to JSON")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;
        info!(path = %path.display(), "engine config saved (atomic)");
        Ok(())
    }
}

/// Base verification requirements per action type.
pub fn base_requirements(action_type: ActionType) -> Vec<crate::model::Requirement> {
    use crate::model::Requirement as R;
    match action_type {
        ActionType::Revenue => vec![R::new("connect", "stripe"), R::new("upload", "invoice")],
        ActionType::Milestone => vec![R::new("upload", "contract"), R::new("connect", "hubspot")],
        ActionType::Hiring => vec![R::new("upload", "offer_letter"), R::new("link", "linkedin")],
        ActionType::Funding => vec![R::new("upload", "term_sheet"), R::new("connect", "plaid")],
        ActionType::Product => vec![R::new("link", "release_notes"), R::new("connect", "github")],
        ActionType::Press => vec![R::new("link", "press")],
        ActionType::Partnership => vec![R::new("upload", "contract")],
        ActionType::Other => vec![R::new("review", "light")],
    }
}

/// Features touched by a provisional/verified lift for a given action type.
/// Falls back to `[founder_velocity]`.
pub fn action_feature_map(action_type: ActionType) -> Vec<FeatureId> {
    match action_type {
        ActionType::Revenue => vec![FeatureId::Traction, FeatureId::CapitalConvergence],
        ActionType::Product => vec![FeatureId::ProductQuality, FeatureId::TeamStrength],
        ActionType::Hiring => vec![FeatureId::TeamStrength, FeatureId::FounderVelocity],
        ActionType::Funding => vec![FeatureId::CapitalConvergence, FeatureId::InvestorIntent],
        ActionType::Partnership => vec![FeatureId::MarketBeliefShift, FeatureId::Traction],
        ActionType::Press => vec![FeatureId::MarketBeliefShift],
        ActionType::Milestone => vec![FeatureId::Traction, FeatureId::FounderVelocity],
        ActionType::Other => vec![FeatureId::FounderVelocity],
    }
}

// =============================================================================
// Error taxonomy — Validation / NotFound / Concurrency / Store / Extraction
// =============================================================================
//
// Callers never see a partial result alongside an error: every public
// operation on `Engine` returns `Result<T, EngineError>`. Each variant maps
// to one of the five categories in the error handling design; `category()`
// and `code()` give the caller a stable machine-readable handle without
// string-matching the `Display` text.
// =============================================================================

use thiserror::Error;

/// The five error categories a caller can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Concurrency,
    Store,
    Extraction,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Concurrency => write!(f, "concurrency"),
            Self::Store => write!(f, "store"),
            Self::Extraction => write!(f, "extraction"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("unknown feature id: {0}")]
    UnknownFeatureId(String),

    #[error("unknown action type: {0}")]
    UnknownActionType(String),

    #[error("unknown impact guess: {0}")]
    UnknownImpactGuess(String),

    #[error("unknown blocker id: {0}")]
    UnknownBlockerId(String),

    #[error("unknown verification tier: {0}")]
    UnknownVerificationTier(String),

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("verification state not found for action: {0}")]
    StateNotFound(String),

    #[error("snapshot not found for subject: {0}")]
    SnapshotNotFound(String),

    #[error("snapshot append rejected: predecessor {expected} does not match current head {actual}")]
    ConcurrentSnapshotConflict { expected: String, actual: String },

    #[error("store failure: {0}")]
    Store(String),

    #[error("evidence extraction failed: {0}")]
    Extraction(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl EngineError {
    /// The category the caller should branch on.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownFeatureId(_)
            | Self::UnknownActionType(_)
            | Self::UnknownImpactGuess(_)
            | Self::UnknownBlockerId(_)
            | Self::UnknownVerificationTier(_) => ErrorCategory::Validation,
            Self::ActionNotFound(_) | Self::StateNotFound(_) | Self::SnapshotNotFound(_) => {
                ErrorCategory::NotFound
            }
            Self::ConcurrentSnapshotConflict { .. } => ErrorCategory::Concurrency,
            Self::Store(_) => ErrorCategory::Store,
            Self::Extraction(_) => ErrorCategory::Extraction,
            Self::Cancelled => ErrorCategory::Store,
        }
    }

    /// Stable machine-readable code, safe to expose to callers across the
    /// language boundary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownFeatureId(_) => "unknown_feature_id",
            Self::UnknownActionType(_) => "unknown_action_type",
            Self::UnknownImpactGuess(_) => "unknown_impact_guess",
            Self::UnknownBlockerId(_) => "unknown_blocker_id",
            Self::UnknownVerificationTier(_) => "unknown_verification_tier",
            Self::ActionNotFound(_) => "action_not_found",
            Self::StateNotFound(_) => "state_not_found",
            Self::SnapshotNotFound(_) => "snapshot_not_found",
            Self::ConcurrentSnapshotConflict { .. } => "concurrent_snapshot_conflict",
            Self::Store(_) => "store_failure",
            Self::Extraction(_) => "extraction_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

//! Error taxonomy for the traceability engine
//!
//! Walkers never raise on a missing intermediate hop; only the root lookup
//! and explicit business-rule violations produce errors. Transient store
//! errors pass through unmodified via the `Store` variant.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Structured reason for a rejected business operation
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationReason {
    /// Override or disagreeing sign-off submitted without a rationale
    RationaleRequired,
    /// Sign-off attempted while preconditions are unmet and no force flag given
    SignOffBlocked { blockers: Vec<String> },
    /// Operation only valid on a node of a different hierarchy level
    WrongLevel { expected: String, actual: String },
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationReason::RationaleRequired => {
                write!(f, "a non-empty rationale is required")
            }
            ValidationReason::SignOffBlocked { blockers } => {
                write!(f, "sign-off blocked: {}", blockers.join("; "))
            }
            ValidationReason::WrongLevel { expected, actual } => {
                write!(f, "expected a {} node, got {}", expected, actual)
            }
        }
    }
}

/// Errors surfaced by the traceability and aggregation operations
#[derive(Debug, Error)]
pub enum TraceError {
    /// Root entity missing or outside the caller's scope. The two cases are
    /// intentionally indistinguishable so a caller cannot probe another
    /// tenant's data for existence.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: Uuid },

    /// Unrecognized entity type tag; the message lists the valid set
    #[error("unsupported entity type '{given}', expected one of: {valid}")]
    InvalidEntityType { given: String, valid: String },

    /// Business-rule violation (400-equivalent), with a structured reason
    #[error("validation failed: {0}")]
    ValidationFailed(ValidationReason),

    /// Store-level failure, propagated unmodified
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl TraceError {
    /// Shorthand for the NotFound variant
    pub fn not_found(kind: impl Into<String>, id: Uuid) -> Self {
        TraceError::NotFound {
            kind: kind.into(),
            id,
        }
    }
}

/// Result alias used by every exposed operation
pub type Result<T> = std::result::Result<T, TraceError>;

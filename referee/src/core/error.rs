//! Malformed-input taxonomy for the evaluation engine.
//!
//! The engine is total over well-formed input. These errors only describe
//! records that could not have been produced by the engine itself, so callers
//! can tell "the engine could not run" apart from a `no-safe-winner` decision.

use crate::core::types::{CheckName, GateStatus};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("candidate id must be non-empty")]
    EmptyCandidateId,

    #[error("candidate {candidate_id}: more than one {check} check result")]
    DuplicateCheck {
        candidate_id: String,
        check: CheckName,
    },

    #[error(
        "expected the five gates in fixed order (patch_apply, forbidden_paths, lint_health, typecheck_health, functional_viability), found [{found}]"
    )]
    MalformedGates { found: String },

    #[error("candidate {candidate_id}: gateStatus {recorded} disagrees with gate results ({derived})")]
    GateStatusMismatch {
        candidate_id: String,
        recorded: GateStatus,
        derived: GateStatus,
    },

    #[error("candidate {candidate_id}: metric {metric} = {value} is outside [0, 1]")]
    MetricOutOfRange {
        candidate_id: String,
        metric: &'static str,
        value: f64,
    },

    #[error("unknown scoring profile '{0}' (expected safe, balanced, or speed)")]
    UnknownProfile(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

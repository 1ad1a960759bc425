//! Evaluation assembly: gates and metrics folded into one immutable record.

use regex::Regex;

use crate::core::error::{EngineError, Result};
use crate::core::gates::{DEFAULT_FORBIDDEN_PREFIXES, evaluate_gates};
use crate::core::metrics::{DEFAULT_RISKY_PATHS, MetricInputs, calculate_metrics};
use crate::core::types::{
    CandidateEvaluation, CheckName, CheckResult, DiffStats, ExecutionResult,
};

/// Path rules shared by every candidate in a round.
#[derive(Debug, Clone)]
pub struct EvaluationPolicy {
    pub forbidden_path_prefixes: Vec<String>,
    pub risky_paths: Regex,
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self {
            forbidden_path_prefixes: DEFAULT_FORBIDDEN_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            risky_paths: DEFAULT_RISKY_PATHS.clone(),
        }
    }
}

/// Raw signals for one candidate.
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub candidate_id: String,
    pub strategy: String,
    pub execution: ExecutionResult,
    pub diff_stats: DiffStats,
    pub checks: Vec<CheckResult>,
    pub historical_acceptance: Option<f64>,
}

/// Assemble the evaluation record for one candidate.
///
/// Fails only on malformed input: an empty candidate id or two results for
/// the same check name.
pub fn evaluate_candidate(
    input: EvaluationInput,
    policy: &EvaluationPolicy,
) -> Result<CandidateEvaluation> {
    if input.candidate_id.trim().is_empty() {
        return Err(EngineError::EmptyCandidateId);
    }
    for name in CheckName::ALL {
        if input.checks.iter().filter(|check| check.name == name).count() > 1 {
            return Err(EngineError::DuplicateCheck {
                candidate_id: input.candidate_id,
                check: name,
            });
        }
    }

    let gate_report = evaluate_gates(
        &input.execution,
        &input.diff_stats,
        &input.checks,
        &policy.forbidden_path_prefixes,
    );
    let metric_report = calculate_metrics(&MetricInputs {
        strategy: &input.strategy,
        execution: &input.execution,
        diff: &input.diff_stats,
        checks: &input.checks,
        reduced_confidence: gate_report.reduced_confidence,
        historical_acceptance: input.historical_acceptance,
        risky_paths: &policy.risky_paths,
    });

    Ok(CandidateEvaluation {
        candidate_id: input.candidate_id,
        strategy: input.strategy,
        gate_status: gate_report.gates.status(),
        gates: gate_report.gates,
        checks: input.checks,
        reduced_confidence: gate_report.reduced_confidence,
        risk_flags: metric_report.risk_flags,
        explanation: metric_report.explanation,
        metrics: metric_report.metrics,
        diff_stats: input.diff_stats,
        runtime_ms: input.execution.duration_ms,
    })
}

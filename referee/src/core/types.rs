//! Shared deterministic records for the evaluation engine.
//!
//! These types define stable contracts between the engine stages and the
//! collaborators that feed them. They carry no behavior that depends on
//! external state. Field names serialize in camelCase so persisted artifacts
//! keep a stable, language-neutral shape.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::EngineError;

/// Named verification check run inside a candidate working copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckName {
    Test,
    Lint,
    Typecheck,
}

impl CheckName {
    /// Every check, in the order the orchestrator runs them.
    pub const ALL: [CheckName; 3] = [CheckName::Test, CheckName::Lint, CheckName::Typecheck];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckName::Test => "test",
            CheckName::Lint => "lint",
            CheckName::Typecheck => "typecheck",
        }
    }
}

impl fmt::Display for CheckName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check. `Skip` is distinct from "not configured" (absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Fail,
    Skip,
}

impl CheckStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Pass => "pass",
            CheckStatus::Fail => "fail",
            CheckStatus::Skip => "skip",
        }
    }
}

/// Aggregate gate verdict: `Pass` iff every gate passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    Pass,
    Fail,
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateStatus::Pass => f.write_str("pass"),
            GateStatus::Fail => f.write_str("fail"),
        }
    }
}

/// Coarse trust level attached to a scored candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named weight profile used by the scoring engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringProfile {
    Safe,
    #[default]
    Balanced,
    Speed,
}

impl ScoringProfile {
    pub const ALL: [ScoringProfile; 3] = [
        ScoringProfile::Safe,
        ScoringProfile::Balanced,
        ScoringProfile::Speed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScoringProfile::Safe => "safe",
            ScoringProfile::Balanced => "balanced",
            ScoringProfile::Speed => "speed",
        }
    }
}

impl fmt::Display for ScoringProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringProfile {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ScoringProfile::ALL
            .into_iter()
            .find(|profile| profile.as_str() == value.trim())
            .ok_or_else(|| EngineError::UnknownProfile(value.to_string()))
    }
}

/// Result of running one strategy inside its working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub candidate_id: String,
    pub strategy: String,
    pub worktree_path: String,
    /// Human-readable description of what was executed.
    pub command: String,
    /// Primary output file, relative to the working copy.
    pub output_path: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_code: i32,
}

/// Snapshot of uncommitted changes in a working copy.
///
/// `touched_paths` keeps the collaborator's report order; it carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub files_changed: u32,
    pub insertions: u64,
    pub deletions: u64,
    pub touched_paths: Vec<String>,
}

impl DiffStats {
    /// Inserted plus deleted lines.
    pub fn changed_lines(&self) -> u64 {
        self.insertions + self.deletions
    }
}

/// One named check outcome. At most one per name per candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: CheckName,
    pub status: CheckStatus,
    pub command: String,
    pub summary: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
}

/// The five gates every candidate is judged on, in their fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateName {
    PatchApply,
    ForbiddenPaths,
    LintHealth,
    TypecheckHealth,
    FunctionalViability,
}

impl GateName {
    pub const ALL: [GateName; 5] = [
        GateName::PatchApply,
        GateName::ForbiddenPaths,
        GateName::LintHealth,
        GateName::TypecheckHealth,
        GateName::FunctionalViability,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GateName::PatchApply => "patch_apply",
            GateName::ForbiddenPaths => "forbidden_paths",
            GateName::LintHealth => "lint_health",
            GateName::TypecheckHealth => "typecheck_health",
            GateName::FunctionalViability => "functional_viability",
        }
    }

    fn index(self) -> usize {
        match self {
            GateName::PatchApply => 0,
            GateName::ForbiddenPaths => 1,
            GateName::LintHealth => 2,
            GateName::TypecheckHealth => 3,
            GateName::FunctionalViability => 4,
        }
    }
}

impl fmt::Display for GateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub name: GateName,
    pub passed: bool,
    pub reason: String,
}

/// Exactly five gate results in [`GateName::ALL`] order.
///
/// The shape is fixed by construction; deserialization refuses any other
/// gate list instead of filling gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<GateResult>", into = "Vec<GateResult>")]
pub struct GateSet {
    results: [GateResult; 5],
}

impl GateSet {
    /// Build the set by asking `verdict` for each gate in fixed order.
    pub fn new(mut verdict: impl FnMut(GateName) -> (bool, String)) -> Self {
        let results = GateName::ALL.map(|name| {
            let (passed, reason) = verdict(name);
            GateResult {
                name,
                passed,
                reason,
            }
        });
        Self { results }
    }

    pub fn get(&self, name: GateName) -> &GateResult {
        &self.results[name.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &GateResult> {
        self.results.iter()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|gate| gate.passed)
    }

    pub fn status(&self) -> GateStatus {
        if self.all_passed() {
            GateStatus::Pass
        } else {
            GateStatus::Fail
        }
    }
}

impl TryFrom<Vec<GateResult>> for GateSet {
    type Error = EngineError;

    fn try_from(value: Vec<GateResult>) -> Result<Self, Self::Error> {
        let in_order = value.len() == GateName::ALL.len()
            && value
                .iter()
                .zip(GateName::ALL)
                .all(|(gate, expected)| gate.name == expected);
        if !in_order {
            return Err(EngineError::MalformedGates {
                found: value
                    .iter()
                    .map(|gate| gate.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        let results: [GateResult; 5] =
            value
                .try_into()
                .map_err(|rest: Vec<GateResult>| EngineError::MalformedGates {
                    found: format!("{} gates", rest.len()),
                })?;
        Ok(Self { results })
    }
}

impl From<GateSet> for Vec<GateResult> {
    fn from(value: GateSet) -> Self {
        value.results.into()
    }
}

/// Named warning attached to an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskFlag {
    WideBlastRadius,
    HighDiffChurn,
    TouchesSensitiveArea,
    ReducedConfidence,
}

impl RiskFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskFlag::WideBlastRadius => "wide-blast-radius",
            RiskFlag::HighDiffChurn => "high-diff-churn",
            RiskFlag::TouchesSensitiveArea => "touches-sensitive-area",
            RiskFlag::ReducedConfidence => "reduced-confidence",
        }
    }
}

impl fmt::Display for RiskFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized quality metrics, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationMetrics {
    pub correctness: f64,
    pub safety: f64,
    pub maintainability: f64,
    pub efficiency: f64,
    pub personal_fit: f64,
}

impl EvaluationMetrics {
    /// Metrics paired with their wire names, in declaration order.
    pub fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("correctness", self.correctness),
            ("safety", self.safety),
            ("maintainability", self.maintainability),
            ("efficiency", self.efficiency),
            ("personalFit", self.personal_fit),
        ]
    }
}

/// Immutable evaluation record, one per candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateEvaluation {
    pub candidate_id: String,
    pub strategy: String,
    pub gate_status: GateStatus,
    pub gates: GateSet,
    pub checks: Vec<CheckResult>,
    /// True when the test check did not pass (skipped, absent, or failed).
    pub reduced_confidence: bool,
    pub risk_flags: BTreeSet<RiskFlag>,
    pub explanation: Vec<String>,
    pub metrics: EvaluationMetrics,
    pub diff_stats: DiffStats,
    pub runtime_ms: u64,
}

impl CandidateEvaluation {
    /// Reject records that could not have come out of the assembler.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.candidate_id.trim().is_empty() {
            return Err(EngineError::EmptyCandidateId);
        }
        let derived = self.gates.status();
        if derived != self.gate_status {
            return Err(EngineError::GateStatusMismatch {
                candidate_id: self.candidate_id.clone(),
                recorded: self.gate_status,
                derived,
            });
        }
        for (metric, value) in self.metrics.named() {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::MetricOutOfRange {
                    candidate_id: self.candidate_id.clone(),
                    metric,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Weighted score components on a 0-100 scale, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub correctness: f64,
    pub safety: f64,
    pub maintainability: f64,
    pub efficiency: f64,
    pub personal_fit: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub candidate_id: String,
    pub strategy: String,
    /// `evaluation.gate_status == Pass`.
    pub eligible: bool,
    pub confidence: Confidence,
    /// `confidence == Low`.
    pub advisory: bool,
    pub evaluation: CandidateEvaluation,
    pub score: ScoreBreakdown,
}

/// Decision-specific part of a [`WinnerSelection`].
///
/// Winner fields exist only on `Winner`; the salvage pointer only on
/// `NoSafeWinner`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SelectionOutcome {
    #[serde(rename_all = "camelCase")]
    Winner {
        winner_candidate_id: String,
        winner_strategy: String,
        winner_score: f64,
        winner_confidence: Confidence,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_up_candidate_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        runner_up_delta: Option<f64>,
    },
    #[serde(rename_all = "camelCase")]
    NoSafeWinner {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        salvage_candidate_id: Option<String>,
    },
}

/// Final decision of one tournament round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSelection {
    #[serde(flatten)]
    pub outcome: SelectionOutcome,
    /// Reason trail joined with `"; "`.
    pub selection_reason: String,
    pub manual_review_required: bool,
    pub advisory: bool,
}

impl WinnerSelection {
    pub fn is_winner(&self) -> bool {
        matches!(self.outcome, SelectionOutcome::Winner { .. })
    }

    pub fn winner_candidate_id(&self) -> Option<&str> {
        match &self.outcome {
            SelectionOutcome::Winner {
                winner_candidate_id,
                ..
            } => Some(winner_candidate_id),
            SelectionOutcome::NoSafeWinner { .. } => None,
        }
    }

    pub fn salvage_candidate_id(&self) -> Option<&str> {
        match &self.outcome {
            SelectionOutcome::Winner { .. } => None,
            SelectionOutcome::NoSafeWinner {
                salvage_candidate_id,
            } => salvage_candidate_id.as_deref(),
        }
    }

    pub fn status_str(&self) -> &'static str {
        match self.outcome {
            SelectionOutcome::Winner { .. } => "winner",
            SelectionOutcome::NoSafeWinner { .. } => "no-safe-winner",
        }
    }
}

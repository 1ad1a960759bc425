//! Test-only fixtures and scripted collaborators.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::core::ranking::rank_candidates;
use crate::core::selection::{SelectionOptions, select_winner};
use crate::core::types::{
    CandidateEvaluation, CheckName, CheckResult, CheckStatus, Confidence, DiffStats,
    EvaluationMetrics, ExecutionResult, GateName, GateSet, GateStatus, ScoreBreakdown,
    ScoredCandidate, ScoringProfile,
};
use crate::io::artifacts::{ARTIFACT_SCHEMA_VERSION, GENERATOR};
use crate::io::checks::{CheckRequest, CheckRunner};
use crate::io::git::Workspaces;
use crate::io::strategy::{StrategyRequest, StrategyRunner};
use crate::report::RunReport;

/// Fixed clock used by every fixture.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 25, 10, 15, 0)
        .single()
        .expect("valid fixture timestamp")
}

pub fn execution(
    candidate_id: &str,
    strategy: &str,
    exit_code: i32,
    duration_ms: u64,
) -> ExecutionResult {
    let started_at = fixed_time();
    ExecutionResult {
        candidate_id: candidate_id.to_string(),
        strategy: strategy.to_string(),
        worktree_path: format!("/tmp/worktrees/{strategy}"),
        command: format!("scripted {strategy}"),
        output_path: format!(".referee/placeholder/{strategy}.md"),
        started_at,
        finished_at: started_at + Duration::milliseconds(duration_ms as i64),
        duration_ms,
        exit_code,
    }
}

pub fn check(name: CheckName, status: CheckStatus) -> CheckResult {
    let summary = match status {
        CheckStatus::Pass => "check completed successfully".to_string(),
        CheckStatus::Fail => "check exited with code 1".to_string(),
        CheckStatus::Skip => "check execution disabled".to_string(),
    };
    CheckResult {
        name,
        status,
        command: format!("just {name}"),
        summary,
        started_at: fixed_time(),
        finished_at: fixed_time() + Duration::milliseconds(10),
        duration_ms: 10,
        output_path: None,
    }
}

pub fn diff_stats(paths: &[&str], insertions: u64, deletions: u64) -> DiffStats {
    DiffStats {
        files_changed: paths.len() as u32,
        insertions,
        deletions,
        touched_paths: paths.iter().map(|path| path.to_string()).collect(),
    }
}

pub fn uniform_metrics(value: f64) -> EvaluationMetrics {
    EvaluationMetrics {
        correctness: value,
        safety: value,
        maintainability: value,
        efficiency: value,
        personal_fit: value,
    }
}

/// Evaluation with the given metrics. A failing status fails `patch_apply` only.
pub fn evaluation_with_metrics(
    candidate_id: &str,
    strategy: &str,
    metrics: EvaluationMetrics,
    status: GateStatus,
) -> CandidateEvaluation {
    let gates = GateSet::new(|name| match (status, name) {
        (GateStatus::Fail, GateName::PatchApply) => {
            (false, "strategy exited with code 1".to_string())
        }
        _ => (true, format!("{name} ok")),
    });
    CandidateEvaluation {
        candidate_id: candidate_id.to_string(),
        strategy: strategy.to_string(),
        gate_status: gates.status(),
        gates,
        checks: CheckName::ALL
            .into_iter()
            .map(|name| check(name, CheckStatus::Pass))
            .collect(),
        reduced_confidence: false,
        risk_flags: BTreeSet::new(),
        explanation: vec!["fixture evaluation".to_string()],
        metrics,
        diff_stats: diff_stats(&["src/lib.rs"], 10, 2),
        runtime_ms: 1_000,
    }
}

/// Strategy named by the part of `candidate_id` before its last `-`.
fn strategy_of(candidate_id: &str) -> &str {
    candidate_id
        .rsplit_once('-')
        .map_or(candidate_id, |(strategy, _)| strategy)
}

fn breakdown(total: f64) -> ScoreBreakdown {
    let part = |share: f64| (total * share * 100.0).round() / 100.0;
    ScoreBreakdown {
        correctness: part(0.40),
        safety: part(0.25),
        maintainability: part(0.20),
        efficiency: part(0.10),
        personal_fit: part(0.05),
        total,
    }
}

/// Eligible, medium-confidence candidate with the given total.
pub fn scored(candidate_id: &str, total: f64) -> ScoredCandidate {
    let strategy = strategy_of(candidate_id);
    ScoredCandidate {
        candidate_id: candidate_id.to_string(),
        strategy: strategy.to_string(),
        eligible: true,
        confidence: Confidence::Medium,
        advisory: false,
        evaluation: evaluation_with_metrics(
            candidate_id,
            strategy,
            uniform_metrics(total / 100.0),
            GateStatus::Pass,
        ),
        score: breakdown(total),
    }
}

/// Candidate that failed a hard gate.
pub fn ineligible(candidate_id: &str, total: f64) -> ScoredCandidate {
    let strategy = strategy_of(candidate_id);
    ScoredCandidate {
        candidate_id: candidate_id.to_string(),
        strategy: strategy.to_string(),
        eligible: false,
        confidence: Confidence::Low,
        advisory: true,
        evaluation: evaluation_with_metrics(
            candidate_id,
            strategy,
            uniform_metrics(total / 100.0),
            GateStatus::Fail,
        ),
        score: breakdown(total),
    }
}

/// Report for run `20260225-101500-ab12` with default selection options.
pub fn sample_report(candidates: Vec<ScoredCandidate>) -> RunReport {
    let mut strategies: Vec<String> = Vec::new();
    for candidate in &candidates {
        if !strategies.contains(&candidate.strategy) {
            strategies.push(candidate.strategy.clone());
        }
    }
    let winner = select_winner(&candidates, &SelectionOptions::default());
    let ranked = rank_candidates(&candidates).into_iter().cloned().collect();
    RunReport {
        schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
        generated_at: fixed_time() + Duration::seconds(30),
        generator: GENERATOR.to_string(),
        run_id: "20260225-101500-ab12".to_string(),
        repo_path: "/tmp/repo".to_string(),
        task: "Add retry to the HTTP client".to_string(),
        strategies,
        profile: ScoringProfile::Balanced,
        started_at: fixed_time(),
        finished_at: fixed_time() + Duration::seconds(30),
        artifacts_path: "/tmp/repo/runs/20260225-101500-ab12".to_string(),
        candidates: ranked,
        winner,
    }
}

/// Create `<parent>/repo` with one committed file and return its path.
pub fn init_repo(parent: &Path) -> PathBuf {
    let repo = parent.join("repo");
    fs::create_dir_all(&repo).expect("create repo dir");
    let git = |args: &[&str]| {
        let status = Command::new("git")
            .args([
                "-c",
                "user.name=Referee Tests",
                "-c",
                "user.email=referee@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .current_dir(&repo)
            .status()
            .expect("spawn git");
        assert!(status.success(), "git {args:?} failed");
    };
    git(&["init", "--quiet"]);
    fs::write(repo.join("README.md"), "# fixture\n").expect("write readme");
    git(&["add", "README.md"]);
    git(&["commit", "--quiet", "-m", "initial commit"]);
    repo
}

fn worktree_key(worktree: &Path) -> String {
    worktree
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// [`Workspaces`] that creates plain directories and reports scripted diffs,
/// keyed by worktree directory name.
#[derive(Debug, Default)]
pub struct ScriptedWorkspaces {
    pub diffs: BTreeMap<String, DiffStats>,
    pub fail_provision: BTreeSet<String>,
}

impl Workspaces for ScriptedWorkspaces {
    fn provision(&self, _run_id: &str, strategy: &str, dest: &Path) -> Result<PathBuf> {
        if self.fail_provision.contains(strategy) {
            bail!("scripted provisioning failure for {strategy}");
        }
        fs::create_dir_all(dest)?;
        Ok(dest.to_path_buf())
    }

    fn diff_stats(&self, worktree: &Path) -> Result<DiffStats> {
        Ok(self
            .diffs
            .get(&worktree_key(worktree))
            .cloned()
            .unwrap_or_else(|| diff_stats(&["src/lib.rs"], 10, 2)))
    }

    fn write_patch(&self, worktree: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, format!("scripted patch for {}\n", worktree_key(worktree)))?;
        Ok(())
    }
}

/// [`StrategyRunner`] returning scripted exit codes (default 0).
#[derive(Debug, Default)]
pub struct ScriptedStrategies {
    pub exit_codes: BTreeMap<String, i32>,
    pub duration_ms: u64,
}

impl StrategyRunner for ScriptedStrategies {
    fn run(&self, request: &StrategyRequest) -> Result<ExecutionResult> {
        let exit_code = self.exit_codes.get(&request.strategy).copied().unwrap_or(0);
        let mut result = execution(
            &request.candidate_id,
            &request.strategy,
            exit_code,
            self.duration_ms,
        );
        result.worktree_path = request.worktree.display().to_string();
        Ok(result)
    }
}

/// [`CheckRunner`] returning scripted statuses keyed by worktree directory
/// name; unscripted checks pass and disabled checks skip.
#[derive(Debug, Default)]
pub struct ScriptedChecks {
    pub statuses: BTreeMap<(String, CheckName), CheckStatus>,
}

impl CheckRunner for ScriptedChecks {
    fn run(&self, request: &CheckRequest) -> CheckResult {
        if !request.enabled {
            return check(request.name, CheckStatus::Skip);
        }
        let status = self
            .statuses
            .get(&(worktree_key(&request.worktree), request.name))
            .copied()
            .unwrap_or(CheckStatus::Pass);
        check(request.name, status)
    }
}

//! One tournament round: provision, execute, evaluate, score, rank, select, report.
//!
//! Candidates run through the bounded pool; each one writes its artifacts
//! as it goes. Once every candidate is scored the engine ranks them and picks
//! a winner, and the round report is validated before it is written.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, instrument};

use crate::core::evaluation::{EvaluationInput, EvaluationPolicy, evaluate_candidate};
use crate::core::ranking::rank_candidates;
use crate::core::scoring::score_candidate;
use crate::core::selection::{SelectionOptions, select_winner};
use crate::core::types::{CheckName, ScoredCandidate, ScoringProfile};
use crate::io::artifacts::{
    self, EVALUATION_FILE, EXECUTION_FILE, PATCH_FILE, RunLayout, SCORE_FILE, write_artifact,
    write_json,
};
use crate::io::checks::{CheckRequest, CheckRunner};
use crate::io::git::{Git, Workspaces, sanitize_name};
use crate::io::strategy::{StrategyRequest, StrategyRunner};
use crate::pool::map_bounded;
use crate::report::{RunReport, format_summary, render_markdown, validate_report};

pub const DEFAULT_STRATEGIES: &str = "safe,balanced,aggressive";

/// What the caller asked for.
#[derive(Debug, Clone)]
pub struct RoundRequest {
    pub task: String,
    pub repo: PathBuf,
    pub strategies: Vec<String>,
    pub max_parallel: usize,
    pub profile: ScoringProfile,
    pub run_checks: bool,
    pub json_out: Option<PathBuf>,
}

/// Policy knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct RoundSettings {
    pub runs_root: PathBuf,
    pub evaluation: EvaluationPolicy,
    pub selection: SelectionOptions,
    pub acceptance: BTreeMap<String, f64>,
}

/// External collaborators for one round.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub workspaces: &'a dyn Workspaces,
    pub strategies: &'a dyn StrategyRunner,
    pub checks: &'a dyn CheckRunner,
}

#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub layout: RunLayout,
    pub report: RunReport,
}

impl RoundOutcome {
    pub fn summary(&self) -> String {
        format_summary(&self.report)
    }
}

/// Split a comma-separated list, trimming and keeping first occurrences.
pub fn parse_strategies(csv: &str) -> Result<Vec<String>> {
    let mut strategies: Vec<String> = Vec::new();
    let mut directories: HashMap<String, String> = HashMap::new();
    for entry in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if strategies.iter().any(|existing| existing == entry) {
            continue;
        }
        if let Some(previous) = directories.insert(sanitize_name(entry), entry.to_string()) {
            bail!("strategies '{previous}' and '{entry}' map to the same directory name");
        }
        strategies.push(entry.to_string());
    }
    if strategies.is_empty() {
        bail!("no strategies provided");
    }
    Ok(strategies)
}

/// Refuse to run outside a git repository, or on a dirty one unless allowed.
///
/// Earlier runs under `runs_dir` do not count as dirt.
#[instrument(skip_all, fields(repo = %repo.display(), allow_dirty))]
pub fn preflight_repository(repo: &Path, runs_dir: &Path, allow_dirty: bool) -> Result<()> {
    let git = Git::new(repo);
    git.ensure_repository()?;
    if allow_dirty {
        return Ok(());
    }
    let runs_prefix = if runs_dir.is_absolute() {
        None
    } else {
        Some(format!(
            "{}/",
            runs_dir.to_string_lossy().replace('\\', "/").trim_end_matches('/')
        ))
    };
    let allowed: Vec<&str> = runs_prefix.as_deref().into_iter().collect();
    git.ensure_clean_except_prefixes(&allowed)
}

/// Run one full round and write its report.
#[instrument(skip_all, fields(strategies = request.strategies.len(), profile = %request.profile))]
pub fn run_round(
    request: &RoundRequest,
    settings: &RoundSettings,
    collaborators: Collaborators<'_>,
) -> Result<RoundOutcome> {
    if request.strategies.is_empty() {
        bail!("no strategies provided");
    }
    if request.task.trim().is_empty() {
        bail!("task must be non-empty");
    }

    let started_at = Utc::now();
    let run_id = artifacts::generate_run_id(started_at);
    let layout = RunLayout::new(&settings.runs_root, &run_id);
    layout.create()?;
    info!(run_id = %run_id, root = %layout.root.display(), "starting tournament round");

    let scored = map_bounded(&request.strategies, request.max_parallel, |index, strategy| {
        run_candidate(request, settings, collaborators, &layout, index, strategy)
            .with_context(|| format!("candidate for strategy '{strategy}'"))
    })?;

    let ranked: Vec<ScoredCandidate> = rank_candidates(&scored).into_iter().cloned().collect();
    let winner = select_winner(&scored, &settings.selection);
    let finished_at = Utc::now();

    let report = RunReport {
        schema_version: artifacts::ARTIFACT_SCHEMA_VERSION.to_string(),
        generated_at: finished_at,
        generator: artifacts::GENERATOR.to_string(),
        run_id: run_id.clone(),
        repo_path: request.repo.display().to_string(),
        task: request.task.clone(),
        strategies: request.strategies.clone(),
        profile: request.profile,
        started_at,
        finished_at,
        artifacts_path: layout.root.display().to_string(),
        candidates: ranked,
        winner,
    };
    validate_report(&report)?;

    write_json(&layout.report_json(), &report)?;
    let markdown = render_markdown(&report)?;
    std::fs::write(layout.report_markdown(), markdown)
        .with_context(|| format!("write {}", layout.report_markdown().display()))?;
    if let Some(path) = &request.json_out {
        write_json(path, &report)?;
    }

    info!(
        run_id = %run_id,
        status = report.winner.status_str(),
        manual_review = report.winner.manual_review_required,
        "tournament round finished"
    );
    Ok(RoundOutcome { layout, report })
}

#[instrument(skip_all, fields(strategy = %strategy, index))]
fn run_candidate(
    request: &RoundRequest,
    settings: &RoundSettings,
    collaborators: Collaborators<'_>,
    layout: &RunLayout,
    index: usize,
    strategy: &str,
) -> Result<ScoredCandidate> {
    let candidate_id = artifacts::candidate_id(strategy, index);
    let candidate_dir = layout.candidate_dir(strategy);

    let worktree = collaborators.workspaces.provision(
        &layout.run_id,
        strategy,
        &layout.worktree_dir(strategy),
    )?;

    let execution = collaborators.strategies.run(&StrategyRequest {
        run_id: layout.run_id.clone(),
        candidate_id: candidate_id.clone(),
        task: request.task.clone(),
        strategy: strategy.to_string(),
        worktree: worktree.clone(),
        log_path: candidate_dir.join("strategy.log"),
    })?;
    write_artifact(&candidate_dir.join(EXECUTION_FILE), &execution)?;

    let diff_stats = collaborators.workspaces.diff_stats(&worktree)?;
    collaborators
        .workspaces
        .write_patch(&worktree, &candidate_dir.join(PATCH_FILE))?;

    let checks = CheckName::ALL
        .into_iter()
        .map(|name| {
            collaborators.checks.run(&CheckRequest {
                name,
                worktree: worktree.clone(),
                log_dir: candidate_dir.join("checks"),
                enabled: request.run_checks,
            })
        })
        .collect();

    let evaluation = evaluate_candidate(
        EvaluationInput {
            candidate_id: candidate_id.clone(),
            strategy: strategy.to_string(),
            execution,
            diff_stats,
            checks,
            historical_acceptance: settings.acceptance.get(strategy).copied(),
        },
        &settings.evaluation,
    )?;
    write_artifact(&candidate_dir.join(EVALUATION_FILE), &evaluation)?;

    let scored = score_candidate(evaluation, request.profile)?;
    write_artifact(&candidate_dir.join(SCORE_FILE), &scored.score)?;

    info!(
        candidate = %candidate_id,
        eligible = scored.eligible,
        score = scored.score.total,
        confidence = scored.confidence.as_str(),
        "candidate evaluated"
    );
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_are_trimmed_and_deduplicated() {
        assert_eq!(
            parse_strategies(" safe, balanced ,,safe,aggressive ").expect("parse"),
            vec!["safe", "balanced", "aggressive"]
        );
    }

    #[test]
    fn empty_strategy_list_is_rejected() {
        assert!(parse_strategies(" , ,").is_err());
    }

    #[test]
    fn colliding_directory_names_are_rejected() {
        let err = parse_strategies("fast path,fast-path").expect_err("collision");
        assert!(err.to_string().contains("same directory name"));
    }

    #[test]
    fn default_strategy_list_parses() {
        assert_eq!(
            parse_strategies(DEFAULT_STRATEGIES).expect("parse").len(),
            3
        );
    }
}

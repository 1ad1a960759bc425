//! Run report: the persisted record of one tournament round and its renderings.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use jsonschema::Draft;
use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{ScoredCandidate, ScoringProfile, SelectionOutcome, WinnerSelection};

const RUN_REPORT_SCHEMA: &str = include_str!("../schemas/run_report/v1.schema.json");
const REPORT_TEMPLATE: &str = include_str!("templates/report.md");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub generator: String,
    pub run_id: String,
    pub repo_path: String,
    pub task: String,
    pub strategies: Vec<String>,
    pub profile: ScoringProfile,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub artifacts_path: String,
    /// Ranked best first.
    pub candidates: Vec<ScoredCandidate>,
    pub winner: WinnerSelection,
}

/// Validate a report against the embedded JSON schema (Draft 2020-12).
pub fn validate_report(report: &RunReport) -> Result<()> {
    let instance = serde_json::to_value(report).context("serialize run report")?;
    validate_report_value(&instance)
}

pub fn validate_report_value(instance: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(RUN_REPORT_SCHEMA).context("parse run report schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile run report schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!(
            "run report schema validation failed:\n- {}",
            messages.join("\n- ")
        );
    }
    Ok(())
}

/// One-line result, e.g. `Run <id>: winner safe-01 (91.25, high)`.
pub fn format_summary(report: &RunReport) -> String {
    match &report.winner.outcome {
        SelectionOutcome::Winner {
            winner_candidate_id,
            winner_score,
            winner_confidence,
            ..
        } => format!(
            "Run {}: winner {winner_candidate_id} ({winner_score:.2}, {winner_confidence})",
            report.run_id
        ),
        SelectionOutcome::NoSafeWinner { .. } => {
            format!("Run {}: no-safe-winner", report.run_id)
        }
    }
}

#[derive(Debug, Serialize)]
struct WinnerRow {
    status: &'static str,
    candidate: String,
    strategy: String,
    score: String,
    confidence: String,
    manual_review: bool,
    advisory: bool,
}

#[derive(Debug, Serialize)]
struct CandidateRow {
    candidate_id: String,
    strategy: String,
    eligible: bool,
    total: String,
    confidence: &'static str,
    correctness: String,
    safety: String,
    maintainability: String,
    efficiency: String,
    personal_fit: String,
}

impl CandidateRow {
    fn from_candidate(candidate: &ScoredCandidate) -> Self {
        let score = &candidate.score;
        Self {
            candidate_id: candidate.candidate_id.clone(),
            strategy: candidate.strategy.clone(),
            eligible: candidate.eligible,
            total: format!("{:.2}", score.total),
            confidence: candidate.confidence.as_str(),
            correctness: format!("{:.2}", score.correctness),
            safety: format!("{:.2}", score.safety),
            maintainability: format!("{:.2}", score.maintainability),
            efficiency: format!("{:.2}", score.efficiency),
            personal_fit: format!("{:.2}", score.personal_fit),
        }
    }
}

fn winner_row(selection: &WinnerSelection) -> WinnerRow {
    let na = || "n/a".to_string();
    match &selection.outcome {
        SelectionOutcome::Winner {
            winner_candidate_id,
            winner_strategy,
            winner_score,
            winner_confidence,
            ..
        } => WinnerRow {
            status: selection.status_str(),
            candidate: winner_candidate_id.clone(),
            strategy: winner_strategy.clone(),
            score: format!("{winner_score:.2}"),
            confidence: winner_confidence.to_string(),
            manual_review: selection.manual_review_required,
            advisory: selection.advisory,
        },
        SelectionOutcome::NoSafeWinner {
            salvage_candidate_id,
        } => WinnerRow {
            status: selection.status_str(),
            candidate: salvage_candidate_id.clone().unwrap_or_else(na),
            strategy: na(),
            score: na(),
            confidence: na(),
            manual_review: selection.manual_review_required,
            advisory: selection.advisory,
        },
    }
}

/// Detailed markdown document for humans.
pub fn render_markdown(report: &RunReport) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report.md", REPORT_TEMPLATE)
        .context("load report template")?;
    let template = env.get_template("report.md")?;
    let candidates: Vec<CandidateRow> = report
        .candidates
        .iter()
        .map(CandidateRow::from_candidate)
        .collect();
    let mut rendered = template
        .render(context! {
            run_id => report.run_id,
            task => report.task.trim(),
            repo_path => report.repo_path,
            profile => report.profile.as_str(),
            started_at => report.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            finished_at => report.finished_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            artifacts_path => report.artifacts_path,
            winner => winner_row(&report.winner),
            candidates => candidates,
            selection_reason => report.winner.selection_reason,
        })
        .context("render report markdown")?;
    rendered.push('\n');
    Ok(rendered)
}

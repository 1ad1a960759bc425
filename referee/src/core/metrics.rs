//! Normalized quality metrics derived from raw candidate signals.
//!
//! Every metric is clamped into `[0, 1]` before it leaves this module. The
//! `safety` and `maintainability` formulas apply their penalties to the
//! combined value and clamp once at the end, so two independent penalties can
//! saturate at zero without either being visible on its own.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::gates::find_check;
use crate::core::types::{
    CheckName, CheckResult, CheckStatus, DiffStats, EvaluationMetrics, ExecutionResult, RiskFlag,
};

/// Case-insensitive pattern for paths in sensitive areas.
pub const DEFAULT_RISKY_PATH_PATTERN: &str = r"(auth|payment|security|infra|core)";

pub static DEFAULT_RISKY_PATHS: LazyLock<Regex> = LazyLock::new(|| {
    risky_path_regex(DEFAULT_RISKY_PATH_PATTERN).expect("default risky path pattern is valid")
});

/// Compile a risky-path pattern with case-insensitive matching.
pub fn risky_path_regex(pattern: &str) -> Result<Regex, regex::Error> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
}

const TEST_WEIGHT: f64 = 0.625;
const LINT_WEIGHT: f64 = 0.1875;
const TYPECHECK_WEIGHT: f64 = 0.1875;

const BLAST_RADIUS_FILES: f64 = 40.0;
const CHURN_LINES: f64 = 800.0;
const BLAST_RADIUS_SHARE: f64 = 0.6;
const CHURN_SHARE: f64 = 0.4;
const SENSITIVE_AREA_PENALTY: f64 = 0.2;

const MAINTAINABILITY_BASE: f64 = 0.55;
const DOCS_OR_TESTS_BONUS: f64 = 0.15;
const MAINTAINABILITY_CHURN_LINES: f64 = 1200.0;
const MAINTAINABILITY_MAX_PENALTY: f64 = 0.45;

/// Runtime at which efficiency reaches zero (two minutes).
const EFFICIENCY_HORIZON_MS: f64 = 2.0 * 60.0 * 1000.0;

const WIDE_BLAST_RADIUS_FILES: u32 = 20;
const HIGH_CHURN_LINES: u64 = 500;

/// Signals the calculator reads. All borrowed, nothing retained.
#[derive(Debug, Clone, Copy)]
pub struct MetricInputs<'a> {
    pub strategy: &'a str,
    pub execution: &'a ExecutionResult,
    pub diff: &'a DiffStats,
    pub checks: &'a [CheckResult],
    pub reduced_confidence: bool,
    /// Overrides the strategy-keyed personal fit default when present.
    pub historical_acceptance: Option<f64>,
    pub risky_paths: &'a Regex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricReport {
    pub metrics: EvaluationMetrics,
    pub risk_flags: BTreeSet<RiskFlag>,
    /// One line per metric, in metric order.
    pub explanation: Vec<String>,
}

pub fn calculate_metrics(inputs: &MetricInputs<'_>) -> MetricReport {
    let diff = inputs.diff;
    let changed_lines = diff.changed_lines();
    let touches_sensitive_area = diff
        .touched_paths
        .iter()
        .any(|path| inputs.risky_paths.is_match(path));

    let correctness = clamp_unit(
        status_score(inputs.checks, CheckName::Test) * TEST_WEIGHT
            + status_score(inputs.checks, CheckName::Lint) * LINT_WEIGHT
            + status_score(inputs.checks, CheckName::Typecheck) * TYPECHECK_WEIGHT,
    );

    let blast_radius = clamp_unit(1.0 - f64::from(diff.files_changed) / BLAST_RADIUS_FILES);
    let churn = clamp_unit(1.0 - changed_lines as f64 / CHURN_LINES);
    let sensitive_penalty = if touches_sensitive_area {
        SENSITIVE_AREA_PENALTY
    } else {
        0.0
    };
    let safety = clamp_unit(
        blast_radius * BLAST_RADIUS_SHARE + churn * CHURN_SHARE - sensitive_penalty,
    );

    let docs_bonus = if touches_docs_or_tests(diff) {
        DOCS_OR_TESTS_BONUS
    } else {
        0.0
    };
    let churn_penalty =
        (changed_lines as f64 / MAINTAINABILITY_CHURN_LINES).min(MAINTAINABILITY_MAX_PENALTY);
    let maintainability = clamp_unit(MAINTAINABILITY_BASE + docs_bonus - churn_penalty);

    let efficiency =
        clamp_unit(1.0 - inputs.execution.duration_ms as f64 / EFFICIENCY_HORIZON_MS);

    let personal_fit = clamp_unit(
        inputs
            .historical_acceptance
            .unwrap_or_else(|| default_personal_fit(inputs.strategy)),
    );

    let mut risk_flags = BTreeSet::new();
    if diff.files_changed > WIDE_BLAST_RADIUS_FILES {
        risk_flags.insert(RiskFlag::WideBlastRadius);
    }
    if changed_lines > HIGH_CHURN_LINES {
        risk_flags.insert(RiskFlag::HighDiffChurn);
    }
    if touches_sensitive_area {
        risk_flags.insert(RiskFlag::TouchesSensitiveArea);
    }
    if inputs.reduced_confidence {
        risk_flags.insert(RiskFlag::ReducedConfidence);
    }

    let personal_fit_source = if inputs.historical_acceptance.is_some() {
        "historical acceptance"
    } else {
        "baseline"
    };
    let explanation = vec![
        format!("correctness derived from checks (test/lint/typecheck) => {correctness:.2}"),
        format!("safety derived from blast radius and churn => {safety:.2}"),
        format!(
            "maintainability adjusted by diff churn and docs/tests touch => {maintainability:.2}"
        ),
        format!("efficiency derived from strategy runtime => {efficiency:.2}"),
        format!(
            "personal fit {personal_fit_source} for strategy '{}' => {personal_fit:.2}",
            inputs.strategy
        ),
    ];

    MetricReport {
        metrics: EvaluationMetrics {
            correctness,
            safety,
            maintainability,
            efficiency,
            personal_fit,
        },
        risk_flags,
        explanation,
    }
}

/// Personal fit when no acceptance history exists for the strategy.
pub fn default_personal_fit(strategy: &str) -> f64 {
    match strategy {
        "safe" => 0.7,
        "balanced" => 0.6,
        _ => 0.5,
    }
}

/// Clamp into `[0, 1]`; NaN collapses to zero.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// `pass` → 1, `fail` → 0, `skip` or absent → 0.5.
fn status_score(checks: &[CheckResult], name: CheckName) -> f64 {
    match find_check(checks, name).map(|check| check.status) {
        Some(CheckStatus::Pass) => 1.0,
        Some(CheckStatus::Fail) => 0.0,
        Some(CheckStatus::Skip) | None => 0.5,
    }
}

fn touches_docs_or_tests(diff: &DiffStats) -> bool {
    diff.touched_paths.iter().any(|path| {
        let lowered = path.to_lowercase();
        lowered.contains("readme") || lowered.contains("docs/") || lowered.contains("test")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn execution(duration_ms: u64) -> ExecutionResult {
        let at = Utc.with_ymd_and_hms(2026, 2, 25, 0, 0, 0).unwrap();
        ExecutionResult {
            candidate_id: "balanced-02".to_string(),
            strategy: "balanced".to_string(),
            worktree_path: "/tmp/wt".to_string(),
            command: "placeholder.write-file".to_string(),
            output_path: "out.md".to_string(),
            started_at: at,
            finished_at: at,
            duration_ms,
            exit_code: 0,
        }
    }

    fn check(name: CheckName, status: CheckStatus) -> CheckResult {
        let at = Utc.with_ymd_and_hms(2026, 2, 25, 0, 0, 0).unwrap();
        CheckResult {
            name,
            status,
            command: format!("just {name}"),
            summary: status.as_str().to_string(),
            started_at: at,
            finished_at: at,
            duration_ms: 10,
            output_path: None,
        }
    }

    fn diff(files: u32, insertions: u64, deletions: u64, paths: &[&str]) -> DiffStats {
        DiffStats {
            files_changed: files,
            insertions,
            deletions,
            touched_paths: paths.iter().map(|path| path.to_string()).collect(),
        }
    }

    fn calculate(
        strategy: &str,
        duration_ms: u64,
        diff: &DiffStats,
        checks: &[CheckResult],
        historical_acceptance: Option<f64>,
    ) -> MetricReport {
        let execution = execution(duration_ms);
        calculate_metrics(&MetricInputs {
            strategy,
            execution: &execution,
            diff,
            checks,
            reduced_confidence: false,
            historical_acceptance,
            risky_paths: &DEFAULT_RISKY_PATHS,
        })
    }

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn correctness_blends_check_statuses() {
        let checks = vec![
            check(CheckName::Test, CheckStatus::Pass),
            check(CheckName::Lint, CheckStatus::Fail),
        ];
        let report = calculate("balanced", 0, &DiffStats::default(), &checks, None);
        // 1.0 * 0.625 + 0.0 * 0.1875 + 0.5 * 0.1875
        assert!(close(report.metrics.correctness, 0.71875));
    }

    #[test]
    fn safety_combines_blast_radius_and_churn() {
        let diff = diff(10, 150, 50, &["src/client.rs"]);
        let report = calculate("balanced", 0, &diff, &[], None);
        // 0.6 * 0.75 + 0.4 * 0.75
        assert!(close(report.metrics.safety, 0.75));
    }

    #[test]
    fn sensitive_area_penalty_saturates_at_zero() {
        let diff = diff(40, 900, 0, &["src/Auth/session.rs"]);
        let report = calculate("balanced", 0, &diff, &[], None);
        assert_eq!(report.metrics.safety, 0.0);
        assert!(report.risk_flags.contains(&RiskFlag::TouchesSensitiveArea));
        assert!(report.risk_flags.contains(&RiskFlag::WideBlastRadius));
        assert!(report.risk_flags.contains(&RiskFlag::HighDiffChurn));
    }

    #[test]
    fn maintainability_rewards_docs_and_caps_churn_penalty() {
        let docs = diff(1, 0, 0, &["docs/usage.md"]);
        let report = calculate("balanced", 0, &docs, &[], None);
        assert!(close(report.metrics.maintainability, 0.70));

        let churny = diff(1, 5000, 5000, &["src/engine.rs"]);
        let report = calculate("balanced", 0, &churny, &[], None);
        assert!(close(report.metrics.maintainability, 0.10));
    }

    #[test]
    fn efficiency_spans_two_minutes() {
        let empty = DiffStats::default();
        assert_eq!(calculate("x", 0, &empty, &[], None).metrics.efficiency, 1.0);
        assert!(close(
            calculate("x", 30_000, &empty, &[], None).metrics.efficiency,
            0.75
        ));
        assert_eq!(
            calculate("x", 240_000, &empty, &[], None).metrics.efficiency,
            0.0
        );
    }

    #[test]
    fn personal_fit_prefers_history_then_strategy_default() {
        let empty = DiffStats::default();
        assert_eq!(calculate("safe", 0, &empty, &[], None).metrics.personal_fit, 0.7);
        assert_eq!(
            calculate("balanced", 0, &empty, &[], None).metrics.personal_fit,
            0.6
        );
        assert_eq!(
            calculate("aggressive", 0, &empty, &[], None).metrics.personal_fit,
            0.5
        );
        assert_eq!(
            calculate("aggressive", 0, &empty, &[], Some(0.92))
                .metrics
                .personal_fit,
            0.92
        );
        assert_eq!(
            calculate("safe", 0, &empty, &[], Some(1.7)).metrics.personal_fit,
            1.0
        );
    }

    #[test]
    fn explanation_cites_each_metric() {
        let report = calculate("safe", 60_000, &DiffStats::default(), &[], None);
        assert_eq!(report.explanation.len(), 5);
        assert_eq!(
            report.explanation[3],
            "efficiency derived from strategy runtime => 0.50"
        );
        assert_eq!(
            report.explanation[4],
            "personal fit baseline for strategy 'safe' => 0.70"
        );
    }

    #[test]
    fn reduced_confidence_becomes_a_risk_flag() {
        let execution = execution(0);
        let report = calculate_metrics(&MetricInputs {
            strategy: "safe",
            execution: &execution,
            diff: &DiffStats::default(),
            checks: &[],
            reduced_confidence: true,
            historical_acceptance: None,
            risky_paths: &DEFAULT_RISKY_PATHS,
        });
        assert_eq!(
            report.risk_flags.into_iter().collect::<Vec<_>>(),
            vec![RiskFlag::ReducedConfidence]
        );
    }

    #[test]
    fn clamp_unit_handles_nan() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(-0.3), 0.0);
        assert_eq!(clamp_unit(1.3), 1.0);
    }
}

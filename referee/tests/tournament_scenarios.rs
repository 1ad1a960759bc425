//! End-to-end scenarios for the engine and for a full round with scripted collaborators.

use std::collections::BTreeMap;
use std::path::Path;

use referee::core::evaluation::{EvaluationInput, EvaluationPolicy, evaluate_candidate};
use referee::core::ranking::rank_candidates;
use referee::core::scoring::score_candidate;
use referee::core::selection::{SelectionOptions, select_winner};
use referee::core::types::{
    CheckName, CheckStatus, Confidence, GateName, GateStatus, RiskFlag, ScoringProfile,
    SelectionOutcome,
};
use referee::io::artifacts::{
    ArtifactEnvelope, EVALUATION_FILE, EXECUTION_FILE, PATCH_FILE, SCORE_FILE, read_artifact,
    read_json,
};
use referee::report::{RunReport, validate_report_value};
use referee::test_support::{
    ScriptedChecks, ScriptedStrategies, ScriptedWorkspaces, check, diff_stats,
    evaluation_with_metrics, execution, ineligible, uniform_metrics,
};
use referee::tournament::{Collaborators, RoundRequest, RoundSettings, run_round};

fn input(checks: [CheckStatus; 3]) -> EvaluationInput {
    EvaluationInput {
        candidate_id: "safe-01".to_string(),
        strategy: "safe".to_string(),
        execution: execution("safe-01", "safe", 0, 2_000),
        diff_stats: diff_stats(&["src/client.rs", "tests/client.rs"], 40, 5),
        checks: CheckName::ALL
            .into_iter()
            .zip(checks)
            .map(|(name, status)| check(name, status))
            .collect(),
        historical_acceptance: None,
    }
}

#[test]
fn skipped_tests_pass_gates_with_reduced_confidence() {
    let evaluation = evaluate_candidate(
        input([CheckStatus::Skip, CheckStatus::Pass, CheckStatus::Pass]),
        &EvaluationPolicy::default(),
    )
    .expect("evaluate");

    assert_eq!(evaluation.gate_status, GateStatus::Pass);
    assert!(evaluation.reduced_confidence);
    assert!(evaluation.risk_flags.contains(&RiskFlag::ReducedConfidence));
}

#[test]
fn failed_lint_fails_lint_gate() {
    let evaluation = evaluate_candidate(
        input([CheckStatus::Pass, CheckStatus::Fail, CheckStatus::Pass]),
        &EvaluationPolicy::default(),
    )
    .expect("evaluate");

    assert_eq!(evaluation.gate_status, GateStatus::Fail);
    assert!(!evaluation.gates.get(GateName::LintHealth).passed);
    assert!(evaluation.gates.get(GateName::PatchApply).passed);
}

#[test]
fn perfect_metrics_score_one_hundred_with_high_confidence() {
    let scored = score_candidate(
        evaluation_with_metrics("safe-01", "safe", uniform_metrics(1.0), GateStatus::Pass),
        ScoringProfile::Balanced,
    )
    .expect("score");

    assert_eq!(scored.score.total, 100.0);
    assert!(scored.eligible);
    assert_eq!(scored.confidence, Confidence::High);
}

#[test]
fn one_point_lead_requires_manual_review() {
    let leader = score_candidate(
        evaluation_with_metrics("safe-01", "safe", uniform_metrics(0.9), GateStatus::Pass),
        ScoringProfile::Balanced,
    )
    .expect("score");
    let chaser = score_candidate(
        evaluation_with_metrics("balanced-02", "balanced", uniform_metrics(0.89), GateStatus::Pass),
        ScoringProfile::Balanced,
    )
    .expect("score");
    assert_eq!(leader.score.total, 90.0);
    assert_eq!(chaser.score.total, 89.0);

    let selection = select_winner(&[chaser, leader], &SelectionOptions::default());
    assert_eq!(selection.winner_candidate_id(), Some("safe-01"));
    assert!(selection.manual_review_required);
    assert!(selection.selection_reason.contains("tie-breakers applied"));
    assert!(selection.selection_reason.contains("manual review required"));
    match selection.outcome {
        SelectionOutcome::Winner {
            runner_up_candidate_id,
            runner_up_delta,
            ..
        } => {
            assert_eq!(runner_up_candidate_id.as_deref(), Some("balanced-02"));
            assert_eq!(runner_up_delta, Some(1.0));
        }
        SelectionOutcome::NoSafeWinner { .. } => panic!("expected a winner"),
    }
}

#[test]
fn lone_ineligible_candidate_is_salvage() {
    let selection = select_winner(
        &[ineligible("aggressive-03", 77.0)],
        &SelectionOptions::default(),
    );
    assert_eq!(selection.status_str(), "no-safe-winner");
    assert_eq!(selection.salvage_candidate_id(), Some("aggressive-03"));
}

#[test]
fn empty_candidate_set_ranks_to_empty() {
    assert!(rank_candidates(&[]).is_empty());
}

fn request(task: &str, strategies: &[&str], run_checks: bool) -> RoundRequest {
    RoundRequest {
        task: task.to_string(),
        repo: "/tmp/repo".into(),
        strategies: strategies.iter().map(|s| s.to_string()).collect(),
        max_parallel: 2,
        profile: ScoringProfile::Balanced,
        run_checks,
        json_out: None,
    }
}

fn settings(runs_root: &Path) -> RoundSettings {
    RoundSettings {
        runs_root: runs_root.to_path_buf(),
        evaluation: EvaluationPolicy::default(),
        selection: SelectionOptions::default(),
        acceptance: BTreeMap::new(),
    }
}

#[test]
fn scripted_round_writes_artifacts_and_picks_safe_candidate() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspaces = ScriptedWorkspaces {
        diffs: BTreeMap::from([(
            "balanced".to_string(),
            diff_stats(&["src/auth/login.rs"], 30, 4),
        )]),
        ..ScriptedWorkspaces::default()
    };
    let strategies = ScriptedStrategies::default();
    let checks = ScriptedChecks {
        statuses: BTreeMap::from([(
            ("aggressive".to_string(), CheckName::Lint),
            CheckStatus::Fail,
        )]),
    };
    let mut round_request = request("Add retry", &["safe", "balanced", "aggressive"], true);
    let json_out = temp.path().join("out").join("report.json");
    round_request.json_out = Some(json_out.clone());
    let mut round_settings = settings(&temp.path().join("runs"));
    round_settings
        .acceptance
        .insert("balanced".to_string(), 1.0);

    let outcome = run_round(
        &round_request,
        &round_settings,
        Collaborators {
            workspaces: &workspaces,
            strategies: &strategies,
            checks: &checks,
        },
    )
    .expect("round");

    let report = &outcome.report;
    assert_eq!(report.winner.winner_candidate_id(), Some("safe-01"));
    assert_eq!(report.candidates.len(), 3);
    assert_eq!(report.candidates[0].candidate_id, "safe-01");
    let aggressive = report
        .candidates
        .iter()
        .find(|candidate| candidate.candidate_id == "aggressive-03")
        .expect("aggressive candidate");
    assert!(!aggressive.eligible);
    let balanced = report
        .candidates
        .iter()
        .find(|candidate| candidate.strategy == "balanced")
        .expect("balanced candidate");
    assert_eq!(balanced.evaluation.metrics.personal_fit, 1.0);
    assert!(
        balanced
            .evaluation
            .risk_flags
            .contains(&RiskFlag::TouchesSensitiveArea)
    );

    let root = &outcome.layout.root;
    let candidate_dir = root.join("candidates").join("safe");
    for file in [EXECUTION_FILE, PATCH_FILE, EVALUATION_FILE, SCORE_FILE] {
        assert!(candidate_dir.join(file).is_file(), "missing {file}");
    }
    let envelope: ArtifactEnvelope<serde_json::Value> =
        read_artifact(&candidate_dir.join(SCORE_FILE)).expect("score artifact");
    assert_eq!(envelope.schema_version, "1.0.0");
    assert_eq!(envelope.data["total"], report.candidates[0].score.total);

    let raw: serde_json::Value = read_json(&outcome.layout.report_json()).expect("report json");
    validate_report_value(&raw).expect("schema-valid report");
    let persisted: RunReport = read_json(&json_out).expect("json-out copy");
    assert_eq!(&persisted, report);

    let markdown = std::fs::read_to_string(outcome.layout.report_markdown()).expect("markdown");
    assert!(markdown.contains("| safe-01 | safe | true |"));
    assert!(outcome.summary().starts_with(&format!("Run {}: winner safe-01 (", report.run_id)));
}

#[test]
fn failing_strategies_produce_no_safe_winner_report() {
    let temp = tempfile::tempdir().expect("tempdir");
    let strategies = ScriptedStrategies {
        exit_codes: BTreeMap::from([("safe".to_string(), 1), ("speed".to_string(), -1)]),
        duration_ms: 500,
    };
    let outcome = run_round(
        &request("Fix flaky test", &["safe", "speed"], true),
        &settings(temp.path()),
        Collaborators {
            workspaces: &ScriptedWorkspaces::default(),
            strategies: &strategies,
            checks: &ScriptedChecks::default(),
        },
    )
    .expect("round completes");

    assert!(!outcome.report.winner.is_winner());
    assert!(outcome.report.winner.salvage_candidate_id().is_some());
    assert_eq!(
        outcome.summary(),
        format!("Run {}: no-safe-winner", outcome.report.run_id)
    );
    assert!(outcome.layout.report_markdown().is_file());
}

#[test]
fn disabled_checks_give_an_advisory_winner() {
    let temp = tempfile::tempdir().expect("tempdir");
    let outcome = run_round(
        &request("Tidy docs", &["safe"], false),
        &settings(temp.path()),
        Collaborators {
            workspaces: &ScriptedWorkspaces::default(),
            strategies: &ScriptedStrategies::default(),
            checks: &ScriptedChecks::default(),
        },
    )
    .expect("round");

    let winner = &outcome.report.winner;
    assert!(winner.is_winner());
    assert!(winner.advisory);
    assert!(!winner.manual_review_required);
    let candidate = &outcome.report.candidates[0];
    assert!(candidate.evaluation.reduced_confidence);
    assert!(
        candidate
            .evaluation
            .checks
            .iter()
            .all(|check| check.status == CheckStatus::Skip)
    );
}

#[test]
fn provisioning_failure_aborts_the_round() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspaces = ScriptedWorkspaces {
        fail_provision: ["balanced".to_string()].into(),
        ..ScriptedWorkspaces::default()
    };
    let err = run_round(
        &request("Add retry", &["safe", "balanced"], false),
        &settings(temp.path()),
        Collaborators {
            workspaces: &workspaces,
            strategies: &ScriptedStrategies::default(),
            checks: &ScriptedChecks::default(),
        },
    )
    .expect_err("provisioning fails");

    let chain = format!("{err:#}");
    assert!(chain.contains("strategy 'balanced'"), "{chain}");
    assert!(chain.contains("scripted provisioning failure"), "{chain}");
}

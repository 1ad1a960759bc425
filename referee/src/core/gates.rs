//! Hard gates: the pass/fail preconditions for winning.

use crate::core::types::{
    CheckName, CheckResult, CheckStatus, DiffStats, ExecutionResult, GateName, GateSet,
};

/// Path prefixes no candidate may touch unless configured otherwise.
pub const DEFAULT_FORBIDDEN_PREFIXES: [&str; 2] = [".git/", "node_modules/"];

/// Gate verdicts plus the verification-completeness signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateReport {
    pub gates: GateSet,
    /// True whenever the `test` check is anything other than `pass`.
    pub reduced_confidence: bool,
}

/// Find the result for `name`; the first one wins if a collaborator misbehaves.
pub fn find_check(checks: &[CheckResult], name: CheckName) -> Option<&CheckResult> {
    checks.iter().find(|check| check.name == name)
}

/// Touched paths starting with any forbidden prefix (case-insensitive).
pub fn forbidden_touched<'a, P: AsRef<str>>(diff: &'a DiffStats, prefixes: &[P]) -> Vec<&'a str> {
    let prefixes: Vec<String> = prefixes
        .iter()
        .map(|prefix| prefix.as_ref().to_lowercase())
        .collect();
    diff.touched_paths
        .iter()
        .filter(|path| {
            let lowered = path.to_lowercase();
            prefixes.iter().any(|prefix| lowered.starts_with(prefix))
        })
        .map(String::as_str)
        .collect()
}

/// Compute the five gates for one candidate.
pub fn evaluate_gates<P: AsRef<str>>(
    execution: &ExecutionResult,
    diff: &DiffStats,
    checks: &[CheckResult],
    forbidden_prefixes: &[P],
) -> GateReport {
    let forbidden = forbidden_touched(diff, forbidden_prefixes);
    let gates = GateSet::new(|name| match name {
        GateName::PatchApply => {
            if execution.exit_code == 0 {
                (true, "runner completed with successful exit code".to_string())
            } else {
                (false, format!("runner exited with code {}", execution.exit_code))
            }
        }
        GateName::ForbiddenPaths => {
            if forbidden.is_empty() {
                (true, "no forbidden path changes detected".to_string())
            } else {
                (
                    false,
                    format!("forbidden path changes: {}", forbidden.join(", ")),
                )
            }
        }
        GateName::LintHealth => {
            check_gate(find_check(checks, CheckName::Lint), "lint check not configured")
        }
        GateName::TypecheckHealth => check_gate(
            find_check(checks, CheckName::Typecheck),
            "typecheck not configured",
        ),
        GateName::FunctionalViability => {
            check_gate(find_check(checks, CheckName::Test), "tests not configured")
        }
    });

    let reduced_confidence = find_check(checks, CheckName::Test)
        .is_none_or(|check| check.status != CheckStatus::Pass);

    GateReport {
        gates,
        reduced_confidence,
    }
}

/// Absent checks pass as "not configured"; present checks pass unless they failed.
fn check_gate(check: Option<&CheckResult>, not_configured: &str) -> (bool, String) {
    match check {
        Some(check) => (check.status != CheckStatus::Fail, check.summary.clone()),
        None => (true, not_configured.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GateStatus;
    use chrono::{TimeZone, Utc};

    fn execution(exit_code: i32) -> ExecutionResult {
        let started = Utc.with_ymd_and_hms(2026, 2, 25, 0, 0, 0).unwrap();
        ExecutionResult {
            candidate_id: "safe-01".to_string(),
            strategy: "safe".to_string(),
            worktree_path: "/tmp/worktrees/safe".to_string(),
            command: "placeholder.write-file".to_string(),
            output_path: ".referee/placeholder/safe.md".to_string(),
            started_at: started,
            finished_at: started,
            duration_ms: 1000,
            exit_code,
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
            duration_ms: 500,
            output_path: None,
        }
    }

    fn diff(paths: &[&str]) -> DiffStats {
        DiffStats {
            files_changed: paths.len() as u32,
            insertions: 10,
            deletions: 2,
            touched_paths: paths.iter().map(|path| path.to_string()).collect(),
        }
    }

    #[test]
    fn nonzero_exit_fails_patch_apply() {
        let report = evaluate_gates(
            &execution(3),
            &diff(&["src/lib.rs"]),
            &[],
            &DEFAULT_FORBIDDEN_PREFIXES,
        );
        let gate = report.gates.get(GateName::PatchApply);
        assert!(!gate.passed);
        assert_eq!(gate.reason, "runner exited with code 3");
        assert_eq!(report.gates.status(), GateStatus::Fail);
    }

    #[test]
    fn forbidden_prefix_match_ignores_case() {
        let report = evaluate_gates(
            &execution(0),
            &diff(&["src/lib.rs", "Node_Modules/left-pad/index.js", ".GIT/config"]),
            &[],
            &DEFAULT_FORBIDDEN_PREFIXES,
        );
        let gate = report.gates.get(GateName::ForbiddenPaths);
        assert!(!gate.passed);
        assert_eq!(
            gate.reason,
            "forbidden path changes: Node_Modules/left-pad/index.js, .GIT/config"
        );
    }

    #[test]
    fn absent_checks_pass_as_not_configured() {
        let report = evaluate_gates(&execution(0), &diff(&[]), &[], &DEFAULT_FORBIDDEN_PREFIXES);
        assert!(report.gates.all_passed());
        assert_eq!(
            report.gates.get(GateName::LintHealth).reason,
            "lint check not configured"
        );
        assert_eq!(
            report.gates.get(GateName::FunctionalViability).reason,
            "tests not configured"
        );
        assert!(report.reduced_confidence);
    }

    #[test]
    fn skipped_check_passes_gate_but_reduces_confidence() {
        let checks = vec![
            check(CheckName::Test, CheckStatus::Skip),
            check(CheckName::Lint, CheckStatus::Pass),
        ];
        let report = evaluate_gates(&execution(0), &diff(&[]), &checks, &DEFAULT_FORBIDDEN_PREFIXES);
        assert!(report.gates.get(GateName::FunctionalViability).passed);
        assert!(report.reduced_confidence);
    }

    #[test]
    fn passing_tests_restore_full_confidence() {
        let checks = vec![check(CheckName::Test, CheckStatus::Pass)];
        let report = evaluate_gates(&execution(0), &diff(&[]), &checks, &DEFAULT_FORBIDDEN_PREFIXES);
        assert!(!report.reduced_confidence);
    }

    #[test]
    fn failed_typecheck_fails_its_gate_only() {
        let checks = vec![
            check(CheckName::Test, CheckStatus::Pass),
            check(CheckName::Typecheck, CheckStatus::Fail),
        ];
        let report = evaluate_gates(&execution(0), &diff(&[]), &checks, &DEFAULT_FORBIDDEN_PREFIXES);
        let failed: Vec<GateName> = report
            .gates
            .iter()
            .filter(|gate| !gate.passed)
            .map(|gate| gate.name)
            .collect();
        assert_eq!(failed, vec![GateName::TypecheckHealth]);
    }
}

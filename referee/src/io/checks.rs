//! Check runner: executes `test`, `lint`, and `typecheck` inside a candidate worktree.
//!
//! A check never aborts the round. Timeouts, oversized output, spawn errors
//! and non-zero exits all come back as a `fail` result with a summary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::core::types::{CheckName, CheckResult, CheckStatus};
use crate::io::config::ChecksConfig;
use crate::io::process::run_command_with_timeout;

pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 16 * 1024 * 1024;

const JUSTFILE_NAMES: [&str; 3] = ["justfile", "Justfile", ".justfile"];

#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub name: CheckName,
    pub worktree: PathBuf,
    /// Directory receiving `<name>.log`.
    pub log_dir: PathBuf,
    pub enabled: bool,
}

pub trait CheckRunner: Sync {
    fn run(&self, request: &CheckRequest) -> CheckResult;
}

/// Runs configured commands, falling back to `just <name>` when the worktree
/// defines that recipe.
#[derive(Debug, Clone)]
pub struct ScriptCheckRunner {
    pub commands: ChecksConfig,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Default for ScriptCheckRunner {
    fn default() -> Self {
        Self {
            commands: ChecksConfig::default(),
            timeout: DEFAULT_CHECK_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl ScriptCheckRunner {
    fn resolve_command(&self, name: CheckName, worktree: &Path) -> Option<Vec<String>> {
        if let Some(command) = self.commands.command_for(name) {
            return Some(command.to_vec());
        }
        let has_recipe = JUSTFILE_NAMES.iter().any(|file| {
            fs::read_to_string(worktree.join(file))
                .map(|contents| justfile_has_recipe(&contents, name.as_str()))
                .unwrap_or(false)
        });
        has_recipe.then(|| vec!["just".to_string(), name.as_str().to_string()])
    }
}

impl CheckRunner for ScriptCheckRunner {
    #[instrument(skip_all, fields(check = %request.name, worktree = %request.worktree.display()))]
    fn run(&self, request: &CheckRequest) -> CheckResult {
        let started_at = Utc::now();
        let finished = |status: CheckStatus,
                        command: String,
                        summary: String,
                        output_path: Option<String>| {
            let finished_at = Utc::now();
            CheckResult {
                name: request.name,
                status,
                command,
                summary,
                started_at,
                finished_at,
                duration_ms: u64::try_from((finished_at - started_at).num_milliseconds())
                    .unwrap_or(0),
                output_path,
            }
        };

        if !request.enabled {
            return finished(
                CheckStatus::Skip,
                String::new(),
                "check execution disabled".to_string(),
                None,
            );
        }

        let Some(argv) = self.resolve_command(request.name, &request.worktree) else {
            debug!("no command resolved");
            return finished(
                CheckStatus::Skip,
                String::new(),
                format!("recipe '{}' not found", request.name),
                None,
            );
        };
        let display = argv.join(" ");

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).current_dir(&request.worktree);
        let output = match run_command_with_timeout(cmd, self.timeout, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "check could not run");
                return finished(CheckStatus::Fail, display, format!("{err:#}"), None);
            }
        };

        let log_path = request.log_dir.join(format!("{}.log", request.name));
        let output_path = match write_log(&log_path, &output.combined_log()) {
            Ok(()) => Some(log_path.display().to_string()),
            Err(err) => {
                warn!(err = %err, path = %log_path.display(), "failed to write check log");
                None
            }
        };

        let (status, summary) = if output.timed_out {
            (CheckStatus::Fail, "check timed out".to_string())
        } else if output.exceeded_limit() {
            (
                CheckStatus::Fail,
                format!("check output exceeded {} bytes", self.output_limit_bytes),
            )
        } else if !output.status.success() {
            (
                CheckStatus::Fail,
                format!("check exited with code {}", output.exit_code()),
            )
        } else {
            (CheckStatus::Pass, "check completed successfully".to_string())
        };
        debug!(status = status.as_str(), "check finished");
        finished(status, display, summary, output_path)
    }
}

fn write_log(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// True when a justfile defines a recipe called `name`.
///
/// Matches unindented `name:` or `name arg:` headers, with an optional `@`
/// quiet prefix, and ignores `name := value` assignments.
pub fn justfile_has_recipe(contents: &str, name: &str) -> bool {
    contents.lines().any(|line| {
        if line.starts_with([' ', '\t', '#']) {
            return false;
        }
        let Some((header, rest)) = line.split_once(':') else {
            return false;
        };
        if rest.starts_with('=') {
            return false;
        }
        let header = header.trim_start_matches('@');
        header.split_whitespace().next() == Some(name)
    })
}

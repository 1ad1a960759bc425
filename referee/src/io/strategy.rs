//! Strategy runner: produces one candidate's changes inside its worktree.
//!
//! A strategy with a configured command runs that command. Any other strategy
//! writes a placeholder plan so the rest of the round still has a diff to judge.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use minijinja::{Environment, context};
use tracing::{debug, info, instrument, warn};

use crate::core::types::ExecutionResult;
use crate::io::git::sanitize_name;
use crate::io::process::run_command_with_timeout;

const PLACEHOLDER_TEMPLATE: &str = include_str!("../templates/placeholder.md");
pub const PLACEHOLDER_COMMAND: &str = "placeholder.write-file";
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const STRATEGY_OUTPUT_LIMIT_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StrategyRequest {
    pub run_id: String,
    pub candidate_id: String,
    pub task: String,
    pub strategy: String,
    pub worktree: PathBuf,
    /// Where command output is logged. Unused by the placeholder.
    pub log_path: PathBuf,
}

pub trait StrategyRunner: Sync {
    fn run(&self, request: &StrategyRequest) -> Result<ExecutionResult>;
}

#[derive(Debug, Clone)]
pub struct CommandStrategyRunner {
    pub commands: BTreeMap<String, Vec<String>>,
    pub timeout: Duration,
}

impl Default for CommandStrategyRunner {
    fn default() -> Self {
        Self {
            commands: BTreeMap::new(),
            timeout: DEFAULT_STRATEGY_TIMEOUT,
        }
    }
}

impl StrategyRunner for CommandStrategyRunner {
    #[instrument(skip_all, fields(candidate = %request.candidate_id))]
    fn run(&self, request: &StrategyRequest) -> Result<ExecutionResult> {
        match self.commands.get(&request.strategy) {
            Some(argv) if !argv.is_empty() => self.run_command(request, argv),
            _ => run_placeholder(request),
        }
    }
}

impl CommandStrategyRunner {
    fn run_command(&self, request: &StrategyRequest, argv: &[String]) -> Result<ExecutionResult> {
        let started_at = Utc::now();
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(&request.worktree)
            .env("REFEREE_TASK", &request.task)
            .env("REFEREE_RUN_ID", &request.run_id)
            .env("REFEREE_CANDIDATE_ID", &request.candidate_id)
            .env("REFEREE_STRATEGY", &request.strategy);

        info!(command = %argv.join(" "), "running strategy command");
        let (exit_code, log) =
            match run_command_with_timeout(cmd, self.timeout, STRATEGY_OUTPUT_LIMIT_BYTES) {
                Ok(output) => (output.exit_code(), output.combined_log()),
                Err(err) => {
                    // A strategy that cannot start is a failed patch, not a failed round.
                    warn!(err = %format!("{err:#}"), "strategy command could not run");
                    (-1, format!("{err:#}\n"))
                }
            };
        write_file(&request.log_path, &log)?;
        let finished_at = Utc::now();
        debug!(exit_code, "strategy finished");

        Ok(ExecutionResult {
            candidate_id: request.candidate_id.clone(),
            strategy: request.strategy.clone(),
            worktree_path: request.worktree.display().to_string(),
            command: argv.join(" "),
            output_path: request.log_path.display().to_string(),
            started_at,
            finished_at,
            duration_ms: elapsed_ms(started_at, finished_at),
            exit_code,
        })
    }
}

/// Write the placeholder plan to `.referee/placeholder/<strategy>.md`.
pub fn run_placeholder(request: &StrategyRequest) -> Result<ExecutionResult> {
    let started_at = Utc::now();
    let relative = Path::new(".referee")
        .join("placeholder")
        .join(format!("{}.md", sanitize_name(&request.strategy)));
    let contents = render_placeholder(request)?;
    write_file(&request.worktree.join(&relative), &contents)?;
    let finished_at = Utc::now();

    Ok(ExecutionResult {
        candidate_id: request.candidate_id.clone(),
        strategy: request.strategy.clone(),
        worktree_path: request.worktree.display().to_string(),
        command: PLACEHOLDER_COMMAND.to_string(),
        output_path: relative.to_string_lossy().replace('\\', "/"),
        started_at,
        finished_at,
        duration_ms: elapsed_ms(started_at, finished_at),
        exit_code: 0,
    })
}

fn render_placeholder(request: &StrategyRequest) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("placeholder.md", PLACEHOLDER_TEMPLATE)
        .context("load placeholder template")?;
    let template = env.get_template("placeholder.md")?;
    let rendered = template.render(context! {
        run_id => request.run_id,
        candidate_id => request.candidate_id,
        strategy => request.strategy,
        generated_at => Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        task => request.task.trim(),
    })?;
    Ok(rendered)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}

fn elapsed_ms(started: chrono::DateTime<Utc>, finished: chrono::DateTime<Utc>) -> u64 {
    u64::try_from((finished - started).num_milliseconds()).unwrap_or(0)
}

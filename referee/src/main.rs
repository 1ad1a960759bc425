//! Patch tournament referee CLI.
//!
//! `referee run` plays one round: every strategy works in its own git
//! worktree, candidates are judged and ranked, and the report lands under
//! `<repo>/runs/<run-id>/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use referee::core::types::ScoringProfile;
use referee::exit_codes;
use referee::io::artifacts::{RunLayout, ensure_run_id, list_run_ids, read_json};
use referee::io::checks::ScriptCheckRunner;
use referee::io::config::{CONFIG_FILE_NAME, RefereeConfig, load_config};
use referee::io::git::{Git, GitWorkspaces};
use referee::io::policy::check_policy;
use referee::io::strategy::CommandStrategyRunner;
use referee::logging;
use referee::report::{RunReport, format_summary, render_markdown};
use referee::tournament::{
    Collaborators, DEFAULT_STRATEGIES, RoundRequest, RoundSettings, parse_strategies,
    preflight_repository, run_round,
};

#[derive(Parser, Debug)]
#[command(
    name = "referee",
    version,
    about = "Run competing strategies on one task and pick the safest best patch"
)]
struct Cli {
    /// Config file (defaults to `<repo>/referee.toml`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bypass an active optimization policy (requires REFEREE_POLICY_OVERRIDE_CONFIRM=YES).
    #[arg(long, global = true)]
    policy_override: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play one tournament round.
    Run(RunArgs),
    /// Show the report of a previous run.
    Inspect {
        run_id: String,
        #[arg(long)]
        repo: Option<PathBuf>,
        /// Print the full markdown report.
        #[arg(long)]
        markdown: bool,
    },
    /// List previous runs with their outcome.
    ListRuns {
        #[arg(long)]
        repo: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    task: String,

    /// Repository root (defaults to the current directory).
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Comma-separated strategy names.
    #[arg(long, default_value = DEFAULT_STRATEGIES)]
    strategies: String,

    #[arg(long)]
    max_parallel: Option<usize>,

    /// safe, balanced or speed.
    #[arg(long, value_parser = parse_profile)]
    profile: Option<ScoringProfile>,

    /// Skip the clean-working-tree preflight.
    #[arg(long)]
    allow_dirty: bool,

    /// Also write the report JSON here.
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Never flag close calls for manual review.
    #[arg(long)]
    auto_accept: bool,

    /// Execute test, lint and typecheck (otherwise they are skipped).
    #[arg(long)]
    run_checks: bool,
}

fn parse_profile(raw: &str) -> Result<ScoringProfile, String> {
    raw.parse().map_err(|err: referee::core::error::EngineError| err.to_string())
}

fn main() {
    logging::init();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                exit_codes::INVALID
            } else {
                exit_codes::OK
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    let code = match dispatch(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn dispatch(cli: Cli) -> Result<i32> {
    let cwd = std::env::current_dir().context("resolve current directory")?;
    check_policy(&cwd, cli.policy_override)?;
    match cli.command {
        Command::Run(args) => cmd_run(cli.config.as_deref(), &cwd, args),
        Command::Inspect {
            run_id,
            repo,
            markdown,
        } => cmd_inspect(cli.config.as_deref(), &cwd, repo, &run_id, markdown),
        Command::ListRuns { repo } => cmd_list_runs(cli.config.as_deref(), &cwd, repo),
    }
}

fn resolve_repo(cwd: &Path, repo: Option<PathBuf>) -> Result<PathBuf> {
    let repo = repo.map_or_else(|| cwd.to_path_buf(), |path| cwd.join(path));
    repo.canonicalize()
        .with_context(|| format!("resolve repository path {}", repo.display()))
}

fn load_repo_config(config: Option<&Path>, repo: &Path) -> Result<RefereeConfig> {
    let path = config.map_or_else(|| repo.join(CONFIG_FILE_NAME), Path::to_path_buf);
    load_config(&path)
}

fn cmd_run(config: Option<&Path>, cwd: &Path, args: RunArgs) -> Result<i32> {
    let repo = resolve_repo(cwd, args.repo)?;
    let mut cfg = load_repo_config(config, &repo)?;
    if let Some(max_parallel) = args.max_parallel {
        if max_parallel == 0 {
            bail!("--max-parallel must be > 0");
        }
        cfg.max_parallel = max_parallel;
    }
    if let Some(profile) = args.profile {
        cfg.profile = profile;
    }
    if args.task.trim().is_empty() {
        bail!("--task must be non-empty");
    }
    let strategies = parse_strategies(&args.strategies)?;

    preflight_repository(&repo, &cfg.runs_dir, args.allow_dirty)?;

    let workspaces = GitWorkspaces::new(Git::new(&repo), "HEAD");
    let strategy_runner = CommandStrategyRunner {
        commands: cfg.strategy_commands(),
        timeout: Duration::from_secs(cfg.strategy_timeout_secs),
    };
    let check_runner = ScriptCheckRunner {
        commands: cfg.checks.clone(),
        timeout: Duration::from_secs(cfg.check_timeout_secs),
        output_limit_bytes: cfg.check_output_limit_bytes,
    };

    let request = RoundRequest {
        task: args.task,
        repo: repo.clone(),
        strategies,
        max_parallel: cfg.max_parallel,
        profile: cfg.profile,
        run_checks: args.run_checks,
        json_out: args.json_out.map(|path| cwd.join(path)),
    };
    let settings = RoundSettings {
        runs_root: cfg.runs_root(&repo),
        evaluation: cfg.evaluation_policy()?,
        selection: cfg.selection_options(args.auto_accept),
        acceptance: cfg.acceptance.clone(),
    };
    let outcome = run_round(
        &request,
        &settings,
        Collaborators {
            workspaces: &workspaces,
            strategies: &strategy_runner,
            checks: &check_runner,
        },
    )?;

    println!("{}", outcome.summary());
    println!("Artifacts: {}", outcome.layout.root.display());
    if outcome.report.winner.is_winner() {
        Ok(exit_codes::OK)
    } else {
        info!("no candidate passed every hard gate");
        Ok(exit_codes::NO_SAFE_WINNER)
    }
}

fn cmd_inspect(
    config: Option<&Path>,
    cwd: &Path,
    repo: Option<PathBuf>,
    run_id: &str,
    markdown: bool,
) -> Result<i32> {
    ensure_run_id(run_id)?;
    let repo = resolve_repo(cwd, repo)?;
    let cfg = load_repo_config(config, &repo)?;
    let layout = RunLayout::new(&cfg.runs_root(&repo), run_id);
    let report: RunReport = read_json(&layout.report_json())
        .with_context(|| format!("load report for run {run_id}"))?;

    if markdown {
        print!("{}", render_markdown(&report)?);
        return Ok(exit_codes::OK);
    }
    println!("{}", format_summary(&report));
    println!("Reason: {}", report.winner.selection_reason);
    for candidate in &report.candidates {
        println!(
            "  {:<24} eligible={:<5} score={:>6.2} confidence={}",
            candidate.candidate_id,
            candidate.eligible,
            candidate.score.total,
            candidate.confidence
        );
    }
    println!("Artifacts: {}", layout.root.display());
    Ok(exit_codes::OK)
}

fn cmd_list_runs(config: Option<&Path>, cwd: &Path, repo: Option<PathBuf>) -> Result<i32> {
    let repo = resolve_repo(cwd, repo)?;
    let cfg = load_repo_config(config, &repo)?;
    let runs_root = cfg.runs_root(&repo);
    let run_ids = list_run_ids(&runs_root)?;
    if run_ids.is_empty() {
        println!("No runs under {}", runs_root.display());
        return Ok(exit_codes::OK);
    }
    for run_id in run_ids {
        let layout = RunLayout::new(&runs_root, &run_id);
        match read_json::<RunReport>(&layout.report_json()) {
            Ok(report) => println!("{}", format_summary(&report)),
            Err(err) => {
                warn!(run_id = %run_id, error = %format!("{err:#}"), "skipping unreadable report");
                println!("Run {run_id}: report unavailable");
            }
        }
    }
    Ok(exit_codes::OK)
}

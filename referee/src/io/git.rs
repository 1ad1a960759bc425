//! Git adapter: repository preflight, per-candidate worktrees, and diff inspection.
//!
//! Every candidate gets its own `git worktree` on a dedicated branch, so
//! strategies never see each other's edits or the caller's checkout.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::DiffStats;

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    pub path: String,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Fail unless `workdir` is inside a git working tree.
    #[instrument(skip_all)]
    pub fn ensure_repository(&self) -> Result<()> {
        let out = self
            .run_capture(&["rev-parse", "--is-inside-work-tree"])
            .with_context(|| format!("{} is not a git repository", self.workdir.display()))?;
        if out.trim() != "true" {
            return Err(anyhow!(
                "path is not a git worktree: {}",
                self.workdir.display()
            ));
        }
        Ok(())
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        let mut entries = Vec::new();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            entries.push(parse_status_line(line)?);
        }
        Ok(entries)
    }

    /// Ensure the worktree is clean, allowing entries with any of the given prefixes.
    #[instrument(skip_all)]
    pub fn ensure_clean_except_prefixes(&self, allowed_prefixes: &[&str]) -> Result<()> {
        let entries = self.status_porcelain()?;
        let disallowed: Vec<StatusEntry> = entries
            .into_iter()
            .filter(|entry| {
                !allowed_prefixes
                    .iter()
                    .any(|prefix| entry.path.starts_with(prefix))
            })
            .collect();
        if disallowed.is_empty() {
            debug!("worktree is clean");
            return Ok(());
        }
        warn!(disallowed_count = disallowed.len(), "worktree not clean");
        let mut msg = String::from(
            "repository has uncommitted changes; re-run with --allow-dirty to bypass this gate:\n",
        );
        for entry in disallowed {
            msg.push_str(&format!("{} {}\n", entry.code, entry.path));
        }
        Err(anyhow!(msg.trim_end().to_string()))
    }

    /// Add a worktree at `path` on a new branch created from `base_ref`.
    #[instrument(skip_all, fields(branch))]
    pub fn worktree_add(&self, branch: &str, path: &Path, base_ref: &str) -> Result<()> {
        let path = path.to_string_lossy();
        self.run_checked(&["worktree", "add", "--force", "-b", branch, &path, base_ref])?;
        debug!(branch, path = %path, "worktree added");
        Ok(())
    }

    /// Stage all changes (respects .gitignore).
    pub fn add_all(&self) -> Result<()> {
        self.run_checked(&["add", "-A"])?;
        Ok(())
    }

    /// NUL-separated numstat. A move is reported as a deletion plus an addition,
    /// and paths are emitted verbatim instead of quoted.
    pub fn diff_cached_numstat(&self) -> Result<String> {
        self.run_capture(&[
            "diff",
            "--cached",
            "--numstat",
            "--no-renames",
            "-z",
            "--",
            ".",
        ])
    }

    pub fn diff_cached_patch(&self) -> Result<String> {
        self.run_capture(&["diff", "--cached", "--", "."])
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "git {} failed in {}: {}",
                args.join(" "),
                self.workdir.display(),
                stderr.trim()
            ));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

/// Working-copy provisioner and diff inspector used by a tournament round.
pub trait Workspaces: Sync {
    /// Create an isolated working copy for one strategy at `dest`.
    fn provision(&self, run_id: &str, strategy: &str, dest: &Path) -> Result<PathBuf>;

    /// Snapshot of uncommitted changes in `worktree`.
    fn diff_stats(&self, worktree: &Path) -> Result<DiffStats>;

    /// Write the full diff of `worktree` to `dest`.
    fn write_patch(&self, worktree: &Path, dest: &Path) -> Result<()>;
}

/// [`Workspaces`] backed by `git worktree`.
#[derive(Debug)]
pub struct GitWorkspaces {
    repo: Git,
    base_ref: String,
    /// `git worktree add` writes shared metadata under `.git/worktrees`.
    provision_lock: Mutex<()>,
}

impl GitWorkspaces {
    pub fn new(repo: Git, base_ref: impl Into<String>) -> Self {
        Self {
            repo,
            base_ref: base_ref.into(),
            provision_lock: Mutex::new(()),
        }
    }
}

impl Workspaces for GitWorkspaces {
    #[instrument(skip_all, fields(run_id = %run_id, strategy = %strategy))]
    fn provision(&self, run_id: &str, strategy: &str, dest: &Path) -> Result<PathBuf> {
        let branch = worktree_branch(run_id, strategy);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create worktree root {}", parent.display()))?;
        }
        let _guard = self
            .provision_lock
            .lock()
            .map_err(|_| anyhow!("worktree provisioning lock poisoned"))?;
        self.repo
            .worktree_add(&branch, dest, &self.base_ref)
            .with_context(|| format!("provision worktree for strategy {strategy}"))?;
        Ok(dest.to_path_buf())
    }

    #[instrument(skip_all, fields(worktree = %worktree.display()))]
    fn diff_stats(&self, worktree: &Path) -> Result<DiffStats> {
        let git = Git::new(worktree);
        git.add_all().context("stage candidate changes")?;
        let numstat = git.diff_cached_numstat()?;
        let stats = parse_numstat(&numstat);
        debug!(
            files_changed = stats.files_changed,
            insertions = stats.insertions,
            deletions = stats.deletions,
            "collected diff stats"
        );
        Ok(stats)
    }

    fn write_patch(&self, worktree: &Path, dest: &Path) -> Result<()> {
        let git = Git::new(worktree);
        git.add_all().context("stage candidate changes")?;
        let patch = git.diff_cached_patch()?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create patch dir {}", parent.display()))?;
        }
        fs::write(dest, patch).with_context(|| format!("write {}", dest.display()))?;
        Ok(())
    }
}

/// Branch name for one candidate: `referee/<run-id>/<strategy>`.
pub fn worktree_branch(run_id: &str, strategy: &str) -> String {
    format!(
        "referee/{}/{}",
        sanitize_name(run_id),
        sanitize_name(strategy)
    )
}

/// Replace anything outside `[A-Za-z0-9._-]` with `-`.
pub fn sanitize_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Parse `git diff --numstat -z` output. Binary entries (`-\t-\tpath`) count zero lines.
///
/// Rename records (`added\tremoved\t\0old\0new`) are reported by their destination.
pub fn parse_numstat(raw: &str) -> DiffStats {
    let mut stats = DiffStats::default();
    let mut fields = raw.split('\0');
    while let Some(record) = fields.next() {
        let record = record.trim_start_matches('\n');
        let mut parts = record.splitn(3, '\t');
        let (Some(added), Some(removed), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let path = if path.is_empty() {
            let _source = fields.next();
            fields.next().unwrap_or_default()
        } else {
            path
        };
        stats.insertions += added.trim().parse::<u64>().unwrap_or(0);
        stats.deletions += removed.trim().parse::<u64>().unwrap_or(0);
        if !path.is_empty() {
            stats.touched_paths.push(path.to_string());
        }
    }
    stats.files_changed = u32::try_from(stats.touched_paths.len()).unwrap_or(u32::MAX);
    stats
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}

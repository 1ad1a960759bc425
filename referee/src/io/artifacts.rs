//! Run directory layout and JSON artifact envelopes.
//!
//! ```text
//! <runs_root>/<run-id>/
//!   report.json, report.md
//!   candidates/<strategy>/execution.json, diff.patch, eval.json, score.json, checks/*.log
//!   worktrees/<strategy>/
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::git::sanitize_name;

pub const ARTIFACT_SCHEMA_VERSION: &str = "1.0.0";
pub const GENERATOR: &str = concat!("referee@", env!("CARGO_PKG_VERSION"));

pub const EXECUTION_FILE: &str = "execution.json";
pub const PATCH_FILE: &str = "diff.patch";
pub const EVALUATION_FILE: &str = "eval.json";
pub const SCORE_FILE: &str = "score.json";
pub const REPORT_JSON_FILE: &str = "report.json";
pub const REPORT_MARKDOWN_FILE: &str = "report.md";

/// Versioned wrapper around every persisted per-candidate record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEnvelope<T> {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub generator: String,
    pub data: T,
}

impl<T> ArtifactEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            generator: GENERATOR.to_string(),
            data,
        }
    }
}

/// Paths for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub run_id: String,
    pub root: PathBuf,
}

impl RunLayout {
    pub fn new(runs_root: &Path, run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            root: runs_root.join(run_id),
        }
    }

    pub fn candidate_dir(&self, strategy: &str) -> PathBuf {
        self.root.join("candidates").join(sanitize_name(strategy))
    }

    pub fn worktree_dir(&self, strategy: &str) -> PathBuf {
        self.root.join("worktrees").join(sanitize_name(strategy))
    }

    pub fn report_json(&self) -> PathBuf {
        self.root.join(REPORT_JSON_FILE)
    }

    pub fn report_markdown(&self) -> PathBuf {
        self.root.join(REPORT_MARKDOWN_FILE)
    }

    pub fn create(&self) -> Result<()> {
        for dir in [self.root.join("candidates"), self.root.join("worktrees")] {
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// `YYYYMMDD-HHMMSS-xxxx` from the UTC clock and four random lowercase alphanumerics.
pub fn generate_run_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(|byte| char::from(byte).to_ascii_lowercase())
        .collect();
    format!("{}-{suffix}", now.format("%Y%m%d-%H%M%S"))
}

static RUN_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8}-[0-9]{6}-[a-z0-9]{4}$").expect("run id pattern is valid"));

/// Reject anything that is not a generated run id, so lookups stay inside `runs_root`.
pub fn ensure_run_id(raw: &str) -> Result<()> {
    if !RUN_ID.is_match(raw) {
        bail!("invalid run id '{raw}': expected YYYYMMDD-HHMMSS-xxxx");
    }
    Ok(())
}

/// `<strategy>-NN`, where `NN` is the 1-based position in the round.
pub fn candidate_id(strategy: &str, index: usize) -> String {
    format!("{strategy}-{:02}", index + 1)
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    debug!(path = %path.display(), "wrote artifact");
    Ok(())
}

pub fn write_artifact<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    write_json(path, &ArtifactEnvelope::new(data))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<ArtifactEnvelope<T>> {
    read_json(path)
}

/// Run directories under `runs_root`, sorted. A missing root lists nothing.
pub fn list_run_ids(runs_root: &Path) -> Result<Vec<String>> {
    if !runs_root.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in
        fs::read_dir(runs_root).with_context(|| format!("read {}", runs_root.display()))?
    {
        let entry = entry.with_context(|| format!("read entry in {}", runs_root.display()))?;
        if entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?
            .is_dir()
        {
            ids.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    ids.sort();
    Ok(ids)
}

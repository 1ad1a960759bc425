//! Optimization policy gate, loaded independently of the engine.
//!
//! The policy file lives at `references/optimization-policy.json` in the
//! working directory or one of its ancestors. An active policy refuses
//! `--policy-override` unless the caller confirms it through the environment.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

pub const POLICY_RELATIVE_PATH: &str = "references/optimization-policy.json";
pub const OVERRIDE_CONFIRM_ENV: &str = "REFEREE_POLICY_OVERRIDE_CONFIRM";
const SEARCH_DEPTH: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationPolicy {
    pub policy_version: String,
    pub policy_name: String,
    pub active: bool,
    pub owner: String,
    pub last_updated: String,
    pub hard_rules: Vec<String>,
    pub decision_requirements: Vec<String>,
}

/// What the gate decided for this invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    NoPolicy,
    Inactive,
    Enforced,
    Overridden,
}

/// Find the nearest policy file, walking up from `start` at most twelve levels.
pub fn find_policy_path(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(SEARCH_DEPTH)
        .map(|dir| dir.join(POLICY_RELATIVE_PATH))
        .find(|candidate| candidate.is_file())
}

/// Load the nearest policy. A missing file is not an error.
#[instrument(skip_all, fields(start = %start.display()))]
pub fn load_policy(start: &Path) -> Result<Option<OptimizationPolicy>> {
    let Some(path) = find_policy_path(start) else {
        debug!("no optimization policy found");
        return Ok(None);
    };
    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let policy: OptimizationPolicy =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    debug!(path = %path.display(), policy = %policy.policy_name, "loaded optimization policy");
    Ok(Some(policy))
}

/// Apply the override rules. `confirmation` is the value of [`OVERRIDE_CONFIRM_ENV`].
pub fn enforce_policy(
    policy: Option<&OptimizationPolicy>,
    override_requested: bool,
    confirmation: Option<&str>,
) -> Result<PolicyDecision> {
    let Some(policy) = policy else {
        return Ok(PolicyDecision::NoPolicy);
    };
    if !policy.active {
        return Ok(PolicyDecision::Inactive);
    }
    if !override_requested {
        return Ok(PolicyDecision::Enforced);
    }
    if confirmation != Some("YES") {
        bail!(
            "policy override blocked; set {OVERRIDE_CONFIRM_ENV}=YES only with explicit user approval"
        );
    }
    warn!(policy = %policy.policy_name, "policy override enabled for this invocation");
    Ok(PolicyDecision::Overridden)
}

/// Load from `start` and enforce using the process environment.
pub fn check_policy(start: &Path, override_requested: bool) -> Result<PolicyDecision> {
    let policy = load_policy(start)?;
    let confirmation = std::env::var(OVERRIDE_CONFIRM_ENV).ok();
    enforce_policy(policy.as_ref(), override_requested, confirmation.as_deref())
}

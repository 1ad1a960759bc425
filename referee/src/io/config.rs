//! Referee configuration stored in `referee.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::evaluation::EvaluationPolicy;
use crate::core::gates::DEFAULT_FORBIDDEN_PREFIXES;
use crate::core::metrics::{DEFAULT_RISKY_PATH_PATTERN, risky_path_regex};
use crate::core::selection::SelectionOptions;
use crate::core::types::{CheckName, ScoringProfile};

/// File name looked up at the repository root when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "referee.toml";

/// Referee configuration (TOML).
///
/// Every table is optional. Missing fields fall back to the defaults below,
/// and command-line flags override them for a single invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RefereeConfig {
    /// Candidates allowed to run external commands at the same time.
    pub max_parallel: usize,

    pub profile: ScoringProfile,

    /// Run directory root, relative to the repository unless absolute.
    pub runs_dir: PathBuf,

    /// Per-check wall-clock budget in seconds.
    pub check_timeout_secs: u64,

    /// A check producing more combined output than this fails.
    pub check_output_limit_bytes: usize,

    /// Wall-clock budget for a configured strategy command.
    pub strategy_timeout_secs: u64,

    pub forbidden_path_prefixes: Vec<String>,

    /// Regex (case-insensitive) marking sensitive paths.
    pub risky_path_pattern: String,

    pub selection: SelectionConfig,

    pub checks: ChecksConfig,

    pub strategies: BTreeMap<String, StrategyConfig>,

    /// Historical acceptance rate per strategy, in `[0, 1]`.
    pub acceptance: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SelectionConfig {
    pub tie_delta: f64,
    pub review_delta: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        let options = SelectionOptions::default();
        Self {
            tie_delta: options.tie_delta,
            review_delta: options.review_delta,
        }
    }
}

/// Explicit check commands. An empty array falls back to the `justfile` recipe.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChecksConfig {
    pub test: Vec<String>,
    pub lint: Vec<String>,
    pub typecheck: Vec<String>,
}

impl ChecksConfig {
    pub fn command_for(&self, name: CheckName) -> Option<&[String]> {
        let command = match name {
            CheckName::Test => &self.test,
            CheckName::Lint => &self.lint,
            CheckName::Typecheck => &self.typecheck,
        };
        (!command.is_empty()).then_some(command.as_slice())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StrategyConfig {
    /// Program and arguments run inside the candidate working copy.
    pub command: Vec<String>,
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self {
            max_parallel: 3,
            profile: ScoringProfile::default(),
            runs_dir: PathBuf::from("runs"),
            check_timeout_secs: 10 * 60,
            check_output_limit_bytes: 16 * 1024 * 1024,
            strategy_timeout_secs: 30 * 60,
            forbidden_path_prefixes: DEFAULT_FORBIDDEN_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            risky_path_pattern: DEFAULT_RISKY_PATH_PATTERN.to_string(),
            selection: SelectionConfig::default(),
            checks: ChecksConfig::default(),
            strategies: BTreeMap::new(),
            acceptance: BTreeMap::new(),
        }
    }
}

impl RefereeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel == 0 {
            return Err(anyhow!("max_parallel must be > 0"));
        }
        if self.check_timeout_secs == 0 {
            return Err(anyhow!("check_timeout_secs must be > 0"));
        }
        if self.check_output_limit_bytes == 0 {
            return Err(anyhow!("check_output_limit_bytes must be > 0"));
        }
        if self.strategy_timeout_secs == 0 {
            return Err(anyhow!("strategy_timeout_secs must be > 0"));
        }
        if self.forbidden_path_prefixes.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("forbidden_path_prefixes must not contain empty entries"));
        }
        risky_path_regex(&self.risky_path_pattern)
            .with_context(|| format!("invalid risky_path_pattern {:?}", self.risky_path_pattern))?;
        for (key, value) in [
            ("selection.tie_delta", self.selection.tie_delta),
            ("selection.review_delta", self.selection.review_delta),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow!("{key} must be a finite number >= 0"));
            }
        }
        for name in CheckName::ALL {
            if let Some(command) = self.checks.command_for(name)
                && command[0].trim().is_empty()
            {
                return Err(anyhow!("checks.{name} must start with a program name"));
            }
        }
        for (strategy, config) in &self.strategies {
            if config.command.is_empty() || config.command[0].trim().is_empty() {
                return Err(anyhow!(
                    "strategies.{strategy}.command must be a non-empty array"
                ));
            }
        }
        for (strategy, rate) in &self.acceptance {
            if !(0.0..=1.0).contains(rate) {
                return Err(anyhow!("acceptance.{strategy} must be within [0, 1]"));
            }
        }
        Ok(())
    }

    /// Path rules for the evaluation engine.
    pub fn evaluation_policy(&self) -> Result<EvaluationPolicy> {
        Ok(EvaluationPolicy {
            forbidden_path_prefixes: self.forbidden_path_prefixes.clone(),
            risky_paths: risky_path_regex(&self.risky_path_pattern)
                .context("compile risky_path_pattern")?,
        })
    }

    pub fn selection_options(&self, auto_accept: bool) -> SelectionOptions {
        SelectionOptions {
            tie_delta: self.selection.tie_delta,
            review_delta: self.selection.review_delta,
            auto_accept,
        }
    }

    /// Configured command per strategy name. Unlisted strategies get a placeholder plan.
    pub fn strategy_commands(&self) -> BTreeMap<String, Vec<String>> {
        self.strategies
            .iter()
            .map(|(name, config)| (name.clone(), config.command.clone()))
            .collect()
    }

    /// Resolve `runs_dir` against the repository root.
    pub fn runs_root(&self, repo: &Path) -> PathBuf {
        if self.runs_dir.is_absolute() {
            self.runs_dir.clone()
        } else {
            repo.join(&self.runs_dir)
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RefereeConfig::default()`.
pub fn load_config(path: &Path) -> Result<RefereeConfig> {
    if !path.exists() {
        let cfg = RefereeConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RefereeConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, RefereeConfig::default());
        assert_eq!(cfg.max_parallel, 3);
        assert_eq!(cfg.check_output_limit_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn strategies_and_acceptance_load_from_tables() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "profile = \"safe\"\n\
             [acceptance]\nsafe = 0.82\n\
             [strategies.aggressive]\ncommand = [\"./scripts/aggressive.sh\", \"--fast\"]\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.profile, ScoringProfile::Safe);
        assert_eq!(cfg.acceptance.get("safe"), Some(&0.82));
        assert_eq!(
            cfg.strategy_commands(),
            BTreeMap::from([(
                "aggressive".to_string(),
                vec!["./scripts/aggressive.sh".to_string(), "--fast".to_string()]
            )])
        );
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "profile = \"speed\"\n[checks]\ntest = [\"cargo\", \"test\"]\n[selection]\ntie_delta = 1.0\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.profile, ScoringProfile::Speed);
        assert_eq!(cfg.selection.tie_delta, 1.0);
        assert_eq!(cfg.selection.review_delta, 3.0);
        assert_eq!(
            cfg.checks.command_for(CheckName::Test),
            Some(&["cargo".to_string(), "test".to_string()][..])
        );
        assert_eq!(cfg.checks.command_for(CheckName::Lint), None);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cfg = RefereeConfig {
            max_parallel: 0,
            ..RefereeConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = RefereeConfig {
            risky_path_pattern: "(unclosed".to_string(),
            ..RefereeConfig::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = RefereeConfig::default();
        cfg.acceptance.insert("safe".to_string(), 1.5);
        let err = cfg.validate().expect_err("rate out of range");
        assert!(err.to_string().contains("acceptance.safe"));
    }

    #[test]
    fn unknown_profile_fails_to_parse() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "profile = \"turbo\"\n").expect("write");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn relative_runs_dir_resolves_under_repo() {
        let cfg = RefereeConfig::default();
        assert_eq!(
            cfg.runs_root(Path::new("/work/repo")),
            PathBuf::from("/work/repo/runs")
        );
    }
}

//! Loop configuration: phases, runners, limits, gates, pricing.
//!
//! Loaded from superloop.yml (see `config::load_config` for the search order).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use super::gates::GatesConfig;
use super::runner_spec::RunnerSpec;
use crate::accounting::RateTable;

/// Default completion promise token.
pub const DEFAULT_PROMISE: &str = "SUPERLOOP_COMPLETE";

/// Default state directory, relative to the repository root.
pub const DEFAULT_STATE_DIR: &str = ".superloop";

/// Default phase sequence.
pub fn default_phases() -> Vec<String> {
    vec![
        "planner".to_string(),
        "implementer".to_string(),
        "tester".to_string(),
        "reviewer".to_string(),
    ]
}

/// Provider rate-limit signatures matched against runner output.
pub fn default_rate_limit_signatures() -> Vec<String> {
    vec![
        "rate limit".to_string(),
        "rate_limit".to_string(),
        "ratelimit".to_string(),
        "too many requests".to_string(),
        "overloaded_error".to_string(),
        "usage limit reached".to_string(),
    ]
}

/// Configuration for one loop against one repository.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoopConfig {
    /// Directory for state, logs and report (relative to the repo root).
    pub state_dir: String,

    /// Spec document handed to runners via `{spec}`.
    pub spec: Option<String>,

    /// Maximum phase cycles before the loop fails.
    pub max_iterations: u32,

    /// Token expected inside `<promise>...</promise>`, compared case-sensitively.
    pub expected_promise: String,

    /// Phase sequence run each iteration.
    pub phases: Vec<String>,

    /// Phase whose failure maps to `test_failures` instead of `failed`.
    pub tester_phase: Option<String>,

    /// Re-enter `in_progress` automatically after `test_failures`.
    pub continue_on_test_failures: bool,

    /// Runner per phase name.
    pub runners: BTreeMap<String, RunnerSpec>,

    /// Transient failure handling.
    pub retry: RetryConfig,

    /// Non-progress detection.
    pub stuck: StuckConfig,

    /// Completion gates.
    pub gates: GatesConfig,

    /// USD per million tokens.
    pub pricing: RateTable,

    /// How often the cancel-request file is polled, in milliseconds.
    pub cancel_poll_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        let phases = default_phases();
        let runners = phases
            .iter()
            .map(|p| (p.clone(), RunnerSpec::default()))
            .collect();

        Self {
            state_dir: DEFAULT_STATE_DIR.to_string(),
            spec: None,
            max_iterations: 20,
            expected_promise: DEFAULT_PROMISE.to_string(),
            phases,
            tester_phase: Some("tester".to_string()),
            continue_on_test_failures: true,
            runners,
            retry: RetryConfig::default(),
            stuck: StuckConfig::default(),
            gates: GatesConfig::default(),
            pricing: RateTable::default(),
            cancel_poll_ms: 1_000,
        }
    }
}

impl LoopConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Runner configured for a phase.
    pub fn runner_for(&self, phase: &str) -> Option<&RunnerSpec> {
        self.runners.get(phase)
    }

    /// Whether `phase` is the tester role.
    pub fn is_tester(&self, phase: &str) -> bool {
        self.tester_phase.as_deref() == Some(phase)
    }

    /// State directory resolved against the repository root.
    pub fn state_dir_in(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.state_dir)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            eyre::bail!("max-iterations must be > 0");
        }
        if self.expected_promise.trim().is_empty() {
            eyre::bail!("expected-promise cannot be empty");
        }
        if self.phases.is_empty() {
            eyre::bail!("phases cannot be empty");
        }
        for phase in &self.phases {
            let spec = self
                .runner_for(phase)
                .ok_or_else(|| eyre::eyre!("phase '{}' has no runner configured", phase))?;
            spec.validate(phase)?;
        }
        if let Some(tester) = &self.tester_phase
            && !self.phases.contains(tester)
        {
            eyre::bail!("tester-phase '{}' is not in phases", tester);
        }
        if self.retry.multiplier < 1.0 {
            eyre::bail!("retry.multiplier must be >= 1.0");
        }
        Ok(())
    }
}

/// Retry budget for transient runner failures.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Retries after a rate-limited failure.
    pub max_retries: u32,
    /// Retries after a timeout.
    pub timeout_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// Case-insensitive substrings that mark output as rate limited.
    pub rate_limit_signatures: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout_retries: 0,
            initial_backoff_ms: 5_000,
            max_backoff_ms: 120_000,
            multiplier: 2.0,
            rate_limit_signatures: default_rate_limit_signatures(),
        }
    }
}

/// Stuck detection settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StuckConfig {
    /// Identical consecutive fingerprints that classify the loop as stuck (0 disables).
    pub window: u32,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self { window: 3 }
    }
}

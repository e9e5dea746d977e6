//! Per-role runner configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default output path template for captured runner output.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "{state_dir}/logs/iter-{iteration}-{phase}.log";

/// How to start the external agent for one role.
///
/// Read-only to the engine. `args` and `output` are templates; see
/// `runner::template` for the placeholders.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunnerSpec {
    /// Executable to run (looked up on PATH).
    pub command: String,

    /// Argument templates.
    pub args: Vec<String>,

    /// Hard wall-clock limit in milliseconds.
    pub timeout_ms: u64,

    /// Time between the cooperative and the forced stop, in milliseconds.
    pub grace_period_ms: u64,

    /// Output path template, relative to the repository root.
    pub output: String,

    /// Extra environment variables (values are templates too).
    pub env: BTreeMap<String, String>,
}

impl Default for RunnerSpec {
    fn default() -> Self {
        Self {
            command: "sh".to_string(),
            args: vec!["{state_dir}/runners/{phase}.sh".to_string()],
            timeout_ms: 1_800_000, // 30 minutes
            grace_period_ms: 5_000,
            output: DEFAULT_OUTPUT_TEMPLATE.to_string(),
            env: BTreeMap::new(),
        }
    }
}

impl RunnerSpec {
    /// Create a spec running `command` with `args` and default limits.
    pub fn new(command: impl Into<String>, args: &[&str]) -> Self {
        Self {
            command: command.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Set the grace period in milliseconds
    pub fn grace_period_ms(mut self, ms: u64) -> Self {
        self.grace_period_ms = ms;
        self
    }

    /// Set the output path template
    pub fn output(mut self, template: impl Into<String>) -> Self {
        self.output = template.into();
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Validate the runner settings.
    pub fn validate(&self, phase: &str) -> eyre::Result<()> {
        if self.command.trim().is_empty() {
            eyre::bail!("runner '{}': command cannot be empty", phase);
        }
        if self.timeout_ms == 0 {
            eyre::bail!("runner '{}': timeout-ms must be > 0", phase);
        }
        if self.output.trim().is_empty() {
            eyre::bail!("runner '{}': output template cannot be empty", phase);
        }
        Ok(())
    }
}

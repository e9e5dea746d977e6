//! One execution of one role within one iteration.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::usage::UsageTotals;

/// How a runner invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    /// Exit code 0
    Success,
    /// Non-zero exit, killed by a signal, or could not be started
    Failure,
    /// Wall-clock budget exceeded; process group was terminated
    Timeout,
    /// Operator cancellation while the runner was in flight
    Cancelled,
}

impl ExitStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitStatus::Success => "success",
            ExitStatus::Failure => "failure",
            ExitStatus::Timeout => "timeout",
            ExitStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Record of a single phase execution. Immutable once appended to history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub iteration: u32,
    pub phase: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub exit_status: ExitStatus,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub promise_found: Option<String>,
    pub output_path: PathBuf,
    /// Invocation attempts including rate-limit/timeout retries
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default)]
    pub rate_limited: bool,
    /// Why the phase did not succeed
    #[serde(default)]
    pub reason: Option<String>,
    /// Token usage reported by this phase alone
    #[serde(default)]
    pub usage: Option<UsageTotals>,
}

fn default_attempts() -> u32 {
    1
}

impl PhaseRecord {
    pub fn succeeded(&self) -> bool {
        self.exit_status.is_success()
    }
}

//! Loop status enum.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a loop's execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    /// Created, no phase has run yet
    #[default]
    Idle,
    /// Actively cycling through phases
    InProgress,
    /// Everything passed except the operator approval gate
    AwaitingApproval,
    /// No repository change across the detection window
    Stuck,
    /// Tester phase failed
    TestFailures,
    /// All gates passed and the agent claimed completion
    Complete,
    /// Unrecoverable (budget, runner failure, cancellation)
    Failed,
}

impl LoopStatus {
    /// Returns true if the loop is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopStatus::Complete | LoopStatus::Failed)
    }

    /// Returns true if automatic continuation has stopped and an operator
    /// (or configuration) must decide what happens next
    pub fn is_halted(&self) -> bool {
        matches!(
            self,
            LoopStatus::AwaitingApproval | LoopStatus::Stuck | LoopStatus::TestFailures
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoopStatus::Idle => "idle",
            LoopStatus::InProgress => "in_progress",
            LoopStatus::AwaitingApproval => "awaiting_approval",
            LoopStatus::Stuck => "stuck",
            LoopStatus::TestFailures => "test_failures",
            LoopStatus::Complete => "complete",
            LoopStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

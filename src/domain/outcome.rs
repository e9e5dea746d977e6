//! Loop execution outcome types.

use super::status::LoopStatus;

/// Result of driving a loop until it stops on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All gates passed and the expected promise was seen
    Complete,
    /// Halted awaiting an operator decision (approval, stuck, test failures)
    Halted { status: LoopStatus, reason: String },
    /// Terminal failure
    Failed(String),
}

impl RunOutcome {
    pub fn status(&self) -> LoopStatus {
        match self {
            RunOutcome::Complete => LoopStatus::Complete,
            RunOutcome::Halted { status, .. } => *status,
            RunOutcome::Failed(_) => LoopStatus::Failed,
        }
    }
}

/// What the scheduler decided at the end of one phase cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// Keep going with the next iteration
    Continue,
    /// Stop cycling; the loop is in `status`
    Stop { status: LoopStatus, reason: String },
}

//! Loop status state machine.
//!
//! ```text
//! idle -> in_progress -> { awaiting_approval | stuck | test_failures | complete | failed }
//! { awaiting_approval | stuck | test_failures } -> { in_progress | complete | failed }
//! ```

use log::info;

use crate::domain::{LoopState, LoopStatus};
use crate::error::{Result, SuperloopError};

/// Whether `from -> to` is an edge of the state machine.
///
/// Staying in the same status is not a transition and is always allowed.
pub fn can_transition(from: LoopStatus, to: LoopStatus) -> bool {
    use LoopStatus::*;

    if from == to {
        return true;
    }
    match from {
        Idle => to == InProgress,
        InProgress => matches!(to, AwaitingApproval | Stuck | TestFailures | Complete | Failed),
        AwaitingApproval | Stuck | TestFailures => matches!(to, InProgress | Complete | Failed),
        Complete | Failed => false,
    }
}

/// Move `state` to `to`, recording `reason`.
pub fn apply(state: &mut LoopState, to: LoopStatus, reason: Option<String>) -> Result<()> {
    let from = state.status;
    if !can_transition(from, to) {
        return Err(SuperloopError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    match &reason {
        Some(reason) => info!("Loop {} -> {}: {}", from, to, reason),
        None => info!("Loop {} -> {}", from, to),
    }
    state.status = to;
    state.status_reason = reason;
    if to != LoopStatus::InProgress {
        state.current_phase = None;
    }
    state.touch();
    Ok(())
}

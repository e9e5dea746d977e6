//! Phase scheduling for Superloop.
//!
//! This module provides:
//! - **PhaseScheduler**: runs the phase sequence per iteration, then stuck
//!   detection and completion gates, persisting after every step.
//! - **Transitions**: the loop status state machine.
//! - **Cancellation**: a shared token tripped by Ctrl-C or a cancel-request file.

mod cancel;
mod phase_scheduler;
pub mod transitions;

pub use cancel::{CANCEL_FILE, CancelToken, cancel_file, clear_cancel_request, request_cancel, watch_cancel_file};
pub use phase_scheduler::{BUDGET_EXHAUSTED, CANCELLED, PhaseScheduler};
pub use transitions::{apply as apply_transition, can_transition};

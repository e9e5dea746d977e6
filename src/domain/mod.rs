//! Domain types for Superloop
//!
//! This module contains all core domain types:
//! - LoopState: the persisted root record (status, iteration, history, costs)
//! - PhaseRecord: one runner execution within one iteration
//! - UsageTotals: cumulative token counters and derived cost
//! - RunOutcome / IterationOutcome: what the scheduler decided

pub mod loop_state;
pub mod outcome;
pub mod phase_record;
pub mod status;
pub mod usage;

pub use loop_state::{GateSummary, IterationFingerprint, LoopState, STATE_VERSION};
pub use outcome::{IterationOutcome, RunOutcome};
pub use phase_record::{ExitStatus, PhaseRecord};
pub use status::LoopStatus;
pub use usage::UsageTotals;

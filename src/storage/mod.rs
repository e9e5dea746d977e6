//! Storage layer for Superloop - durable loop state and derived report.
//!
//! The state document is the single source of truth; every save replaces it
//! atomically. The markdown report is regenerated from it and never read.

mod atomic;
pub mod report;
mod state_store;

pub use atomic::write_atomic;
pub use report::{REPORT_FILE, render as render_report, write_report};
pub use state_store::{FileStateStore, STATE_FILE, StateStore};

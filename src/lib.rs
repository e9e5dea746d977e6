//! Superloop - a multi-role agent loop orchestrator
//!
//! Superloop repeatedly runs external agent processes (planner, implementer,
//! tester, reviewer) against a repository until completion gates pass and an
//! agent claims completion, detecting stalls and persisting every step.

pub mod accounting;
pub mod config;
pub mod domain;
pub mod error;
pub mod gates;
pub mod parser;
pub mod runner;
pub mod scheduler;
pub mod storage;
pub mod stuck;

pub use error::{Result, SuperloopError};

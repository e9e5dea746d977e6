//! Error types for Superloop
//!
//! Centralized error handling using thiserror.

use std::path::PathBuf;

use thiserror::Error;

/// All error types that can occur in the loop engine
#[derive(Debug, Error)]
pub enum SuperloopError {
    /// Runner exceeded its wall-clock budget (after any timeout retries)
    #[error("Runner '{phase}' timed out after {timeout_ms}ms")]
    RunnerTimeout { phase: String, timeout_ms: u64 },

    /// Runner exited non-zero or could not be started
    #[error("Runner '{phase}' failed after {attempts} attempt(s): {reason}")]
    RunnerFailure {
        phase: String,
        attempts: u32,
        reason: String,
    },

    /// Provider rate limit seen in runner output; retried internally
    #[error("Runner '{phase}' rate limited (attempt {attempt})")]
    RateLimited { phase: String, attempt: u32 },

    /// Runner output could not be interpreted; never fatal
    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    /// State file exists but cannot be read back; requires operator repair
    #[error("State file {path} is corrupt: {reason}")]
    StateCorruption { path: PathBuf, reason: String },

    /// Loop ran out of iterations
    #[error("Iteration budget exhausted ({0} iterations)")]
    IterationBudgetExceeded(u32),

    /// No observable repository change across the detection window
    #[error("Stuck: no repository change across {0} iterations")]
    StuckDetected(u32),

    /// Operator cancelled the loop
    #[error("Cancelled")]
    Cancelled,

    /// Status change outside the loop state machine
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Configuration problem
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SuperloopError {
    /// Whether the loop can make progress again without operator repair
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SuperloopError::RunnerTimeout { .. } | SuperloopError::RateLimited { .. }
        )
    }
}

/// Result type alias for Superloop operations
pub type Result<T> = std::result::Result<T, SuperloopError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_timeout_error() {
        let err = SuperloopError::RunnerTimeout {
            phase: "tester".to_string(),
            timeout_ms: 1500,
        };
        assert_eq!(err.to_string(), "Runner 'tester' timed out after 1500ms");
        assert!(err.is_transient());
    }

    #[test]
    fn test_runner_failure_error() {
        let err = SuperloopError::RunnerFailure {
            phase: "implementer".to_string(),
            attempts: 3,
            reason: "exit code 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Runner 'implementer' failed after 3 attempt(s): exit code 1"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_state_corruption_error() {
        let err = SuperloopError::StateCorruption {
            path: PathBuf::from(".superloop/state.json"),
            reason: "expected value at line 1".to_string(),
        };
        assert!(err.to_string().contains(".superloop/state.json"));
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn test_budget_and_stuck_errors() {
        assert_eq!(
            SuperloopError::IterationBudgetExceeded(10).to_string(),
            "Iteration budget exhausted (10 iterations)"
        );
        assert_eq!(
            SuperloopError::StuckDetected(3).to_string(),
            "Stuck: no repository change across 3 iterations"
        );
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = SuperloopError::InvalidTransition {
            from: "complete".to_string(),
            to: "in_progress".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid transition: complete -> in_progress");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SuperloopError = io_err.into();
        assert!(matches!(err, SuperloopError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: SuperloopError = json_err.into();
        assert!(matches!(err, SuperloopError::Json(_)));
    }
}

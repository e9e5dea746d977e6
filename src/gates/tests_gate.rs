// Completion gates - test status artifact

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::LoopState;
use crate::gates::traits::{Gate, GateOutcome};

pub const TESTS_GATE: &str = "tests";

/// Test-status artifact written by the tester role.
#[derive(Debug, Clone, Deserialize)]
pub struct TestStatus {
    pub ok: bool,
    #[serde(default)]
    pub passed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub skipped: u64,
}

/// Passes only when the artifact exists, parses, and reports all passing.
pub struct TestsGate {
    artifact: PathBuf,
}

impl TestsGate {
    pub fn new(artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
        }
    }
}

impl Gate for TestsGate {
    fn name(&self) -> &str {
        TESTS_GATE
    }

    fn check(&self, repo_root: &Path, _state: &LoopState) -> GateOutcome {
        let path = repo_root.join(&self.artifact);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => {
                return GateOutcome::fail(format!("test-status artifact missing at {}", self.artifact.display()));
            }
        };

        let status: TestStatus = match serde_json::from_str(&content) {
            Ok(status) => status,
            Err(e) => return GateOutcome::fail(format!("unparsable test-status artifact: {}", e)),
        };

        if status.failed > 0 {
            GateOutcome::fail(format!("{} failing test(s)", status.failed))
        } else if !status.ok {
            GateOutcome::fail("test-status reports not ok")
        } else {
            GateOutcome::pass(format!(
                "{} passed, {} skipped",
                status.passed, status.skipped
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn check_with(content: Option<&str>) -> GateOutcome {
        let temp = TempDir::new().unwrap();
        if let Some(content) = content {
            fs::write(temp.path().join("status.json"), content).unwrap();
        }
        TestsGate::new("status.json").check(temp.path(), &LoopState::new())
    }

    #[test]
    fn test_missing_artifact_fails_closed() {
        let outcome = check_with(None);
        assert!(!outcome.passed);
        assert!(outcome.reason.contains("missing"));
    }

    #[test]
    fn test_all_passing() {
        let outcome = check_with(Some(r#"{"ok": true, "passed": 12, "skipped": 1}"#));
        assert!(outcome.passed);
        assert_eq!(outcome.reason, "12 passed, 1 skipped");
    }

    #[test]
    fn test_failures_reported() {
        let outcome = check_with(Some(r#"{"ok": true, "passed": 10, "failed": 2}"#));
        assert!(!outcome.passed);
        assert_eq!(outcome.reason, "2 failing test(s)");
    }

    #[test]
    fn test_not_ok() {
        assert!(!check_with(Some(r#"{"ok": false}"#)).passed);
    }

    #[test]
    fn test_garbage_fails() {
        let outcome = check_with(Some("PASS"));
        assert!(!outcome.passed);
        assert!(outcome.reason.contains("unparsable"));
    }
}

// Completion gates - operator approval

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};

use crate::domain::{LoopState, PhaseRecord};
use crate::gates::traits::{Gate, GateOutcome};

pub const APPROVAL_GATE: &str = "approval";

/// Passes only when the operator has written the approval flag file.
///
/// Agent output is never consulted. A flag whose modification time falls
/// inside a recorded phase run was written while a runner had the repository,
/// so it is rejected.
pub struct ApprovalGate {
    flag: PathBuf,
}

impl ApprovalGate {
    pub fn new(flag: impl Into<PathBuf>) -> Self {
        Self { flag: flag.into() }
    }
}

/// Interpret flag file contents; an empty file counts as approval.
fn is_affirmative(content: &str) -> bool {
    let value = content.trim().to_ascii_lowercase();
    !matches!(value.as_str(), "false" | "0" | "no")
}

/// The phase that was running when the flag was written, if any.
fn written_during<'a>(written: DateTime<Utc>, state: &'a LoopState) -> Option<&'a PhaseRecord> {
    state.history.iter().find(|record| {
        let finished = record.started_at + Duration::milliseconds(record.duration_ms as i64);
        record.started_at <= written && written <= finished
    })
}

impl Gate for ApprovalGate {
    fn name(&self) -> &str {
        APPROVAL_GATE
    }

    fn check(&self, repo_root: &Path, state: &LoopState) -> GateOutcome {
        let path = repo_root.join(&self.flag);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(_) => return GateOutcome::fail("awaiting operator approval"),
        };
        if !is_affirmative(&String::from_utf8_lossy(&bytes)) {
            return GateOutcome::fail("approval withheld");
        }

        let written = fs::metadata(&path).and_then(|m| m.modified()).map(DateTime::<Utc>::from);
        if let Ok(written) = written
            && let Some(record) = written_during(written, state)
        {
            return GateOutcome::fail(format!(
                "approval flag written while phase {} (iteration {}) was running",
                record.phase, record.iteration
            ));
        }
        GateOutcome::pass("approved by operator")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_affirmative() {
        assert!(is_affirmative(""));
        assert!(is_affirmative("yes\n"));
        assert!(is_affirmative("approved by alex"));
        assert!(!is_affirmative("false"));
        assert!(!is_affirmative(" NO \n"));
        assert!(!is_affirmative("0"));
    }

    #[test]
    fn test_missing_flag_fails() {
        let temp = TempDir::new().unwrap();
        let outcome = ApprovalGate::new("approved").check(temp.path(), &LoopState::new());
        assert!(!outcome.passed);
    }

    #[test]
    fn test_flag_present_passes() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("approved"), "").unwrap();
        assert!(ApprovalGate::new("approved").check(temp.path(), &LoopState::new()).passed);
    }

    fn record_around(now: DateTime<Utc>) -> PhaseRecord {
        PhaseRecord {
            iteration: 2,
            phase: "implementer".to_string(),
            started_at: now - Duration::seconds(30),
            duration_ms: 60_000,
            exit_status: crate::domain::ExitStatus::Success,
            exit_code: Some(0),
            promise_found: None,
            output_path: PathBuf::from("implementer.log"),
            attempts: 1,
            rate_limited: false,
            reason: None,
            usage: None,
        }
    }

    #[test]
    fn test_flag_written_during_phase_is_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("approved"), "").unwrap();
        let mut state = LoopState::new();
        state.append_record(record_around(Utc::now()));

        let outcome = ApprovalGate::new("approved").check(temp.path(), &state);
        assert!(!outcome.passed);
        assert!(outcome.reason.contains("implementer"), "{}", outcome.reason);
    }

    #[test]
    fn test_flag_written_after_phases_passes() {
        let temp = TempDir::new().unwrap();
        let mut state = LoopState::new();
        state.append_record(record_around(Utc::now() - Duration::minutes(5)));
        fs::write(temp.path().join("approved"), "yes").unwrap();

        assert!(ApprovalGate::new("approved").check(temp.path(), &state).passed);
    }
}

// Completion gates - core interfaces

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;

use crate::domain::{GateSummary, LoopState};

/// Verdict of a single gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub passed: bool,
    pub reason: String,
}

impl GateOutcome {
    /// Create a passing outcome
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: reason.into(),
        }
    }

    /// Create a failing outcome
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: reason.into(),
        }
    }
}

/// Verdicts of every enabled gate, keyed by gate name.
///
/// Disabled gates are absent and therefore never block completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateResult {
    pub outcomes: BTreeMap<String, GateOutcome>,
}

impl GateResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, outcome: GateOutcome) {
        self.outcomes.insert(name.into(), outcome);
    }

    pub fn get(&self, name: &str) -> Option<&GateOutcome> {
        self.outcomes.get(name)
    }

    /// True when every enabled gate passed
    pub fn all_passed(&self) -> bool {
        self.outcomes.values().all(|o| o.passed)
    }

    /// Names of every failing gate, in name order
    pub fn failing(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| !o.passed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// True when `name` is enabled and is the only failing gate
    pub fn only_failing(&self, name: &str) -> bool {
        self.failing() == [name]
    }

    /// Whether the named gate is enabled and passing; None when disabled
    pub fn passed(&self, name: &str) -> Option<bool> {
        self.outcomes.get(name).map(|o| o.passed)
    }

    /// One-line description of every verdict
    pub fn describe(&self) -> String {
        if self.outcomes.is_empty() {
            return "no gates enabled".to_string();
        }
        self.outcomes
            .iter()
            .map(|(name, o)| format!("{}: {} ({})", name, if o.passed { "pass" } else { "fail" }, o.reason))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Condense into the persisted form
    pub fn summarize(&self, iteration: u32, record_index: Option<usize>) -> GateSummary {
        GateSummary {
            iteration,
            record_index,
            passed: self.all_passed(),
            failing: self.failing().into_iter().map(String::from).collect(),
            detail: self.describe(),
            evaluated_at: Utc::now(),
        }
    }
}

/// A named completion criterion checked against external signals.
///
/// Implementations must be deterministic: the same repository contents and
/// loop state always yield the same outcome.
pub trait Gate: Send + Sync {
    /// Gate name used in results and configuration
    fn name(&self) -> &str;

    /// Check the gate against the repository and loop state
    fn check(&self, repo_root: &Path, state: &LoopState) -> GateOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(entries: &[(&str, bool)]) -> GateResult {
        let mut result = GateResult::new();
        for (name, passed) in entries {
            let outcome = if *passed {
                GateOutcome::pass("ok")
            } else {
                GateOutcome::fail("nope")
            };
            result.insert(*name, outcome);
        }
        result
    }

    #[test]
    fn test_empty_result_passes() {
        let result = GateResult::new();
        assert!(result.all_passed());
        assert!(result.failing().is_empty());
        assert_eq!(result.describe(), "no gates enabled");
    }

    #[test]
    fn test_all_failing_gates_reported() {
        let result = result(&[("tests", false), ("checklist", true), ("approval", false)]);
        assert!(!result.all_passed());
        assert_eq!(result.failing(), vec!["approval", "tests"]);
        assert!(!result.only_failing("approval"));
    }

    #[test]
    fn test_only_failing() {
        let result = result(&[("tests", true), ("approval", false)]);
        assert!(result.only_failing("approval"));
        assert!(!result.only_failing("tests"));
    }

    #[test]
    fn test_passed_lookup() {
        let result = result(&[("tests", true)]);
        assert_eq!(result.passed("tests"), Some(true));
        assert_eq!(result.passed("evidence"), None);
    }

    #[test]
    fn test_summarize() {
        let result = result(&[("tests", false), ("checklist", true)]);
        let summary = result.summarize(4, Some(11));
        assert_eq!(summary.iteration, 4);
        assert_eq!(summary.record_index, Some(11));
        assert!(!summary.passed);
        assert_eq!(summary.failing, vec!["tests".to_string()]);
        assert_eq!(summary.detail, "checklist: pass (ok); tests: fail (nope)");
    }
}

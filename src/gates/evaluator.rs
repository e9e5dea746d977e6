// Completion gates - evaluator
// Runs every enabled gate and collects all verdicts

use std::path::Path;

use crate::config::GatesConfig;
use crate::domain::LoopState;
use crate::gates::approval::ApprovalGate;
use crate::gates::checklist::ChecklistGate;
use crate::gates::evidence::EvidenceGate;
use crate::gates::tests_gate::TestsGate;
use crate::gates::traits::{Gate, GateResult};

/// Runs the enabled gates. Every gate is checked even after a failure so
/// that all failing gates are reported together.
pub struct GateEvaluator {
    gates: Vec<Box<dyn Gate>>,
}

impl GateEvaluator {
    /// Create an evaluator with no gates
    pub fn new() -> Self {
        Self { gates: Vec::new() }
    }

    /// Build the gate set from configuration; disabled gates are left out.
    pub fn from_config(config: &GatesConfig) -> Self {
        let mut evaluator = Self::new();
        if config.tests.enabled {
            evaluator = evaluator.with_gate(TestsGate::new(&config.tests.artifact));
        }
        if config.checklist.enabled {
            evaluator = evaluator.with_gate(ChecklistGate::new(&config.checklist.path, config.checklist.optional));
        }
        if config.evidence.enabled {
            evaluator = evaluator.with_gate(EvidenceGate::new(config.evidence.paths.clone()));
        }
        if config.approval.enabled {
            evaluator = evaluator.with_gate(ApprovalGate::new(&config.approval.flag));
        }
        evaluator
    }

    /// Add a gate (builder pattern)
    pub fn with_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gates.push(Box::new(gate));
        self
    }

    /// Names of the enabled gates
    pub fn gate_names(&self) -> Vec<&str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.gates.iter().any(|g| g.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Check every enabled gate
    pub fn evaluate(&self, repo_root: &Path, state: &LoopState) -> GateResult {
        let mut result = GateResult::new();
        for gate in &self.gates {
            let outcome = gate.check(repo_root, state);
            log::debug!("Gate {}: passed={} ({})", gate.name(), outcome.passed, outcome.reason);
            result.insert(gate.name(), outcome);
        }
        result
    }
}

impl Default for GateEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gates::traits::GateOutcome;
    use std::fs;
    use tempfile::TempDir;

    struct FixedGate(&'static str, bool);

    impl Gate for FixedGate {
        fn name(&self) -> &str {
            self.0
        }

        fn check(&self, _repo_root: &Path, _state: &LoopState) -> GateOutcome {
            if self.1 {
                GateOutcome::pass("fixed")
            } else {
                GateOutcome::fail("fixed")
            }
        }
    }

    #[test]
    fn test_from_config_defaults() {
        let evaluator = GateEvaluator::from_config(&GatesConfig::default());
        assert_eq!(evaluator.gate_names(), vec!["tests", "checklist"]);
        assert!(!evaluator.is_enabled("approval"));
    }

    #[test]
    fn test_disabled_gates_absent() {
        let mut config = GatesConfig::default();
        config.tests.enabled = false;
        config.checklist.enabled = false;
        let evaluator = GateEvaluator::from_config(&config);
        assert!(evaluator.is_empty());

        let temp = TempDir::new().unwrap();
        let result = evaluator.evaluate(temp.path(), &LoopState::new());
        assert!(result.all_passed());
        assert!(result.outcomes.is_empty());
    }

    #[test]
    fn test_reports_every_failure() {
        let evaluator = GateEvaluator::new()
            .with_gate(FixedGate("a", false))
            .with_gate(FixedGate("b", true))
            .with_gate(FixedGate("c", false));
        let temp = TempDir::new().unwrap();
        let result = evaluator.evaluate(temp.path(), &LoopState::new());
        assert_eq!(result.failing(), vec!["a", "c"]);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".superloop")).unwrap();
        fs::write(temp.path().join(".superloop/checklist.md"), "- [x] a\n- [ ] b\n").unwrap();
        fs::write(temp.path().join(".superloop/test-status.json"), r#"{"ok": true, "passed": 3}"#).unwrap();

        let mut config = GatesConfig::default();
        config.approval.enabled = true;
        let evaluator = GateEvaluator::from_config(&config);
        let state = LoopState::new();

        let first = evaluator.evaluate(temp.path(), &state);
        let second = evaluator.evaluate(temp.path(), &state);
        assert_eq!(first, second);
        assert_eq!(first.failing(), vec!["approval", "checklist"]);
    }
}

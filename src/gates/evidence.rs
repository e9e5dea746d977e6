// Completion gates - evidence artifacts

use std::fs;
use std::path::Path;

use crate::domain::LoopState;
use crate::gates::traits::{Gate, GateOutcome};

pub const EVIDENCE_GATE: &str = "evidence";

/// Every configured path must exist and be non-empty. Glob patterns must
/// match at least one non-empty file.
pub struct EvidenceGate {
    paths: Vec<String>,
}

impl EvidenceGate {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    fn is_pattern(path: &str) -> bool {
        path.contains(['*', '?', '['])
    }

    fn non_empty(path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(meta) if meta.is_dir() => fs::read_dir(path).map(|mut d| d.next().is_some()).unwrap_or(false),
            Ok(meta) => meta.len() > 0,
            Err(_) => false,
        }
    }

    fn satisfied(&self, repo_root: &Path, entry: &str) -> bool {
        if !Self::is_pattern(entry) {
            return Self::non_empty(&repo_root.join(entry));
        }

        let pattern = repo_root.join(entry);
        let Some(pattern) = pattern.to_str() else {
            return false;
        };
        match glob::glob(pattern) {
            Ok(paths) => paths.filter_map(|p| p.ok()).any(|p| Self::non_empty(&p)),
            Err(e) => {
                log::warn!("Invalid evidence pattern {}: {}", entry, e);
                false
            }
        }
    }
}

impl Gate for EvidenceGate {
    fn name(&self) -> &str {
        EVIDENCE_GATE
    }

    fn check(&self, repo_root: &Path, _state: &LoopState) -> GateOutcome {
        if self.paths.is_empty() {
            return GateOutcome::fail("no evidence paths configured");
        }

        let missing: Vec<&str> = self
            .paths
            .iter()
            .filter(|entry| !self.satisfied(repo_root, entry))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            GateOutcome::pass(format!("{} evidence path(s) present", self.paths.len()))
        } else {
            GateOutcome::fail(format!("missing or empty: {}", missing.join(", ")))
        }
    }
}

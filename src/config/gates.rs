//! Completion gate configuration.

use serde::{Deserialize, Serialize};

/// Which completion gates are enabled, and where their artifacts live.
///
/// Paths are relative to the repository root.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GatesConfig {
    pub tests: TestsGateConfig,
    pub checklist: ChecklistGateConfig,
    pub evidence: EvidenceGateConfig,
    pub approval: ApprovalGateConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TestsGateConfig {
    pub enabled: bool,
    /// JSON test-status artifact written by the tester role
    pub artifact: String,
}

impl Default for TestsGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            artifact: ".superloop/test-status.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChecklistGateConfig {
    pub enabled: bool,
    pub path: String,
    /// A missing or empty checklist passes only when optional
    pub optional: bool,
}

impl Default for ChecklistGateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: ".superloop/checklist.md".to_string(),
            optional: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EvidenceGateConfig {
    pub enabled: bool,
    /// Paths or glob patterns that must exist and be non-empty
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApprovalGateConfig {
    pub enabled: bool,
    /// Operator-written flag file
    pub flag: String,
}

impl Default for ApprovalGateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            flag: ".superloop/approved".to_string(),
        }
    }
}

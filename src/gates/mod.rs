//! Completion gates for Superloop
//!
//! A loop may only complete when every enabled gate passes. Gates read
//! external artifacts (test status, checklist, evidence files, an operator
//! approval flag) and never trust agent output.

pub mod approval;
pub mod checklist;
pub mod evaluator;
pub mod evidence;
pub mod tests_gate;
pub mod traits;

pub use approval::{APPROVAL_GATE, ApprovalGate};
pub use checklist::{CHECKLIST_GATE, ChecklistGate, ChecklistProgress, count_items};
pub use evaluator::GateEvaluator;
pub use evidence::{EVIDENCE_GATE, EvidenceGate};
pub use tests_gate::{TESTS_GATE, TestStatus, TestsGate};
pub use traits::{Gate, GateOutcome, GateResult};

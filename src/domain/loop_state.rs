//! LoopState - the root persisted entity.
//!
//! The orchestrator keeps no state between invocations: everything it needs
//! to resume is in this record, which is written back after every phase and
//! every status transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase_record::PhaseRecord;
use super::status::LoopStatus;
use super::usage::UsageTotals;

/// Current state document format.
pub const STATE_VERSION: u32 = 1;

/// Digest of observable repository state at the end of one iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationFingerprint {
    pub iteration: u32,
    pub digest: String,
}

/// Condensed gate evaluation, attached to the history entry that triggered it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateSummary {
    pub iteration: u32,
    /// Index into `history` of the last phase run before evaluation
    pub record_index: Option<usize>,
    pub passed: bool,
    #[serde(default)]
    pub failing: Vec<String>,
    pub detail: String,
    pub evaluated_at: DateTime<Utc>,
}

/// Durable record of one loop against one target repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    #[serde(default = "default_version")]
    pub version: u32,

    pub status: LoopStatus,

    /// Reason attached to the most recent transition
    #[serde(default)]
    pub status_reason: Option<String>,

    /// Full phase cycles started so far (0-indexed cycle number)
    pub iteration: u32,

    #[serde(default)]
    pub current_phase: Option<String>,

    /// Append-only, in execution order
    #[serde(default)]
    pub history: Vec<PhaseRecord>,

    #[serde(default)]
    pub cost_totals: UsageTotals,

    #[serde(default)]
    pub stuck_counter: u32,

    /// Most recent iteration fingerprints, oldest first
    #[serde(default)]
    pub fingerprints: Vec<IterationFingerprint>,

    #[serde(default)]
    pub gate_log: Vec<GateSummary>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Fields written by newer versions or other tools; kept on re-save
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopState {
    /// Fresh idle state
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: STATE_VERSION,
            status: LoopStatus::Idle,
            status_reason: None,
            iteration: 0,
            current_phase: None,
            history: Vec::new(),
            cost_totals: UsageTotals::default(),
            stuck_counter: 0,
            fingerprints: Vec::new(),
            gate_log: Vec::new(),
            created_at: now,
            updated_at: now,
            extra: serde_json::Map::new(),
        }
    }

    /// Update the timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a finished phase; history is never rewritten.
    pub fn append_record(&mut self, record: PhaseRecord) {
        self.history.push(record);
        self.touch();
    }

    pub fn append_gate_summary(&mut self, summary: GateSummary) {
        self.gate_log.push(summary);
        self.touch();
    }

    /// Records run during the given iteration, in execution order
    pub fn records_for(&self, iteration: u32) -> impl Iterator<Item = &PhaseRecord> {
        self.history.iter().filter(move |r| r.iteration == iteration)
    }

    /// Last completion promise claimed during the given iteration
    pub fn last_promise(&self, iteration: u32) -> Option<&str> {
        self.records_for(iteration)
            .filter_map(|r| r.promise_found.as_deref())
            .last()
    }

    /// Record an iteration fingerprint and update `stuck_counter`.
    ///
    /// The counter grows while consecutive fingerprints match and drops to
    /// zero as soon as a new one appears. Only `keep` entries are retained.
    pub fn push_fingerprint(&mut self, fingerprint: IterationFingerprint, keep: usize) {
        let repeated = self
            .fingerprints
            .last()
            .is_some_and(|prev| prev.digest == fingerprint.digest);

        if repeated {
            self.stuck_counter = self.stuck_counter.saturating_add(1);
        } else {
            self.stuck_counter = 0;
        }

        self.fingerprints.push(fingerprint);
        let keep = keep.max(1);
        if self.fingerprints.len() > keep {
            let excess = self.fingerprints.len() - keep;
            self.fingerprints.drain(..excess);
        }
        self.touch();
    }

    /// Forget the fingerprint window after an operator forces continuation.
    pub fn clear_fingerprints(&mut self) {
        self.fingerprints.clear();
        self.stuck_counter = 0;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitStatus;
    use std::path::PathBuf;

    fn record(iteration: u32, phase: &str, promise: Option<&str>) -> PhaseRecord {
        PhaseRecord {
            iteration,
            phase: phase.to_string(),
            started_at: Utc::now(),
            duration_ms: 10,
            exit_status: ExitStatus::Success,
            exit_code: Some(0),
            promise_found: promise.map(String::from),
            output_path: PathBuf::from(format!("{}-{}.log", iteration, phase)),
            attempts: 1,
            rate_limited: false,
            reason: None,
            usage: None,
        }
    }

    fn fp(iteration: u32, digest: &str) -> IterationFingerprint {
        IterationFingerprint {
            iteration,
            digest: digest.to_string(),
        }
    }

    #[test]
    fn test_new_state_is_idle() {
        let state = LoopState::new();
        assert_eq!(state.status, LoopStatus::Idle);
        assert_eq!(state.iteration, 0);
        assert!(state.history.is_empty());
        assert!(state.current_phase.is_none());
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_last_promise_uses_latest_phase_in_iteration() {
        let mut state = LoopState::new();
        state.append_record(record(0, "planner", Some("OLD")));
        state.append_record(record(1, "implementer", Some("EARLY")));
        state.append_record(record(1, "reviewer", Some("DONE")));
        state.append_record(record(1, "tester", None));

        assert_eq!(state.last_promise(1), Some("DONE"));
        assert_eq!(state.last_promise(0), Some("OLD"));
        assert_eq!(state.last_promise(2), None);
        assert_eq!(state.records_for(1).count(), 3);
    }

    #[test]
    fn test_push_fingerprint_counts_repeats() {
        let mut state = LoopState::new();
        state.push_fingerprint(fp(0, "a"), 3);
        assert_eq!(state.stuck_counter, 0);
        state.push_fingerprint(fp(1, "a"), 3);
        assert_eq!(state.stuck_counter, 1);
        state.push_fingerprint(fp(2, "a"), 3);
        assert_eq!(state.stuck_counter, 2);
        state.push_fingerprint(fp(3, "b"), 3);
        assert_eq!(state.stuck_counter, 0);
    }

    #[test]
    fn test_push_fingerprint_bounds_window() {
        let mut state = LoopState::new();
        for i in 0..10 {
            state.push_fingerprint(fp(i, &format!("d{}", i)), 3);
        }
        assert_eq!(state.fingerprints.len(), 3);
        assert_eq!(state.fingerprints[0].iteration, 7);
    }

    #[test]
    fn test_clear_fingerprints() {
        let mut state = LoopState::new();
        state.push_fingerprint(fp(0, "a"), 3);
        state.push_fingerprint(fp(1, "a"), 3);
        state.clear_fingerprints();
        assert!(state.fingerprints.is_empty());
        assert_eq!(state.stuck_counter, 0);
    }

    #[test]
    fn test_unknown_fields_survive_roundtrip() {
        let mut value = serde_json::to_value(LoopState::new()).unwrap();
        value
            .as_object_mut()
            .unwrap()
            .insert("dashboard_hint".to_string(), serde_json::json!({"color": "green"}));

        let parsed: LoopState = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.extra["dashboard_hint"]["color"], "green");

        let again = serde_json::to_value(&parsed).unwrap();
        assert_eq!(again["dashboard_hint"]["color"], "green");
    }
}

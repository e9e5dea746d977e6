//! PhaseScheduler - drives one loop through its phase cycles.
//!
//! Each iteration runs the configured phases in order, then checks for
//! non-progress and evaluates the completion gates. State is persisted after
//! every phase and every status transition, so a crash loses at most the
//! phase that was running.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};

use crate::accounting::accumulate;
use crate::config::LoopConfig;
use crate::domain::{
    ExitStatus, IterationFingerprint, IterationOutcome, LoopState, LoopStatus, PhaseRecord, RunOutcome,
};
use crate::error::{Result, SuperloopError};
use crate::gates::{APPROVAL_GATE, GateEvaluator, GateResult, TESTS_GATE};
use crate::parser;
use crate::runner::{InvocationRequest, ProcessInvoker, RetryPolicy, RunnerInvoker, TemplateContext, invoke_with_retry};
use crate::scheduler::cancel::CancelToken;
use crate::scheduler::transitions;
use crate::storage::{FileStateStore, REPORT_FILE, StateStore, write_report};
use crate::stuck::{Fingerprinter, GitFingerprinter, classify};

/// Reason recorded when the iteration budget runs out.
pub const BUDGET_EXHAUSTED: &str = "iteration budget exhausted";

/// Reason recorded when the operator cancels.
pub const CANCELLED: &str = "cancelled";

/// Orchestrates phases, gates and stuck detection for one repository.
pub struct PhaseScheduler<I, S, F>
where
    I: RunnerInvoker,
    S: StateStore,
    F: Fingerprinter,
{
    config: LoopConfig,
    repo_root: PathBuf,
    invoker: I,
    store: S,
    fingerprinter: F,
    gates: GateEvaluator,
    retry: RetryPolicy,
    /// Regenerated after every save when set
    report_path: Option<PathBuf>,
}

impl PhaseScheduler<ProcessInvoker, FileStateStore, GitFingerprinter> {
    /// Scheduler with real child processes, the JSON state file and git
    /// fingerprints, writing the report next to the state.
    pub fn for_repo(config: LoopConfig, repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        let state_dir = config.state_dir_in(&repo_root);
        let store = FileStateStore::new(&state_dir);
        let fingerprinter = GitFingerprinter::new(&config.state_dir);
        Self::new(config, repo_root, ProcessInvoker::new(), store, fingerprinter)
            .with_report(Some(state_dir.join(REPORT_FILE)))
    }
}

impl<I, S, F> PhaseScheduler<I, S, F>
where
    I: RunnerInvoker,
    S: StateStore,
    F: Fingerprinter,
{
    pub fn new(config: LoopConfig, repo_root: impl Into<PathBuf>, invoker: I, store: S, fingerprinter: F) -> Self {
        let gates = GateEvaluator::from_config(&config.gates);
        let retry = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            repo_root: repo_root.into(),
            invoker,
            store,
            fingerprinter,
            gates,
            retry,
            report_path: None,
        }
    }

    /// Set (or clear) the report path
    pub fn with_report(mut self, path: Option<PathBuf>) -> Self {
        self.report_path = path;
        self
    }

    /// Replace the gate set built from configuration
    pub fn with_gates(mut self, gates: GateEvaluator) -> Self {
        self.gates = gates;
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Load the state with the cost estimate re-derived from the counters.
    pub fn load(&self) -> Result<LoopState> {
        let mut state = self.store.load()?;
        self.config.pricing.reprice(&mut state);
        Ok(state)
    }

    /// Evaluate the gates against the current repository.
    pub fn evaluate_gates(&self, state: &LoopState) -> GateResult {
        self.gates.evaluate(&self.repo_root, state)
    }

    /// Drive the loop until it completes, fails or halts for the operator.
    ///
    /// `force` continues from `stuck`, `awaiting_approval` or
    /// `test_failures`. If an error escapes, the loop is moved to `failed`
    /// and persisted before the error is returned; a corrupt state file is
    /// returned untouched.
    pub async fn run(&self, force: bool, cancel: &CancelToken) -> Result<RunOutcome> {
        let mut state = self.load()?;

        match self.drive(&mut state, force, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Loop aborted: {}", e);
                if transitions::can_transition(state.status, LoopStatus::Failed)
                    && let Err(te) = transitions::apply(&mut state, LoopStatus::Failed, Some(e.to_string()))
                {
                    warn!("{}", te);
                }
                if let Err(save_err) = self.persist(&state) {
                    warn!("Failed to persist state after error: {}", save_err);
                }
                Err(e)
            }
        }
    }

    async fn drive(&self, state: &mut LoopState, force: bool, cancel: &CancelToken) -> Result<RunOutcome> {
        let mut resume_at = 0;

        match state.status {
            LoopStatus::Complete => {
                info!("Loop already complete");
                return Ok(RunOutcome::Complete);
            }
            LoopStatus::Failed => {
                let reason = state.status_reason.clone().unwrap_or_default();
                info!("Loop already failed: {}", reason);
                return Ok(RunOutcome::Failed(reason));
            }
            LoopStatus::Idle => {
                self.transition(state, LoopStatus::InProgress, None)?;
            }
            LoopStatus::InProgress => {
                // Interrupted mid-iteration: skip the phases already recorded.
                resume_at = state.records_for(state.iteration).count();
                info!("Resuming iteration {} at phase {}", state.iteration, resume_at);

                // Interrupted after saving a failed phase but before acting on it.
                let unhandled = state
                    .records_for(state.iteration)
                    .last()
                    .filter(|r| r.exit_status != ExitStatus::Success)
                    .map(|r| (r.phase.clone(), r.exit_status, r.reason.clone()));
                if let Some((phase, exit_status, reason)) = unhandled {
                    warn!("Phase {} ended {} before the loop stopped; stopping now", phase, exit_status);
                    if let Some(IterationOutcome::Stop { status, reason }) =
                        self.early_stop(state, &phase, exit_status, reason)?
                    {
                        return Ok(run_outcome(status, reason));
                    }
                }
            }
            LoopStatus::AwaitingApproval => {
                let gates = self.record_gates(state);
                if gates.all_passed() && self.promise_matches(state) {
                    self.transition(state, LoopStatus::Complete, Some("approved".to_string()))?;
                    return Ok(RunOutcome::Complete);
                }
                if !force {
                    self.persist(state)?;
                    return Ok(self.halted(state));
                }
                self.continue_loop(state, "continued without approval")?;
            }
            LoopStatus::TestFailures => {
                if !(force || self.config.continue_on_test_failures) {
                    return Ok(self.halted(state));
                }
                self.continue_loop(state, "continuing after test failures")?;
            }
            LoopStatus::Stuck => {
                if !force {
                    return Ok(self.halted(state));
                }
                state.clear_fingerprints();
                self.continue_loop(state, "forced continuation")?;
            }
        }

        loop {
            match self.run_iteration(state, resume_at, cancel).await? {
                IterationOutcome::Continue => resume_at = 0,
                IterationOutcome::Stop { status, reason } => return Ok(run_outcome(status, reason)),
            }
        }
    }

    /// One phase cycle, starting at phase index `start`.
    pub async fn run_iteration(
        &self,
        state: &mut LoopState,
        start: usize,
        cancel: &CancelToken,
    ) -> Result<IterationOutcome> {
        let iteration = state.iteration;

        // 1. Budget
        if iteration >= self.config.max_iterations {
            warn!("{}", SuperloopError::IterationBudgetExceeded(self.config.max_iterations));
            return self.stop(state, LoopStatus::Failed, BUDGET_EXHAUSTED.to_string());
        }
        info!("Iteration {} starting", iteration);

        // 2. Phases, persisted one at a time
        for phase in self.config.phases.iter().skip(start) {
            if cancel.is_cancelled() {
                return self.stop(state, LoopStatus::Failed, CANCELLED.to_string());
            }

            let record = self.run_phase(state, phase, cancel).await?;
            let exit_status = record.exit_status;
            let reason = record.reason.clone();
            state.current_phase = None;
            state.append_record(record);
            self.persist(state)?;

            // 3. Early stop
            if let Some(outcome) = self.early_stop(state, phase, exit_status, reason)? {
                return Ok(outcome);
            }
        }

        // 4. Stuck detection
        if let Some(reason) = self.detect_stuck(state) {
            return self.stop(state, LoopStatus::Stuck, reason);
        }

        // 5. Gates and promise
        let gates = self.record_gates(state);
        let promise_ok = self.promise_matches(state);
        if gates.all_passed() && promise_ok {
            return self.stop(
                state,
                LoopStatus::Complete,
                "all gates passed and completion promise received".to_string(),
            );
        }
        if promise_ok && gates.only_failing(APPROVAL_GATE) {
            return self.stop(state, LoopStatus::AwaitingApproval, "awaiting operator approval".to_string());
        }

        if !promise_ok {
            info!("Iteration {}: no completion promise; {}", iteration, gates.describe());
        } else {
            info!("Iteration {}: promise received but gates failing: {}", iteration, gates.failing().join(", "));
        }

        // 6. Next cycle
        state.iteration += 1;
        state.touch();
        self.persist(state)?;
        Ok(IterationOutcome::Continue)
    }

    /// Invoke one phase (with retries) and build its record.
    async fn run_phase(&self, state: &mut LoopState, phase: &str, cancel: &CancelToken) -> Result<PhaseRecord> {
        let spec = self
            .config
            .runner_for(phase)
            .ok_or_else(|| SuperloopError::Config(format!("phase '{}' has no runner configured", phase)))?;

        state.current_phase = Some(phase.to_string());
        state.touch();
        self.persist(state)?;

        let state_dir = Path::new(&self.config.state_dir);
        let ctx = TemplateContext::new(&self.repo_root, state_dir, phase, state.iteration)
            .with_spec(self.config.spec.as_deref());
        let request = InvocationRequest::from_spec(spec, &ctx);

        info!("Phase {} (iteration {}) starting", phase, state.iteration);
        let started_at = Utc::now();
        let clock = Instant::now();

        let retried = match invoke_with_retry(&self.invoker, &request, &self.retry, cancel).await {
            Ok(retried) => retried,
            Err(e @ (SuperloopError::RunnerFailure { .. } | SuperloopError::Io(_))) => {
                warn!("Phase {} could not run: {}", phase, e);
                return Ok(PhaseRecord {
                    iteration: state.iteration,
                    phase: phase.to_string(),
                    started_at,
                    duration_ms: clock.elapsed().as_millis() as u64,
                    exit_status: ExitStatus::Failure,
                    exit_code: None,
                    promise_found: None,
                    output_path: request.output_path.clone(),
                    attempts: 1,
                    rate_limited: false,
                    reason: Some(e.to_string()),
                    usage: None,
                });
            }
            Err(e) => return Err(e),
        };

        let result = retried.result;
        let parsed = parser::parse(&result.output_path);
        if let Some(usage) = &parsed.usage {
            state.cost_totals = self.config.pricing.priced(&accumulate(&state.cost_totals, usage));
        }
        if retried.rate_limited {
            warn!(
                "{}",
                SuperloopError::RateLimited {
                    phase: phase.to_string(),
                    attempt: retried.attempts,
                }
            );
        }

        let reason = match result.exit_status {
            ExitStatus::Success => None,
            ExitStatus::Timeout => Some(
                SuperloopError::RunnerTimeout {
                    phase: phase.to_string(),
                    timeout_ms: spec.timeout_ms,
                }
                .to_string(),
            ),
            ExitStatus::Failure => {
                let detail = match (retried.rate_limited, result.exit_code) {
                    (true, _) => "rate limit retries exhausted".to_string(),
                    (false, Some(code)) => format!("exit code {}", code),
                    (false, None) => "terminated by signal".to_string(),
                };
                Some(
                    SuperloopError::RunnerFailure {
                        phase: phase.to_string(),
                        attempts: retried.attempts,
                        reason: detail,
                    }
                    .to_string(),
                )
            }
            ExitStatus::Cancelled => Some(CANCELLED.to_string()),
        };

        info!(
            "Phase {} finished: {} in {}ms (promise: {})",
            phase,
            result.exit_status,
            result.duration_ms,
            parsed.promise.as_deref().unwrap_or("none")
        );

        Ok(PhaseRecord {
            iteration: state.iteration,
            phase: phase.to_string(),
            started_at,
            duration_ms: clock.elapsed().as_millis() as u64,
            exit_status: result.exit_status,
            exit_code: result.exit_code,
            promise_found: parsed.promise,
            output_path: result.output_path,
            attempts: retried.attempts,
            rate_limited: retried.rate_limited,
            reason,
            usage: parsed.usage.map(|u| self.config.pricing.priced(&u)),
        })
    }

    /// Stop the sequence after a phase that did not succeed; `None` lets it
    /// go on.
    ///
    /// A failed or timed-out phase still counts toward stuck detection, so a
    /// tester that keeps failing on an unchanged tree ends up `stuck`.
    fn early_stop(
        &self,
        state: &mut LoopState,
        phase: &str,
        exit_status: ExitStatus,
        reason: Option<String>,
    ) -> Result<Option<IterationOutcome>> {
        match exit_status {
            ExitStatus::Success => Ok(None),
            ExitStatus::Cancelled => self.stop(state, LoopStatus::Failed, CANCELLED.to_string()).map(Some),
            ExitStatus::Failure | ExitStatus::Timeout => {
                if let Some(stuck) = self.detect_stuck(state) {
                    return self.stop(state, LoopStatus::Stuck, stuck).map(Some);
                }
                let reason = reason.unwrap_or_else(|| format!("phase {} {}", phase, exit_status));
                self.phase_failed(state, phase, reason).map(Some)
            }
        }
    }

    /// Fingerprint the repository for this iteration; the stuck reason when
    /// the whole window is identical.
    fn detect_stuck(&self, state: &mut LoopState) -> Option<String> {
        let window = self.config.stuck.window as usize;
        if window == 0 {
            return None;
        }

        let iteration = state.iteration;
        match self.fingerprinter.fingerprint(&self.repo_root) {
            Ok(digest) => {
                debug!("Iteration {} fingerprint {}", iteration, digest);
                state.push_fingerprint(IterationFingerprint { iteration, digest }, window);
                classify(&state.fingerprints, window)
                    .then(|| SuperloopError::StuckDetected(self.config.stuck.window).to_string())
            }
            Err(e) => {
                warn!("Skipping stuck detection for iteration {}: {}", iteration, e);
                None
            }
        }
    }

    /// Classify a failed or timed-out phase.
    fn phase_failed(&self, state: &mut LoopState, phase: &str, reason: String) -> Result<IterationOutcome> {
        let gates = self.record_gates(state);
        let tests_passing = gates.passed(TESTS_GATE) == Some(true);

        if self.config.is_tester(phase) && !tests_passing {
            self.stop(state, LoopStatus::TestFailures, reason)
        } else {
            self.stop(state, LoopStatus::Failed, reason)
        }
    }

    /// Evaluate the gates and attach a summary to the latest record.
    fn record_gates(&self, state: &mut LoopState) -> GateResult {
        let result = self.evaluate_gates(state);
        let record_index = state.history.len().checked_sub(1);
        state.append_gate_summary(result.summarize(state.iteration, record_index));
        result
    }

    /// Last promise seen this iteration equals the expected token.
    fn promise_matches(&self, state: &LoopState) -> bool {
        state.last_promise(state.iteration) == Some(self.config.expected_promise.as_str())
    }

    fn continue_loop(&self, state: &mut LoopState, reason: &str) -> Result<()> {
        state.iteration += 1;
        self.transition(state, LoopStatus::InProgress, Some(reason.to_string()))
    }

    fn stop(&self, state: &mut LoopState, status: LoopStatus, reason: String) -> Result<IterationOutcome> {
        self.transition(state, status, Some(reason.clone()))?;
        Ok(IterationOutcome::Stop { status, reason })
    }

    fn halted(&self, state: &LoopState) -> RunOutcome {
        let reason = state.status_reason.clone().unwrap_or_default();
        info!("Loop halted in {}: {}", state.status, reason);
        RunOutcome::Halted {
            status: state.status,
            reason,
        }
    }

    fn transition(&self, state: &mut LoopState, to: LoopStatus, reason: Option<String>) -> Result<()> {
        transitions::apply(state, to, reason)?;
        self.persist(state)
    }

    /// Save the state, then regenerate the report from it.
    fn persist(&self, state: &LoopState) -> Result<()> {
        self.store.save(state)?;
        if let Some(path) = &self.report_path
            && let Err(e) = write_report(path, state)
        {
            warn!("Failed to write report {}: {}", path.display(), e);
        }
        Ok(())
    }
}

fn run_outcome(status: LoopStatus, reason: String) -> RunOutcome {
    match status {
        LoopStatus::Complete => RunOutcome::Complete,
        LoopStatus::Failed => RunOutcome::Failed(reason),
        status => RunOutcome::Halted { status, reason },
    }
}

//! Child-process runner invoker.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::{Child, Command};

use crate::domain::ExitStatus;
use crate::error::{Result, SuperloopError};
use crate::runner::invoker::{InvocationRequest, InvocationResult, RunnerInvoker};
use crate::runner::output::prepare_output;
use crate::scheduler::CancelToken;

/// Runs each phase as a child process in its own process group.
///
/// On timeout or cancellation the whole group gets SIGTERM, then SIGKILL once
/// the grace period has passed. The child is always reaped before returning.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker;

impl ProcessInvoker {
    pub fn new() -> Self {
        Self
    }
}

enum Interrupt {
    Timeout,
    Cancelled,
}

#[async_trait]
impl RunnerInvoker for ProcessInvoker {
    async fn invoke(&self, request: &InvocationRequest, cancel: &CancelToken) -> Result<InvocationResult> {
        let stdout = prepare_output(&request.output_path)?;
        let stderr = stdout.try_clone()?;

        let mut cmd = Command::new(&request.command);
        cmd.args(&request.args)
            .envs(&request.env)
            .current_dir(&request.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| SuperloopError::RunnerFailure {
            phase: request.phase.clone(),
            attempts: 1,
            reason: format!("failed to start '{}': {}", request.command, e),
        })?;
        let pid = child.id();
        debug!("Started {} for phase {} (pid {:?})", request.command, request.phase, pid);

        let waited = tokio::select! {
            status = child.wait() => Ok(status?),
            _ = tokio::time::sleep(request.timeout) => Err(Interrupt::Timeout),
            _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        };

        let (exit_status, exit_code) = match waited {
            Ok(status) if status.success() => (ExitStatus::Success, status.code()),
            Ok(status) => (ExitStatus::Failure, status.code()),
            Err(interrupt) => {
                let exit_status = match interrupt {
                    Interrupt::Timeout => {
                        warn!(
                            "Phase {} exceeded {}ms, terminating",
                            request.phase,
                            request.timeout.as_millis()
                        );
                        ExitStatus::Timeout
                    }
                    Interrupt::Cancelled => {
                        info!("Cancelling phase {}", request.phase);
                        ExitStatus::Cancelled
                    }
                };
                terminate(&mut child, pid, request.grace_period).await;
                (exit_status, None)
            }
        };

        Ok(InvocationResult {
            exit_status,
            exit_code,
            output_path: request.output_path.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
            pid,
        })
    }
}

/// Two-stage shutdown of the child's process group.
#[cfg(unix)]
async fn terminate(child: &mut Child, pid: Option<u32>, grace: Duration) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        // Already reaped
        return;
    };
    let group = Pid::from_raw(pid as i32);

    if let Err(e) = killpg(group, Signal::SIGTERM) {
        debug!("SIGTERM to group {} failed: {}", pid, e);
    }

    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        warn!("Process group {} ignored SIGTERM for {}ms, killing", pid, grace.as_millis());
    }

    // Sweep anything left in the group, including a leader that ignored SIGTERM.
    let _ = killpg(group, Signal::SIGKILL);
    if let Err(e) = child.wait().await {
        warn!("Failed to reap runner {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _pid: Option<u32>, grace: Duration) {
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        let _ = child.kill().await;
    }
}

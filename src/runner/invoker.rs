//! Runner invocation interface.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RunnerSpec;
use crate::domain::ExitStatus;
use crate::error::Result;
use crate::runner::template::TemplateContext;
use crate::scheduler::CancelToken;

/// A fully rendered runner invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub phase: String,
    pub iteration: u32,
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    /// Working directory (the target repository)
    pub cwd: PathBuf,
    /// Where stdout and stderr are captured
    pub output_path: PathBuf,
    pub timeout: Duration,
    pub grace_period: Duration,
}

impl InvocationRequest {
    /// Render a runner spec for one phase of one iteration.
    ///
    /// A relative output path is resolved against the repository root.
    pub fn from_spec(spec: &RunnerSpec, ctx: &TemplateContext<'_>) -> Self {
        let output = PathBuf::from(ctx.render(&spec.output));
        let output_path = if output.is_absolute() {
            output
        } else {
            ctx.repo.join(output)
        };

        let ctx = ctx.with_output(&output_path);
        let args = spec.args.iter().map(|a| ctx.render(a)).collect();
        let env = spec
            .env
            .iter()
            .map(|(k, v)| (k.clone(), ctx.render(v)))
            .collect();

        Self {
            phase: ctx.phase.to_string(),
            iteration: ctx.iteration,
            command: ctx.render(&spec.command),
            args,
            env,
            cwd: ctx.repo.to_path_buf(),
            output_path,
            timeout: Duration::from_millis(spec.timeout_ms),
            grace_period: Duration::from_millis(spec.grace_period_ms),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

/// What happened to one runner process.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub exit_status: ExitStatus,
    /// None when the process was killed by a signal or never waited on
    pub exit_code: Option<i32>,
    pub output_path: PathBuf,
    pub duration_ms: u64,
    pub pid: Option<u32>,
}

/// Starts a runner and waits for it, enforcing timeout and cancellation.
///
/// Errors are reserved for invocations that could not happen at all (spawn
/// failure, unwritable output); a runner that ran and failed is an
/// `Ok` result with a non-success exit status.
#[async_trait]
pub trait RunnerInvoker: Send + Sync {
    async fn invoke(&self, request: &InvocationRequest, cancel: &CancelToken) -> Result<InvocationResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spec_renders_templates() {
        let spec = RunnerSpec::new("claude", &["-p", "act as {phase}", "--log={output}"])
            .timeout_ms(1_000)
            .grace_period_ms(10)
            .env("SUPERLOOP_ITERATION", "{iteration}");
        let ctx = TemplateContext::new(Path::new("/repo"), Path::new(".superloop"), "reviewer", 2);

        let request = InvocationRequest::from_spec(&spec, &ctx);

        assert_eq!(request.command, "claude");
        assert_eq!(request.output_path, PathBuf::from("/repo/.superloop/logs/iter-2-reviewer.log"));
        assert_eq!(
            request.args,
            vec!["-p", "act as reviewer", "--log=/repo/.superloop/logs/iter-2-reviewer.log"]
        );
        assert_eq!(request.env.get("SUPERLOOP_ITERATION").map(String::as_str), Some("2"));
        assert_eq!(request.cwd, PathBuf::from("/repo"));
        assert_eq!(request.timeout, Duration::from_secs(1));
        assert_eq!(request.grace_period, Duration::from_millis(10));
    }

    #[test]
    fn test_from_spec_absolute_output() {
        let spec = RunnerSpec::default().output("/tmp/{phase}.log");
        let ctx = TemplateContext::new(Path::new("/repo"), Path::new(".superloop"), "tester", 0);
        let request = InvocationRequest::from_spec(&spec, &ctx);
        assert_eq!(request.output_path, PathBuf::from("/tmp/tester.log"));
        assert_eq!(request.args, vec![".superloop/runners/tester.sh"]);
    }
}

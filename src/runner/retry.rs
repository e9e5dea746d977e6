//! Retry policy for transient runner failures.
//!
//! A failed invocation whose output carries a provider rate-limit signature
//! is retried with exponential backoff; timeouts get their own (usually
//! zero) retry budget. Cancellation is never retried.

use std::fs;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::domain::ExitStatus;
use crate::error::Result;
use crate::runner::invoker::{InvocationRequest, InvocationResult, RunnerInvoker};
use crate::scheduler::CancelToken;

/// Backoff parameters and rate-limit signatures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub timeout_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    /// Lowercased signatures
    signatures: Vec<String>,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            timeout_retries: config.timeout_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
            signatures: config
                .rate_limit_signatures
                .iter()
                .map(|s| s.to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Delay before retry number `retry` (1-based): `initial * multiplier^(retry-1)`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(64) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let cap = self.max_backoff.as_millis() as f64;
        Duration::from_millis(millis.min(cap) as u64)
    }

    /// Case-insensitive signature match
    pub fn is_rate_limited(&self, output: &str) -> bool {
        if self.signatures.is_empty() {
            return false;
        }
        let lowered = output.to_lowercase();
        self.signatures.iter().any(|s| lowered.contains(s.as_str()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Final invocation after retries, with the attempt count.
#[derive(Debug, Clone, PartialEq)]
pub struct RetriedInvocation {
    pub result: InvocationResult,
    /// Invocations made, including the first
    pub attempts: u32,
    /// Whether any attempt failed with a rate-limit signature
    pub rate_limited: bool,
}

/// Invoke a runner, retrying rate-limited failures and (if configured) timeouts.
///
/// When the rate-limit budget is spent the last failure is returned with
/// `rate_limited` set; exactly `max_retries + 1` attempts will have been made.
pub async fn invoke_with_retry<I>(
    invoker: &I,
    request: &InvocationRequest,
    policy: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<RetriedInvocation>
where
    I: RunnerInvoker + ?Sized,
{
    let mut attempts = 0;
    let mut rate_limit_retries = 0;
    let mut timeout_retries = 0;
    let mut rate_limited = false;

    loop {
        attempts += 1;
        let result = invoker.invoke(request, cancel).await?;

        let retry_delay = match result.exit_status {
            ExitStatus::Success | ExitStatus::Cancelled => None,
            ExitStatus::Timeout if timeout_retries < policy.timeout_retries => {
                timeout_retries += 1;
                tracing::warn!(
                    phase = %request.phase,
                    attempt = attempts,
                    "Runner timed out, retrying"
                );
                Some(Duration::ZERO)
            }
            ExitStatus::Timeout => None,
            ExitStatus::Failure => {
                let output = fs::read(&result.output_path)
                    .map(|b| String::from_utf8_lossy(&b).into_owned())
                    .unwrap_or_default();
                if policy.is_rate_limited(&output) {
                    rate_limited = true;
                    if rate_limit_retries < policy.max_retries {
                        rate_limit_retries += 1;
                        let delay = policy.delay_for(rate_limit_retries);
                        tracing::warn!(
                            phase = %request.phase,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Runner rate limited, backing off"
                        );
                        Some(delay)
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
        };

        let Some(delay) = retry_delay else {
            return Ok(RetriedInvocation {
                result,
                attempts,
                rate_limited,
            });
        };

        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Ok(RetriedInvocation { result, attempts, rate_limited });
                }
            }
        }
        if cancel.is_cancelled() {
            return Ok(RetriedInvocation {
                result,
                attempts,
                rate_limited,
            });
        }
    }
}

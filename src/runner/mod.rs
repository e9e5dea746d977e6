//! Runner invocation
//!
//! Starts the external agent for one phase, captures its output to a file,
//! and enforces timeout, cancellation and transient-failure retries.

mod invoker;
pub mod output;
mod process;
pub mod retry;
pub mod template;

pub use invoker::{InvocationRequest, InvocationResult, RunnerInvoker};
pub use process::ProcessInvoker;
pub use retry::{RetriedInvocation, RetryPolicy, invoke_with_retry};
pub use template::TemplateContext;

//! Script runner — executes entity scripts under a time limit.

use std::time::Duration;

use serde_json::{Map, Value};

use unictl_domain::execution::ExecutionError;

use crate::execution_context::ExecutionContext;
use crate::ports::ScriptRuntime;

/// Default time a script may run before it is abandoned.
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs scripts through a [`ScriptRuntime`] and enforces the timeout.
///
/// On timeout the context's cancellation flag is raised so the runtime can
/// stop; the runner itself returns immediately and never waits for it.
pub struct ScriptRunner<R> {
    runtime: R,
    timeout: Duration,
}

impl<R: ScriptRuntime> ScriptRunner<R> {
    pub fn new(runtime: R, timeout: Duration) -> Self {
        Self { runtime, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `script` and return its result value.
    ///
    /// A blank script completes immediately with an empty mapping.
    ///
    /// # Errors
    ///
    /// - [`ExecutionError::Timeout`] when the script outlives the timeout
    /// - [`ExecutionError::Script`] with the runtime's message verbatim
    pub async fn run(&self, script: &str, context: ExecutionContext) -> Result<Value, ExecutionError> {
        if script.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        let cancellation = context.cancellation();
        match tokio::time::timeout(self.timeout, self.runtime.execute(script, context)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(ExecutionError::Script {
                message: err.message,
            }),
            Err(_elapsed) => {
                cancellation.cancel();
                Err(ExecutionError::Timeout {
                    timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}

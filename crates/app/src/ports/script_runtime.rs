//! Script runtime port — the interpreter that executes entity scripts.

use std::future::Future;

use crate::execution_context::ExecutionContext;

/// A script raised an error, or the runtime refused to run it.
///
/// The message is shown to users verbatim as the entity's `last_error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Strategy executing script source against an [`ExecutionContext`].
///
/// Implementations must stop promptly once
/// [`ExecutionContext::is_cancelled`] turns `true`; the runner has already
/// given up on the result by then.
pub trait ScriptRuntime {
    fn execute(
        &self,
        script: &str,
        context: ExecutionContext,
    ) -> impl Future<Output = Result<serde_json::Value, ScriptError>> + Send;
}

impl<T: ScriptRuntime + Send + Sync> ScriptRuntime for std::sync::Arc<T> {
    fn execute(
        &self,
        script: &str,
        context: ExecutionContext,
    ) -> impl Future<Output = Result<serde_json::Value, ScriptError>> + Send {
        (**self).execute(script, context)
    }
}

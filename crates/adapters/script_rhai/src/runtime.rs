//! [`ScriptRuntime`] implementation backed by a Rhai [`Engine`].

use std::sync::Arc;

use rhai::serde::{from_dynamic, to_dynamic};
use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;
use tokio::runtime::Handle;

use unictl_app::execution_context::ExecutionContext;
use unictl_app::ports::{ScriptError, ScriptRuntime};

use crate::helpers;

/// Operation budget of a single run when none is configured.
pub const DEFAULT_MAX_OPERATIONS: u64 = 1_000_000;

/// Evaluates entity scripts with Rhai.
///
/// Each run gets its own engine on a blocking thread, so a busy script never
/// stalls the async workers. The run's variables are `entity`, `last_result`,
/// `states` and `now`; the script's final expression (or `return` value) is
/// the result.
#[derive(Debug, Clone, Copy)]
pub struct RhaiRuntime {
    max_operations: u64,
}

impl RhaiRuntime {
    #[must_use]
    pub fn new(max_operations: u64) -> Self {
        Self { max_operations }
    }

    #[must_use]
    pub fn max_operations(&self) -> u64 {
        self.max_operations
    }

    fn engine(self, context: &Arc<ExecutionContext>, handle: &Handle) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(self.max_operations);

        let cancellation = context.cancellation();
        engine.on_progress(move |_| cancellation.is_cancelled().then_some(Dynamic::UNIT));

        helpers::register(&mut engine, context, handle);
        engine
    }

    fn evaluate(
        self,
        script: &str,
        context: ExecutionContext,
        handle: &Handle,
    ) -> Result<Value, ScriptError> {
        let context = Arc::new(context);
        let engine = self.engine(&context, handle);

        let mut scope = Scope::new();
        for (name, value) in context.bindings() {
            scope.push_dynamic(name.clone(), to_dynamic(value).map_err(script_error)?);
        }

        let result: Dynamic = engine
            .eval_with_scope(&mut scope, script)
            .map_err(script_error)?;
        if result.is_unit() {
            return Ok(Value::Null);
        }
        from_dynamic(&result).map_err(script_error)
    }
}

impl Default for RhaiRuntime {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OPERATIONS)
    }
}

#[allow(clippy::needless_pass_by_value)]
fn script_error(err: Box<EvalAltResult>) -> ScriptError {
    ScriptError::new(err.to_string())
}

impl ScriptRuntime for RhaiRuntime {
    async fn execute(&self, script: &str, context: ExecutionContext) -> Result<Value, ScriptError> {
        let runtime = *self;
        let script = script.to_owned();
        let handle = Handle::current();

        tokio::task::spawn_blocking(move || runtime.evaluate(&script, context, &handle))
            .await
            .map_err(|err| ScriptError::new(format!("script evaluation aborted: {err}")))?
    }
}

//! Execution context — everything a script sees during one run.
//!
//! A context is assembled fresh for every run by [`ContextBuilder`]: the
//! entity's own summary and last result, a snapshot of external state taken
//! at build time, and handles for performing actions and logging. Nothing is
//! shared between runs except the action handle.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{Map, Value};

use unictl_domain::action::{ActionError, ActionRequest};
use unictl_domain::entity::Entity;
use unictl_domain::error::UnictlError;
use unictl_domain::id::{EntityId, RunId};
use unictl_domain::state::{ExternalState, StateSnapshot};
use unictl_domain::time::{Timestamp, now, to_rfc3339};

use crate::ports::{ActionInvoker, StateProvider};

/// Boxed future returned by an [`ActionHandle`].
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Value, ActionError>> + Send>>;

/// Type-erased, cheaply cloneable access to an [`ActionInvoker`].
#[derive(Clone)]
pub struct ActionHandle(Arc<dyn Fn(ActionRequest) -> ActionFuture + Send + Sync>);

impl ActionHandle {
    pub fn new<F>(call: F) -> Self
    where
        F: Fn(ActionRequest) -> ActionFuture + Send + Sync + 'static,
    {
        Self(Arc::new(call))
    }

    pub fn from_invoker<AI>(invoker: Arc<AI>) -> Self
    where
        AI: ActionInvoker + Send + Sync + 'static,
    {
        Self::new(move |request| {
            let invoker = Arc::clone(&invoker);
            Box::pin(async move { invoker.invoke(request).await })
        })
    }

    /// A handle that rejects every request as unsupported.
    #[must_use]
    pub fn unsupported() -> Self {
        Self::new(|request| {
            let err = ActionError::unsupported(&request);
            Box::pin(async move { Err(err) })
        })
    }

    #[must_use]
    pub fn call(&self, request: ActionRequest) -> ActionFuture {
        (self.0)(request)
    }
}

impl std::fmt::Debug for ActionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ActionHandle")
    }
}

/// Shared flag raised when the runner stops waiting for a script.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Severity of a script log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Per-run view handed to the [`ScriptRuntime`](crate::ports::ScriptRuntime).
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    run_id: RunId,
    entity_id: EntityId,
    bindings: Map<String, Value>,
    states: Arc<StateSnapshot>,
    actions: ActionHandle,
    started_at: Timestamp,
    cancellation: Cancellation,
}

impl ExecutionContext {
    /// Bindings exposed to the script: `entity`, `last_result`, `states`, `now`.
    #[must_use]
    pub fn new(
        run_id: RunId,
        entity: &Entity,
        states: StateSnapshot,
        actions: ActionHandle,
        started_at: Timestamp,
    ) -> Self {
        let mut bindings = Map::new();
        bindings.insert("entity".to_string(), entity.summary());
        bindings.insert(
            "last_result".to_string(),
            Value::Object(entity.last_result.clone()),
        );
        bindings.insert("states".to_string(), states.to_value());
        bindings.insert("now".to_string(), Value::String(to_rfc3339(started_at)));
        Self {
            run_id,
            entity_id: entity.id.clone(),
            bindings,
            states: Arc::new(states),
            actions,
            started_at,
            cancellation: Cancellation::default(),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    #[must_use]
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    #[must_use]
    pub fn bindings(&self) -> &Map<String, Value> {
        &self.bindings
    }

    #[must_use]
    pub fn snapshot(&self) -> &StateSnapshot {
        &self.states
    }

    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Wall clock, not frozen at build time.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        now()
    }

    #[must_use]
    pub fn state(&self, entity_id: &str) -> Option<&ExternalState> {
        self.states.get(entity_id)
    }

    #[must_use]
    pub fn attribute(&self, entity_id: &str, name: &str) -> Option<&Value> {
        self.state(entity_id).and_then(|s| s.attribute(name))
    }

    #[must_use]
    pub fn is_on(&self, entity_id: &str) -> bool {
        self.state(entity_id).is_some_and(ExternalState::is_on)
    }

    #[must_use]
    pub fn is_off(&self, entity_id: &str) -> bool {
        self.state(entity_id).is_some_and(ExternalState::is_off)
    }

    #[must_use]
    pub fn filter_by_domain(&self, domain: &str) -> Vec<&ExternalState> {
        self.states.by_domain(domain).collect()
    }

    /// Perform an action through the host environment.
    #[must_use]
    pub fn call_action(&self, request: ActionRequest) -> ActionFuture {
        tracing::debug!(
            entity_id = %self.entity_id,
            run_id = %self.run_id,
            action = %request,
            "script action"
        );
        self.actions.call(request)
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        let entity_id = self.entity_id.as_str();
        let run_id = self.run_id;
        match level {
            LogLevel::Debug => tracing::debug!(entity_id, %run_id, "{message}"),
            LogLevel::Info => tracing::info!(entity_id, %run_id, "{message}"),
            LogLevel::Warn => tracing::warn!(entity_id, %run_id, "{message}"),
            LogLevel::Error => tracing::error!(entity_id, %run_id, "{message}"),
        }
    }

    #[must_use]
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Assembles an [`ExecutionContext`] for each run.
pub struct ContextBuilder<SP> {
    states: SP,
    actions: ActionHandle,
}

impl<SP: StateProvider> ContextBuilder<SP> {
    pub fn new(states: SP, actions: ActionHandle) -> Self {
        Self { states, actions }
    }

    /// Fresh copy of every external state.
    ///
    /// # Errors
    ///
    /// Propagates the state provider's error.
    pub async fn snapshot(&self) -> Result<StateSnapshot, UnictlError> {
        Ok(self.states.list_states().await?.into_iter().collect())
    }

    /// Build the context of one run. External state is read now, never cached.
    ///
    /// # Errors
    ///
    /// Propagates the state provider's error.
    pub async fn build(
        &self,
        run_id: RunId,
        entity: &Entity,
        started_at: Timestamp,
    ) -> Result<ExecutionContext, UnictlError> {
        let states = self.snapshot().await?;
        Ok(ExecutionContext::new(
            run_id,
            entity,
            states,
            self.actions.clone(),
            started_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct FixedStates(Mutex<Vec<ExternalState>>);

    impl StateProvider for FixedStates {
        async fn get_state(&self, entity_id: &str) -> Result<Option<ExternalState>, UnictlError> {
            let states = self.0.lock().unwrap();
            Ok(states.iter().find(|s| s.entity_id == entity_id).cloned())
        }

        async fn list_states(&self) -> Result<Vec<ExternalState>, UnictlError> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct EchoInvoker;

    impl ActionInvoker for EchoInvoker {
        async fn invoke(&self, request: ActionRequest) -> Result<Value, ActionError> {
            if request.domain == "broken" {
                return Err(ActionError::failed(&request, "offline"));
            }
            Ok(json!({ "called": request.to_string() }))
        }
    }

    fn provider() -> FixedStates {
        FixedStates(Mutex::new(vec![
            ExternalState::new("light.kitchen", "on").with_attribute("brightness", json!(200)),
            ExternalState::new("light.hall", "off"),
            ExternalState::new("sensor.temp", "21.5"),
        ]))
    }

    fn entity() -> Entity {
        let mut entity = Entity::builder().name("Clock").build().unwrap();
        entity.last_result.insert("count".to_string(), json!(3));
        entity
    }

    fn builder(states: FixedStates) -> ContextBuilder<FixedStates> {
        ContextBuilder::new(states, ActionHandle::from_invoker(Arc::new(EchoInvoker)))
    }

    #[tokio::test]
    async fn should_expose_entity_and_last_result_bindings() {
        let ctx = builder(provider())
            .build(RunId::new(), &entity(), now())
            .await
            .unwrap();
        assert_eq!(ctx.bindings()["entity"]["name"], "Clock");
        assert_eq!(ctx.bindings()["last_result"]["count"], 3);
        assert_eq!(ctx.bindings()["states"]["light.kitchen"]["state"], "on");
        assert!(ctx.bindings()["now"].is_string());
    }

    #[tokio::test]
    async fn should_answer_state_helpers_from_snapshot() {
        let ctx = builder(provider())
            .build(RunId::new(), &entity(), now())
            .await
            .unwrap();
        assert!(ctx.is_on("light.kitchen"));
        assert!(ctx.is_off("light.hall"));
        assert!(!ctx.is_on("light.missing"));
        assert!(!ctx.is_off("light.missing"));
        assert_eq!(ctx.attribute("light.kitchen", "brightness"), Some(&json!(200)));
        assert_eq!(ctx.filter_by_domain("light").len(), 2);
    }

    #[tokio::test]
    async fn should_filter_by_domain_when_domain_is_a_temporary() {
        let ctx = builder(provider())
            .build(RunId::new(), &entity(), now())
            .await
            .unwrap();
        let ids: Vec<&str> = ctx
            .filter_by_domain(&String::from("light"))
            .into_iter()
            .map(|s| s.entity_id.as_str())
            .collect();
        assert_eq!(ids, vec!["light.hall", "light.kitchen"]);
    }

    #[tokio::test]
    async fn should_read_fresh_states_when_building_each_context() {
        let states = provider();
        let builder = builder(states);
        let first = builder.build(RunId::new(), &entity(), now()).await.unwrap();
        builder.states.0.lock().unwrap()[0].state = "off".to_string();
        let second = builder.build(RunId::new(), &entity(), now()).await.unwrap();

        assert!(first.is_on("light.kitchen"));
        assert!(second.is_off("light.kitchen"));
    }

    #[tokio::test]
    async fn should_forward_actions_to_invoker() {
        let ctx = builder(provider())
            .build(RunId::new(), &entity(), now())
            .await
            .unwrap();
        let result = ctx
            .call_action(ActionRequest::turn_on("light.hall"))
            .await
            .unwrap();
        assert_eq!(result, json!({ "called": "homeassistant.turn_on" }));

        let failed = ctx
            .call_action(ActionRequest::new("broken", "thing", Value::Null))
            .await;
        assert!(matches!(failed, Err(ActionError::Failed { .. })));
    }

    #[tokio::test]
    async fn should_reject_actions_when_handle_is_unsupported() {
        let ctx = ExecutionContext::new(
            RunId::new(),
            &entity(),
            StateSnapshot::default(),
            ActionHandle::unsupported(),
            now(),
        );
        let result = ctx.call_action(ActionRequest::notify("hi")).await;
        assert!(matches!(result, Err(ActionError::Unsupported { .. })));
    }

    #[test]
    fn should_share_cancellation_between_clones() {
        let ctx = ExecutionContext::new(
            RunId::new(),
            &entity(),
            StateSnapshot::default(),
            ActionHandle::unsupported(),
            now(),
        );
        let cancellation = ctx.cancellation();
        assert!(!ctx.is_cancelled());
        cancellation.cancel();
        assert!(ctx.clone().is_cancelled());
    }
}

//! Entity scheduler — one periodic timer per entity, one run at a time.
//!
//! ## Lifecycle of a run
//! 1. Admission: the entity id enters the in-flight set. A manual request for
//!    an entity already in flight is rejected with [`BusyError`]; a timer tick
//!    is skipped.
//! 2. The record switches to `running` and an `execution_started` event is
//!    queued.
//! 3. A fresh [`ExecutionContext`](crate::execution_context::ExecutionContext)
//!    is built and the script runs under the configured timeout.
//! 4. The outcome is recorded (`completed` or `error`), the failure policy is
//!    applied, the document is rendered and the record is queued for storage
//!    together with the matching execution event.
//!
//! ## Timers
//! Timers live in an arena keyed by entity id. A timer task only holds a weak
//! reference to the scheduler, so dropping the scheduler stops every timer.
//! Each tick spawns the run as its own task: cancelling a timer never aborts
//! a run that is already executing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use unictl_domain::entity::Entity;
use unictl_domain::error::{BusyError, NotFoundError, UnictlError};
use unictl_domain::event::{Event, EventType};
use unictl_domain::execution::{ExecutionError, ExecutionOutcome, Trigger};
use unictl_domain::id::{EntityId, RunId};
use unictl_domain::state::StateSnapshot;
use unictl_domain::template::Document;
use unictl_domain::time::{Timestamp, now};

use crate::document::render_document;
use crate::execution_context::ContextBuilder;
use crate::outbox::Outbox;
use crate::ports::{ScriptRuntime, StateProvider};
use crate::registry::EntityRegistry;
use crate::script_runner::{DEFAULT_EXECUTION_TIMEOUT, ScriptRunner};

/// Default failure streak after which an entity stops being scheduled.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub execution_timeout: Duration,
    /// `0` disables the policy.
    pub max_consecutive_failures: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            execution_timeout: DEFAULT_EXECUTION_TIMEOUT,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// What [`Scheduler::timer_info`] reports about an armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerInfo {
    pub period: Duration,
    pub armed_at: Timestamp,
    pub next_tick_at: Timestamp,
}

/// Result of one finished run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub entity: Entity,
    pub outcome: ExecutionOutcome,
    pub document: Document,
}

struct TimerHandle {
    task: JoinHandle<()>,
    period: Duration,
    armed_at: Timestamp,
}

type InFlight = Arc<Mutex<HashSet<EntityId>>>;

/// Proof of admission; leaves the in-flight set when dropped.
struct InFlightGuard {
    in_flight: InFlight,
    id: EntityId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

struct Inner<SP, R> {
    registry: Arc<EntityRegistry>,
    outbox: Outbox,
    contexts: ContextBuilder<SP>,
    runner: ScriptRunner<R>,
    max_consecutive_failures: u32,
    timers: Mutex<HashMap<EntityId, TimerHandle>>,
    in_flight: InFlight,
}

impl<SP, R> Inner<SP, R> {
    fn timers(&self) -> MutexGuard<'_, HashMap<EntityId, TimerHandle>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the timers and serialises runs per entity. Cheap to clone.
pub struct Scheduler<SP, R> {
    inner: Arc<Inner<SP, R>>,
}

impl<SP, R> Clone for Scheduler<SP, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<SP, R> Scheduler<SP, R>
where
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    pub fn new(
        registry: Arc<EntityRegistry>,
        outbox: Outbox,
        contexts: ContextBuilder<SP>,
        runtime: R,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                outbox,
                contexts,
                runner: ScriptRunner::new(runtime, config.execution_timeout),
                max_consecutive_failures: config.max_consecutive_failures,
                timers: Mutex::new(HashMap::new()),
                in_flight: Arc::default(),
            }),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.inner.registry
    }

    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.inner.outbox
    }

    /// (Re)arm the timer of an entity from its current record.
    ///
    /// Any existing timer is cancelled first. No timer is armed when the
    /// entity is missing, disabled or has a non-positive interval.
    /// Returns whether a timer is now armed.
    pub fn schedule(&self, id: &EntityId) -> bool {
        let Some(period) = self
            .inner
            .registry
            .get(id)
            .and_then(|entity| entity.schedule_period())
        else {
            self.unschedule(id);
            return false;
        };

        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(tick_loop(weak, id.clone(), period));
        let handle = TimerHandle {
            task,
            period,
            armed_at: now(),
        };
        if let Some(previous) = self.inner.timers().insert(id.clone(), handle) {
            previous.task.abort();
        }
        tracing::debug!(entity_id = %id, period_secs = period.as_secs(), "timer armed");
        true
    }

    /// Cancel the timer of an entity. Returns whether one was armed.
    pub fn unschedule(&self, id: &EntityId) -> bool {
        let Some(handle) = self.inner.timers().remove(id) else {
            return false;
        };
        handle.task.abort();
        tracing::debug!(entity_id = %id, "timer cancelled");
        true
    }

    #[must_use]
    pub fn is_scheduled(&self, id: &EntityId) -> bool {
        self.inner.timers().contains_key(id)
    }

    #[must_use]
    pub fn scheduled_count(&self) -> usize {
        self.inner.timers().len()
    }

    #[must_use]
    pub fn timer_info(&self, id: &EntityId) -> Option<TimerInfo> {
        let timers = self.inner.timers();
        let handle = timers.get(id)?;
        let period = chrono::Duration::from_std(handle.period).ok()?;
        let elapsed_periods = (now() - handle.armed_at)
            .num_milliseconds()
            .checked_div(period.num_milliseconds())
            .unwrap_or(0)
            .max(0);
        let next_tick_at = handle.armed_at + period * i32::try_from(elapsed_periods + 1).ok()?;
        Some(TimerInfo {
            period: handle.period,
            armed_at: handle.armed_at,
            next_tick_at,
        })
    }

    #[must_use]
    pub fn is_executing(&self, id: &EntityId) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Run an entity now, outside its timer.
    ///
    /// # Errors
    ///
    /// - [`UnictlError::NotFound`] if the entity does not exist
    /// - [`UnictlError::Busy`] if a run for the entity is already in flight
    pub async fn execute_now(&self, id: &EntityId) -> Result<ExecutionReport, UnictlError> {
        if !self.inner.registry.contains(id) {
            return Err(not_found(id).into());
        }
        let guard = self
            .admit(id)
            .ok_or_else(|| BusyError { id: id.clone() })?;
        self.execute(guard, Trigger::Manual).await
    }

    /// Load stored records into the registry, recover interrupted runs and
    /// arm every timer. Returns the number of armed timers.
    pub fn restore(&self, entities: Vec<Entity>) -> usize {
        for mut entity in entities {
            if entity.reset_interrupted() {
                tracing::info!(entity_id = %entity.id, "recovered interrupted run");
                self.inner.outbox.save(
                    entity.clone(),
                    Event::entity_changed(EventType::EntityUpdated, &entity),
                );
            }
            self.inner.registry.insert(entity);
        }
        let ids: Vec<EntityId> = self
            .inner
            .registry
            .list()
            .into_iter()
            .map(|entity| entity.id)
            .collect();
        ids.iter().filter(|id| self.schedule(id)).count()
    }

    /// Cancel every timer. Runs already executing finish normally.
    pub fn shutdown(&self) {
        let timers: Vec<(EntityId, TimerHandle)> = self.inner.timers().drain().collect();
        for (_, handle) in &timers {
            handle.task.abort();
        }
        tracing::info!(count = timers.len(), "scheduler stopped");
    }

    /// Fresh snapshot of external state, empty when the provider fails.
    pub async fn states(&self) -> StateSnapshot {
        self.inner.contexts.snapshot().await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "state provider unavailable");
            StateSnapshot::default()
        })
    }

    /// Render the current document of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::NotFound`] if the entity does not exist.
    pub async fn render_document(&self, id: &EntityId) -> Result<Document, UnictlError> {
        let states = self.states().await;
        let entity = self.inner.registry.get(id).ok_or_else(|| not_found(id))?;
        Ok(render_document(&entity, &states, now()))
    }

    fn admit(&self, id: &EntityId) -> Option<InFlightGuard> {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(id.clone()) {
            return None;
        }
        Some(InFlightGuard {
            in_flight: Arc::clone(&self.inner.in_flight),
            id: id.clone(),
        })
    }

    fn on_tick(&self, id: &EntityId) {
        let Some(guard) = self.admit(id) else {
            tracing::debug!(entity_id = %id, "previous run still in flight, skipping tick");
            return;
        };
        let scheduler = self.clone();
        tokio::spawn(async move {
            if let Err(err) = scheduler.execute(guard, Trigger::Timer).await {
                tracing::debug!(error = %err, "timer run abandoned");
            }
        });
    }

    async fn execute(
        &self,
        guard: InFlightGuard,
        trigger: Trigger,
    ) -> Result<ExecutionReport, UnictlError> {
        let id = guard.id.clone();
        let run_id = RunId::new();
        let started_at = now();
        let inner = &self.inner;

        let entity = inner
            .registry
            .update(&id, |entity| {
                entity.begin_execution(started_at);
                inner.outbox.save(
                    entity.clone(),
                    Event::execution_started(entity, run_id, trigger),
                );
                entity.clone()
            })
            .ok_or_else(|| not_found(&id))?;

        tracing::debug!(entity_id = %id, %run_id, %trigger, "execution started");
        let clock = Instant::now();
        let result = match inner.contexts.build(run_id, &entity, started_at).await {
            Ok(context) => inner.runner.run(&entity.script_code, context).await,
            Err(err) => Err(ExecutionError::Context {
                message: err.to_string(),
            }),
        };
        let duration_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(_) => tracing::debug!(entity_id = %id, %run_id, duration_ms, "execution completed"),
            Err(err) => tracing::warn!(entity_id = %id, %run_id, duration_ms, error = %err, "execution failed"),
        }

        let states = self.states().await;
        let threshold = inner.max_consecutive_failures;
        let report = inner
            .registry
            .update(&id, |entity| {
                let outcome = match result {
                    Ok(value) => {
                        entity.record_success(value, duration_ms);
                        ExecutionOutcome::Completed
                    }
                    Err(error) => {
                        entity.record_failure(&error, duration_ms);
                        if threshold > 0 && entity.consecutive_failures >= threshold {
                            entity.disable_after_failures();
                            ExecutionOutcome::Disabled {
                                failures: entity.consecutive_failures,
                                error,
                            }
                        } else {
                            ExecutionOutcome::Failed { error }
                        }
                    }
                };
                let document = render_document(entity, &states, now());
                inner.outbox.save(
                    entity.clone(),
                    Event::execution_finished(entity, run_id, &outcome, &document),
                );
                ExecutionReport {
                    entity: entity.clone(),
                    outcome,
                    document,
                }
            })
            .ok_or_else(|| {
                tracing::debug!(entity_id = %id, %run_id, "entity deleted during execution");
                not_found(&id)
            })?;

        if let ExecutionOutcome::Disabled { failures, .. } = &report.outcome {
            // Under the registry lock, so a concurrent re-enable either lands
            // first and keeps its timer or re-arms after this.
            self.inner.registry.update(&id, |entity| {
                if !entity.enabled {
                    self.unschedule(&id);
                }
            });
            tracing::info!(
                entity_id = %id,
                failures,
                "scheduling disabled after repeated failures"
            );
        }
        drop(guard);
        Ok(report)
    }
}

async fn tick_loop<SP, R>(scheduler: Weak<Inner<SP, R>>, id: EntityId, period: Duration)
where
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let Some(inner) = scheduler.upgrade() else {
            break;
        };
        Scheduler { inner }.on_tick(&id);
    }
}

fn not_found(id: &EntityId) -> NotFoundError {
    NotFoundError {
        entity: "Entity",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution_context::{ActionHandle, ExecutionContext};
    use crate::ports::{EntityStore, EventPublisher, ScriptError};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use unictl_domain::entity::EntityStatus;
    use unictl_domain::state::ExternalState;

    // ── In-memory ports ────────────────────────────────────────────

    #[derive(Default)]
    struct MemoryStore(Mutex<HashMap<EntityId, Entity>>);

    impl EntityStore for MemoryStore {
        async fn load(&self, id: &EntityId) -> Result<Option<Entity>, UnictlError> {
            Ok(self.0.lock().unwrap().get(id).cloned())
        }

        async fn save(&self, entity: Entity) -> Result<Entity, UnictlError> {
            self.0
                .lock()
                .unwrap()
                .insert(entity.id.clone(), entity.clone());
            Ok(entity)
        }

        async fn delete(&self, id: &EntityId) -> Result<(), UnictlError> {
            self.0.lock().unwrap().remove(id);
            Ok(())
        }

        async fn list_all(&self) -> Result<Vec<Entity>, UnictlError> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }
    }

    #[derive(Default)]
    struct SpyPublisher(Mutex<Vec<Event>>);

    impl SpyPublisher {
        fn types(&self) -> Vec<EventType> {
            self.0.lock().unwrap().iter().map(|e| e.event_type).collect()
        }
    }

    impl EventPublisher for SpyPublisher {
        async fn publish(&self, event: Event) -> Result<(), UnictlError> {
            self.0.lock().unwrap().push(event);
            Ok(())
        }
    }

    struct Sensors;

    impl StateProvider for Sensors {
        async fn get_state(&self, entity_id: &str) -> Result<Option<ExternalState>, UnictlError> {
            Ok(self
                .list_states()
                .await?
                .into_iter()
                .find(|s| s.entity_id == entity_id))
        }

        async fn list_states(&self) -> Result<Vec<ExternalState>, UnictlError> {
            Ok(vec![ExternalState::new("sensor.temp", "22")])
        }
    }

    /// Scripted runtime: `ok`, `fail`, `sleep <ms>`, `count` (counts calls).
    #[derive(Default)]
    struct StubRuntime {
        calls: AtomicUsize,
    }

    impl ScriptRuntime for StubRuntime {
        async fn execute(&self, script: &str, context: ExecutionContext) -> Result<Value, ScriptError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let (command, arg) = script.split_once(' ').unwrap_or((script, ""));
            match command {
                "ok" => Ok(json!({ "temp": context.state("sensor.temp").map(|s| s.state.clone()) })),
                "fail" => Err(ScriptError::new("boom")),
                "sleep" => {
                    tokio::time::sleep(Duration::from_millis(arg.parse().unwrap())).await;
                    Ok(json!({ "calls": calls }))
                }
                _ => Ok(json!({ "calls": calls })),
            }
        }
    }

    struct Harness {
        scheduler: Scheduler<Sensors, Arc<StubRuntime>>,
        runtime: Arc<StubRuntime>,
        store: Arc<MemoryStore>,
        events: Arc<SpyPublisher>,
    }

    impl Harness {
        fn new(config: SchedulerConfig) -> Self {
            let store = Arc::new(MemoryStore::default());
            let events = Arc::new(SpyPublisher::default());
            let runtime = Arc::new(StubRuntime::default());
            let (outbox, _writer) = Outbox::spawn(Arc::clone(&store), Arc::clone(&events));
            let scheduler = Scheduler::new(
                Arc::new(EntityRegistry::default()),
                outbox,
                ContextBuilder::new(Sensors, ActionHandle::unsupported()),
                Arc::clone(&runtime),
                config,
            );
            Self {
                scheduler,
                runtime,
                store,
                events,
            }
        }

        fn add(&self, script: &str, interval_seconds: i64) -> EntityId {
            let entity = Entity::builder()
                .name(format!("entity-{}", self.scheduler.registry().len()))
                .script_code(script)
                .html_template("<p>{{ temp }}</p>")
                .interval_seconds(interval_seconds)
                .build()
                .unwrap();
            let id = entity.id.clone();
            self.scheduler.registry().insert(entity);
            id
        }

        fn calls(&self) -> usize {
            self.runtime.calls.load(Ordering::SeqCst)
        }

        fn entity(&self, id: &EntityId) -> Entity {
            self.scheduler.registry().get(id).unwrap()
        }
    }

    fn harness() -> Harness {
        Harness::new(SchedulerConfig::default())
    }

    /// Let spawned tasks make progress without moving the paused clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    // ── Timers ─────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn should_keep_one_timer_when_scheduled_twice() {
        let h = harness();
        let id = h.add("count", 10);

        assert!(h.scheduler.schedule(&id));
        assert!(h.scheduler.schedule(&id));
        assert_eq!(h.scheduler.scheduled_count(), 1);

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        settle().await;
        assert_eq!(h.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_once_per_period() {
        let h = harness();
        let id = h.add("count", 5);
        h.scheduler.schedule(&id);

        tokio::time::sleep(Duration::from_millis(15_500)).await;
        settle().await;

        assert_eq!(h.calls(), 3);
        assert_eq!(h.entity(&id).execution_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_arm_timer_when_disabled_or_interval_not_positive() {
        let h = harness();
        let zero = h.add("count", 0);
        let negative = h.add("count", -5);
        let disabled = h.add("count", 5);
        h.scheduler.registry().update(&disabled, |e| e.enabled = false);

        assert!(!h.scheduler.schedule(&zero));
        assert!(!h.scheduler.schedule(&negative));
        assert!(!h.scheduler.schedule(&disabled));
        assert_eq!(h.scheduler.scheduled_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_running_when_unscheduled() {
        let h = harness();
        let id = h.add("count", 5);
        h.scheduler.schedule(&id);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        settle().await;
        assert!(h.scheduler.unschedule(&id));
        assert!(!h.scheduler.unschedule(&id));
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(h.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_next_tick_of_armed_timer() {
        let h = harness();
        let id = h.add("count", 30);
        h.scheduler.schedule(&id);

        let info = h.scheduler.timer_info(&id).unwrap();
        assert_eq!(info.period, Duration::from_secs(30));
        assert!(info.next_tick_at > info.armed_at);
        assert!(h.scheduler.timer_info(&EntityId::generate()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_cancel_every_timer_on_shutdown() {
        let h = harness();
        let a = h.add("count", 5);
        let b = h.add("count", 7);
        h.scheduler.schedule(&a);
        h.scheduler.schedule(&b);

        h.scheduler.shutdown();
        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;

        assert_eq!(h.scheduler.scheduled_count(), 0);
        assert_eq!(h.calls(), 0);
    }

    // ── Runs ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_complete_and_render_document() {
        let h = harness();
        let id = h.add("ok", 0);

        let report = h.scheduler.execute_now(&id).await.unwrap();

        assert_eq!(report.outcome, ExecutionOutcome::Completed);
        assert_eq!(report.entity.status, EntityStatus::Completed);
        assert_eq!(report.entity.last_result["temp"], "22");
        assert_eq!(report.document.html, "<p>22</p>");
        assert!(report.entity.last_execution_at.is_some());
        assert!(!h.scheduler.is_executing(&id));
    }

    #[tokio::test]
    async fn should_persist_and_publish_in_run_order() {
        let h = harness();
        let id = h.add("ok", 0);

        h.scheduler.execute_now(&id).await.unwrap();
        h.scheduler.outbox().flush().await;

        assert_eq!(
            h.events.types(),
            vec![EventType::ExecutionStarted, EventType::ExecutionCompleted]
        );
        let stored = h.store.load(&id).await.unwrap().unwrap();
        assert_eq!(stored.status, EntityStatus::Completed);
    }

    #[tokio::test]
    async fn should_record_error_and_keep_previous_result_when_script_fails() {
        let h = harness();
        let id = h.add("ok", 0);
        h.scheduler.execute_now(&id).await.unwrap();
        h.scheduler
            .registry()
            .update(&id, |e| e.script_code = "fail".to_string());

        let report = h.scheduler.execute_now(&id).await.unwrap();

        assert!(matches!(report.outcome, ExecutionOutcome::Failed { .. }));
        assert_eq!(report.entity.status, EntityStatus::Error);
        assert_eq!(report.entity.last_error.as_deref(), Some("boom"));
        assert_eq!(report.entity.last_result["temp"], "22");
        assert_eq!(report.entity.execution_count, 2);
    }

    #[tokio::test]
    async fn should_return_not_found_when_entity_missing() {
        let h = harness();
        let result = h.scheduler.execute_now(&EntityId::generate()).await;
        assert!(matches!(result, Err(UnictlError::NotFound(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_manual_run_when_busy() {
        let h = harness();
        let id = h.add("sleep 1000", 0);

        let scheduler = h.scheduler.clone();
        let first_id = id.clone();
        let first = tokio::spawn(async move { scheduler.execute_now(&first_id).await });
        settle().await;
        assert!(h.scheduler.is_executing(&id));
        assert_eq!(h.entity(&id).status, EntityStatus::Running);

        let second = h.scheduler.execute_now(&id).await;
        assert!(matches!(second, Err(UnictlError::Busy(_))));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.outcome, ExecutionOutcome::Completed);
        assert_eq!(h.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_tick_when_previous_run_in_flight() {
        let h = Harness::new(SchedulerConfig {
            execution_timeout: Duration::from_secs(20),
            ..SchedulerConfig::default()
        });
        let id = h.add("sleep 12000", 5);
        h.scheduler.schedule(&id);

        tokio::time::sleep(Duration::from_millis(16_000)).await;
        settle().await;
        assert_eq!(h.calls(), 1);
        assert!(h.scheduler.is_executing(&id));
        assert_eq!(h.entity(&id).status, EntityStatus::Running);

        // The first run ends at 17s; the next tick is not due before 20s.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        settle().await;
        let entity = h.entity(&id);
        assert_eq!(h.calls(), 1);
        assert_eq!(entity.status, EntityStatus::Completed);
        assert_eq!(entity.execution_count, 1);
        assert_eq!(entity.last_result["calls"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_manual_run_during_timer_run_and_keep_its_result() {
        let h = Harness::new(SchedulerConfig {
            execution_timeout: Duration::from_secs(20),
            ..SchedulerConfig::default()
        });
        let id = h.add("sleep 3000", 5);
        h.scheduler.schedule(&id);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        settle().await;
        assert!(h.scheduler.is_executing(&id));

        let manual = h.scheduler.execute_now(&id).await;
        assert!(matches!(manual, Err(UnictlError::Busy(_))));
        assert_eq!(h.entity(&id).status, EntityStatus::Running);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        settle().await;
        h.scheduler.outbox().flush().await;

        let entity = h.entity(&id);
        assert_eq!(h.calls(), 1);
        assert_eq!(entity.status, EntityStatus::Completed);
        assert_eq!(entity.last_error, None);
        assert_eq!(entity.execution_count, 1);
        assert_eq!(entity.last_result["calls"], 1);
        assert!(!h.scheduler.is_executing(&id));
        assert!(h.scheduler.is_scheduled(&id));
        assert_eq!(
            h.events.types(),
            vec![EventType::ExecutionStarted, EventType::ExecutionCompleted]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_fail_with_timeout_when_script_is_too_slow() {
        let h = Harness::new(SchedulerConfig {
            execution_timeout: Duration::from_millis(100),
            ..SchedulerConfig::default()
        });
        let id = h.add("sleep 5000", 0);

        let report = h.scheduler.execute_now(&id).await.unwrap();

        assert_eq!(
            report.outcome,
            ExecutionOutcome::Failed {
                error: ExecutionError::Timeout { timeout_ms: 100 }
            }
        );
        assert_eq!(report.entity.status, EntityStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn should_disable_scheduling_when_failures_reach_threshold() {
        let h = Harness::new(SchedulerConfig {
            max_consecutive_failures: 3,
            ..SchedulerConfig::default()
        });
        let id = h.add("fail", 5);
        h.scheduler.schedule(&id);

        tokio::time::sleep(Duration::from_millis(30_500)).await;
        settle().await;
        h.scheduler.outbox().flush().await;

        let entity = h.entity(&id);
        assert_eq!(h.calls(), 3);
        assert!(!entity.enabled);
        assert_eq!(entity.disabled_after_failures, Some(3));
        assert!(!h.scheduler.is_scheduled(&id));
        assert_eq!(h.events.types().last(), Some(&EventType::ExecutionDisabled));
    }

    #[tokio::test(start_paused = true)]
    async fn should_rearm_when_reenabled_after_failure_disable() {
        let h = Harness::new(SchedulerConfig {
            max_consecutive_failures: 1,
            ..SchedulerConfig::default()
        });
        let id = h.add("fail", 5);
        h.scheduler.schedule(&id);

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        settle().await;
        assert!(!h.scheduler.is_scheduled(&id));

        h.scheduler.registry().update(&id, |e| {
            e.enabled = true;
            e.script_code = "count".to_string();
        });
        assert!(h.scheduler.schedule(&id));
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        settle().await;

        assert!(h.scheduler.is_scheduled(&id));
        assert_eq!(h.calls(), 2);
        assert_eq!(h.entity(&id).status, EntityStatus::Completed);
    }

    #[tokio::test]
    async fn should_keep_scheduling_when_policy_is_off() {
        let h = Harness::new(SchedulerConfig {
            max_consecutive_failures: 0,
            ..SchedulerConfig::default()
        });
        let id = h.add("fail", 0);
        for _ in 0..10 {
            h.scheduler.execute_now(&id).await.unwrap();
        }
        let entity = h.entity(&id);
        assert!(entity.enabled);
        assert_eq!(entity.consecutive_failures, 10);
    }

    #[tokio::test]
    async fn should_reset_failure_streak_on_success() {
        let h = harness();
        let id = h.add("fail", 0);
        h.scheduler.execute_now(&id).await.unwrap();
        h.scheduler.execute_now(&id).await.unwrap();
        h.scheduler
            .registry()
            .update(&id, |e| e.script_code = "ok".to_string());

        h.scheduler.execute_now(&id).await.unwrap();

        assert_eq!(h.entity(&id).consecutive_failures, 0);
    }

    #[tokio::test]
    async fn should_complete_with_empty_result_when_script_is_blank() {
        let h = harness();
        let id = h.add("", 0);
        let report = h.scheduler.execute_now(&id).await.unwrap();
        assert_eq!(report.outcome, ExecutionOutcome::Completed);
        assert!(report.entity.last_result.is_empty());
        assert_eq!(h.calls(), 0);
    }

    // ── Restore ────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn should_reset_interrupted_runs_and_arm_timers_on_restore() {
        let h = harness();
        let mut interrupted = Entity::builder()
            .name("Interrupted")
            .interval_seconds(5)
            .build()
            .unwrap();
        interrupted.status = EntityStatus::Running;
        let paused = Entity::builder()
            .name("Paused")
            .enabled(false)
            .build()
            .unwrap();
        let interrupted_id = interrupted.id.clone();

        let armed = h.scheduler.restore(vec![interrupted, paused]);

        assert_eq!(armed, 1);
        assert_eq!(h.scheduler.registry().len(), 2);
        assert_eq!(h.entity(&interrupted_id).status, EntityStatus::Idle);
        h.scheduler.outbox().flush().await;
        assert_eq!(
            h.store.load(&interrupted_id).await.unwrap().unwrap().status,
            EntityStatus::Idle
        );
    }
}

//! Entity service — the administrative use-cases.
//!
//! Every mutation happens on the scheduler's registry first, is queued on the
//! outbox, and is only reported as successful once the store accepted it.

use std::sync::Arc;

use unictl_domain::entity::{Entity, EntityPatch};
use unictl_domain::error::{NotFoundError, UnictlError, ValidationError};
use unictl_domain::event::{Event, EventType};
use unictl_domain::id::EntityId;
use unictl_domain::template::{Context, Document};
use unictl_domain::time::now;

use crate::document::render_sources;
use crate::outbox::Outbox;
use crate::ports::{EntityStore, ScriptRuntime, StateProvider};
use crate::registry::EntityRegistry;
use crate::scheduler::{ExecutionReport, Scheduler, TimerInfo};

/// Application service for entity CRUD, manual runs and rendering.
pub struct EntityService<S, SP, R> {
    store: S,
    scheduler: Scheduler<SP, R>,
}

impl<S, SP, R> EntityService<S, SP, R>
where
    S: EntityStore,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    /// Create a new service. `store` must be the store the scheduler's
    /// outbox writes to.
    pub fn new(store: S, scheduler: Scheduler<SP, R>) -> Self {
        Self { store, scheduler }
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<SP, R> {
        &self.scheduler
    }

    fn registry(&self) -> &Arc<EntityRegistry> {
        self.scheduler.registry()
    }

    fn outbox(&self) -> &Outbox {
        self.scheduler.outbox()
    }

    /// Load every stored entity and arm the timers. Call once at start-up.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self) -> Result<usize, UnictlError> {
        let entities = self.store.list_all().await?;
        let total = entities.len();
        let armed = self.scheduler.restore(entities);
        tracing::info!(total, armed, "entities restored");
        Ok(armed)
    }

    /// Register a new entity and arm its timer.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::Validation`] if invariants fail or the id or
    /// name is taken, or a storage error from the store.
    #[tracing::instrument(skip(self, entity), fields(entity_id = %entity.id, name = %entity.name))]
    pub async fn create_entity(&self, mut entity: Entity) -> Result<Entity, UnictlError> {
        entity.validate()?;
        let at = now();
        entity.created_at = at;
        entity.updated_at = at;

        let pending = self.registry().with_all(|entities| {
            if entities.contains_key(&entity.id) {
                return Err(ValidationError::DuplicateId(entity.id.clone()));
            }
            if entities.values().any(|other| same_name(&other.name, &entity.name)) {
                return Err(ValidationError::DuplicateName(entity.name.trim().to_string()));
            }
            entities.insert(entity.id.clone(), entity.clone());
            Ok(self.outbox().save_acked(
                entity.clone(),
                Event::entity_changed(EventType::EntityCreated, &entity),
            ))
        })?;
        if let Err(err) = pending.wait().await {
            self.registry().remove(&entity.id);
            return Err(err);
        }

        self.scheduler.schedule(&entity.id);
        tracing::info!("entity created");
        Ok(entity)
    }

    /// Look up an entity by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::NotFound`] when no entity with `id` exists.
    pub fn get_entity(&self, id: &EntityId) -> Result<Entity, UnictlError> {
        self.registry()
            .get(id)
            .ok_or_else(|| not_found(id).into())
    }

    /// Every entity, oldest first.
    #[must_use]
    pub fn list_entities(&self) -> Vec<Entity> {
        self.registry().list()
    }

    /// Apply a partial update. The timer is re-armed when the interval or
    /// the enabled flag is part of the patch.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::NotFound`] if the entity does not exist,
    /// [`UnictlError::Validation`] if the patched record is invalid or the new
    /// name is taken, or a storage error from the store.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_entity(
        &self,
        id: &EntityId,
        patch: EntityPatch,
    ) -> Result<Entity, UnictlError> {
        let reschedule = patch.touches_schedule();
        let at = now();
        let (entity, previous, pending) = self.registry().with_all(|entities| {
            if let Some(name) = &patch.name
                && entities
                    .values()
                    .any(|other| other.id != *id && same_name(&other.name, name))
            {
                return Err(UnictlError::from(ValidationError::DuplicateName(
                    name.trim().to_string(),
                )));
            }
            let entity = entities.get_mut(id).ok_or_else(|| not_found(id))?;
            let previous = entity.clone();
            patch.apply(entity, at)?;
            let pending = self.outbox().save_acked(
                entity.clone(),
                Event::entity_changed(EventType::EntityUpdated, entity),
            );
            Ok((entity.clone(), previous, pending))
        })?;
        if let Err(err) = pending.wait().await {
            self.registry().update(id, |current| restore_settings(current, &previous));
            return Err(err);
        }

        if reschedule {
            self.scheduler.schedule(id);
        }
        tracing::info!("entity updated");
        Ok(entity)
    }

    /// Remove the entity and cancel its timer.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::NotFound`] if the entity does not exist,
    /// or a storage error from the store.
    #[tracing::instrument(skip(self))]
    pub async fn delete_entity(&self, id: &EntityId) -> Result<(), UnictlError> {
        let pending = self.registry().with_all(|entities| {
            let removed = entities.remove(id).ok_or_else(|| not_found(id))?;
            Ok::<_, UnictlError>(self.outbox().delete_acked(
                id.clone(),
                Event::entity_changed(EventType::EntityDeleted, &removed),
            ))
        })?;
        // A schedule() from here on finds no record and arms nothing.
        self.scheduler.unschedule(id);
        pending.wait().await?;
        tracing::info!("entity deleted");
        Ok(())
    }

    /// Run an entity now, outside its timer.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::NotFound`] if the entity does not exist, or
    /// [`UnictlError::Busy`] if a run is already in flight.
    #[tracing::instrument(skip(self))]
    pub async fn execute_now(&self, id: &EntityId) -> Result<ExecutionReport, UnictlError> {
        self.scheduler.execute_now(id).await
    }

    /// Render the entity's current document.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::NotFound`] if the entity does not exist.
    pub async fn render_document(&self, id: &EntityId) -> Result<Document, UnictlError> {
        self.scheduler.render_document(id).await
    }

    /// Timer details, `None` when the entity has no armed timer.
    ///
    /// # Errors
    ///
    /// Returns [`UnictlError::NotFound`] if the entity does not exist.
    pub fn timer_info(&self, id: &EntityId) -> Result<Option<TimerInfo>, UnictlError> {
        if !self.registry().contains(id) {
            return Err(not_found(id).into());
        }
        Ok(self.scheduler.timer_info(id))
    }

    /// Render arbitrary templates against a caller-supplied context.
    pub async fn preview(&self, html: &str, css: &str, context: &Context) -> Document {
        let states = self.scheduler.states().await;
        render_sources(html, css, context, &states, now())
    }

    /// Stop every timer and wait for pending writes.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown();
        self.outbox().flush().await;
    }
}

/// Put back what a failed patch changed. Execution fields written since
/// the patch are kept.
fn restore_settings(current: &mut Entity, previous: &Entity) {
    current.name.clone_from(&previous.name);
    current.script_code.clone_from(&previous.script_code);
    current.html_template.clone_from(&previous.html_template);
    current.css_styles.clone_from(&previous.css_styles);
    current.interval_seconds = previous.interval_seconds;
    current.enabled = previous.enabled;
    current.updated_at = previous.updated_at;
    if previous.disabled_after_failures.is_some() {
        current.consecutive_failures = previous.consecutive_failures;
        current.disabled_after_failures = previous.disabled_after_failures;
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

fn not_found(id: &EntityId) -> NotFoundError {
    NotFoundError {
        entity: "Entity",
        id: id.to_string(),
    }
}

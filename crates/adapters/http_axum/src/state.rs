//! Shared application state for axum handlers.

use std::sync::Arc;

use unictl_app::event_bus::InProcessEventBus;
use unictl_app::ports::{EntityStore, ScriptRuntime, StateProvider};
use unictl_app::services::entity_service::EntityService;

/// Application state shared across all axum handlers.
///
/// Generic over the entity store, state provider and script runtime to avoid
/// dynamic dispatch. `Clone` is implemented manually so the underlying types
/// themselves do not need to be `Clone`; only the `Arc` wrappers are cloned.
pub struct AppState<S, SP, R> {
    /// Entity CRUD, manual runs and rendering.
    pub entity_service: Arc<EntityService<S, SP, R>>,
    /// Event bus for real-time SSE streaming.
    pub event_bus: Arc<InProcessEventBus>,
}

impl<S, SP, R> Clone for AppState<S, SP, R> {
    fn clone(&self) -> Self {
        Self {
            entity_service: Arc::clone(&self.entity_service),
            event_bus: Arc::clone(&self.event_bus),
        }
    }
}

impl<S, SP, R> AppState<S, SP, R>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    /// Create a new application state from pre-wrapped `Arc`s.
    ///
    /// The service is shared with the shutdown path of the binary, and the
    /// bus with the outbox writer, so both arrive already wrapped.
    pub fn new(
        entity_service: Arc<EntityService<S, SP, R>>,
        event_bus: Arc<InProcessEventBus>,
    ) -> Self {
        Self {
            entity_service,
            event_bus,
        }
    }
}

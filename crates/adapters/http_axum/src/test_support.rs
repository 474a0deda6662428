//! In-memory wiring shared by the handler tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Value, json};

use unictl_app::event_bus::InProcessEventBus;
use unictl_app::execution_context::{ActionHandle, ContextBuilder, ExecutionContext};
use unictl_app::outbox::Outbox;
use unictl_app::ports::{EntityStore, ScriptError, ScriptRuntime, StateProvider};
use unictl_app::registry::EntityRegistry;
use unictl_app::scheduler::{Scheduler, SchedulerConfig};
use unictl_app::services::entity_service::EntityService;
use unictl_domain::entity::Entity;
use unictl_domain::error::UnictlError;
use unictl_domain::id::EntityId;
use unictl_domain::state::ExternalState;

use crate::router;
use crate::state::AppState;

#[derive(Default)]
pub struct MemoryStore(Mutex<HashMap<EntityId, Entity>>);

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

pub struct NoStates;

impl StateProvider for NoStates {
    async fn get_state(&self, _entity_id: &str) -> Result<Option<ExternalState>, UnictlError> {
        Ok(None)
    }

    async fn list_states(&self) -> Result<Vec<ExternalState>, UnictlError> {
        Ok(Vec::new())
    }
}

/// Echoes the script source back as `{"message": <source>}`.
pub struct EchoRuntime;

impl ScriptRuntime for EchoRuntime {
    async fn execute(&self, script: &str, _context: ExecutionContext) -> Result<Value, ScriptError> {
        Ok(json!({ "message": script }))
    }
}

pub type TestState = AppState<Arc<MemoryStore>, NoStates, EchoRuntime>;

/// Must be called inside a tokio runtime: the outbox writer is spawned here.
pub fn test_app() -> (Router, TestState) {
    let store = Arc::new(MemoryStore::default());
    let event_bus = Arc::new(InProcessEventBus::new(64));
    let (outbox, _writer) = Outbox::spawn(Arc::clone(&store), Arc::clone(&event_bus));
    let scheduler = Scheduler::new(
        Arc::new(EntityRegistry::default()),
        outbox,
        ContextBuilder::new(NoStates, ActionHandle::unsupported()),
        EchoRuntime,
        SchedulerConfig::default(),
    );
    let service = Arc::new(EntityService::new(store, scheduler));
    let state = AppState::new(service, event_bus);
    (router::build(state.clone()), state)
}

pub fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

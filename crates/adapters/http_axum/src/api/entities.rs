//! JSON REST handlers for entities.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use unictl_app::ports::{EntityStore, ScriptRuntime, StateProvider};
use unictl_app::scheduler::{ExecutionReport, TimerInfo};
use unictl_domain::entity::{Entity, EntityPatch};
use unictl_domain::error::UnictlError;
use unictl_domain::execution::ExecutionOutcome;
use unictl_domain::id::EntityId;
use unictl_domain::template::Document;
use unictl_domain::time::Timestamp;

use crate::error::{ApiError, parse_id};
use crate::state::AppState;

/// Request body for creating an entity. Omitted fields take their defaults.
#[derive(Debug, Deserialize)]
pub struct CreateEntityRequest {
    pub id: Option<String>,
    pub name: String,
    pub script_code: Option<String>,
    pub html_template: Option<String>,
    pub css_styles: Option<String>,
    pub interval_seconds: Option<i64>,
    pub enabled: Option<bool>,
}

impl CreateEntityRequest {
    fn into_entity(self) -> Result<Entity, UnictlError> {
        let mut builder = Entity::builder().name(self.name);
        if let Some(id) = self.id {
            builder = builder.id(EntityId::parse(id)?);
        }
        if let Some(code) = self.script_code {
            builder = builder.script_code(code);
        }
        if let Some(html) = self.html_template {
            builder = builder.html_template(html);
        }
        if let Some(css) = self.css_styles {
            builder = builder.css_styles(css);
        }
        if let Some(seconds) = self.interval_seconds {
            builder = builder.interval_seconds(seconds);
        }
        if let Some(enabled) = self.enabled {
            builder = builder.enabled(enabled);
        }
        builder.build()
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Entity>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// Body of `POST /api/entities/{id}/execute`.
#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub entity: Entity,
    #[serde(flatten)]
    pub outcome: ExecutionOutcome,
    pub document: Document,
}

impl From<ExecutionReport> for ExecutionResponse {
    fn from(report: ExecutionReport) -> Self {
        Self {
            entity: report.entity,
            outcome: report.outcome,
            document: report.document,
        }
    }
}

/// Body of `GET /api/entities/{id}/timer`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TimerResponse {
    pub scheduled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub armed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_tick_at: Option<Timestamp>,
}

impl From<Option<TimerInfo>> for TimerResponse {
    fn from(info: Option<TimerInfo>) -> Self {
        Self {
            scheduled: info.is_some(),
            period_seconds: info.map(|i| i.period.as_secs()),
            armed_at: info.map(|i| i.armed_at),
            next_tick_at: info.map(|i| i.next_tick_at),
        }
    }
}

/// `GET /api/entities`
pub async fn list<S, SP, R>(State(state): State<AppState<S, SP, R>>) -> Json<Vec<Entity>>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    Json(state.entity_service.list_entities())
}

/// `GET /api/entities/{id}`
pub async fn get<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
) -> Result<Json<Entity>, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    Ok(Json(state.entity_service.get_entity(&id)?))
}

/// `POST /api/entities`
pub async fn create<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Json(req): Json<CreateEntityRequest>,
) -> Result<CreateResponse, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let entity = req.into_entity()?;
    let created = state.entity_service.create_entity(entity).await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PUT /api/entities/{id}`
pub async fn update<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
    Json(patch): Json<EntityPatch>,
) -> Result<Json<Entity>, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    let updated = state.entity_service.update_entity(&id, patch).await?;
    Ok(Json(updated))
}

/// `DELETE /api/entities/{id}`
pub async fn delete<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    state.entity_service.delete_entity(&id).await?;
    Ok(DeleteResponse::NoContent)
}

/// `POST /api/entities/{id}/execute`: 409 while a run is in flight.
pub async fn execute<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionResponse>, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    let report = state.entity_service.execute_now(&id).await?;
    Ok(Json(report.into()))
}

/// `GET /api/entities/{id}/document`
pub async fn document<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    Ok(Json(state.entity_service.render_document(&id).await?))
}

/// `GET /api/entities/{id}/timer`
pub async fn timer<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
) -> Result<Json<TimerResponse>, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    Ok(Json(state.entity_service.timer_info(&id)?.into()))
}

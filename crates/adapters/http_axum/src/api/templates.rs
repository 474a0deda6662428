//! Template preview: render arbitrary sources without creating an entity.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use unictl_app::ports::{EntityStore, ScriptRuntime, StateProvider};
use unictl_domain::template::{Context, Document};

use crate::state::AppState;

/// Request body for `POST /api/templates/preview`.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub context: Context,
}

/// `POST /api/templates/preview`
///
/// Rendering never fails: unresolved paths and bad functions come back as
/// diagnostics next to the output.
pub async fn preview<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Json(req): Json<PreviewRequest>,
) -> Json<Document>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let document = state
        .entity_service
        .preview(&req.html, &req.css, &req.context)
        .await;
    Json(document)
}

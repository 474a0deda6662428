//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod entities;
pub mod sse;
pub mod templates;

use axum::Router;
use axum::routing::{get, post};

use unictl_app::ports::{EntityStore, ScriptRuntime, StateProvider};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<S, SP, R>() -> Router<AppState<S, SP, R>>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/entities",
            get(entities::list::<S, SP, R>).post(entities::create::<S, SP, R>),
        )
        .route(
            "/entities/{id}",
            get(entities::get::<S, SP, R>)
                .put(entities::update::<S, SP, R>)
                .delete(entities::delete::<S, SP, R>),
        )
        .route(
            "/entities/{id}/execute",
            post(entities::execute::<S, SP, R>),
        )
        .route(
            "/entities/{id}/document",
            get(entities::document::<S, SP, R>),
        )
        .route("/entities/{id}/timer", get(entities::timer::<S, SP, R>))
        .route("/templates/preview", post(templates::preview::<S, SP, R>))
        .route("/events/stream", get(sse::stream::<S, SP, R>))
}

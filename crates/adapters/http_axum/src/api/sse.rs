//! Server-Sent Events (SSE) stream for real-time updates.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use unictl_app::event_bus::concerns;
use unictl_app::ports::{EntityStore, ScriptRuntime, StateProvider};

use crate::error::{ApiError, parse_id};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    /// Only forward events about this entity.
    pub entity_id: Option<String>,
}

/// `GET /api/events/stream` — SSE stream of domain events.
///
/// Each event is sent as a JSON `data:` frame named after its event type.
/// The stream continues until the client disconnects or the event bus is
/// closed; lagging subscribers lose the oldest events.
///
/// # Errors
///
/// Returns 400 when `entity_id` is not a valid entity id.
pub async fn stream<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>, ApiError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let entity = query.entity_id.as_deref().map(parse_id).transpose()?;
    let receiver = state.event_bus.subscribe();
    let events = BroadcastStream::new(receiver).filter_map(move |result| match result {
        Ok(event) if !concerns(&event, entity.as_ref()) => None,
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json) => Some(Ok(Event::default()
                .event(event.event_type.to_string())
                .data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to serialize event for SSE stream");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "SSE subscriber lagged, some events were dropped");
            None
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

//! Dashboard pages for entities.

use std::fmt::Write as _;

use axum::extract::{Path, State};
use axum::response::Redirect;

use unictl_app::ports::{EntityStore, ScriptRuntime, StateProvider};
use unictl_domain::entity::Entity;
use unictl_domain::error::UnictlError;

use super::{DashboardError, Page, escape};
use crate::error::parse_id;
use crate::state::AppState;

/// `GET /` — every entity with its status and schedule.
pub async fn list<S, SP, R>(State(state): State<AppState<S, SP, R>>) -> Page
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let entities = state.entity_service.list_entities();

    let mut body = String::from("<h1>Entities</h1>\n");
    if entities.is_empty() {
        body.push_str("<p>No entities yet.</p>\n");
    } else {
        body.push_str(
            "<table>\n<tr><th>Name</th><th>Status</th><th>Interval</th><th>Runs</th><th>Last error</th></tr>\n",
        );
        for entity in &entities {
            let _ = writeln!(
                body,
                "<tr><td><a href=\"/entities/{id}\">{name}</a></td><td class=\"status-{status}\">{status}</td><td>{interval}</td><td>{runs}</td><td>{error}</td></tr>",
                id = escape(entity.id.as_str()),
                name = escape(&entity.name),
                status = entity.status,
                interval = schedule_label(entity),
                runs = entity.execution_count,
                error = escape(entity.last_error.as_deref().unwrap_or("")),
            );
        }
        body.push_str("</table>\n");
    }

    Page::new("Entities").body(body)
}

/// `GET /entities/{id}` — the entity's rendered document.
pub async fn detail<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
) -> Result<Page, DashboardError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let id = parse_id(&id)?;
    let entity = state.entity_service.get_entity(&id)?;
    let document = state.entity_service.render_document(&id).await?;

    let mut body = String::new();
    let _ = writeln!(
        body,
        "<h1>{name}</h1>\n<p>Status: <span class=\"status-{status}\">{status}</span> · {schedule}</p>",
        name = escape(&entity.name),
        status = entity.status,
        schedule = schedule_label(&entity),
    );
    let _ = writeln!(
        body,
        "<form method=\"post\" action=\"/entities/{}/execute\"><button type=\"submit\">Run now</button></form>",
        escape(entity.id.as_str()),
    );
    if let Some(error) = &entity.last_error {
        let _ = writeln!(body, "<p class=\"status-error\">{}</p>", escape(error));
    }
    let _ = writeln!(body, "<section class=\"document\">\n{}\n</section>", document.html);
    if !document.diagnostics.is_empty() {
        body.push_str("<h2>Template diagnostics</h2>\n<ul>\n");
        for diagnostic in &document.diagnostics {
            let _ = writeln!(body, "<li>{}</li>", escape(&diagnostic.to_string()));
        }
        body.push_str("</ul>\n");
    }

    Ok(Page::new(entity.name)
        .head(format!("<style>{}</style>\n", document.css))
        .body(body))
}

/// `POST /entities/{id}/execute` — run now, then back to the detail page (PRG).
///
/// A run already in flight is not an error here; the page simply shows it.
pub async fn execute<S, SP, R>(
    State(state): State<AppState<S, SP, R>>,
    Path(id): Path<String>,
) -> Result<Redirect, DashboardError>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    let entity_id = parse_id(&id)?;
    match state.entity_service.execute_now(&entity_id).await {
        Ok(_) | Err(UnictlError::Busy(_)) => {}
        Err(err) => return Err(err.into()),
    }
    Ok(Redirect::to(&format!("/entities/{}", entity_id.as_str())))
}

fn schedule_label(entity: &Entity) -> String {
    match entity.schedule_period() {
        Some(period) => format!("every {}s", period.as_secs()),
        None if entity.disabled_after_failures.is_some() => {
            "disabled after repeated failures".to_string()
        }
        None => "manual".to_string(),
    }
}

//! Document materialization — renders an entity's templates against its
//! latest result.

use serde_json::Value;

use unictl_domain::entity::Entity;
use unictl_domain::state::StateSnapshot;
use unictl_domain::template::{Context, Document, RenderEnv, Template};
use unictl_domain::time::{Timestamp, to_rfc3339};

/// Rendered in place of an empty HTML template.
pub const EMPTY_TEMPLATE_PLACEHOLDER: &str = "<div>No template defined</div>";

/// Context an entity's templates are rendered against.
///
/// Keys, in order: `id`, `name`, `state`, `status`, `entity`, `result`, every
/// key of the last result, `states`, `now`, `utc_now`.
#[must_use]
pub fn template_context(entity: &Entity, states: &StateSnapshot, at: Timestamp) -> Context {
    let mut context = Context::new();
    context.insert("id".to_string(), Value::String(entity.id.to_string()));
    context.insert("name".to_string(), Value::String(entity.name.clone()));
    context.insert("state".to_string(), Value::String(entity.status.to_string()));
    context.insert("status".to_string(), Value::String(entity.status.to_string()));
    context.insert("entity".to_string(), entity.summary());
    context.insert(
        "result".to_string(),
        Value::Object(entity.last_result.clone()),
    );
    for (key, value) in &entity.last_result {
        context.insert(key.clone(), value.clone());
    }
    context.insert("states".to_string(), states.to_value());
    context.insert("now".to_string(), Value::String(to_rfc3339(at)));
    context.insert("utc_now".to_string(), Value::String(to_rfc3339(at)));
    context
}

/// Render the entity's HTML and CSS.
///
/// String fields `html_template` / `css_styles` in the last result take
/// precedence over the stored templates.
#[must_use]
pub fn render_document(entity: &Entity, states: &StateSnapshot, at: Timestamp) -> Document {
    let html_source = result_override(entity, "html_template").unwrap_or(&entity.html_template);
    let css_source = result_override(entity, "css_styles").unwrap_or(&entity.css_styles);
    let context = template_context(entity, states, at);
    render_sources(html_source, css_source, &context, states, at)
}

/// Render arbitrary HTML and CSS sources against `context`.
#[must_use]
pub fn render_sources(
    html_source: &str,
    css_source: &str,
    context: &Context,
    states: &StateSnapshot,
    at: Timestamp,
) -> Document {
    let env = RenderEnv::new(at, states);
    let mut diagnostics = Vec::new();

    let html = if html_source.trim().is_empty() {
        EMPTY_TEMPLATE_PLACEHOLDER.to_string()
    } else {
        let rendered = Template::parse(html_source).render(context, &env);
        diagnostics.extend(rendered.diagnostics);
        rendered.output
    };
    let css = if css_source.trim().is_empty() {
        String::new()
    } else {
        let rendered = Template::parse(css_source).render(context, &env);
        diagnostics.extend(rendered.diagnostics);
        rendered.output
    };

    Document {
        html,
        css,
        diagnostics,
    }
}

fn result_override<'a>(entity: &'a Entity, key: &str) -> Option<&'a str> {
    entity.last_result.get(key).and_then(Value::as_str)
}

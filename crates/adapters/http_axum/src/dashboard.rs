//! Server-side rendered HTML dashboard (no JavaScript).
//!
//! Pages are built with plain string formatting. Entity documents are
//! embedded as rendered; everything else is escaped.

#[allow(clippy::missing_errors_doc)]
pub mod entities;

use std::fmt::Write as _;

use axum::Router;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};

use unictl_app::ports::{EntityStore, ScriptRuntime, StateProvider};
use unictl_domain::error::UnictlError;

use crate::error::ApiError;
use crate::state::AppState;

/// Seconds between automatic page reloads.
const REFRESH_SECONDS: u32 = 5;

/// Build the dashboard sub-router for SSR HTML pages.
pub fn routes<S, SP, R>() -> Router<AppState<S, SP, R>>
where
    S: EntityStore + Send + Sync + 'static,
    SP: StateProvider + Send + Sync + 'static,
    R: ScriptRuntime + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(entities::list::<S, SP, R>))
        .route("/entities/{id}", get(entities::detail::<S, SP, R>))
        .route(
            "/entities/{id}/execute",
            post(entities::execute::<S, SP, R>),
        )
}

/// A complete HTML page.
pub struct Page {
    title: String,
    head: String,
    body: String,
}

impl Page {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            head: String::new(),
            body: String::new(),
        }
    }

    fn head(mut self, head: impl Into<String>) -> Self {
        self.head = head.into();
        self
    }

    fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn render(&self) -> String {
        let mut out = String::new();
        let _ = write!(
            out,
            concat!(
                "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n",
                "<meta charset=\"utf-8\">\n",
                "<meta http-equiv=\"refresh\" content=\"{refresh}\">\n",
                "<title>{title} · unictl</title>\n",
                "<style>{base}</style>\n{head}</head>\n<body>\n",
                "<nav><a href=\"/\">Entities</a></nav>\n<main>\n{body}</main>\n",
                "</body>\n</html>\n"
            ),
            refresh = REFRESH_SECONDS,
            title = escape(&self.title),
            base = BASE_STYLE,
            head = self.head,
            body = self.body,
        );
        out
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        Html(self.render()).into_response()
    }
}

const BASE_STYLE: &str = "body{font-family:sans-serif;margin:0}\
nav{padding:8px 16px;background:#222}nav a{color:#fff}\
main{padding:16px}table{border-collapse:collapse}\
td,th{padding:4px 12px;text-align:left;border-bottom:1px solid #ddd}\
.status-error{color:#b00}.status-running{color:#06c}";

/// Error page shown instead of a JSON body.
pub struct DashboardError(ApiError);

impl From<ApiError> for DashboardError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<UnictlError> for DashboardError {
    fn from(err: UnictlError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let reason = status.canonical_reason().unwrap_or("Error");
        let page = Page::new(reason).body(format!(
            "<h1>{}</h1>\n<p><a href=\"/\">Back to entities</a></p>\n",
            escape(reason)
        ));
        (status, Html(page.render())).into_response()
    }
}

/// Escape text for HTML element content and attribute values.
#[must_use]
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_escape_markup() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn should_render_complete_page() {
        let html = Page::new("A <b>")
            .head("<style>p{}</style>")
            .body("<p>hi</p>")
            .render();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>A &lt;b&gt; · unictl</title>"));
        assert!(html.contains("<style>p{}</style>"));
        assert!(html.contains("<p>hi</p>"));
        assert!(html.contains("content=\"5\""));
    }
}

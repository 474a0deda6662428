//! Template engine — interpolates entity results into HTML and CSS.
//!
//! ## Grammar
//! - `{{ path }}` — dot-separated lookup into the context (`sensor.value`,
//!   `items.0`). A missing path leaves the original `{{ path }}` text in place.
//! - `{% if A == B %} … {% endif %}` — also `!=`, `>`, `<` and a bare
//!   truthiness test. `==` / `!=` compare the *text* of both sides, so
//!   `"5" == 5` holds. `>` / `<` compare numerically and are false when either
//!   side is not a number.
//! - `{% for item in path %} … {% endfor %}` — iterates a sequence, or the
//!   values of a mapping in insertion order. `item` shadows outer bindings.
//! - `{{ fn(arg, …) }}` — built-in functions; arguments are quoted strings,
//!   numbers, `true` / `false` / `null`, or paths (missing paths are `null`).
//!
//! ## Evaluation order
//! Substitution, conditionals, loops and function calls keep the semantics of
//! a fixed-order pipeline: a value substituted into the output is never
//! re-interpreted as template syntax, conditions and loop sources are read
//! from the context and function calls see loop bindings. Control blocks
//! may nest up to 64 levels; a deeper block renders empty with a diagnostic.
//!
//! ## Error containment
//! Rendering never fails. Problems are reported as [`Diagnostic`]s next to
//! the output; an unclosed or malformed block renders as an empty string, and
//! an unknown or failing function call leaves its source text in place.

mod functions;
mod parser;
mod render;
mod value;

pub use value::format_value;

use serde::{Deserialize, Serialize};

use crate::state::StateLookup;
use crate::time::Timestamp;

/// Rendering context: the root mapping paths are resolved against.
pub type Context = serde_json::Map<String, serde_json::Value>;

/// Something the renderer could not interpret. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    #[error("unresolved path `{path}`")]
    ResolutionGap { path: String },

    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("function `{name}` failed: {reason}")]
    FunctionFailed { name: String, reason: String },

    #[error("malformed block: {reason}")]
    MalformedBlock { reason: String },
}

/// Ambient inputs of a render that do not come from the context.
pub struct RenderEnv<'a> {
    now: Timestamp,
    states: &'a dyn StateLookup,
}

impl<'a> RenderEnv<'a> {
    /// `now` is frozen for the whole render so repeated calls agree.
    #[must_use]
    pub fn new(now: Timestamp, states: &'a dyn StateLookup) -> Self {
        Self { now, states }
    }
}

/// Output of one render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// A parsed template, reusable across renders.
#[derive(Debug, Clone)]
pub struct Template {
    nodes: Vec<parser::Node>,
}

impl Template {
    /// Parse template source. Parsing never fails; malformed parts become
    /// nodes that render empty and report a diagnostic.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        Self {
            nodes: parser::parse(source),
        }
    }

    #[must_use]
    pub fn render(&self, context: &Context, env: &RenderEnv<'_>) -> Rendered {
        render::render(&self.nodes, context, env)
    }
}

/// Parse and render in one go.
#[must_use]
pub fn render(source: &str, context: &Context, env: &RenderEnv<'_>) -> Rendered {
    Template::parse(source).render(context, env)
}

/// The rendered HTML and CSS of an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub html: String,
    pub css: String,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

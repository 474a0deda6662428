//! # unictl-adapter-script-rhai
//!
//! Script runtime backed by the [Rhai](https://rhai.rs) embedded scripting engine.
//!
//! ## Responsibilities
//! - Implement the [`ScriptRuntime`](unictl_app::ports::ScriptRuntime) port
//! - Expose the execution context to scripts: `entity`, `last_result`,
//!   `states` and `now` as variables, plus the state, action, clock and
//!   logging helpers
//! - Stop evaluation once the run is cancelled or the operation budget is spent
//!
//! ## Dependency rule
//! Depends on `unictl-app` (for port traits) and `unictl-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod helpers;
mod runtime;

pub use runtime::{DEFAULT_MAX_OPERATIONS, RhaiRuntime};

//! # unictl-app
//!
//! Application layer — use-cases, **port definitions** (traits) and the
//! execution machinery of the controller.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `EntityStore` — durable storage of entity records
//!   - `StateProvider` — read-only view of the external environment
//!   - `ActionInvoker` — side effects requested by scripts
//!   - `EventPublisher` — push notifications to observers
//!   - `ScriptRuntime` — the sandboxed interpreter that runs entity scripts
//! - Build the per-run [`ExecutionContext`](execution_context::ExecutionContext)
//!   and run scripts under a timeout ([`ScriptRunner`](script_runner::ScriptRunner))
//! - Own one timer per entity and serialise runs ([`Scheduler`](scheduler::Scheduler))
//! - Expose the administrative use-cases ([`EntityService`](services::entity_service::EntityService))
//!
//! ## Dependency rule
//! Depends on `unictl-domain` only (plus `tokio` for timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod document;
pub mod event_bus;
pub mod execution_context;
pub mod outbox;
pub mod ports;
pub mod registry;
pub mod scheduler;
pub mod script_runner;
pub mod services;

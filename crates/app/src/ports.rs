//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod action_invoker;
pub mod event_bus;
pub mod script_runtime;
pub mod state_provider;
pub mod storage;

pub use action_invoker::ActionInvoker;
pub use event_bus::EventPublisher;
pub use script_runtime::{ScriptError, ScriptRuntime};
pub use state_provider::StateProvider;
pub use storage::EntityStore;

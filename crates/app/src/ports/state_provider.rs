//! State provider port — read-only view of the external environment.

use std::future::Future;

use unictl_domain::error::UnictlError;
use unictl_domain::state::ExternalState;

/// Source of external state (lights, sensors, switches, …).
///
/// Scripts and templates only ever see a snapshot taken when a run starts.
pub trait StateProvider {
    /// Current state of one external entity.
    fn get_state(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<Option<ExternalState>, UnictlError>> + Send;

    /// Current state of every known external entity.
    fn list_states(&self) -> impl Future<Output = Result<Vec<ExternalState>, UnictlError>> + Send;
}

impl<T: StateProvider + Send + Sync> StateProvider for std::sync::Arc<T> {
    fn get_state(
        &self,
        entity_id: &str,
    ) -> impl Future<Output = Result<Option<ExternalState>, UnictlError>> + Send {
        (**self).get_state(entity_id)
    }

    fn list_states(&self) -> impl Future<Output = Result<Vec<ExternalState>, UnictlError>> + Send {
        (**self).list_states()
    }
}

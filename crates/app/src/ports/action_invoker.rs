//! Action invoker port — side effects requested by scripts.

use std::future::Future;

use unictl_domain::action::{ActionError, ActionRequest};

/// Performs an action (`light.turn_on`, `notify.notify`, …) on the host
/// environment and returns its result.
pub trait ActionInvoker {
    fn invoke(
        &self,
        request: ActionRequest,
    ) -> impl Future<Output = Result<serde_json::Value, ActionError>> + Send;
}

impl<T: ActionInvoker + Send + Sync> ActionInvoker for std::sync::Arc<T> {
    fn invoke(
        &self,
        request: ActionRequest,
    ) -> impl Future<Output = Result<serde_json::Value, ActionError>> + Send {
        (**self).invoke(request)
    }
}

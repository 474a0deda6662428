//! The environment entity scripts read from and act upon.

use serde_json::Value;

use unictl_adapter_virtual::VirtualHome;
use unictl_app::ports::{ActionInvoker, StateProvider};
use unictl_domain::action::{ActionError, ActionRequest};
use unictl_domain::error::UnictlError;
use unictl_domain::state::ExternalState;

/// Picks the integration backing the state provider and action invoker.
pub enum Host {
    /// Simulated light, switch and temperature sensor.
    Virtual(VirtualHome),
    /// No integration: no external states, every action is unsupported.
    Detached,
}

impl Host {
    #[must_use]
    pub fn from_config(virtual_enabled: bool) -> Self {
        if virtual_enabled {
            Self::Virtual(VirtualHome::default())
        } else {
            Self::Detached
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Virtual(_) => "virtual",
            Self::Detached => "detached",
        }
    }
}

impl StateProvider for Host {
    async fn get_state(&self, entity_id: &str) -> Result<Option<ExternalState>, UnictlError> {
        match self {
            Self::Virtual(home) => home.get_state(entity_id).await,
            Self::Detached => Ok(None),
        }
    }

    async fn list_states(&self) -> Result<Vec<ExternalState>, UnictlError> {
        match self {
            Self::Virtual(home) => home.list_states().await,
            Self::Detached => Ok(Vec::new()),
        }
    }
}

impl ActionInvoker for Host {
    async fn invoke(&self, request: ActionRequest) -> Result<Value, ActionError> {
        match self {
            Self::Virtual(home) => home.invoke(request).await,
            Self::Detached => Err(ActionError::unsupported(&request)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_expose_virtual_devices_when_enabled() {
        let host = Host::from_config(true);
        assert_eq!(host.name(), "virtual");
        assert_eq!(host.list_states().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn should_reject_actions_when_detached() {
        let host = Host::from_config(false);
        assert!(host.list_states().await.unwrap().is_empty());
        assert!(host.get_state("light.virtual_light").await.unwrap().is_none());

        let result = host
            .invoke(ActionRequest::turn_on("light.virtual_light"))
            .await;
        assert!(matches!(result, Err(ActionError::Unsupported { .. })));
    }
}

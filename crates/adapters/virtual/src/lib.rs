//! # unictl-adapter-virtual
//!
//! Simulated host environment for demos and tests.
//!
//! ## Provided entities
//!
//! | Device | Entity ID | Behaviour |
//! |--------|-----------|-----------|
//! | Virtual Light | `light.virtual_light` | `turn_on` (optional `brightness`) / `turn_off` / `toggle` |
//! | Virtual Sensor | `sensor.virtual_temperature` | Reading in °C, changed through `virtual.set_state` |
//! | Virtual Switch | `switch.virtual_switch` | `turn_on` / `turn_off` / `toggle` |
//!
//! ## Actions
//!
//! - `<domain>.turn_on|turn_off|toggle` with `entity_id`, where `domain` is the
//!   entity's own domain or `homeassistant`
//! - `virtual.set_state` with `entity_id`, `state` and optional `attributes`
//! - `notify.notify` with `message` (logged; the last 100 are kept)
//!
//! ## Dependency rule
//!
//! Depends on `unictl-app` (port traits) and `unictl-domain` only.

mod devices;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use serde_json::{Value, json};

use unictl_app::ports::{ActionInvoker, StateProvider};
use unictl_domain::action::{ActionError, ActionRequest, GENERIC_DOMAIN};
use unictl_domain::error::UnictlError;
use unictl_domain::state::ExternalState;

use devices::{VirtualDevice, VirtualLight, VirtualSensor, VirtualSwitch};

/// Most recent notifications kept; older ones are dropped.
pub const MAX_NOTIFICATIONS: usize = 100;

/// Virtual host environment holding simulated devices.
pub struct VirtualHome {
    devices: BTreeMap<&'static str, VirtualDevice>,
    notifications: Mutex<VecDeque<String>>,
}

impl Default for VirtualHome {
    fn default() -> Self {
        let devices = [
            VirtualDevice::Light(VirtualLight::default()),
            VirtualDevice::Sensor(VirtualSensor::default()),
            VirtualDevice::Switch(VirtualSwitch::default()),
        ]
        .into_iter()
        .map(|device| (device.entity_id(), device))
        .collect();

        Self {
            devices,
            notifications: Mutex::new(VecDeque::new()),
        }
    }
}

impl VirtualHome {
    /// The last [`MAX_NOTIFICATIONS`] messages received through
    /// `notify.notify`, oldest first.
    #[must_use]
    pub fn notifications(&self) -> Vec<String> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    fn device(&self, request: &ActionRequest) -> Result<&VirtualDevice, ActionError> {
        let target = request
            .target()
            .ok_or_else(|| ActionError::failed(request, "missing entity_id"))?;
        self.devices
            .get(target)
            .ok_or_else(|| ActionError::failed(request, format!("unknown entity {target}")))
    }

    fn switch(&self, request: &ActionRequest) -> Result<Value, ActionError> {
        let device = self.device(request)?;
        let owner = device
            .entity_id()
            .split_once('.')
            .map_or("", |(domain, _)| domain);
        if request.domain != owner && request.domain != GENERIC_DOMAIN {
            return Err(ActionError::unsupported(request));
        }
        let state = device
            .handle_action(&request.action, &request.params)
            .ok_or_else(|| ActionError::unsupported(request))?;
        Ok(state.to_value())
    }

    fn set_state(&self, request: &ActionRequest) -> Result<Value, ActionError> {
        let device = self.device(request)?;
        let state = request
            .params
            .get("state")
            .and_then(Value::as_str)
            .ok_or_else(|| ActionError::failed(request, "missing state"))?;
        let attributes = request.params.get("attributes").and_then(Value::as_object);
        Ok(device.set_state(state, attributes).to_value())
    }

    fn notify(&self, request: &ActionRequest) -> Value {
        let message = request
            .params
            .get("message")
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        tracing::info!(%message, "virtual notification");
        let mut notifications = self
            .notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if notifications.len() == MAX_NOTIFICATIONS {
            notifications.pop_front();
        }
        notifications.push_back(message);
        json!({ "delivered": true })
    }
}

impl StateProvider for VirtualHome {
    async fn get_state(&self, entity_id: &str) -> Result<Option<ExternalState>, UnictlError> {
        Ok(self.devices.get(entity_id).map(VirtualDevice::snapshot))
    }

    async fn list_states(&self) -> Result<Vec<ExternalState>, UnictlError> {
        Ok(self.devices.values().map(VirtualDevice::snapshot).collect())
    }
}

impl ActionInvoker for VirtualHome {
    async fn invoke(&self, request: ActionRequest) -> Result<Value, ActionError> {
        match (request.domain.as_str(), request.action.as_str()) {
            ("notify", "notify") => Ok(self.notify(&request)),
            ("virtual", "set_state") => self.set_state(&request),
            (_, "turn_on" | "turn_off" | "toggle") => self.switch(&request),
            _ => Err(ActionError::unsupported(&request)),
        }
    }
}

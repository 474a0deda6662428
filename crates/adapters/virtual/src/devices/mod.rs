//! Virtual device implementations — light, sensor, switch.
//!
//! Each device owns one external entity with a fixed entity id, so scripts
//! and templates can refer to it by name.

mod light;
mod sensor;
mod switch;

pub use light::VirtualLight;
pub use sensor::VirtualSensor;
pub use switch::VirtualSwitch;

use std::sync::{Mutex, PoisonError};

use serde_json::{Map, Value};

use unictl_domain::state::ExternalState;
use unictl_domain::time::now;

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
    Switch(VirtualSwitch),
}

impl VirtualDevice {
    #[must_use]
    pub fn entity_id(&self) -> &'static str {
        match self {
            Self::Light(_) => light::ENTITY_ID,
            Self::Sensor(_) => sensor::ENTITY_ID,
            Self::Switch(_) => switch::ENTITY_ID,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ExternalState {
        self.cell().get()
    }

    /// Apply `turn_on` / `turn_off` / `toggle`.
    ///
    /// Returns `None` when the device does not support the action.
    pub fn handle_action(&self, action: &str, params: &Value) -> Option<ExternalState> {
        match self {
            Self::Light(d) => d.handle_action(action, params),
            Self::Sensor(_) => None,
            Self::Switch(d) => d.handle_action(action),
        }
    }

    /// Overwrite the state and merge `attributes` into the existing ones.
    pub fn set_state(&self, state: &str, attributes: Option<&Map<String, Value>>) -> ExternalState {
        self.cell().update(|current| {
            state.clone_into(&mut current.state);
            if let Some(attributes) = attributes {
                for (name, value) in attributes {
                    current.attributes.insert(name.clone(), value.clone());
                }
            }
        })
    }

    fn cell(&self) -> &StateCell {
        match self {
            Self::Light(d) => &d.cell,
            Self::Sensor(d) => &d.cell,
            Self::Switch(d) => &d.cell,
        }
    }
}

/// Current state of one device.
pub struct StateCell(Mutex<ExternalState>);

impl StateCell {
    fn new(state: ExternalState) -> Self {
        Self(Mutex::new(state))
    }

    fn get(&self) -> ExternalState {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Mutate the state; `last_changed` moves only when the state text changes.
    fn update(&self, f: impl FnOnce(&mut ExternalState)) -> ExternalState {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let before = guard.state.clone();
        f(&mut guard);
        if guard.state != before {
            guard.last_changed = Some(now());
        }
        guard.clone()
    }
}

/// On/off state after `action`, or `None` for anything else.
fn switched(current: &str, action: &str) -> Option<&'static str> {
    match action {
        "turn_on" => Some("on"),
        "turn_off" => Some("off"),
        "toggle" if current == "on" => Some("off"),
        "toggle" => Some("on"),
        _ => None,
    }
}

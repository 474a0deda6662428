//! Virtual light — responds to `turn_on`, `turn_off`, `toggle`.

use serde_json::{Value, json};

use unictl_domain::state::ExternalState;

use super::{StateCell, switched};

pub const ENTITY_ID: &str = "light.virtual_light";

const FULL_BRIGHTNESS: u64 = 255;

/// A simulated dimmable light.
pub struct VirtualLight {
    pub(super) cell: StateCell,
}

impl Default for VirtualLight {
    fn default() -> Self {
        Self {
            cell: StateCell::new(
                ExternalState::new(ENTITY_ID, "off")
                    .with_attribute("friendly_name", json!("Virtual Light"))
                    .with_attribute("brightness", json!(FULL_BRIGHTNESS)),
            ),
        }
    }
}

impl VirtualLight {
    /// `turn_on` accepts an optional `brightness` (0-255).
    pub fn handle_action(&self, action: &str, params: &Value) -> Option<ExternalState> {
        let brightness = params
            .get("brightness")
            .and_then(Value::as_u64)
            .map(|b| b.min(FULL_BRIGHTNESS));
        let mut supported = true;
        let state = self.cell.update(|current| {
            let Some(next) = switched(&current.state, action) else {
                supported = false;
                return;
            };
            current.state = next.to_string();
            if let (Some(brightness), "turn_on") = (brightness, action) {
                current
                    .attributes
                    .insert("brightness".to_string(), json!(brightness));
            }
        });
        supported.then_some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_off() {
        let light = VirtualLight::default();
        assert_eq!(light.cell.get().state, "off");
    }

    #[test]
    fn should_turn_on_with_brightness() {
        let light = VirtualLight::default();
        let state = light
            .handle_action("turn_on", &json!({ "brightness": 400 }))
            .unwrap();
        assert_eq!(state.state, "on");
        assert_eq!(state.attribute("brightness"), Some(&json!(255)));

        let state = light
            .handle_action("turn_on", &json!({ "brightness": 40 }))
            .unwrap();
        assert_eq!(state.attribute("brightness"), Some(&json!(40)));
    }

    #[test]
    fn should_toggle_back_to_off() {
        let light = VirtualLight::default();
        light.handle_action("toggle", &Value::Null).unwrap();
        let state = light.handle_action("toggle", &Value::Null).unwrap();
        assert_eq!(state.state, "off");
    }

    #[test]
    fn should_reject_unknown_action() {
        let light = VirtualLight::default();
        assert!(light.handle_action("blink", &Value::Null).is_none());
        assert_eq!(light.cell.get().state, "off");
    }
}

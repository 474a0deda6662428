//! Virtual switch — responds to `turn_on`, `turn_off`, `toggle`.

use serde_json::json;

use unictl_domain::state::ExternalState;

use super::{StateCell, switched};

pub const ENTITY_ID: &str = "switch.virtual_switch";

/// A simulated on/off switch.
pub struct VirtualSwitch {
    pub(super) cell: StateCell,
}

impl Default for VirtualSwitch {
    fn default() -> Self {
        Self {
            cell: StateCell::new(
                ExternalState::new(ENTITY_ID, "off")
                    .with_attribute("friendly_name", json!("Virtual Switch")),
            ),
        }
    }
}

impl VirtualSwitch {
    pub fn handle_action(&self, action: &str) -> Option<ExternalState> {
        let current = self.cell.get();
        let next = switched(&current.state, action)?;
        Some(self.cell.update(|state| next.clone_into(&mut state.state)))
    }
}

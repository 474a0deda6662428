//! Virtual temperature sensor — holds a numeric reading.

use serde_json::json;

use unictl_domain::state::ExternalState;

use super::StateCell;

pub const ENTITY_ID: &str = "sensor.virtual_temperature";

/// A simulated temperature sensor.
///
/// Sensors do not respond to on/off actions; their reading only changes
/// through `virtual.set_state`.
pub struct VirtualSensor {
    pub(super) cell: StateCell,
}

impl Default for VirtualSensor {
    fn default() -> Self {
        Self {
            cell: StateCell::new(
                ExternalState::new(ENTITY_ID, "21.5")
                    .with_attribute("friendly_name", json!("Virtual Temperature"))
                    .with_attribute("unit", json!("\u{b0}C")),
            ),
        }
    }
}

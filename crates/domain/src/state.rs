//! External state — what the hosting environment reports about its own entities.
//!
//! Scripts read these values through the execution context; templates read
//! them through the `state()` / `attr()` functions and the `states` binding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

const ON_STATES: &[&str] = &["on", "open", "active", "playing"];
const OFF_STATES: &[&str] = &["off", "closed", "inactive", "paused", "stopped"];

/// Snapshot of one entity owned by the hosting environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<Timestamp>,
}

impl ExternalState {
    #[must_use]
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: serde_json::Map::new(),
            last_changed: None,
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// The part of the entity id before the first `.` (`light` for `light.kitchen`).
    #[must_use]
    pub fn domain(&self) -> &str {
        self.entity_id
            .split_once('.')
            .map_or(self.entity_id.as_str(), |(domain, _)| domain)
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Whether the state reads as active (`on`, `open`, `active`, `playing`).
    #[must_use]
    pub fn is_on(&self) -> bool {
        ON_STATES.contains(&self.state.as_str())
    }

    /// Whether the state reads as inactive (`off`, `closed`, `inactive`, `paused`, `stopped`).
    #[must_use]
    pub fn is_off(&self) -> bool {
        OFF_STATES.contains(&self.state.as_str())
    }

    /// The `{state, attributes}` mapping exposed to scripts and templates.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state,
            "attributes": self.attributes,
        })
    }
}

/// Read access to external state, used by the template functions.
pub trait StateLookup {
    fn lookup(&self, entity_id: &str) -> Option<&ExternalState>;
}

/// Point-in-time copy of every external state, keyed by entity id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSnapshot {
    states: BTreeMap<String, ExternalState>,
}

impl StateSnapshot {
    #[must_use]
    pub fn get(&self, entity_id: &str) -> Option<&ExternalState> {
        self.states.get(entity_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExternalState> {
        self.states.values()
    }

    /// Every state whose entity id starts with `<domain>.`.
    /// The iterator borrows only the snapshot.
    pub fn by_domain<'a>(
        &'a self,
        domain: &str,
    ) -> impl Iterator<Item = &'a ExternalState> + use<'a> {
        let domain = domain.to_owned();
        self.states.values().filter(move |s| s.domain() == domain)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Entity id → `{state, attributes}` mapping.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        let map = self
            .states
            .iter()
            .map(|(id, state)| (id.clone(), state.to_value()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<ExternalState> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = ExternalState>>(iter: I) -> Self {
        Self {
            states: iter
                .into_iter()
                .map(|state| (state.entity_id.clone(), state))
                .collect(),
        }
    }
}

impl StateLookup for StateSnapshot {
    fn lookup(&self, entity_id: &str) -> Option<&ExternalState> {
        self.get(entity_id)
    }
}

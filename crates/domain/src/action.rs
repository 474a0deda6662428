//! Action requests — side effects a script asks the hosting environment to perform.
//!
//! Examples: `homeassistant.turn_on`, `light.toggle`, `notify.notify`.

use serde::{Deserialize, Serialize};

/// Domain used by the `turn_on` / `turn_off` / `toggle` shorthands.
pub const GENERIC_DOMAIN: &str = "homeassistant";

/// A single call of the action-call primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub domain: String,
    pub action: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ActionRequest {
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        action: impl Into<String>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            domain: domain.into(),
            action: action.into(),
            params,
        }
    }

    /// `homeassistant.turn_on` targeting one external entity.
    #[must_use]
    pub fn turn_on(entity_id: &str) -> Self {
        Self::targeting(GENERIC_DOMAIN, "turn_on", entity_id)
    }

    /// `homeassistant.turn_off` targeting one external entity.
    #[must_use]
    pub fn turn_off(entity_id: &str) -> Self {
        Self::targeting(GENERIC_DOMAIN, "turn_off", entity_id)
    }

    /// `homeassistant.toggle` targeting one external entity.
    #[must_use]
    pub fn toggle(entity_id: &str) -> Self {
        Self::targeting(GENERIC_DOMAIN, "toggle", entity_id)
    }

    /// `notify.notify` carrying a message.
    #[must_use]
    pub fn notify(message: &str) -> Self {
        Self::new("notify", "notify", serde_json::json!({ "message": message }))
    }

    fn targeting(domain: &str, action: &str, entity_id: &str) -> Self {
        Self::new(domain, action, serde_json::json!({ "entity_id": entity_id }))
    }

    /// The `entity_id` parameter, when present.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.params.get("entity_id").and_then(serde_json::Value::as_str)
    }
}

impl std::fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.domain, self.action)
    }
}

/// Failure reported by the action invoker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("action {domain}.{action} is not supported")]
    Unsupported { domain: String, action: String },

    #[error("action {domain}.{action} failed: {reason}")]
    Failed {
        domain: String,
        action: String,
        reason: String,
    },
}

impl ActionError {
    #[must_use]
    pub fn unsupported(request: &ActionRequest) -> Self {
        Self::Unsupported {
            domain: request.domain.clone(),
            action: request.action.clone(),
        }
    }

    #[must_use]
    pub fn failed(request: &ActionRequest, reason: impl Into<String>) -> Self {
        Self::Failed {
            domain: request.domain.clone(),
            action: request.action.clone(),
            reason: reason.into(),
        }
    }
}

//! Entity status — where an entity is in its execution cycle.

use serde::{Deserialize, Serialize};

/// Execution status of an entity. Only the scheduler moves it.
///
/// `idle → running → completed | error`; the next run starts from either
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Error,
}

impl EntityStatus {
    /// Whether a run is currently holding the entity.
    #[must_use]
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Error => f.write_str("error"),
        }
    }
}

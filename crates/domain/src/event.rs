//! Event — an immutable record of something that happened to an entity.
//!
//! Every mutation of an entity record produces one event carrying the full
//! updated record, so observers never need to re-read the store.

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::execution::{ExecutionOutcome, Trigger};
use crate::id::{EntityId, EventId, RunId};
use crate::template::Document;
use crate::time::{Timestamp, now};

/// What kind of change an [`Event`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    EntityCreated,
    EntityUpdated,
    EntityDeleted,
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionDisabled,
}

impl EventType {
    /// The event type matching the outcome of a finished run.
    #[must_use]
    pub fn for_outcome(outcome: &ExecutionOutcome) -> Self {
        match outcome {
            ExecutionOutcome::Completed => Self::ExecutionCompleted,
            ExecutionOutcome::Failed { .. } => Self::ExecutionFailed,
            ExecutionOutcome::Disabled { .. } => Self::ExecutionDisabled,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::EntityCreated => "entity_created",
            Self::EntityUpdated => "entity_updated",
            Self::EntityDeleted => "entity_deleted",
            Self::ExecutionStarted => "execution_started",
            Self::ExecutionCompleted => "execution_completed",
            Self::ExecutionFailed => "execution_failed",
            Self::ExecutionDisabled => "execution_disabled",
        };
        f.write_str(label)
    }
}

/// A notification pushed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub entity_id: Option<EntityId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    #[must_use]
    pub fn new(event_type: EventType, entity_id: Option<EntityId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            entity_id,
            data,
            timestamp: now(),
        }
    }

    /// An administrative change carrying the full record.
    #[must_use]
    pub fn entity_changed(event_type: EventType, entity: &Entity) -> Self {
        Self::new(
            event_type,
            Some(entity.id.clone()),
            serde_json::json!({ "entity": entity }),
        )
    }

    /// A run has been admitted and the entity is now `running`.
    #[must_use]
    pub fn execution_started(entity: &Entity, run_id: RunId, trigger: Trigger) -> Self {
        Self::new(
            EventType::ExecutionStarted,
            Some(entity.id.clone()),
            serde_json::json!({
                "run_id": run_id,
                "trigger": trigger,
                "entity": entity,
            }),
        )
    }

    /// A run finished; carries the record, the outcome and the freshly rendered document.
    #[must_use]
    pub fn execution_finished(
        entity: &Entity,
        run_id: RunId,
        outcome: &ExecutionOutcome,
        document: &Document,
    ) -> Self {
        Self::new(
            EventType::for_outcome(outcome),
            Some(entity.id.clone()),
            serde_json::json!({
                "run_id": run_id,
                "outcome": outcome,
                "entity": entity,
                "document": document,
            }),
        )
    }
}

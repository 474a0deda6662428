//! Common error types used across the workspace.
//!
//! Every port returns [`UnictlError`]. Each layer defines its own typed
//! errors and converts into it via `#[from]` or an explicit `From` impl.
//! Per-run script failures are *not* errors at this level: they are recorded
//! as [`ExecutionOutcome`](crate::execution::ExecutionOutcome)s on the entity.

use crate::action::ActionError;
use crate::id::EntityId;

/// Base error for every fallible operation in the workspace.
#[derive(Debug, thiserror::Error)]
pub enum UnictlError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Busy(#[from] BusyError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("id must not be empty")]
    EmptyId,

    #[error("id {0:?} may only contain ASCII letters, digits, '_', '-' and '.'")]
    InvalidId(String),

    #[error("interval must not exceed {max} seconds (got {actual})")]
    IntervalTooLong { max: i64, actual: i64 },

    #[error("an entity named {0:?} already exists")]
    DuplicateName(String),

    #[error("an entity with id {0} already exists")]
    DuplicateId(EntityId),
}

/// A lookup by id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A manual execution was requested while a run for the same entity was in flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entity {id} is already executing")]
pub struct BusyError {
    pub id: EntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_convert_validation_error_into_base_error() {
        let err: UnictlError = ValidationError::EmptyName.into();
        assert!(matches!(err, UnictlError::Validation(ValidationError::EmptyName)));
    }

    #[test]
    fn should_describe_missing_record() {
        let err = NotFoundError {
            entity: "Entity",
            id: "clock".to_string(),
        };
        assert_eq!(err.to_string(), "Entity clock not found");
    }

    #[test]
    fn should_name_the_busy_entity() {
        let err: UnictlError = BusyError {
            id: EntityId::parse("clock").unwrap(),
        }
        .into();
        assert_eq!(err.to_string(), "entity clock is already executing");
    }
}

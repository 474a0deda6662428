//! Storage port — durable persistence of entity records.

use std::future::Future;

use unictl_domain::entity::Entity;
use unictl_domain::error::UnictlError;
use unictl_domain::id::EntityId;

/// Durable key-value store of [`Entity`] records.
///
/// The store is a write-behind copy of the scheduler's registry: it is read
/// once at start-up and written after every change.
pub trait EntityStore {
    /// Load one record.
    fn load(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<Option<Entity>, UnictlError>> + Send;

    /// Insert or replace a record, returning what was stored.
    fn save(&self, entity: Entity) -> impl Future<Output = Result<Entity, UnictlError>> + Send;

    /// Remove a record. Deleting a missing record is not an error.
    fn delete(&self, id: &EntityId) -> impl Future<Output = Result<(), UnictlError>> + Send;

    /// Every stored record, ordered by creation time.
    fn list_all(&self) -> impl Future<Output = Result<Vec<Entity>, UnictlError>> + Send;
}

impl<T: EntityStore + Send + Sync> EntityStore for std::sync::Arc<T> {
    fn load(
        &self,
        id: &EntityId,
    ) -> impl Future<Output = Result<Option<Entity>, UnictlError>> + Send {
        (**self).load(id)
    }

    fn save(&self, entity: Entity) -> impl Future<Output = Result<Entity, UnictlError>> + Send {
        (**self).save(entity)
    }

    fn delete(&self, id: &EntityId) -> impl Future<Output = Result<(), UnictlError>> + Send {
        (**self).delete(id)
    }

    fn list_all(&self) -> impl Future<Output = Result<Vec<Entity>, UnictlError>> + Send {
        (**self).list_all()
    }
}

//! In-memory registry — the live, authoritative copy of every entity record.
//!
//! The scheduler and the administrative use-cases mutate records here under a
//! single lock; the durable store is updated afterwards through the
//! [`Outbox`](crate::outbox::Outbox).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use unictl_domain::entity::Entity;
use unictl_domain::id::EntityId;

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: Mutex<HashMap<EntityId, Entity>>,
}

impl EntityRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<EntityId, Entity>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<Entity> {
        self.lock().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.lock().contains_key(id)
    }

    /// Every record, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.lock().values().cloned().collect();
        entities.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        entities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn insert(&self, entity: Entity) -> Option<Entity> {
        self.lock().insert(entity.id.clone(), entity)
    }

    pub fn remove(&self, id: &EntityId) -> Option<Entity> {
        self.lock().remove(id)
    }

    /// Mutate one record under the lock. Returns `None` if it does not exist.
    pub fn update<R>(&self, id: &EntityId, f: impl FnOnce(&mut Entity) -> R) -> Option<R> {
        self.lock().get_mut(id).map(f)
    }

    /// Run `f` with exclusive access to every record.
    pub fn with_all<R>(&self, f: impl FnOnce(&mut HashMap<EntityId, Entity>) -> R) -> R {
        f(&mut self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entity(name: &str) -> Entity {
        Entity::builder().name(name).build().unwrap()
    }

    #[test]
    fn should_return_none_when_updating_missing_entity() {
        let registry = EntityRegistry::default();
        let id = EntityId::generate();
        assert!(registry.update(&id, |e| e.name.clone()).is_none());
    }

    #[test]
    fn should_apply_update_in_place() {
        let registry = EntityRegistry::default();
        let entity = entity("Clock");
        let id = entity.id.clone();
        registry.insert(entity);

        let count = registry.update(&id, |e| {
            e.execution_count += 1;
            e.execution_count
        });

        assert_eq!(count, Some(1));
        assert_eq!(registry.get(&id).unwrap().execution_count, 1);
    }

    #[test]
    fn should_list_oldest_first() {
        let registry = EntityRegistry::default();
        let mut newer = entity("Newer");
        let older = entity("Older");
        newer.created_at = older.created_at + Duration::seconds(5);
        registry.insert(newer);
        registry.insert(older);

        let names: Vec<String> = registry.list().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Older", "Newer"]);
    }

    #[test]
    fn should_remove_entity() {
        let registry = EntityRegistry::default();
        let entity = entity("Clock");
        let id = entity.id.clone();
        registry.insert(entity);

        assert!(registry.remove(&id).is_some());
        assert!(registry.is_empty());
        assert!(!registry.contains(&id));
    }
}

//! In-memory implementation of the Repository port
//!
//! Records are kept in a `BTreeMap` keyed by [`EntityId`], so every listing
//! is ordered by id. Batch writes are computed on a copy of the map and
//! swapped in under the write lock: a failing conflict callback leaves the
//! store untouched.

use std::collections::BTreeMap;

use tokio::sync::RwLock;
use tracing::debug;

use chronosync_core::domain::{ConflictResolutionMode, EntityId, SyncableEntity};
use chronosync_core::ports::{ConflictResolutionFn, Repository, RivalsResolver};

use crate::CacheError;

/// Record store backed by process memory
pub struct MemoryRepository<T> {
    entities: RwLock<BTreeMap<EntityId, T>>,
}

impl<T: SyncableEntity> MemoryRepository<T> {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates a store pre-populated with `entities`
    pub fn with_entities(entities: impl IntoIterator<Item = T>) -> Self {
        let entities = entities.into_iter().map(|e| (e.id(), e)).collect();
        Self {
            entities: RwLock::new(entities),
        }
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    /// Returns true if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    async fn apply_batch(
        &self,
        batch: Vec<(EntityId, T)>,
        conflict_resolution: &ConflictResolutionFn<'_, T>,
        rivals: Option<&dyn RivalsResolver<T>>,
    ) -> anyhow::Result<Vec<(ConflictResolutionMode, T)>> {
        let mut store = self.entities.write().await;
        let mut working = store.clone();
        let mut results = Vec::with_capacity(batch.len());

        for (id, incoming) in batch {
            let existing = working.get(&id).cloned();
            let mode = conflict_resolution(existing.as_ref(), &incoming)?;

            debug!(entity_id = %id, mode = %mode, "Applying conflict resolution");

            let written = match mode {
                ConflictResolutionMode::Create | ConflictResolutionMode::Update => {
                    working.remove(&id);
                    let written = match rivals {
                        Some(rivals) => fix_rival_of(&mut working, incoming, rivals),
                        None => incoming,
                    };
                    working.insert(written.id(), written.clone());
                    written
                }
                ConflictResolutionMode::Delete => working.remove(&id).unwrap_or(incoming),
                ConflictResolutionMode::Ignore => existing.unwrap_or(incoming),
            };

            results.push((mode, written));
        }

        *store = working;
        Ok(results)
    }
}

/// Repairs the first stored rival of `entity`, returning the entity to write
fn fix_rival_of<T: SyncableEntity>(
    working: &mut BTreeMap<EntityId, T>,
    entity: T,
    rivals: &dyn RivalsResolver<T>,
) -> T {
    if !rivals.can_have_rival(&entity) {
        return entity;
    }

    let is_rival = rivals.are_rivals(&entity);
    let Some(rival) = working.values().find(|e| is_rival(*e)).cloned() else {
        return entity;
    };

    let all: Vec<T> = working.values().cloned().collect();
    let (fixed_entity, fixed_rival) = rivals.fix_rivals(&entity, &rival, &all);

    debug!(
        entity_id = %fixed_entity.id(),
        rival_id = %fixed_rival.id(),
        "Repaired rival pair"
    );

    working.remove(&rival.id());
    working.insert(fixed_rival.id(), fixed_rival);
    fixed_entity
}

impl<T: SyncableEntity> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> Repository<T> for MemoryRepository<T> {
    async fn get_by_id(&self, id: EntityId) -> anyhow::Result<Option<T>> {
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn get_all(&self) -> anyhow::Result<Vec<T>> {
        Ok(self.entities.read().await.values().cloned().collect())
    }

    async fn get_all_matching(
        &self,
        predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> anyhow::Result<Vec<T>> {
        Ok(self
            .entities
            .read()
            .await
            .values()
            .filter(|e| predicate(*e))
            .cloned()
            .collect())
    }

    async fn create(&self, entity: T) -> anyhow::Result<T> {
        let mut store = self.entities.write().await;
        let id = entity.id();
        if store.contains_key(&id) {
            return Err(CacheError::AlreadyExists(id).into());
        }
        store.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: EntityId, entity: T) -> anyhow::Result<T> {
        let mut store = self.entities.write().await;
        if store.remove(&id).is_none() {
            return Err(CacheError::NotFound(id).into());
        }
        if entity.id() != id {
            debug!(old_id = %id, new_id = %entity.id(), "Re-keying entity");
        }
        store.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn update_with(
        &self,
        id: EntityId,
        replacement: &(dyn for<'a> Fn(&'a T) -> T + Send + Sync),
    ) -> anyhow::Result<T> {
        let mut store = self.entities.write().await;
        let Some(stored) = store.get(&id) else {
            return Err(CacheError::NotFound(id).into());
        };

        let entity = replacement(stored);
        if entity.id() != id {
            debug!(old_id = %id, new_id = %entity.id(), "Re-keying entity");
        }
        store.remove(&id);
        store.insert(entity.id(), entity.clone());
        Ok(entity)
    }

    async fn delete(&self, id: EntityId) -> anyhow::Result<()> {
        self.entities
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CacheError::NotFound(id).into())
    }

    async fn batch_update(
        &self,
        batch: Vec<(EntityId, T)>,
        conflict_resolution: &ConflictResolutionFn<'_, T>,
    ) -> anyhow::Result<Vec<(ConflictResolutionMode, T)>> {
        self.apply_batch(batch, conflict_resolution, None).await
    }

    async fn batch_update_with_rivals(
        &self,
        batch: Vec<(EntityId, T)>,
        conflict_resolution: &ConflictResolutionFn<'_, T>,
        rivals: &dyn RivalsResolver<T>,
    ) -> anyhow::Result<Vec<(ConflictResolutionMode, T)>> {
        self.apply_batch(batch, conflict_resolution, Some(rivals))
            .await
    }
}

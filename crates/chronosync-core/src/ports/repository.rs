//! Repository port (driven/secondary port)
//!
//! This module defines the interface of the local record store consumed by
//! the sync engine.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - Conflict-aware writes take a resolution function instead of a fixed
//!   policy: the pull chain passes a PreferNewer resolver, the push pipeline
//!   passes an "overwrite only if unchanged" guard.
//! - The rival-aware batch update repairs the running-entry invariant in the
//!   same write as the conflict-resolved update.

use crate::domain::{ConflictResolutionMode, EntityId, SyncableEntity};

use super::rivals::RivalsResolver;

/// Decides what to do with an incoming version given the stored one (if any)
pub type ConflictResolutionFn<'a, T> =
    dyn Fn(Option<&T>, &T) -> anyhow::Result<ConflictResolutionMode> + Send + Sync + 'a;

/// Port trait for the local record store
///
/// ## Batch semantics
///
/// For every `(id, incoming)` pair the implementation loads the record stored
/// under `id`, asks `conflict_resolution` for a verdict and applies it:
///
/// | Verdict | Effect | Returned entity |
/// |---------|--------|-----------------|
/// | Create  | insert `incoming` | `incoming` |
/// | Update  | replace the record under `id` with `incoming` (which may carry a new id) | `incoming` |
/// | Delete  | remove the record under `id` | the removed record |
/// | Ignore  | nothing | the stored record, or `incoming` when nothing is stored |
#[async_trait::async_trait]
pub trait Repository<T: SyncableEntity>: Send + Sync {
    /// Retrieves a record by id
    async fn get_by_id(&self, id: EntityId) -> anyhow::Result<Option<T>>;

    /// Retrieves all records, ordered by id
    async fn get_all(&self) -> anyhow::Result<Vec<T>>;

    /// Retrieves all records matching `predicate`, ordered by id
    async fn get_all_matching(
        &self,
        predicate: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> anyhow::Result<Vec<T>>;

    /// Inserts a new record; fails if the id is taken
    async fn create(&self, entity: T) -> anyhow::Result<T>;

    /// Replaces the record stored under `id`; fails if there is none
    ///
    /// `entity` may carry a different id (a server-assigned id replacing a
    /// local placeholder), in which case the record is re-keyed.
    async fn update(&self, id: EntityId, entity: T) -> anyhow::Result<T>;

    /// Replaces the record stored under `id` with `replacement(stored)`
    ///
    /// The stored record is read and replaced in one atomic step, so no
    /// other write can land in between. The replacement may carry a new id,
    /// in which case the record is re-keyed. Fails if nothing is stored
    /// under `id`.
    async fn update_with(
        &self,
        id: EntityId,
        replacement: &(dyn for<'a> Fn(&'a T) -> T + Send + Sync),
    ) -> anyhow::Result<T>;

    /// Removes the record stored under `id`
    async fn delete(&self, id: EntityId) -> anyhow::Result<()>;

    /// Applies a batch of conflict-resolved writes atomically
    async fn batch_update(
        &self,
        batch: Vec<(EntityId, T)>,
        conflict_resolution: &ConflictResolutionFn<'_, T>,
    ) -> anyhow::Result<Vec<(ConflictResolutionMode, T)>>;

    /// Like [`batch_update`](Repository::batch_update), then repairs rivals
    ///
    /// After a Create or Update whose entity can have a rival, the first
    /// stored record matching `rivals.are_rivals(entity)` is looked up and
    /// both are replaced by `rivals.fix_rivals(entity, rival, all)` in the
    /// same atomic write.
    async fn batch_update_with_rivals(
        &self,
        batch: Vec<(EntityId, T)>,
        conflict_resolution: &ConflictResolutionFn<'_, T>,
        rivals: &dyn RivalsResolver<T>,
    ) -> anyhow::Result<Vec<(ConflictResolutionMode, T)>>;

    /// Single-record form of [`batch_update`](Repository::batch_update)
    async fn update_with_conflict_resolution(
        &self,
        id: EntityId,
        entity: T,
        conflict_resolution: &ConflictResolutionFn<'_, T>,
    ) -> anyhow::Result<(ConflictResolutionMode, T)> {
        self.batch_update(vec![(id, entity)], conflict_resolution)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("batch update of entity {id} returned no result"))
    }
}

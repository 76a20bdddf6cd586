//! Pull chain states
//!
//! ```text
//! StartPullSync ──► FetchAllSince ──FetchStarted(batch)──► Persist ──► FinishedPersisting
//! ```
//!
//! The batch is merged with PreferNewer and, when a rivals resolver is
//! configured, repaired so that at most one time entry keeps running. The
//! per-kind cursor only ever moves forward.

use std::sync::Arc;

use chronosync_conflict::PreferNewer;
use chronosync_core::domain::{ConflictResolutionMode, EntityId, SyncableEntity};
use chronosync_core::ports::{EntityApi, Repository, RivalsResolver, SinceParameterRepository};
use tracing::{debug, info};

use crate::error::SyncResult;
use crate::state_machine::StateHandler;
use crate::transition::Transition;

use super::unexpected;

// ============================================================================
// FetchAllSinceState
// ============================================================================

/// Fetches every record changed since the stored cursor
pub struct FetchAllSinceState<T> {
    api: Arc<dyn EntityApi<T>>,
    since: Arc<dyn SinceParameterRepository>,
}

impl<T: SyncableEntity> FetchAllSinceState<T> {
    pub fn new(api: Arc<dyn EntityApi<T>>, since: Arc<dyn SinceParameterRepository>) -> Self {
        Self { api, since }
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for FetchAllSinceState<T> {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        if !matches!(transition, Transition::StartPullSync) {
            return Err(unexpected("FetchAllSince", &transition));
        }

        let since = self.since.get(T::KIND).await?;
        debug!(kind = %T::KIND, since = ?since, "Fetching changes");

        let batch = self.api.fetch_since(since).await?;
        info!(kind = %T::KIND, count = batch.len(), "Fetched changes");
        Ok(Transition::FetchStarted(batch))
    }
}

// ============================================================================
// PersistState
// ============================================================================

/// Merges a fetched batch into the repository and advances the cursor
pub struct PersistState<T: SyncableEntity> {
    repository: Arc<dyn Repository<T>>,
    since: Arc<dyn SinceParameterRepository>,
    prefer_newer: PreferNewer<T>,
    rivals: Option<Arc<dyn RivalsResolver<T>>>,
}

impl<T: SyncableEntity> PersistState<T> {
    pub fn new(
        repository: Arc<dyn Repository<T>>,
        since: Arc<dyn SinceParameterRepository>,
        prefer_newer: PreferNewer<T>,
        rivals: Option<Arc<dyn RivalsResolver<T>>>,
    ) -> Self {
        Self {
            repository,
            since,
            prefer_newer,
            rivals,
        }
    }

    async fn advance_cursor(&self, batch: &[T]) -> SyncResult<()> {
        let Some(newest) = batch.iter().map(|e| e.at()).max() else {
            return Ok(());
        };

        let current = self.since.get(T::KIND).await?;
        if current.is_some_and(|current| current >= newest) {
            return Ok(());
        }

        self.since.set(T::KIND, newest).await?;
        debug!(kind = %T::KIND, since = %newest, "Advanced pull cursor");
        Ok(())
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for PersistState<T> {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        let Transition::FetchStarted(batch) = transition else {
            return Err(unexpected("Persist", &transition));
        };

        let keyed: Vec<(EntityId, T)> = batch.iter().map(|e| (e.id(), e.clone())).collect();
        let resolve = self.prefer_newer.conflict_resolution();

        let results = match &self.rivals {
            Some(rivals) => {
                self.repository
                    .batch_update_with_rivals(keyed, &resolve, &**rivals)
                    .await?
            }
            None => self.repository.batch_update(keyed, &resolve).await?,
        };

        let ignored = results
            .iter()
            .filter(|(mode, _)| *mode == ConflictResolutionMode::Ignore)
            .count();
        info!(
            kind = %T::KIND,
            written = results.len() - ignored,
            ignored,
            "Persisted fetched changes"
        );

        self.advance_cursor(&batch).await?;
        Ok(Transition::FinishedPersisting)
    }
}

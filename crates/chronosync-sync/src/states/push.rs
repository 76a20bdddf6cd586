//! Push pipeline states
//!
//! Pushes dirty records to the server one at a time, lowest id first.
//!
//! ## Failure handling
//!
//! | Failure                      | Reaction                                      |
//! |------------------------------|-----------------------------------------------|
//! | 5xx from create/update       | status probe loop with growing backoff        |
//! | 4xx from create/update       | record marked `SyncFailed`, pushing continues |
//! | missing reason or entity     | run aborted                                   |
//! | anything else                | run aborted                                   |
//!
//! Local writes made after a successful push never overwrite an edit the
//! user made while the request was in flight: the stored record is compared
//! with the pushed one and kept when it changed.

use std::sync::Arc;

use chronosync_core::domain::{ConflictResolutionMode, SyncableEntity};
use chronosync_core::ports::{
    ApiError, ApiErrorKind, EntityApi, Repository, Scheduler, StatusApi,
};
use tracing::{debug, error, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::retry_delay::DelayProvider;
use crate::state_machine::StateHandler;
use crate::transition::{FailedPush, PushError, Transition};

use super::unexpected;

/// Conflict callback keeping the stored record if it changed since `pushed`
fn overwrite_if_unchanged<T: SyncableEntity>(
    pushed: T,
) -> impl Fn(Option<&T>, &T) -> anyhow::Result<ConflictResolutionMode> + Send + Sync {
    move |current: Option<&T>, _: &T| {
        Ok(match current {
            Some(current) if !current.has_changed_since(&pushed) => ConflictResolutionMode::Update,
            _ => ConflictResolutionMode::Ignore,
        })
    }
}

// ============================================================================
// PushState
// ============================================================================

/// Picks the next dirty record
pub struct PushState<T> {
    repository: Arc<dyn Repository<T>>,
}

impl<T> PushState<T> {
    pub fn new(repository: Arc<dyn Repository<T>>) -> Self {
        Self { repository }
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for PushState<T> {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        match transition {
            Transition::StartPushSync
            | Transition::CreatingFinished(_)
            | Transition::UpdatingSucceeded(_)
            | Transition::MarkedAsUnsyncable(_)
            | Transition::ServerIsAvailable => {}
            other => return Err(unexpected("Push", &other)),
        }

        let dirty = self
            .repository
            .get_all_matching(&|e: &T| e.is_dirty())
            .await?;
        let remaining = dirty.len();

        match dirty.into_iter().min_by_key(|e| e.id()) {
            None => {
                debug!(kind = %T::KIND, "Nothing to push");
                Ok(Transition::NothingToPush)
            }
            Some(entity) => {
                debug!(
                    kind = %T::KIND,
                    entity_id = %entity.id(),
                    remaining,
                    "Pushing entity"
                );
                Ok(Transition::PushEntity(entity))
            }
        }
    }
}

// ============================================================================
// PushOneEntityState
// ============================================================================

/// Chooses between create and update
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOneEntityState;

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for PushOneEntityState {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        let Transition::PushEntity(entity) = transition else {
            return Err(unexpected("PushOneEntity", &transition));
        };

        Ok(if entity.has_server_id() {
            Transition::UpdateEntity(entity)
        } else {
            Transition::CreateEntity(entity)
        })
    }
}

// ============================================================================
// CreateEntityState
// ============================================================================

/// Creates a record that was never pushed
pub struct CreateEntityState<T> {
    api: Arc<dyn EntityApi<T>>,
    repository: Arc<dyn Repository<T>>,
    delays: Arc<dyn DelayProvider>,
}

impl<T: SyncableEntity> CreateEntityState<T> {
    pub fn new(
        api: Arc<dyn EntityApi<T>>,
        repository: Arc<dyn Repository<T>>,
        delays: Arc<dyn DelayProvider>,
    ) -> Self {
        Self {
            api,
            repository,
            delays,
        }
    }

    async fn create(&self, entity: &T) -> Result<T, PushError> {
        let created = self.api.create(entity).await?.to_clean();

        // The local id is replaced either way so the record is never created twice
        let replacement = |stored: &T| {
            if stored.has_changed_since(entity) {
                info!(
                    local_id = %entity.id(),
                    server_id = %created.id(),
                    "Entity changed while being created, keeping local edits"
                );
                stored.rekeyed(created.id())
            } else {
                created.clone()
            }
        };

        self.repository
            .update_with(entity.id(), &replacement)
            .await
            .map_err(PushError::Repository)
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for CreateEntityState<T> {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        let Transition::CreateEntity(entity) = transition else {
            return Err(unexpected("CreateEntity", &transition));
        };

        match self.create(&entity).await {
            Ok(saved) => {
                self.delays.reset();
                info!(
                    local_id = %entity.id(),
                    server_id = %saved.id(),
                    "Entity created on server"
                );
                Ok(Transition::CreatingFinished(saved))
            }
            Err(reason) => {
                debug!(entity_id = %entity.id(), error = %reason, "Creating entity failed");
                Ok(Transition::CreatingFailed(FailedPush::new(reason, entity)))
            }
        }
    }
}

// ============================================================================
// UpdateEntityState
// ============================================================================

/// Pushes changes of a record the server already knows
pub struct UpdateEntityState<T> {
    api: Arc<dyn EntityApi<T>>,
    repository: Arc<dyn Repository<T>>,
    delays: Arc<dyn DelayProvider>,
}

impl<T: SyncableEntity> UpdateEntityState<T> {
    pub fn new(
        api: Arc<dyn EntityApi<T>>,
        repository: Arc<dyn Repository<T>>,
        delays: Arc<dyn DelayProvider>,
    ) -> Self {
        Self {
            api,
            repository,
            delays,
        }
    }

    async fn update(&self, entity: &T) -> Result<T, PushError> {
        let updated = self.api.update(entity).await?.to_clean();
        let guard = overwrite_if_unchanged(entity.clone());

        let (mode, saved) = self
            .repository
            .update_with_conflict_resolution(entity.id(), updated, &guard)
            .await
            .map_err(PushError::Repository)?;

        if mode == ConflictResolutionMode::Ignore {
            info!(
                entity_id = %entity.id(),
                "Entity changed while being updated, keeping local edits"
            );
        }
        Ok(saved)
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for UpdateEntityState<T> {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        let Transition::UpdateEntity(entity) = transition else {
            return Err(unexpected("UpdateEntity", &transition));
        };

        match self.update(&entity).await {
            Ok(saved) => {
                self.delays.reset();
                info!(entity_id = %saved.id(), "Entity updated on server");
                Ok(Transition::UpdatingSucceeded(saved))
            }
            Err(reason) => {
                debug!(entity_id = %entity.id(), error = %reason, "Updating entity failed");
                Ok(Transition::UpdatingFailed(FailedPush::new(reason, entity)))
            }
        }
    }
}

// ============================================================================
// UnsyncableEntityState
// ============================================================================

/// Classification of a failed push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// The failure payload lacks its reason or entity
    MissingArgument(&'static str),
    /// Transient 5xx failure, retried after backoff
    ServerError(ApiErrorKind),
    /// Terminal 4xx failure with the server's message
    ClientError(String),
    /// Anything else
    Unclassified(String),
}

/// Maps a failed push onto its [`FailureClass`]
pub fn classify_failure<T>(failed: &FailedPush<T>) -> FailureClass {
    let Some(reason) = &failed.reason else {
        return FailureClass::MissingArgument("reason");
    };
    if failed.entity.is_none() {
        return FailureClass::MissingArgument("entity");
    }

    match reason {
        PushError::Api(err) if err.is_server_error() => FailureClass::ServerError(err.kind()),
        PushError::Api(err @ ApiError::ClientError { .. }) => {
            FailureClass::ClientError(err.to_string())
        }
        other => FailureClass::Unclassified(other.to_string()),
    }
}

/// Decides between retrying and marking the record as unsyncable
pub struct UnsyncableEntityState<T> {
    repository: Arc<dyn Repository<T>>,
    delays: Arc<dyn DelayProvider>,
}

impl<T: SyncableEntity> UnsyncableEntityState<T> {
    pub fn new(repository: Arc<dyn Repository<T>>, delays: Arc<dyn DelayProvider>) -> Self {
        Self { repository, delays }
    }

    async fn mark_unsyncable(&self, entity: T, message: String) -> SyncResult<Transition<T>> {
        warn!(
            entity_id = %entity.id(),
            reason = %message,
            "Server rejected entity, marking as unsyncable"
        );

        let unsyncable = entity.to_unsyncable(message);
        let guard = overwrite_if_unchanged(entity.clone());
        let (_, written) = self
            .repository
            .update_with_conflict_resolution(entity.id(), unsyncable, &guard)
            .await?;

        self.delays.reset();
        Ok(Transition::MarkedAsUnsyncable(written))
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for UnsyncableEntityState<T> {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        let failed = match transition {
            Transition::CreatingFailed(failed) | Transition::UpdatingFailed(failed) => failed,
            other => return Err(unexpected("UnsyncableEntity", &other)),
        };

        let class = classify_failure(&failed);
        match (class, failed.entity) {
            (FailureClass::ClientError(message), Some(entity)) => {
                self.mark_unsyncable(entity, message).await
            }
            (FailureClass::ServerError(kind), _) => {
                warn!(kind = ?kind, "Server error while pushing, checking server status");
                Ok(Transition::CheckServerStatus)
            }
            (FailureClass::Unclassified(message), _) => {
                error!(error = %message, "Unclassified push failure");
                Err(SyncError::UnclassifiedFailure(message))
            }
            (FailureClass::MissingArgument(argument), _) => Err(SyncError::InvalidArgument(
                format!("failed push is missing its {argument}"),
            )),
            (FailureClass::ClientError(_), None) => Err(SyncError::InvalidArgument(
                "failed push is missing its entity".to_string(),
            )),
        }
    }
}

// ============================================================================
// CheckServerStatusState
// ============================================================================

/// Probes the server until it is available again
pub struct CheckServerStatusState {
    status_api: Arc<dyn StatusApi>,
    delays: Arc<dyn DelayProvider>,
    scheduler: Arc<dyn Scheduler>,
}

impl CheckServerStatusState {
    pub fn new(
        status_api: Arc<dyn StatusApi>,
        delays: Arc<dyn DelayProvider>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            status_api,
            delays,
            scheduler,
        }
    }
}

#[async_trait::async_trait]
impl<T: SyncableEntity> StateHandler<T> for CheckServerStatusState {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>> {
        match transition {
            Transition::CheckServerStatus | Transition::Retry => {}
            other => return Err(unexpected("CheckServerStatus", &other)),
        }

        let delay = match self.status_api.is_available().await {
            Ok(true) => {
                info!("Server is available again");
                return Ok(Transition::ServerIsAvailable);
            }
            Ok(false) => self.delays.next_fast_delay(),
            Err(err) if err.kind() == ApiErrorKind::InternalServerError => {
                self.delays.next_slow_delay()
            }
            Err(_) => self.delays.next_fast_delay(),
        };

        warn!(delay_secs = delay.as_secs_f64(), "Server unavailable, retrying later");
        self.scheduler.sleep(delay).await;
        Ok(Transition::Retry)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};
    use chronosync_cache::MemoryRepository;
    use chronosync_core::domain::{EntityId, SyncStatus, TimeEntry};

    use super::*;

    fn entry(id: i64) -> TimeEntry {
        let at = Utc.with_ymd_and_hms(2017, 9, 1, 12, 0, 0).unwrap();
        TimeEntry::new_local(EntityId::new(id), 1, "entry", at, at)
    }

    struct FixedDelays;

    impl DelayProvider for FixedDelays {
        fn next_fast_delay(&self) -> Duration {
            Duration::from_secs(10)
        }
        fn next_slow_delay(&self) -> Duration {
            Duration::from_secs(60)
        }
        fn reset(&self) {}
    }

    #[derive(Default)]
    struct RecordingScheduler {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait::async_trait]
    impl Scheduler for RecordingScheduler {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    struct Status(Result<bool, ApiError>);

    #[async_trait::async_trait]
    impl StatusApi for Status {
        async fn is_available(&self) -> Result<bool, ApiError> {
            self.0.clone()
        }
    }

    async fn check_status(status: Result<bool, ApiError>) -> (Transition<TimeEntry>, Vec<Duration>) {
        let scheduler = Arc::new(RecordingScheduler::default());
        let state =
            CheckServerStatusState::new(Arc::new(Status(status)), Arc::new(FixedDelays), scheduler.clone());
        let next = state.start(Transition::<TimeEntry>::Retry).await.unwrap();
        let slept = scheduler.slept.lock().unwrap().clone();
        (next, slept)
    }

    // -- classify_failure --

    #[test]
    fn test_classify_server_errors() {
        let failed = FailedPush::new(ApiError::from_status(500, "boom"), entry(1));
        assert_eq!(
            classify_failure(&failed),
            FailureClass::ServerError(ApiErrorKind::InternalServerError)
        );

        let failed = FailedPush::new(ApiError::from_status(503, "down"), entry(1));
        assert_eq!(
            classify_failure(&failed),
            FailureClass::ServerError(ApiErrorKind::ServerError)
        );
    }

    #[test]
    fn test_classify_client_error_keeps_message() {
        let failed = FailedPush::new(ApiError::from_status(400, "Workspace is required"), entry(1));
        assert_eq!(
            classify_failure(&failed),
            FailureClass::ClientError("Workspace is required".into())
        );
    }

    #[test]
    fn test_classify_missing_arguments() {
        let no_reason: FailedPush<TimeEntry> = FailedPush {
            reason: None,
            entity: Some(entry(1)),
        };
        assert_eq!(
            classify_failure(&no_reason),
            FailureClass::MissingArgument("reason")
        );

        let no_entity: FailedPush<TimeEntry> = FailedPush {
            reason: Some(ApiError::from_status(400, "x").into()),
            entity: None,
        };
        assert_eq!(
            classify_failure(&no_entity),
            FailureClass::MissingArgument("entity")
        );
    }

    #[test]
    fn test_classify_other_failures_as_unclassified() {
        let transport = FailedPush::new(ApiError::Transport("reset".into()), entry(1));
        assert!(matches!(
            classify_failure(&transport),
            FailureClass::Unclassified(_)
        ));

        let storage = FailedPush::new(PushError::Repository(anyhow::anyhow!("disk")), entry(1));
        assert_eq!(
            classify_failure(&storage),
            FailureClass::Unclassified("disk".into())
        );
    }

    // -- PushOneEntityState --

    #[tokio::test]
    async fn test_dispatch_by_server_id() {
        let next = PushOneEntityState
            .start(Transition::PushEntity(entry(-1)))
            .await
            .unwrap();
        assert!(matches!(next, Transition::CreateEntity(_)));

        let next = PushOneEntityState
            .start(Transition::PushEntity(entry(5)))
            .await
            .unwrap();
        assert!(matches!(next, Transition::UpdateEntity(_)));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unrelated_transition() {
        let result = StateHandler::<TimeEntry>::start(&PushOneEntityState, Transition::Retry).await;
        assert!(matches!(
            result,
            Err(SyncError::UnexpectedTransition { .. })
        ));
    }

    // -- UnsyncableEntityState argument checks --

    #[tokio::test]
    async fn test_unsyncable_routes_failures_without_storage() {
        struct NoRepository;

        #[async_trait::async_trait]
        impl Repository<TimeEntry> for NoRepository {
            async fn get_by_id(&self, _: EntityId) -> anyhow::Result<Option<TimeEntry>> {
                unreachable!()
            }
            async fn get_all(&self) -> anyhow::Result<Vec<TimeEntry>> {
                unreachable!()
            }
            async fn get_all_matching(
                &self,
                _: &(dyn for<'a> Fn(&'a TimeEntry) -> bool + Send + Sync),
            ) -> anyhow::Result<Vec<TimeEntry>> {
                unreachable!()
            }
            async fn create(&self, _: TimeEntry) -> anyhow::Result<TimeEntry> {
                unreachable!()
            }
            async fn update(&self, _: EntityId, _: TimeEntry) -> anyhow::Result<TimeEntry> {
                unreachable!()
            }
            async fn update_with(
                &self,
                _: EntityId,
                _: &(dyn for<'a> Fn(&'a TimeEntry) -> TimeEntry + Send + Sync),
            ) -> anyhow::Result<TimeEntry> {
                unreachable!()
            }
            async fn delete(&self, _: EntityId) -> anyhow::Result<()> {
                unreachable!()
            }
            async fn batch_update(
                &self,
                _: Vec<(EntityId, TimeEntry)>,
                _: &chronosync_core::ports::ConflictResolutionFn<'_, TimeEntry>,
            ) -> anyhow::Result<Vec<(ConflictResolutionMode, TimeEntry)>> {
                unreachable!()
            }
            async fn batch_update_with_rivals(
                &self,
                _: Vec<(EntityId, TimeEntry)>,
                _: &chronosync_core::ports::ConflictResolutionFn<'_, TimeEntry>,
                _: &dyn chronosync_core::ports::RivalsResolver<TimeEntry>,
            ) -> anyhow::Result<Vec<(ConflictResolutionMode, TimeEntry)>> {
                unreachable!()
            }
        }

        let state = UnsyncableEntityState::new(Arc::new(NoRepository), Arc::new(FixedDelays));
        let failed = FailedPush {
            reason: Some(ApiError::from_status(400, "x").into()),
            entity: None,
        };
        let result = state.start(Transition::UpdatingFailed(failed)).await;
        assert!(matches!(result, Err(SyncError::InvalidArgument(_))));

        let failed = FailedPush::new(ApiError::from_status(502, "bad gateway"), entry(1));
        let next = state.start(Transition::CreatingFailed(failed)).await.unwrap();
        assert!(matches!(next, Transition::CheckServerStatus));

        let failed = FailedPush::new(ApiError::Transport("reset".into()), entry(1));
        let result = state.start(Transition::CreatingFailed(failed)).await;
        assert!(matches!(result, Err(SyncError::UnclassifiedFailure(_))));
    }

    // -- Local edits made while a push is in flight --

    fn edited(entity: &TimeEntry, description: &str) -> TimeEntry {
        entity.clone().with_description(description).to_sync_needed()
    }

    /// Edits the stored record while the request is in flight
    struct EditingApi {
        repository: Arc<MemoryRepository<TimeEntry>>,
        rejection: Option<ApiError>,
    }

    impl EditingApi {
        async fn respond(&self, entity: &TimeEntry, id: i64) -> Result<TimeEntry, ApiError> {
            self.repository
                .update(entity.id(), edited(entity, "edited while pushing"))
                .await
                .unwrap();
            match &self.rejection {
                Some(err) => Err(err.clone()),
                None => Ok(entity.clone().with_id(EntityId::new(id))),
            }
        }
    }

    #[async_trait::async_trait]
    impl EntityApi<TimeEntry> for EditingApi {
        async fn create(&self, entity: &TimeEntry) -> Result<TimeEntry, ApiError> {
            self.respond(entity, 100).await
        }
        async fn update(&self, entity: &TimeEntry) -> Result<TimeEntry, ApiError> {
            self.respond(entity, entity.id().value()).await
        }
        async fn fetch_since(&self, _: Option<DateTime<Utc>>) -> Result<Vec<TimeEntry>, ApiError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_update_keeps_edit_made_during_request() {
        let repository = Arc::new(MemoryRepository::with_entities([entry(5)]));
        let api = Arc::new(EditingApi {
            repository: Arc::clone(&repository),
            rejection: None,
        });
        let state = UpdateEntityState::new(api, repository.clone(), Arc::new(FixedDelays));

        let next = state.start(Transition::UpdateEntity(entry(5))).await.unwrap();

        let Transition::UpdatingSucceeded(saved) = next else {
            panic!("unexpected transition {next:?}");
        };
        assert_eq!(saved.description(), "edited while pushing");
        let stored = repository.get_by_id(EntityId::new(5)).await.unwrap().unwrap();
        assert_eq!(stored.description(), "edited while pushing");
        assert_eq!(stored.sync_status(), SyncStatus::SyncNeeded);
    }

    #[tokio::test]
    async fn test_rejection_keeps_edit_made_during_request() {
        let repository = Arc::new(MemoryRepository::with_entities([entry(-1)]));
        let api = Arc::new(EditingApi {
            repository: Arc::clone(&repository),
            rejection: Some(ApiError::from_status(400, "Workspace is required")),
        });
        let delays: Arc<dyn DelayProvider> = Arc::new(FixedDelays);
        let create = CreateEntityState::new(api, repository.clone(), Arc::clone(&delays));
        let unsyncable = UnsyncableEntityState::new(repository.clone(), delays);

        let failed = create.start(Transition::CreateEntity(entry(-1))).await.unwrap();
        assert!(matches!(failed, Transition::CreatingFailed(_)));
        let next = unsyncable.start(failed).await.unwrap();

        let Transition::MarkedAsUnsyncable(written) = next else {
            panic!("unexpected transition {next:?}");
        };
        assert_eq!(written.description(), "edited while pushing");
        let stored = repository.get_by_id(EntityId::new(-1)).await.unwrap().unwrap();
        assert_eq!(stored.description(), "edited while pushing");
        assert_eq!(stored.sync_status(), SyncStatus::SyncNeeded);
        assert_eq!(stored.last_sync_error_message(), None);
    }

    #[tokio::test]
    async fn test_rejection_of_unchanged_entity_marks_it_failed() {
        let repository = Arc::new(MemoryRepository::with_entities([entry(-1)]));
        let state = UnsyncableEntityState::new(repository.clone(), Arc::new(FixedDelays));
        let failed = FailedPush::new(ApiError::from_status(400, "Workspace is required"), entry(-1));

        state.start(Transition::CreatingFailed(failed)).await.unwrap();

        let stored = repository.get_by_id(EntityId::new(-1)).await.unwrap().unwrap();
        assert_eq!(stored.sync_status(), SyncStatus::SyncFailed);
        assert!(stored.last_sync_error_message().is_some());
    }

    /// Lands a local edit right before each atomic replacement
    struct EditsBeforeReplace(MemoryRepository<TimeEntry>);

    #[async_trait::async_trait]
    impl Repository<TimeEntry> for EditsBeforeReplace {
        async fn get_by_id(&self, id: EntityId) -> anyhow::Result<Option<TimeEntry>> {
            self.0.get_by_id(id).await
        }
        async fn get_all(&self) -> anyhow::Result<Vec<TimeEntry>> {
            self.0.get_all().await
        }
        async fn get_all_matching(
            &self,
            predicate: &(dyn for<'a> Fn(&'a TimeEntry) -> bool + Send + Sync),
        ) -> anyhow::Result<Vec<TimeEntry>> {
            self.0.get_all_matching(predicate).await
        }
        async fn create(&self, entity: TimeEntry) -> anyhow::Result<TimeEntry> {
            self.0.create(entity).await
        }
        async fn update(&self, id: EntityId, entity: TimeEntry) -> anyhow::Result<TimeEntry> {
            self.0.update(id, entity).await
        }
        async fn update_with(
            &self,
            id: EntityId,
            replacement: &(dyn for<'a> Fn(&'a TimeEntry) -> TimeEntry + Send + Sync),
        ) -> anyhow::Result<TimeEntry> {
            if let Some(stored) = self.0.get_by_id(id).await? {
                self.0.update(id, edited(&stored, "edited before write")).await?;
            }
            self.0.update_with(id, replacement).await
        }
        async fn delete(&self, id: EntityId) -> anyhow::Result<()> {
            self.0.delete(id).await
        }
        async fn batch_update(
            &self,
            batch: Vec<(EntityId, TimeEntry)>,
            conflict_resolution: &chronosync_core::ports::ConflictResolutionFn<'_, TimeEntry>,
        ) -> anyhow::Result<Vec<(ConflictResolutionMode, TimeEntry)>> {
            self.0.batch_update(batch, conflict_resolution).await
        }
        async fn batch_update_with_rivals(
            &self,
            batch: Vec<(EntityId, TimeEntry)>,
            conflict_resolution: &chronosync_core::ports::ConflictResolutionFn<'_, TimeEntry>,
            rivals: &dyn chronosync_core::ports::RivalsResolver<TimeEntry>,
        ) -> anyhow::Result<Vec<(ConflictResolutionMode, TimeEntry)>> {
            self.0
                .batch_update_with_rivals(batch, conflict_resolution, rivals)
                .await
        }
    }

    struct AssignsServerId;

    #[async_trait::async_trait]
    impl EntityApi<TimeEntry> for AssignsServerId {
        async fn create(&self, entity: &TimeEntry) -> Result<TimeEntry, ApiError> {
            Ok(entity.clone().with_id(EntityId::new(100)))
        }
        async fn update(&self, entity: &TimeEntry) -> Result<TimeEntry, ApiError> {
            Ok(entity.clone())
        }
        async fn fetch_since(&self, _: Option<DateTime<Utc>>) -> Result<Vec<TimeEntry>, ApiError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_create_keeps_edit_landing_right_before_write() {
        let repository = Arc::new(EditsBeforeReplace(MemoryRepository::with_entities([
            entry(-1),
        ])));
        let state = CreateEntityState::new(
            Arc::new(AssignsServerId),
            repository.clone(),
            Arc::new(FixedDelays),
        );

        let next = state.start(Transition::CreateEntity(entry(-1))).await.unwrap();

        let Transition::CreatingFinished(saved) = next else {
            panic!("unexpected transition {next:?}");
        };
        assert_eq!(saved.id(), EntityId::new(100));
        assert!(repository.get_by_id(EntityId::new(-1)).await.unwrap().is_none());
        let stored = repository.get_by_id(EntityId::new(100)).await.unwrap().unwrap();
        assert_eq!(stored.description(), "edited before write");
        assert_eq!(stored.sync_status(), SyncStatus::SyncNeeded);
    }

    // -- CheckServerStatusState --

    #[tokio::test]
    async fn test_available_server_resumes_push() {
        let (next, slept) = check_status(Ok(true)).await;
        assert!(matches!(next, Transition::ServerIsAvailable));
        assert!(slept.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_server_uses_fast_delay() {
        let (next, slept) = check_status(Ok(false)).await;
        assert!(matches!(next, Transition::Retry));
        assert_eq!(slept, vec![Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn test_internal_server_error_uses_slow_delay() {
        let (next, slept) = check_status(Err(ApiError::from_status(500, "boom"))).await;
        assert!(matches!(next, Transition::Retry));
        assert_eq!(slept, vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn test_other_status_errors_use_fast_delay() {
        let (_, slept) = check_status(Err(ApiError::from_status(504, "timeout"))).await;
        assert_eq!(slept, vec![Duration::from_secs(10)]);

        let (_, slept) = check_status(Err(ApiError::Transport("offline".into()))).await;
        assert_eq!(slept, vec![Duration::from_secs(10)]);
    }
}

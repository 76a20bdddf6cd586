//! Sync manager
//!
//! Wires the pull and push states of one entity type into a total
//! transition table and exposes the orchestrator's entry points.
//!
//! ## Transition table
//!
//! | Outcome                                    | Handler            |
//! |--------------------------------------------|--------------------|
//! | `StartPullSync`                            | `FetchAllSince`    |
//! | `FetchStarted`                             | `Persist`          |
//! | `StartPushSync`, `CreatingFinished`,       | `Push`             |
//! | `UpdatingSucceeded`, `MarkedAsUnsyncable`, |                    |
//! | `ServerIsAvailable`                        |                    |
//! | `PushEntity`                               | `PushOneEntity`    |
//! | `CreateEntity`                             | `CreateEntity`     |
//! | `UpdateEntity`                             | `UpdateEntity`     |
//! | `CreatingFailed`, `UpdatingFailed`         | `UnsyncableEntity` |
//! | `CheckServerStatus`, `Retry`               | `CheckServerStatus`|
//! | `NothingToPush`, `FinishedPersisting`      | dead end           |

use std::sync::Arc;

use chronosync_conflict::PreferNewer;
use chronosync_core::config::SyncConfig;
use chronosync_core::domain::SyncableEntity;
use chronosync_core::ports::{
    EntityApi, Repository, RivalsResolver, Scheduler, SinceParameterRepository, StatusApi,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::orchestrator::{EntryPoints, StateMachineOrchestrator, SyncPhase};
use crate::retry_delay::{DelayProvider, RetryDelayService};
use crate::state_machine::{StateHandler, StateMachine, TransitionHandlerProvider};
use crate::states::{
    CheckServerStatusState, CreateEntityState, FetchAllSinceState, PersistState,
    PushOneEntityState, PushState, UnsyncableEntityState, UpdateEntityState,
};
use crate::transition::StateResult;

/// Outcomes that end a run
const DEAD_ENDS: [StateResult; 2] = [StateResult::NothingToPush, StateResult::FinishedPersisting];

/// Ports needed to synchronize one entity type
pub struct SyncDependencies<T> {
    pub repository: Arc<dyn Repository<T>>,
    pub entity_api: Arc<dyn EntityApi<T>>,
    pub status_api: Arc<dyn StatusApi>,
    pub since_parameters: Arc<dyn SinceParameterRepository>,
    /// Repairs rival records after a pull; `None` for types without rivals
    pub rivals: Option<Arc<dyn RivalsResolver<T>>>,
    pub scheduler: Arc<dyn Scheduler>,
}

/// Builds the transition table for one entity type
pub fn configure_transitions<T: SyncableEntity>(
    dependencies: SyncDependencies<T>,
    prefer_newer: PreferNewer<T>,
    delays: Arc<dyn DelayProvider>,
) -> SyncResult<TransitionHandlerProvider<T>> {
    let SyncDependencies {
        repository,
        entity_api,
        status_api,
        since_parameters,
        rivals,
        scheduler,
    } = dependencies;

    let fetch: Arc<dyn StateHandler<T>> = Arc::new(FetchAllSinceState::new(
        Arc::clone(&entity_api),
        Arc::clone(&since_parameters),
    ));
    let persist: Arc<dyn StateHandler<T>> = Arc::new(PersistState::new(
        Arc::clone(&repository),
        since_parameters,
        prefer_newer,
        rivals,
    ));
    let push: Arc<dyn StateHandler<T>> = Arc::new(PushState::new(Arc::clone(&repository)));
    let push_one: Arc<dyn StateHandler<T>> = Arc::new(PushOneEntityState);
    let create: Arc<dyn StateHandler<T>> = Arc::new(CreateEntityState::new(
        Arc::clone(&entity_api),
        Arc::clone(&repository),
        Arc::clone(&delays),
    ));
    let update: Arc<dyn StateHandler<T>> = Arc::new(UpdateEntityState::new(
        entity_api,
        Arc::clone(&repository),
        Arc::clone(&delays),
    ));
    let unsyncable: Arc<dyn StateHandler<T>> =
        Arc::new(UnsyncableEntityState::new(repository, Arc::clone(&delays)));
    let check_status: Arc<dyn StateHandler<T>> =
        Arc::new(CheckServerStatusState::new(status_api, delays, scheduler));

    let table = [
        (StateResult::StartPullSync, &fetch),
        (StateResult::FetchStarted, &persist),
        (StateResult::StartPushSync, &push),
        (StateResult::CreatingFinished, &push),
        (StateResult::UpdatingSucceeded, &push),
        (StateResult::MarkedAsUnsyncable, &push),
        (StateResult::ServerIsAvailable, &push),
        (StateResult::PushEntity, &push_one),
        (StateResult::CreateEntity, &create),
        (StateResult::UpdateEntity, &update),
        (StateResult::CreatingFailed, &unsyncable),
        (StateResult::UpdatingFailed, &unsyncable),
        (StateResult::CheckServerStatus, &check_status),
        (StateResult::Retry, &check_status),
    ];

    let mut provider = TransitionHandlerProvider::new();
    for (result, handler) in table {
        provider.configure_transition(result, Arc::clone(handler))?;
    }
    provider.ensure_total(&DEAD_ENDS)?;

    debug!(kind = %T::KIND, "Configured sync transitions");
    Ok(provider)
}

/// Pull and push synchronization of one entity type
pub struct SyncManager<T> {
    orchestrator: StateMachineOrchestrator<T>,
}

impl<T: SyncableEntity> SyncManager<T> {
    /// Creates a manager backing off with a randomly seeded [`RetryDelayService`]
    ///
    /// Fails if the retry settings are invalid. Must be called from within a
    /// tokio runtime.
    pub fn new(dependencies: SyncDependencies<T>, config: &SyncConfig) -> SyncResult<Self> {
        let errors = config.retry.validate();
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SyncError::InvalidConfig(message));
        }

        let delays = Arc::new(RetryDelayService::from_config(config.retry.clone()));
        Self::with_delay_provider(dependencies, config, delays)
    }

    /// Creates a manager backing off with `delays`
    pub fn with_delay_provider(
        dependencies: SyncDependencies<T>,
        config: &SyncConfig,
        delays: Arc<dyn DelayProvider>,
    ) -> SyncResult<Self> {
        let prefer_newer = PreferNewer::new(config.margin_of_error())?;
        let provider = configure_transitions(dependencies, prefer_newer, delays)?;
        let orchestrator =
            StateMachineOrchestrator::new(StateMachine::new(provider), EntryPoints::default())?;
        Ok(Self { orchestrator })
    }

    /// Starts pushing dirty records
    pub fn push_sync(&self) -> SyncResult<()> {
        self.orchestrator.start(SyncPhase::Push)
    }

    /// Starts fetching and persisting server changes
    pub fn pull_sync(&self) -> SyncResult<()> {
        self.orchestrator.start(SyncPhase::Pull)
    }

    /// Returns to the idle phase
    pub fn sleep(&self) -> SyncResult<()> {
        self.orchestrator.start(SyncPhase::Sleep)
    }

    /// Runs a pull followed by a push, waiting for each to finish
    pub async fn full_sync(&self) -> SyncResult<()> {
        for phase in [SyncPhase::Pull, SyncPhase::Push] {
            let mut complete = self.orchestrator.sync_complete();
            self.orchestrator.start(phase)?;
            wait_for(&mut complete).await;
        }
        Ok(())
    }

    /// Waits until the active run finishes
    ///
    /// Returns the phase of the finished run, or `None` if nothing was running.
    pub async fn wait_for_completion(&self) -> Option<SyncPhase> {
        let mut complete = self.orchestrator.sync_complete();
        if !self.orchestrator.is_syncing() {
            return None;
        }
        wait_for(&mut complete).await
    }

    pub fn state(&self) -> SyncPhase {
        self.orchestrator.state()
    }

    pub fn state_changes(&self) -> watch::Receiver<SyncPhase> {
        self.orchestrator.state_changes()
    }

    pub fn sync_complete(&self) -> broadcast::Receiver<SyncPhase> {
        self.orchestrator.sync_complete()
    }

    pub fn is_syncing(&self) -> bool {
        self.orchestrator.is_syncing()
    }
}

async fn wait_for(complete: &mut broadcast::Receiver<SyncPhase>) -> Option<SyncPhase> {
    loop {
        match complete.recv().await {
            Ok(phase) => return Some(phase),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed sync completion events");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

//! Error types for the sync engine

use chronosync_conflict::ConflictError;
use chronosync_core::ports::ApiError;
use thiserror::Error;

use crate::orchestrator::SyncPhase;
use crate::transition::StateResult;

/// Errors that can occur while configuring or running synchronization
#[derive(Debug, Error)]
pub enum SyncError {
    /// A second handler was registered for the same outcome
    #[error("Transition for {0} is already configured")]
    TransitionAlreadyConfigured(StateResult),

    /// Outcomes that have neither a handler nor a dead-end declaration
    #[error("State results without a handler or dead-end declaration: {0:?}")]
    UnconfiguredStateResults(Vec<StateResult>),

    /// An outcome was declared a dead end although it has a handler
    #[error("State result {0} has a handler and cannot be a dead end")]
    ConfiguredDeadEnd(StateResult),

    /// The state machine was started while a run was active
    #[error("State machine is already running")]
    AlreadyRunning,

    /// The orchestrator was asked to start while a run was active
    #[error("Cannot start {requested} while a {active} sync is in progress")]
    SyncInProgress {
        requested: SyncPhase,
        active: SyncPhase,
    },

    /// A handler received an outcome it is not wired for
    #[error("State {state} cannot handle {result}")]
    UnexpectedTransition {
        state: &'static str,
        result: StateResult,
    },

    /// The sync configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required argument was missing (programming error)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A push failure that is neither a server nor a client error
    #[error("Unclassified push failure: {0}")]
    UnclassifiedFailure(String),

    /// The remote API failed outside of the push retry loop
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Conflict resolver construction failed
    #[error("Conflict resolution error: {0}")]
    Conflict(#[from] ConflictError),

    /// A storage port failed
    #[error("Repository error: {0}")]
    Repository(#[from] anyhow::Error),
}

/// Result alias for sync engine operations
pub type SyncResult<T> = Result<T, SyncError>;

//! Outcome markers and transitions
//!
//! Every state handler finishes by producing a [`Transition`]: one of the
//! closed set of [`StateResult`] outcomes together with the payload the next
//! handler needs. The runtime looks the outcome up in its transition table
//! and hands the whole transition to the registered handler, which consumes
//! it.
//!
//! ## Wiring
//!
//! ```text
//!  StartPullSync ──► FetchAllSince ──FetchStarted──► Persist ──► FinishedPersisting (end)
//!
//!  StartPushSync ──► Push ──NothingToPush──► (end)
//!                     │ ▲
//!          PushEntity │ │ CreatingFinished / UpdatingSucceeded /
//!                     ▼ │ MarkedAsUnsyncable / ServerIsAvailable
//!                  PushOne ──CreateEntity──► Create ──CreatingFailed──┐
//!                         └─UpdateEntity──► Update ──UpdatingFailed──┤
//!                                                                    ▼
//!                        CheckServerStatus ◄──(5xx)── Unsyncable ──(4xx)──► MarkedAsUnsyncable
//!                          │   ▲
//!                          └───┘ Retry (after backoff)
//! ```

use std::fmt;

use chronosync_core::ports::ApiError;

// ============================================================================
// StateResult
// ============================================================================

/// Closed set of outcomes a state can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateResult {
    StartPullSync,
    FetchStarted,
    FinishedPersisting,
    StartPushSync,
    NothingToPush,
    PushEntity,
    CreateEntity,
    UpdateEntity,
    CreatingFinished,
    CreatingFailed,
    UpdatingSucceeded,
    UpdatingFailed,
    MarkedAsUnsyncable,
    CheckServerStatus,
    ServerIsAvailable,
    Retry,
}

impl StateResult {
    /// Every outcome, used to check the transition table for totality
    pub const ALL: [StateResult; 16] = [
        StateResult::StartPullSync,
        StateResult::FetchStarted,
        StateResult::FinishedPersisting,
        StateResult::StartPushSync,
        StateResult::NothingToPush,
        StateResult::PushEntity,
        StateResult::CreateEntity,
        StateResult::UpdateEntity,
        StateResult::CreatingFinished,
        StateResult::CreatingFailed,
        StateResult::UpdatingSucceeded,
        StateResult::UpdatingFailed,
        StateResult::MarkedAsUnsyncable,
        StateResult::CheckServerStatus,
        StateResult::ServerIsAvailable,
        StateResult::Retry,
    ];
}

impl fmt::Display for StateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ============================================================================
// Push failure payload
// ============================================================================

/// Why a create or update attempt failed
#[derive(Debug)]
pub enum PushError {
    /// The remote API rejected or failed the request
    Api(ApiError),
    /// Writing the server's answer back to the local store failed
    Repository(anyhow::Error),
}

impl fmt::Display for PushError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Api(err) => write!(f, "{err}"),
            PushError::Repository(err) => write!(f, "{err:#}"),
        }
    }
}

impl From<ApiError> for PushError {
    fn from(err: ApiError) -> Self {
        PushError::Api(err)
    }
}

/// Payload of `CreatingFailed` / `UpdatingFailed`
///
/// Both fields are optional so that a malformed failure can be detected
/// and rejected by the unsyncable state instead of being assumed away.
#[derive(Debug)]
pub struct FailedPush<T> {
    pub reason: Option<PushError>,
    pub entity: Option<T>,
}

impl<T> FailedPush<T> {
    pub fn new(reason: impl Into<PushError>, entity: T) -> Self {
        Self {
            reason: Some(reason.into()),
            entity: Some(entity),
        }
    }
}

// ============================================================================
// Transition
// ============================================================================

/// An outcome bound to its payload
#[derive(Debug)]
pub enum Transition<T> {
    StartPullSync,
    FetchStarted(Vec<T>),
    FinishedPersisting,
    StartPushSync,
    NothingToPush,
    PushEntity(T),
    CreateEntity(T),
    UpdateEntity(T),
    CreatingFinished(T),
    CreatingFailed(FailedPush<T>),
    UpdatingSucceeded(T),
    UpdatingFailed(FailedPush<T>),
    MarkedAsUnsyncable(T),
    CheckServerStatus,
    ServerIsAvailable,
    Retry,
}

impl<T> Transition<T> {
    /// Outcome marker of this transition
    pub fn result(&self) -> StateResult {
        match self {
            Transition::StartPullSync => StateResult::StartPullSync,
            Transition::FetchStarted(_) => StateResult::FetchStarted,
            Transition::FinishedPersisting => StateResult::FinishedPersisting,
            Transition::StartPushSync => StateResult::StartPushSync,
            Transition::NothingToPush => StateResult::NothingToPush,
            Transition::PushEntity(_) => StateResult::PushEntity,
            Transition::CreateEntity(_) => StateResult::CreateEntity,
            Transition::UpdateEntity(_) => StateResult::UpdateEntity,
            Transition::CreatingFinished(_) => StateResult::CreatingFinished,
            Transition::CreatingFailed(_) => StateResult::CreatingFailed,
            Transition::UpdatingSucceeded(_) => StateResult::UpdatingSucceeded,
            Transition::UpdatingFailed(_) => StateResult::UpdatingFailed,
            Transition::MarkedAsUnsyncable(_) => StateResult::MarkedAsUnsyncable,
            Transition::CheckServerStatus => StateResult::CheckServerStatus,
            Transition::ServerIsAvailable => StateResult::ServerIsAvailable,
            Transition::Retry => StateResult::Retry,
        }
    }

    /// Builds the transition of an outcome that carries no payload
    pub fn without_payload(result: StateResult) -> Option<Self> {
        match result {
            StateResult::StartPullSync => Some(Transition::StartPullSync),
            StateResult::FinishedPersisting => Some(Transition::FinishedPersisting),
            StateResult::StartPushSync => Some(Transition::StartPushSync),
            StateResult::NothingToPush => Some(Transition::NothingToPush),
            StateResult::CheckServerStatus => Some(Transition::CheckServerStatus),
            StateResult::ServerIsAvailable => Some(Transition::ServerIsAvailable),
            StateResult::Retry => Some(Transition::Retry),
            StateResult::FetchStarted
            | StateResult::PushEntity
            | StateResult::CreateEntity
            | StateResult::UpdateEntity
            | StateResult::CreatingFinished
            | StateResult::CreatingFailed
            | StateResult::UpdatingSucceeded
            | StateResult::UpdatingFailed
            | StateResult::MarkedAsUnsyncable => None,
        }
    }
}

//! State handlers of the sync state machine
//!
//! - [`push`] - Pushes dirty records one at a time with server backoff
//! - [`pull`] - Fetches server changes since the cursor and persists them

pub mod pull;
pub mod push;

pub use pull::{FetchAllSinceState, PersistState};
pub use push::{
    classify_failure, CheckServerStatusState, CreateEntityState, FailureClass,
    PushOneEntityState, PushState, UnsyncableEntityState, UpdateEntityState,
};

use crate::error::SyncError;
use crate::transition::Transition;

/// Error for a handler that received an outcome it is not wired for
pub(crate) fn unexpected<T>(state: &'static str, transition: &Transition<T>) -> SyncError {
    SyncError::UnexpectedTransition {
        state,
        result: transition.result(),
    }
}

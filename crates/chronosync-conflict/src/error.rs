//! Error types for conflict resolution

use thiserror::Error;

/// Errors that can occur while resolving a conflict
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// The resolver was asked to judge a missing incoming version
    #[error("incoming entity is required for conflict resolution")]
    MissingIncomingEntity,

    /// A margin of error that does not fit a timestamp offset
    #[error("margin of error out of range: {0:?}")]
    MarginOutOfRange(std::time::Duration),
}

//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as constructing entities with inconsistent field values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A time entry would stop before it starts
    #[error("Stop time {stop} is before start time {start}")]
    StopBeforeStart {
        /// RFC 3339 start timestamp
        start: String,
        /// RFC 3339 stop timestamp
        stop: String,
    },

    /// Sync status and error message disagree
    #[error("Sync error message must be present iff status is SyncFailed (status: {0})")]
    InconsistentSyncError(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Unknown entity kind name
    #[error("Unknown entity kind: {0}")]
    UnknownEntityKind(String),
}

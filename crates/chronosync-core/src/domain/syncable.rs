//! Sync contract shared by every synchronized record
//!
//! ## Sync status lifecycle
//!
//! ```text
//!   local edit ──► SyncNeeded ──── push ok ────► InSync ◄── pulled from server
//!                     │    ▲                         │
//!                     │    └──── local edit ─────────┘
//!                     │
//!                     └── client error (4xx) ──► SyncFailed (+ error message)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{EntityId, EntityKind};

// ============================================================================
// SyncStatus
// ============================================================================

/// Synchronization status of a local record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local copy matches the last known server version
    #[default]
    InSync,
    /// Local changes are waiting to be pushed
    SyncNeeded,
    /// The server rejected the last push; see the entity's error message
    SyncFailed,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::InSync => write!(f, "in_sync"),
            SyncStatus::SyncNeeded => write!(f, "sync_needed"),
            SyncStatus::SyncFailed => write!(f, "sync_failed"),
        }
    }
}

// ============================================================================
// ConflictResolutionMode
// ============================================================================

/// Verdict of comparing a locally known record against an incoming version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictResolutionMode {
    /// No local record exists; store the incoming one
    Create,
    /// Replace the local record with the incoming one
    Update,
    /// Remove the local record
    Delete,
    /// Keep the local record untouched
    Ignore,
}

impl fmt::Display for ConflictResolutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictResolutionMode::Create => write!(f, "create"),
            ConflictResolutionMode::Update => write!(f, "update"),
            ConflictResolutionMode::Delete => write!(f, "delete"),
            ConflictResolutionMode::Ignore => write!(f, "ignore"),
        }
    }
}

// ============================================================================
// SyncableEntity
// ============================================================================

/// A record participating in synchronization
///
/// Implementors are plain values: every status change produces a new value
/// instead of mutating in place, so the push pipeline can keep the version
/// it pushed and compare it with whatever the repository holds afterwards.
pub trait SyncableEntity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Kind used to key the per-type sync cursor
    const KIND: EntityKind;

    /// Stable identity of the record
    fn id(&self) -> EntityId;

    /// Last-modified timestamp, authoritative for ordering
    fn at(&self) -> DateTime<Utc>;

    /// Current sync status
    fn sync_status(&self) -> SyncStatus;

    /// Reason of the last rejected push (present iff status is `SyncFailed`)
    fn last_sync_error_message(&self) -> Option<&str>;

    /// Server-side deletion tombstone
    fn server_deleted_at(&self) -> Option<DateTime<Utc>>;

    /// Returns a copy stored under `id`, every other field unchanged
    fn rekeyed(&self, id: EntityId) -> Self;

    /// Returns a copy with the given status and error message
    fn with_sync_status(&self, status: SyncStatus, error_message: Option<String>) -> Self;

    /// Returns true if any user-visible field differs from `original`
    ///
    /// Sync bookkeeping (`sync_status`, `last_sync_error_message`) and the
    /// `at` timestamp are not compared.
    fn has_changed_since(&self, original: &Self) -> bool;

    /// Returns true if the record already exists on the server
    fn has_server_id(&self) -> bool {
        self.id().is_server_assigned()
    }

    /// Returns true if the record has local changes waiting to be pushed
    fn is_dirty(&self) -> bool {
        self.sync_status() == SyncStatus::SyncNeeded
    }

    /// Returns true if the record carries a server deletion tombstone
    fn is_deleted(&self) -> bool {
        self.server_deleted_at().is_some()
    }

    /// Copy marked as matching the server
    fn to_clean(&self) -> Self {
        self.with_sync_status(SyncStatus::InSync, None)
    }

    /// Copy marked as waiting to be pushed
    fn to_sync_needed(&self) -> Self {
        self.with_sync_status(SyncStatus::SyncNeeded, None)
    }

    /// Copy marked as rejected by the server with the given reason
    fn to_unsyncable(&self, reason: impl Into<String>) -> Self {
        self.with_sync_status(SyncStatus::SyncFailed, Some(reason.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_default_is_in_sync() {
        assert_eq!(SyncStatus::default(), SyncStatus::InSync);
    }

    #[test]
    fn test_sync_status_display() {
        assert_eq!(SyncStatus::SyncNeeded.to_string(), "sync_needed");
        assert_eq!(SyncStatus::SyncFailed.to_string(), "sync_failed");
    }

    #[test]
    fn test_conflict_resolution_mode_display() {
        assert_eq!(ConflictResolutionMode::Ignore.to_string(), "ignore");
        assert_eq!(ConflictResolutionMode::Delete.to_string(), "delete");
    }
}

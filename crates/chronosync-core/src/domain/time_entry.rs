//! TimeEntry domain entity
//!
//! A time entry tracks one span of work. An entry without a `stop` time is
//! *running*; across the whole local store at most one entry may be running
//! at a time. Two running entries are "rivals" and get repaired by the
//! rivals resolver after merges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{EntityId, EntityKind};
use super::syncable::{SyncStatus, SyncableEntity};

/// A time tracking record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    id: EntityId,
    workspace_id: i64,
    project_id: Option<i64>,
    task_id: Option<i64>,
    description: String,
    billable: bool,
    tags: Vec<String>,
    start: DateTime<Utc>,
    stop: Option<DateTime<Utc>>,
    at: DateTime<Utc>,
    sync_status: SyncStatus,
    last_sync_error_message: Option<String>,
    server_deleted_at: Option<DateTime<Utc>>,
}

impl TimeEntry {
    /// Creates a running, clean entry
    pub fn new(
        id: EntityId,
        workspace_id: i64,
        description: impl Into<String>,
        start: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workspace_id,
            project_id: None,
            task_id: None,
            description: description.into(),
            billable: false,
            tags: Vec::new(),
            start,
            stop: None,
            at,
            sync_status: SyncStatus::InSync,
            last_sync_error_message: None,
            server_deleted_at: None,
        }
    }

    /// Creates an entry that was started locally and never pushed
    pub fn new_local(
        local_id: EntityId,
        workspace_id: i64,
        description: impl Into<String>,
        start: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(local_id, workspace_id, description, start, at).to_sync_needed()
    }

    // --- Builders ---

    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = id;
        self
    }

    pub fn with_stop(mut self, stop: Option<DateTime<Utc>>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_project(mut self, project_id: Option<i64>, task_id: Option<i64>) -> Self {
        self.project_id = project_id;
        self.task_id = task_id;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_billable(mut self, billable: bool) -> Self {
        self.billable = billable;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    pub fn with_server_deleted_at(mut self, deleted_at: Option<DateTime<Utc>>) -> Self {
        self.server_deleted_at = deleted_at;
        self
    }

    /// Stops the entry at `stop` and marks it as needing a push
    pub fn stopped_at(&self, stop: DateTime<Utc>) -> Self {
        let mut stopped = self.clone().with_stop(Some(stop));
        stopped.sync_status = SyncStatus::SyncNeeded;
        stopped.last_sync_error_message = None;
        stopped
    }

    // --- Accessors ---

    pub fn workspace_id(&self) -> i64 {
        self.workspace_id
    }

    pub fn project_id(&self) -> Option<i64> {
        self.project_id
    }

    pub fn task_id(&self) -> Option<i64> {
        self.task_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn billable(&self) -> bool {
        self.billable
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stop(&self) -> Option<DateTime<Utc>> {
        self.stop
    }

    /// Returns true if the entry has no stop time
    pub fn is_running(&self) -> bool {
        self.stop.is_none()
    }

    /// Checks field-level invariants
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(stop) = self.stop {
            if stop < self.start {
                return Err(DomainError::StopBeforeStart {
                    start: self.start.to_rfc3339(),
                    stop: stop.to_rfc3339(),
                });
            }
        }

        let failed = self.sync_status == SyncStatus::SyncFailed;
        if failed != self.last_sync_error_message.is_some() {
            return Err(DomainError::InconsistentSyncError(
                self.sync_status.to_string(),
            ));
        }

        Ok(())
    }
}

impl SyncableEntity for TimeEntry {
    const KIND: EntityKind = EntityKind::TimeEntries;

    fn id(&self) -> EntityId {
        self.id
    }

    fn at(&self) -> DateTime<Utc> {
        self.at
    }

    fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    fn last_sync_error_message(&self) -> Option<&str> {
        self.last_sync_error_message.as_deref()
    }

    fn server_deleted_at(&self) -> Option<DateTime<Utc>> {
        self.server_deleted_at
    }

    fn rekeyed(&self, id: EntityId) -> Self {
        self.clone().with_id(id)
    }

    fn with_sync_status(&self, status: SyncStatus, error_message: Option<String>) -> Self {
        let mut copy = self.clone();
        copy.sync_status = status;
        copy.last_sync_error_message = match status {
            SyncStatus::SyncFailed => Some(error_message.unwrap_or_default()),
            SyncStatus::InSync | SyncStatus::SyncNeeded => None,
        };
        copy
    }

    fn has_changed_since(&self, original: &Self) -> bool {
        self.id != original.id
            || self.workspace_id != original.workspace_id
            || self.project_id != original.project_id
            || self.task_id != original.task_id
            || self.description != original.description
            || self.billable != original.billable
            || self.tags != original.tags
            || self.start != original.start
            || self.stop != original.stop
            || self.server_deleted_at != original.server_deleted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 9, 10, 12, 0, 0).unwrap()
    }

    fn entry() -> TimeEntry {
        TimeEntry::new(EntityId::new(1), 10, "Writing docs", start(), start())
    }

    #[test]
    fn test_new_entry_is_running_and_clean() {
        let te = entry();
        assert!(te.is_running());
        assert_eq!(te.sync_status(), SyncStatus::InSync);
        assert!(te.last_sync_error_message().is_none());
        assert!(te.validate().is_ok());
    }

    #[test]
    fn test_new_local_entry_is_dirty() {
        let te = TimeEntry::new_local(EntityId::new(-1), 10, "x", start(), start());
        assert!(te.is_dirty());
        assert!(!te.has_server_id());
    }

    #[test]
    fn test_stopped_at_marks_sync_needed() {
        let stop = start() + Duration::hours(2);
        let stopped = entry().stopped_at(stop);
        assert_eq!(stopped.stop(), Some(stop));
        assert_eq!(stopped.sync_status(), SyncStatus::SyncNeeded);
    }

    #[test]
    fn test_to_unsyncable_sets_message() {
        let failed = entry().to_sync_needed().to_unsyncable("Bad request");
        assert_eq!(failed.sync_status(), SyncStatus::SyncFailed);
        assert_eq!(failed.last_sync_error_message(), Some("Bad request"));
        assert!(failed.validate().is_ok());

        let clean = failed.to_clean();
        assert!(clean.last_sync_error_message().is_none());
    }

    #[test]
    fn test_rekeyed_keeps_local_changes() {
        let local = TimeEntry::new_local(EntityId::new(-3), 10, "draft", start(), start());
        let rekeyed = local.rekeyed(EntityId::new(77));
        assert_eq!(rekeyed.id(), EntityId::new(77));
        assert!(rekeyed.is_dirty());
        assert_eq!(rekeyed.description(), "draft");
    }

    #[test]
    fn test_validate_rejects_stop_before_start() {
        let te = entry().with_stop(Some(start() - Duration::minutes(1)));
        assert!(matches!(
            te.validate(),
            Err(DomainError::StopBeforeStart { .. })
        ));
    }

    #[test]
    fn test_has_changed_since_ignores_sync_fields() {
        let original = entry().to_sync_needed();
        let failed = original
            .to_unsyncable("nope")
            .with_at(start() + Duration::days(1));
        assert!(!failed.has_changed_since(&original));

        let edited = original.clone().with_description("Reviewing docs");
        assert!(edited.has_changed_since(&original));
    }
}

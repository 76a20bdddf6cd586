//! Rival repair for time entries
//!
//! At most one time entry may be running. When a merge leaves two running
//! entries behind, the one modified earlier is stopped at the start of the
//! next entry that began after it, or now when no such entry exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chronosync_core::domain::{SyncableEntity, TimeEntry};
use chronosync_core::ports::{RivalPredicate, RivalsResolver, TimeService};
use tracing::info;

/// Keeps the "single running entry" invariant of time entries
pub struct TimeEntryRivalsResolver {
    time_service: Arc<dyn TimeService>,
}

impl TimeEntryRivalsResolver {
    pub fn new(time_service: Arc<dyn TimeService>) -> Self {
        Self { time_service }
    }

    fn stop(&self, entry: &TimeEntry, all_entries: &[TimeEntry]) -> TimeEntry {
        let stop = next_start_after(entry.start(), all_entries)
            .unwrap_or_else(|| self.time_service.current_date_time());

        info!(
            entry_id = %entry.id(),
            stop = %stop,
            "Stopping rival running time entry"
        );
        entry.stopped_at(stop)
    }
}

/// Earliest start strictly after `start` in `entries`
fn next_start_after(start: DateTime<Utc>, entries: &[TimeEntry]) -> Option<DateTime<Utc>> {
    entries
        .iter()
        .map(TimeEntry::start)
        .filter(|candidate| *candidate > start)
        .min()
}

impl RivalsResolver<TimeEntry> for TimeEntryRivalsResolver {
    fn can_have_rival(&self, entity: &TimeEntry) -> bool {
        entity.is_running()
    }

    fn are_rivals(&self, entity: &TimeEntry) -> RivalPredicate<TimeEntry> {
        if !self.can_have_rival(entity) {
            return Box::new(|_| false);
        }

        let id = entity.id();
        Box::new(move |other: &TimeEntry| other.is_running() && other.id() != id)
    }

    fn fix_rivals(
        &self,
        entity: &TimeEntry,
        rival: &TimeEntry,
        all_entities: &[TimeEntry],
    ) -> (TimeEntry, TimeEntry) {
        if rival.at() < entity.at() {
            (entity.clone(), self.stop(rival, all_entities))
        } else {
            (self.stop(entity, all_entities), rival.clone())
        }
    }
}

//! PreferNewer conflict resolution
//!
//! Decides what happens to the locally stored version of a record when a
//! version of the same record arrives from the server.
//!
//! ```text
//!   incoming missing ─────────────────────────────► error
//!   existing missing ── incoming deleted ─────────► Ignore
//!                    └─ otherwise ────────────────► Create
//!   incoming deleted ─────────────────────────────► Delete
//!   existing dirty ──── incoming.at > existing.at + margin ─► Update
//!                   └── otherwise ────────────────► Ignore
//!   existing clean ───────────────────────────────► Update
//! ```
//!
//! A tombstone always wins, even over an unpushed local edit. A dirty local
//! record is only overwritten by a server version that is newer by more than
//! the margin of error, which absorbs clock skew between devices.

use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chronosync_core::domain::{ConflictResolutionMode, SyncStatus, SyncableEntity};
use tracing::debug;

use crate::error::ConflictError;

/// Grace window applied when none is configured
pub const DEFAULT_MARGIN_OF_ERROR: Duration = Duration::from_secs(5);

/// Exposes the fields [`PreferNewer`] compares
pub trait SyncSelector<T>: Send + Sync {
    fn last_modified(&self, entity: &T) -> DateTime<Utc>;
    fn is_in_sync(&self, entity: &T) -> bool;
    fn is_deleted(&self, entity: &T) -> bool;
}

/// Selector for every [`SyncableEntity`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncableSelector;

impl<T: SyncableEntity> SyncSelector<T> for SyncableSelector {
    fn last_modified(&self, entity: &T) -> DateTime<Utc> {
        entity.at()
    }

    fn is_in_sync(&self, entity: &T) -> bool {
        entity.sync_status() == SyncStatus::InSync
    }

    fn is_deleted(&self, entity: &T) -> bool {
        entity.is_deleted()
    }
}

/// Last-writer-wins resolver with a grace window for dirty local records
pub struct PreferNewer<T, S = SyncableSelector> {
    margin_of_error: chrono::Duration,
    selector: S,
    _entity: PhantomData<fn() -> T>,
}

impl<T: SyncableEntity> PreferNewer<T, SyncableSelector> {
    /// Creates a resolver using the entity's own sync fields
    pub fn new(margin_of_error: Duration) -> Result<Self, ConflictError> {
        Self::with_selector(margin_of_error, SyncableSelector)
    }
}

impl<T: SyncableEntity> Default for PreferNewer<T, SyncableSelector> {
    fn default() -> Self {
        Self {
            margin_of_error: chrono::Duration::seconds(5),
            selector: SyncableSelector,
            _entity: PhantomData,
        }
    }
}

impl<T, S> PreferNewer<T, S>
where
    T: Send + Sync,
    S: SyncSelector<T>,
{
    /// Creates a resolver reading timestamps and flags through `selector`
    pub fn with_selector(margin_of_error: Duration, selector: S) -> Result<Self, ConflictError> {
        let margin_of_error = chrono::Duration::from_std(margin_of_error)
            .map_err(|_| ConflictError::MarginOutOfRange(margin_of_error))?;
        Ok(Self {
            margin_of_error,
            selector,
            _entity: PhantomData,
        })
    }

    /// Configured grace window
    pub fn margin_of_error(&self) -> chrono::Duration {
        self.margin_of_error
    }

    /// Compares the stored version with the incoming one
    pub fn resolve(
        &self,
        existing: Option<&T>,
        incoming: Option<&T>,
    ) -> Result<ConflictResolutionMode, ConflictError> {
        let incoming = incoming.ok_or(ConflictError::MissingIncomingEntity)?;
        let incoming_deleted = self.selector.is_deleted(incoming);

        let Some(existing) = existing else {
            return Ok(if incoming_deleted {
                ConflictResolutionMode::Ignore
            } else {
                ConflictResolutionMode::Create
            });
        };

        if incoming_deleted {
            return Ok(ConflictResolutionMode::Delete);
        }

        if self.selector.is_in_sync(existing) {
            return Ok(ConflictResolutionMode::Update);
        }

        let incoming_at = self.selector.last_modified(incoming);
        let threshold = self
            .selector
            .last_modified(existing)
            .checked_add_signed(self.margin_of_error);

        match threshold {
            Some(threshold) if incoming_at > threshold => Ok(ConflictResolutionMode::Update),
            _ => {
                debug!(
                    incoming_at = %incoming_at,
                    "Keeping dirty local version, incoming change is within the margin of error"
                );
                Ok(ConflictResolutionMode::Ignore)
            }
        }
    }

    /// Adapts the resolver to the repository's conflict callback
    pub fn conflict_resolution(
        &self,
    ) -> impl Fn(Option<&T>, &T) -> anyhow::Result<ConflictResolutionMode> + Send + Sync + '_ {
        move |existing: Option<&T>, incoming: &T| Ok(self.resolve(existing, Some(incoming))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chronosync_core::domain::{EntityId, TimeEntry};

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 9, 10, 12, 0, 0).unwrap()
    }

    fn clean_at(at: DateTime<Utc>) -> TimeEntry {
        TimeEntry::new(EntityId::new(1), 1, "entry", t(), at)
    }

    fn dirty_at(at: DateTime<Utc>) -> TimeEntry {
        clean_at(at).to_sync_needed()
    }

    fn deleted() -> TimeEntry {
        clean_at(t()).with_server_deleted_at(Some(t()))
    }

    fn resolver() -> PreferNewer<TimeEntry> {
        PreferNewer::new(DEFAULT_MARGIN_OF_ERROR).unwrap()
    }

    #[test]
    fn test_missing_incoming_is_an_error() {
        let existing = clean_at(t());
        assert_eq!(
            resolver().resolve(Some(&existing), None),
            Err(ConflictError::MissingIncomingEntity)
        );
        assert_eq!(
            resolver().resolve(None, None),
            Err(ConflictError::MissingIncomingEntity)
        );
    }

    #[test]
    fn test_creates_when_nothing_is_stored() {
        let incoming = clean_at(t());
        assert_eq!(
            resolver().resolve(None, Some(&incoming)),
            Ok(ConflictResolutionMode::Create)
        );
    }

    #[test]
    fn test_ignores_deleted_incoming_when_nothing_is_stored() {
        assert_eq!(
            resolver().resolve(None, Some(&deleted())),
            Ok(ConflictResolutionMode::Ignore)
        );
    }

    #[test]
    fn test_ignores_incoming_inside_margin_of_error() {
        let existing = dirty_at(t());
        let incoming = clean_at(t() + chrono::Duration::seconds(1));
        assert_eq!(
            resolver().resolve(Some(&existing), Some(&incoming)),
            Ok(ConflictResolutionMode::Ignore)
        );
    }

    #[test]
    fn test_ignores_incoming_exactly_at_margin_of_error() {
        let existing = dirty_at(t());
        let incoming = clean_at(t() + chrono::Duration::seconds(5));
        assert_eq!(
            resolver().resolve(Some(&existing), Some(&incoming)),
            Ok(ConflictResolutionMode::Ignore)
        );
    }

    #[test]
    fn test_updates_when_incoming_is_outside_margin_of_error() {
        let existing = dirty_at(t());
        let incoming = clean_at(t() + chrono::Duration::seconds(10));
        assert_eq!(
            resolver().resolve(Some(&existing), Some(&incoming)),
            Ok(ConflictResolutionMode::Update)
        );
    }

    #[test]
    fn test_deleted_incoming_wins_over_dirty_existing() {
        let existing = dirty_at(t() + chrono::Duration::days(1));
        assert_eq!(
            resolver().resolve(Some(&existing), Some(&deleted())),
            Ok(ConflictResolutionMode::Delete)
        );
    }

    #[test]
    fn test_clean_existing_is_always_updated() {
        let existing = clean_at(t());
        for offset in [-3600, 0, 1, 3600] {
            let incoming = clean_at(t() + chrono::Duration::seconds(offset));
            assert_eq!(
                resolver().resolve(Some(&existing), Some(&incoming)),
                Ok(ConflictResolutionMode::Update)
            );
        }
    }

    #[test]
    fn test_failed_existing_counts_as_dirty() {
        let existing = dirty_at(t()).to_unsyncable("Bad request");
        let incoming = clean_at(t() + chrono::Duration::seconds(2));
        assert_eq!(
            resolver().resolve(Some(&existing), Some(&incoming)),
            Ok(ConflictResolutionMode::Ignore)
        );
    }

    #[test]
    fn test_zero_margin_updates_on_any_newer_incoming() {
        let resolver = PreferNewer::<TimeEntry>::new(Duration::ZERO).unwrap();
        let existing = dirty_at(t());
        let incoming = clean_at(t() + chrono::Duration::seconds(1));
        assert_eq!(
            resolver.resolve(Some(&existing), Some(&incoming)),
            Ok(ConflictResolutionMode::Update)
        );
    }

    #[test]
    fn test_conflict_resolution_callback_delegates() {
        let resolver = resolver();
        let callback = resolver.conflict_resolution();
        let incoming = clean_at(t());
        assert_eq!(
            callback(None, &incoming).unwrap(),
            ConflictResolutionMode::Create
        );
    }

    #[test]
    fn test_custom_selector() {
        struct AlwaysDirty;
        impl SyncSelector<TimeEntry> for AlwaysDirty {
            fn last_modified(&self, entity: &TimeEntry) -> DateTime<Utc> {
                entity.at()
            }
            fn is_in_sync(&self, _: &TimeEntry) -> bool {
                false
            }
            fn is_deleted(&self, _: &TimeEntry) -> bool {
                false
            }
        }

        let resolver = PreferNewer::with_selector(DEFAULT_MARGIN_OF_ERROR, AlwaysDirty).unwrap();
        let existing = clean_at(t());
        let incoming = clean_at(t() + chrono::Duration::seconds(1));
        assert_eq!(
            resolver.resolve(Some(&existing), Some(&incoming)),
            Ok(ConflictResolutionMode::Ignore)
        );
    }
}

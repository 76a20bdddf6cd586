//! Chronosync Conflict - Conflict resolution and invariant repair
//!
//! Provides:
//! - Timestamp-based resolution of incoming server versions ([`PreferNewer`])
//! - Repair of the "at most one running time entry" invariant
//!   ([`TimeEntryRivalsResolver`])

pub mod error;
pub mod prefer_newer;
pub mod rivals;

pub use error::ConflictError;
pub use prefer_newer::{PreferNewer, SyncSelector, SyncableSelector, DEFAULT_MARGIN_OF_ERROR};
pub use rivals::TimeEntryRivalsResolver;

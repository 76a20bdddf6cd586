//! Domain entities and business logic
//!
//! This module contains the core domain types for chronosync:
//! - Identifier newtypes (`EntityId`, `EntityKind`)
//! - The sync contract shared by every synchronized record
//! - The time entry entity
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod syncable;
pub mod time_entry;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::{EntityId, EntityKind};
pub use syncable::{ConflictResolutionMode, SyncStatus, SyncableEntity};
pub use time_entry::TimeEntry;

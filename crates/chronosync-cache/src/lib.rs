//! Chronosync Cache - Local record store
//!
//! In-memory adapters for the storage ports of `chronosync-core`:
//! - Records with conflict-aware and rival-aware batch writes
//! - Per-kind pull cursors
//!
//! ## Architecture
//!
//! This crate implements the `Repository` and `SinceParameterRepository`
//! ports. It is a driven (secondary) adapter in the hexagonal architecture,
//! used by embedders without a persistent store and by the sync engine's
//! tests.
//!
//! ## Key Components
//!
//! - [`MemoryRepository`] - Full `Repository` implementation
//! - [`MemorySinceParameters`] - Full `SinceParameterRepository` implementation
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use chronosync_cache::MemoryRepository;
//! use chronosync_core::domain::TimeEntry;
//! use chronosync_core::ports::Repository;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = MemoryRepository::<TimeEntry>::new();
//! let dirty = repo.get_all_matching(&|e: &TimeEntry| e.is_running()).await?;
//! # Ok(())
//! # }
//! ```

pub mod repository;
pub mod since;

pub use repository::MemoryRepository;
pub use since::MemorySinceParameters;

use chronosync_core::domain::EntityId;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No record is stored under the id
    #[error("Entity {0} not found")]
    NotFound(EntityId),

    /// A record is already stored under the id
    #[error("Entity {0} already exists")]
    AlreadyExists(EntityId),
}

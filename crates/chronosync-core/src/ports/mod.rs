//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The sync engine depends on these interfaces;
//! their implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`Repository`] - Local record store with conflict-aware batch writes
//! - [`RivalsResolver`] - Detection and repair of "at most one running" violations
//! - [`StatusApi`] / [`EntityApi`] - Remote service operations
//! - [`TimeService`] - Source of "now"
//! - [`Scheduler`] - Timed suspension, replaceable in tests
//! - [`SinceParameterRepository`] - Per-kind pull cursors

pub mod remote_api;
pub mod repository;
pub mod rivals;
pub mod scheduler;
pub mod since_parameters;
pub mod time;

pub use remote_api::{ApiError, ApiErrorKind, EntityApi, StatusApi};
pub use repository::{ConflictResolutionFn, Repository};
pub use rivals::{RivalPredicate, RivalsResolver};
pub use scheduler::{Scheduler, TokioScheduler};
pub use since_parameters::SinceParameterRepository;
pub use time::{SystemTimeService, TimeService};

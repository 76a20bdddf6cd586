//! Chronosync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `TimeEntry`, the `SyncableEntity` contract, `SyncStatus`
//! - **Port definitions** - Traits for adapters: `Repository`, `RivalsResolver`,
//!   `StatusApi`, `EntityApi`, `TimeService`, `Scheduler`, `SinceParameterRepository`
//! - **Configuration** - YAML-backed settings for the sync engine and logging
//!
//! # Architecture
//!
//! The domain module contains pure data types with no I/O. Ports define the
//! trait interfaces that the sync engine consumes and that adapter crates
//! (storage, HTTP client) implement.

pub mod config;
pub mod domain;
pub mod ports;

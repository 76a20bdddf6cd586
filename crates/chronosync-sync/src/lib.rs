//! Chronosync Sync - State-machine driven synchronization engine
//!
//! Provides:
//! - A small state-machine runtime walking a total transition table
//! - The push pipeline (create, update, unsyncable marking, server backoff)
//! - The pull chain (fetch since cursor, conflict-resolved persist)
//! - Single-flight orchestration of pull and push runs
//! - Randomized exponential backoff for unavailable servers
//!
//! ## Modules
//!
//! - [`state_machine`] - Transition table and run loop
//! - [`transition`] - Outcome markers and their payloads
//! - [`orchestrator`] - Phase tracking and completion events
//! - [`states`] - Push and pull state handlers
//! - [`retry_delay`] - Backoff delay tracks
//! - [`manager`] - Wiring of all of the above for one entity type
//! - [`logging`] - Tracing subscriber initialisation

pub mod error;
pub mod logging;
pub mod manager;
pub mod orchestrator;
pub mod retry_delay;
pub mod state_machine;
pub mod states;
pub mod transition;

pub use error::{SyncError, SyncResult};
pub use manager::{SyncDependencies, SyncManager};
pub use orchestrator::{EntryPoints, StateMachineOrchestrator, SyncPhase};
pub use retry_delay::{DelayProvider, RetryDelayService};
pub use state_machine::{StateHandler, StateMachine, StateMachineEvent, TransitionHandlerProvider};
pub use transition::{FailedPush, PushError, StateResult, Transition};

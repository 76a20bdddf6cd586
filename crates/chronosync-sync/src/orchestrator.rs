//! State machine orchestrator
//!
//! Top-level controller of synchronization runs. It tracks the current
//! [`SyncPhase`], starts the state machine at the configured entry point of
//! a pull or push, and refuses to start anything while a run is in flight.
//!
//! ## Flow
//!
//! ```text
//! start(Push) ──► syncing = true ──► phase = Push ──► machine.start(StartPushSync)
//!                                                          │
//!            sync_complete ◄── syncing = false ◄── DeadEnd / Error event
//! ```
//!
//! The published phase stays at the last started phase after completion;
//! callers move it back with `start(Sleep)`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::state_machine::{StateMachine, StateMachineEvent};
use crate::transition::{StateResult, Transition};

/// Capacity of the completion channel
const COMPLETION_CHANNEL_CAPACITY: usize = 16;

/// Activity of the orchestrator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    #[default]
    Sleep,
    Pull,
    Push,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Sleep => write!(f, "sleep"),
            SyncPhase::Pull => write!(f, "pull"),
            SyncPhase::Push => write!(f, "push"),
        }
    }
}

/// Outcomes at which pull and push runs begin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoints {
    pub start_pull_sync: StateResult,
    pub start_push_sync: StateResult,
}

impl Default for EntryPoints {
    fn default() -> Self {
        Self {
            start_pull_sync: StateResult::StartPullSync,
            start_push_sync: StateResult::StartPushSync,
        }
    }
}

/// Drives pull and push runs one at a time
pub struct StateMachineOrchestrator<T> {
    machine: StateMachine<T>,
    entry_points: EntryPoints,
    syncing: Arc<AtomicBool>,
    phase: watch::Sender<SyncPhase>,
    complete: broadcast::Sender<SyncPhase>,
    listener: JoinHandle<()>,
}

impl<T: Send + 'static> StateMachineOrchestrator<T> {
    /// Creates the orchestrator and starts listening to `machine`
    ///
    /// Must be called from within a tokio runtime. Entry points must be
    /// outcomes that carry no payload.
    pub fn new(machine: StateMachine<T>, entry_points: EntryPoints) -> SyncResult<Self> {
        for entry in [entry_points.start_pull_sync, entry_points.start_push_sync] {
            if Transition::<T>::without_payload(entry).is_none() {
                return Err(SyncError::InvalidArgument(format!(
                    "entry point {entry} carries a payload"
                )));
            }
        }

        let syncing = Arc::new(AtomicBool::new(false));
        let (phase, phase_rx) = watch::channel(SyncPhase::Sleep);
        let (complete, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);

        let listener = tokio::spawn(listen(
            machine.events(),
            Arc::clone(&syncing),
            phase_rx,
            complete.clone(),
        ));

        Ok(Self {
            machine,
            entry_points,
            syncing,
            phase,
            complete,
            listener,
        })
    }

    /// Starts `phase`
    ///
    /// Fails with [`SyncError::SyncInProgress`] while a run is active; the
    /// active run is not affected.
    pub fn start(&self, phase: SyncPhase) -> SyncResult<()> {
        let entry = match phase {
            SyncPhase::Sleep => {
                if self.is_syncing() {
                    return Err(self.in_progress(phase));
                }
                self.phase.send_replace(SyncPhase::Sleep);
                debug!("Sync orchestrator sleeping");
                return Ok(());
            }
            SyncPhase::Pull => self.entry_points.start_pull_sync,
            SyncPhase::Push => self.entry_points.start_push_sync,
        };

        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(self.in_progress(phase));
        }

        let Some(initial) = Transition::without_payload(entry) else {
            self.syncing.store(false, Ordering::Release);
            return Err(SyncError::InvalidArgument(format!(
                "entry point {entry} carries a payload"
            )));
        };

        self.phase.send_replace(phase);
        info!(phase = %phase, "Starting sync");

        if let Err(err) = self.machine.start(initial) {
            self.syncing.store(false, Ordering::Release);
            return Err(err);
        }
        Ok(())
    }

    /// Current phase
    pub fn state(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Receiver observing every phase change
    pub fn state_changes(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Receiver of the phase of every finished run
    pub fn sync_complete(&self) -> broadcast::Receiver<SyncPhase> {
        self.complete.subscribe()
    }

    /// Returns true while a pull or push run is in flight
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    fn in_progress(&self, requested: SyncPhase) -> SyncError {
        let active = self.state();
        warn!(requested = %requested, active = %active, "Sync already in progress");
        SyncError::SyncInProgress { requested, active }
    }
}

impl<T> Drop for StateMachineOrchestrator<T> {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    mut events: broadcast::Receiver<StateMachineEvent>,
    syncing: Arc<AtomicBool>,
    phase: watch::Receiver<SyncPhase>,
    complete: broadcast::Sender<SyncPhase>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Orchestrator lagged behind state machine events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            StateMachineEvent::Transition(_) => {}
            StateMachineEvent::DeadEnd(_) | StateMachineEvent::Error(_) => {
                let finished = *phase.borrow();
                syncing.store(false, Ordering::Release);
                match &event {
                    StateMachineEvent::Error(message) => {
                        warn!(phase = %finished, error = %message, "Sync finished with error")
                    }
                    _ => info!(phase = %finished, "Sync finished"),
                }
                let _ = complete.send(finished);
            }
        }
    }
}

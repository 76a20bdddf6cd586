//! State-machine runtime
//!
//! A [`TransitionHandlerProvider`] maps each [`StateResult`] to at most one
//! [`StateHandler`]. The table is checked for totality before use: every
//! outcome must either have a handler or be declared a dead end.
//!
//! A [`StateMachine`] run starts from an initial transition, awaits the
//! handler of its outcome, and feeds the produced transition back into the
//! table until it reaches an outcome without handler (dead end) or a handler
//! fails. Handlers run strictly one after another on a single spawned task.
//!
//! ## Events
//!
//! ```text
//!   Transition(r)  every outcome that was handed to a handler
//!   DeadEnd(r)     run finished at outcome r
//!   Error(msg)     run aborted by a handler error or panic
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{SyncError, SyncResult};
use crate::transition::{StateResult, Transition};

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// StateHandler
// ============================================================================

/// A state of the machine
///
/// Handlers consume the transition that led to them and produce the next
/// one. They may suspend (network calls, backoff) before producing it.
#[async_trait::async_trait]
pub trait StateHandler<T>: Send + Sync {
    async fn start(&self, transition: Transition<T>) -> SyncResult<Transition<T>>;
}

// ============================================================================
// TransitionHandlerProvider
// ============================================================================

/// Transition table of a state machine
pub struct TransitionHandlerProvider<T> {
    handlers: HashMap<StateResult, Arc<dyn StateHandler<T>>>,
    dead_ends: HashSet<StateResult>,
}

impl<T> TransitionHandlerProvider<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            dead_ends: HashSet::new(),
        }
    }

    /// Registers the handler invoked for `result`
    pub fn configure_transition(
        &mut self,
        result: StateResult,
        handler: Arc<dyn StateHandler<T>>,
    ) -> SyncResult<()> {
        if self.handlers.contains_key(&result) {
            return Err(SyncError::TransitionAlreadyConfigured(result));
        }
        self.handlers.insert(result, handler);
        Ok(())
    }

    /// Declares `dead_ends` and checks that every outcome is accounted for
    pub fn ensure_total(&mut self, dead_ends: &[StateResult]) -> SyncResult<()> {
        if let Some(configured) = dead_ends.iter().find(|r| self.handlers.contains_key(*r)) {
            return Err(SyncError::ConfiguredDeadEnd(*configured));
        }

        let missing: Vec<StateResult> = StateResult::ALL
            .into_iter()
            .filter(|r| !self.handlers.contains_key(r) && !dead_ends.contains(r))
            .collect();
        if !missing.is_empty() {
            return Err(SyncError::UnconfiguredStateResults(missing));
        }

        self.dead_ends = dead_ends.iter().copied().collect();
        Ok(())
    }

    /// Returns the handler registered for `result`
    pub fn handler_for(&self, result: StateResult) -> Option<Arc<dyn StateHandler<T>>> {
        self.handlers.get(&result).cloned()
    }

    /// Returns true if `result` was declared a dead end
    pub fn is_dead_end(&self, result: StateResult) -> bool {
        self.dead_ends.contains(&result)
    }
}

impl<T> Default for TransitionHandlerProvider<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// StateMachine
// ============================================================================

/// Observable events of a state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMachineEvent {
    Transition(StateResult),
    DeadEnd(StateResult),
    Error(String),
}

/// Runs transitions through a transition table
pub struct StateMachine<T> {
    provider: Arc<TransitionHandlerProvider<T>>,
    events: broadcast::Sender<StateMachineEvent>,
    running: Arc<AtomicBool>,
}

impl<T: Send + 'static> StateMachine<T> {
    pub fn new(provider: TransitionHandlerProvider<T>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider: Arc::new(provider),
            events,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to the machine's events
    pub fn events(&self) -> broadcast::Receiver<StateMachineEvent> {
        self.events.subscribe()
    }

    /// Returns true while a run is in flight
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts a run at `initial`
    ///
    /// Must be called from within a tokio runtime. The returned handle
    /// resolves once the run's final event has been emitted.
    pub fn start(&self, initial: Transition<T>) -> SyncResult<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }

        let provider = Arc::clone(&self.provider);
        let events = self.events.clone();
        let running = Arc::clone(&self.running);

        info!(initial = %initial.result(), "State machine run starting");

        Ok(tokio::spawn(async move {
            let run_events = events.clone();
            let task = tokio::spawn(run(provider, run_events, initial));

            let final_event = match task.await {
                Ok(event) => event,
                Err(join_error) => {
                    error!(error = %join_error, "State handler panicked");
                    StateMachineEvent::Error(format!("state handler panicked: {join_error}"))
                }
            };

            running.store(false, Ordering::Release);
            let _ = events.send(final_event);
        }))
    }
}

async fn run<T: Send + 'static>(
    provider: Arc<TransitionHandlerProvider<T>>,
    events: broadcast::Sender<StateMachineEvent>,
    initial: Transition<T>,
) -> StateMachineEvent {
    let mut transition = initial;

    loop {
        let result = transition.result();
        let Some(handler) = provider.handler_for(result) else {
            info!(result = %result, "State machine reached a dead end");
            return StateMachineEvent::DeadEnd(result);
        };

        debug!(result = %result, "Handling transition");
        let _ = events.send(StateMachineEvent::Transition(result));

        match handler.start(transition).await {
            Ok(next) => transition = next,
            Err(err) => {
                error!(result = %result, error = %err, "State machine run failed");
                return StateMachineEvent::Error(err.to_string());
            }
        }
    }
}

//! Completion events
//!
//! Every submitted command returns an [`Event`], the unit of dependency in
//! the execution graph. An event moves through
//! `Pending → Running → Completed`, or to `Failed` from either non-terminal
//! state. Callers read state and pass events as dependencies; only the queue
//! transitions them.

use crate::command::CommandNode;
use crate::error::Error;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;

/// Lifecycle state of a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    /// Registered, waiting for dependencies
    Pending,
    /// Currently executing
    Running,
    /// Executed successfully; its writes are visible to readers
    Completed,
    /// Execution failed, or an upstream dependency failed
    Failed,
}

impl EventState {
    /// Whether the state is `Completed` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, EventState::Completed | EventState::Failed)
    }
}

/// What a registering command observed about one of its dependencies.
pub(crate) enum DepObservation {
    /// Dependency is not terminal yet; the node was added to its dependents.
    Registered,
    /// Dependency already completed; nothing to wait for.
    Completed,
    /// Dependency already failed with the given cause.
    Failed(Arc<Error>),
}

/// Completion token for a submitted command
///
/// Cheap to clone (reference-counted). The event records its dependency set,
/// so the transitive execution graph can be walked from any event at the
/// join point.
pub struct Event {
    inner: Arc<EventInner>,
}

struct EventInner {
    id: u64,
    deps: Vec<Event>,
    slot: Mutex<StateSlot>,
    cond: Condvar,
}

/// State, cause, and the commands waiting on this event, behind one mutex so
/// dependent registration cannot race a concurrent completion.
struct StateSlot {
    state: EventState,
    cause: Option<Arc<Error>>,
    dependents: Vec<Arc<CommandNode>>,
}

impl Event {
    pub(crate) fn new(id: u64, deps: Vec<Event>) -> Self {
        Self {
            inner: Arc::new(EventInner {
                id,
                deps,
                slot: Mutex::new(StateSlot {
                    state: EventState::Pending,
                    cause: None,
                    dependents: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// Queue-assigned identity, monotone in submission order.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EventState {
        self.inner.slot.lock().state
    }

    /// Whether the event reached `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// The recorded failure cause, if the event failed.
    pub fn failure_cause(&self) -> Option<Error> {
        self.inner.slot.lock().cause.as_deref().cloned()
    }

    /// The dependency set declared at submission.
    pub fn dependencies(&self) -> &[Event] {
        &self.inner.deps
    }

    /// Block until the event reaches a terminal state.
    pub(crate) fn wait_terminal(&self) {
        let mut slot = self.inner.slot.lock();
        while !slot.state.is_terminal() {
            self.inner.cond.wait(&mut slot);
        }
    }

    /// Register `node` as a dependent, or report the already-terminal state.
    pub(crate) fn register_dependent(&self, node: &Arc<CommandNode>) -> DepObservation {
        let mut slot = self.inner.slot.lock();
        match slot.state {
            EventState::Completed => DepObservation::Completed,
            EventState::Failed => DepObservation::Failed(
                slot.cause
                    .clone()
                    .unwrap_or_else(|| Arc::new(Error::ExecutionFailure("unrecorded cause".into()))),
            ),
            EventState::Pending | EventState::Running => {
                slot.dependents.push(Arc::clone(node));
                DepObservation::Registered
            }
        }
    }

    /// Transition `Pending → Running`. Returns false if the event already
    /// left `Pending` (e.g. failed through upstream propagation).
    pub(crate) fn try_begin_running(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        if slot.state == EventState::Pending {
            slot.state = EventState::Running;
            true
        } else {
            false
        }
    }

    /// Transition `Running → Completed`, waking waiters and draining the
    /// dependents that can now make progress.
    pub(crate) fn complete(&self) -> Vec<Arc<CommandNode>> {
        let mut slot = self.inner.slot.lock();
        debug_assert_eq!(slot.state, EventState::Running);
        slot.state = EventState::Completed;
        let dependents = std::mem::take(&mut slot.dependents);
        self.inner.cond.notify_all();
        dependents
    }

    /// Transition to `Failed` with `cause`. Returns the drained dependents,
    /// or `None` if the event was already terminal.
    ///
    /// `on_transition` runs inside the state lock before the `Failed` state
    /// becomes observable, so bookkeeping tied to the transition (releasing
    /// the command's buffer references) is visible to anyone who sees the
    /// event as terminal. It runs exactly once per event.
    pub(crate) fn fail(
        &self,
        cause: Arc<Error>,
        on_transition: impl FnOnce(),
    ) -> Option<Vec<Arc<CommandNode>>> {
        let mut slot = self.inner.slot.lock();
        if slot.state.is_terminal() {
            return None;
        }
        on_transition();
        slot.state = EventState::Failed;
        slot.cause = Some(cause);
        let dependents = std::mem::take(&mut slot.dependents);
        self.inner.cond.notify_all();
        Some(dependents)
    }
}

impl Clone for Event {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

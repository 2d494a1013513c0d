/// Exclusive edit session: at most one entity is being configured at a time,
/// and dragging is disabled for as long as one is.
///
/// Drag engines receive the session in their constructor and read the
/// enabled flag from a `watch` channel, so every engine flips together.
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

use crate::events::EditOutcome;
use crate::pending::{EditTarget, TempId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Idle,
    Editing(EditTarget),
}

/// Result of `EditSession::configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The target was already being edited.
    Unchanged,
    Opened,
    /// Implicit close of `previous`; its draft is discarded if it had one.
    Switched {
        previous: EditTarget,
        discarded: Option<TempId>,
    },
}

/// Result of closing the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed {
    pub target: EditTarget,
    pub outcome: EditOutcome,
    /// Unsaved draft that must leave the cache and the view.
    pub discarded: Option<TempId>,
}

#[derive(Clone)]
pub struct EditSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    state: Mutex<EditState>,
    drag_enabled: watch::Sender<bool>,
}

impl EditSession {
    pub fn new() -> Self {
        let (drag_enabled, _rx) = watch::channel(true);
        Self {
            inner: Arc::new(SessionInner {
                state: Mutex::new(EditState::Idle),
                drag_enabled,
            }),
        }
    }

    pub fn state(&self) -> EditState {
        *self.lock()
    }

    pub fn current(&self) -> Option<EditTarget> {
        match self.state() {
            EditState::Idle => None,
            EditState::Editing(target) => Some(target),
        }
    }

    pub fn is_editing(&self) -> bool {
        self.current().is_some()
    }

    pub fn drag_enabled(&self) -> bool {
        *self.inner.drag_enabled.borrow()
    }

    /// Receiver used by drag engines to follow the enabled flag.
    pub fn drag_signal(&self) -> watch::Receiver<bool> {
        self.inner.drag_enabled.subscribe()
    }

    /// Start configuring `target`, closing whatever was open before.
    pub fn configure(&self, target: EditTarget) -> Transition {
        let mut state = self.lock();
        let transition = match *state {
            EditState::Editing(current) if current == target => return Transition::Unchanged,
            EditState::Editing(previous) => Transition::Switched {
                previous,
                discarded: previous.pending(),
            },
            EditState::Idle => Transition::Opened,
        };
        *state = EditState::Editing(target);
        drop(state);
        self.inner.drag_enabled.send_replace(false);
        log::debug!(target: "corkboard.client.session", "Editing {:?}", target);
        transition
    }

    /// Return to idle. A cancelled draft is reported for discarding; a saved
    /// one has already been replaced by its stored entity.
    pub fn close(&self, outcome: EditOutcome) -> Option<Closed> {
        let mut state = self.lock();
        let EditState::Editing(target) = *state else {
            return None;
        };
        *state = EditState::Idle;
        drop(state);
        self.inner.drag_enabled.send_replace(true);
        let discarded = match outcome {
            EditOutcome::Saved => None,
            EditOutcome::Cancelled | EditOutcome::Switched => target.pending(),
        };
        Some(Closed {
            target,
            outcome,
            discarded,
        })
    }

    /// Close only if `target` is the entity being edited.
    pub fn close_if(&self, target: EditTarget, outcome: EditOutcome) -> Option<Closed> {
        if self.current() == Some(target) {
            self.close(outcome)
        } else {
            None
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EditState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

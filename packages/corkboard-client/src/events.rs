/// Typed notifications from the controller to the view layer.
use corkboard_core::types::BoardId;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::pending::{EditTarget, EntityKind, TempId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintSource {
    Cache,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditOutcome {
    Saved,
    Cancelled,
    /// Another entity was configured while this one was open.
    Switched,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum BoardEvent {
    /// The view should render the board from the cache.
    Painted { board_id: BoardId, source: PaintSource },
    /// Background fetch matched the cache; nothing to re-render.
    Unchanged { board_id: BoardId },
    /// Background fetch failed; the cached board stays on screen.
    StaleKept { board_id: BoardId, error: String },
    /// Background fetch failed with nothing cached.
    LoadFailed { board_id: BoardId, error: String },
    ReorderCommitted { board_id: BoardId, updated: usize },
    /// Local order was discarded; a reload follows.
    ReorderRejected { board_id: BoardId, error: String },
    EditStarted { target: EditTarget },
    EditEnded { target: EditTarget, outcome: EditOutcome },
    DraftDiscarded { temp_id: TempId },
    EntitySaved {
        kind: EntityKind,
        id: i64,
        replaced: Option<TempId>,
    },
    EntityDeleted { kind: EntityKind, id: i64 },
}

/// Broadcast channel for `BoardEvent`s. Emitting without subscribers is fine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BoardEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: BoardEvent) {
        log::debug!(target: "corkboard.client.events", "{:?}", event);
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

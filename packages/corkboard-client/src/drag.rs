/// Sortable (drag-and-drop) engines. One engine per container: the board's
/// list strip, and one per list for its items.
///
/// An engine turns a drop into the complete final order of every container
/// it touched, ready to submit as a reorder batch.
use std::hash::Hash;
use std::marker::PhantomData;

use corkboard_core::ordering::{move_between, move_within, ReorderBatch};
use corkboard_core::types::{BoardId, ItemId, ListId};
use tokio::sync::watch;

use crate::error::{ClientError, ClientResult};
use crate::session::EditSession;

pub struct SortableEngine<Id, C> {
    container: C,
    enabled: watch::Receiver<bool>,
    _entries: PhantomData<Id>,
}

/// Lists within a board.
pub type ListSortable = SortableEngine<ListId, BoardId>;
/// Items within a list, and between lists.
pub type ItemSortable = SortableEngine<ItemId, ListId>;

impl<Id, C> SortableEngine<Id, C>
where
    Id: Copy + Eq + Hash,
    C: Copy + Eq,
{
    pub fn new(container: C, session: &EditSession) -> Self {
        Self {
            container,
            enabled: session.drag_signal(),
            _entries: PhantomData,
        }
    }

    pub fn container(&self) -> C {
        self.container
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    fn ensure_enabled(&self) -> ClientResult<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(ClientError::DragDisabled)
        }
    }

    /// Drop the entry at `from` onto index `to` of the same container.
    /// `None` when the drop changes nothing.
    pub fn drop_within(&self, order: &[Id], from: usize, to: usize) -> ClientResult<Option<ReorderBatch<Id, C>>> {
        self.ensure_enabled()?;
        let mut order = order.to_vec();
        if !move_within(&mut order, from, to) {
            return Ok(None);
        }
        Ok(Some(ReorderBatch::from_order(Some(self.container), &order)))
    }

    /// Drop `id`, dragged out of this container, onto index `to` of
    /// `destination`. The batch carries both containers' final orders.
    pub fn drop_into(
        &self,
        destination: &Self,
        source_order: &[Id],
        destination_order: &[Id],
        id: Id,
        to: usize,
    ) -> ClientResult<Option<ReorderBatch<Id, C>>> {
        self.ensure_enabled()?;
        destination.ensure_enabled()?;
        if destination.container == self.container {
            let Some(from) = source_order.iter().position(|e| *e == id) else {
                return Ok(None);
            };
            return self.drop_within(source_order, from, to);
        }
        let mut source = source_order.to_vec();
        let mut target = destination_order.to_vec();
        if !move_between(&mut source, &mut target, &id, to) {
            return Ok(None);
        }
        Ok(Some(ReorderBatch::for_move(
            self.container,
            &source,
            destination.container,
            &target,
        )))
    }
}

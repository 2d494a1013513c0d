/// Reorder batches and the pure order-manipulation helpers used to build them.
///
/// A batch describes the desired final order of one or more containers after
/// a drag: every entry carries the entity id, its 0-based index in the final
/// visual order, and optionally the container it now lives in.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

use crate::storage::StoreError;
use crate::types::{BoardId, ItemId, ListId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "Id: Deserialize<'de>, C: Deserialize<'de>"))]
pub struct PositionUpdate<Id, C> {
    pub id: Id,
    pub position: i64,
    #[serde(default, rename = "container_id", skip_serializing_if = "Option::is_none")]
    pub container: Option<C>,
}

/// Wire form: `[{ "id": .., "position": .., "container_id": .. }, ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReorderBatch<Id, C> {
    pub updates: Vec<PositionUpdate<Id, C>>,
}

/// Lists reordered within a board.
pub type ListReorder = ReorderBatch<ListId, BoardId>;
/// Items reordered within, or moved between, lists.
pub type ItemReorder = ReorderBatch<ItemId, ListId>;

impl<Id, C> ReorderBatch<Id, C>
where
    Id: Copy + Eq + Hash,
    C: Copy,
{
    pub fn new(updates: Vec<PositionUpdate<Id, C>>) -> Self {
        Self { updates }
    }

    /// Batch for a single container's final order. Positions are the indices
    /// of `ids`, so callers never hand-compute integers.
    pub fn from_order(container: Option<C>, ids: &[Id]) -> Self {
        Self {
            updates: ids
                .iter()
                .enumerate()
                .map(|(pos, id)| PositionUpdate {
                    id: *id,
                    position: pos as i64,
                    container,
                })
                .collect(),
        }
    }

    /// Batch for a cross-container move: the complete final order of both
    /// the source and the destination container.
    pub fn for_move(source: C, source_order: &[Id], destination: C, destination_order: &[Id]) -> Self {
        let mut batch = Self::from_order(Some(source), source_order);
        batch
            .updates
            .extend(Self::from_order(Some(destination), destination_order).updates);
        batch
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn ids(&self) -> Vec<Id> {
        self.updates.iter().map(|u| u.id).collect()
    }

    /// Reject batches the store must never see: empty, oversized, negative
    /// positions, or the same entity listed twice.
    pub fn validate(&self, max_batch: usize) -> Result<(), StoreError> {
        if self.updates.is_empty() {
            return Err(StoreError::Validation("reorder batch is empty".to_string()));
        }
        if self.updates.len() > max_batch {
            return Err(StoreError::Validation(format!(
                "reorder batch has {} entries (max {})",
                self.updates.len(),
                max_batch
            )));
        }
        if self.updates.iter().any(|u| u.position < 0) {
            return Err(StoreError::Validation(
                "positions must be non-negative".to_string(),
            ));
        }
        let mut seen = HashSet::with_capacity(self.updates.len());
        if !self.updates.iter().all(|u| seen.insert(u.id)) {
            return Err(StoreError::Validation(
                "an entity appears more than once in the batch".to_string(),
            ));
        }
        Ok(())
    }
}

/// Move the entry at `from` to `to` within one container's order.
/// Out-of-range indices are clamped; returns false when nothing moved.
pub fn move_within<T>(order: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= order.len() {
        return false;
    }
    let to = to.min(order.len() - 1);
    if from == to {
        return false;
    }
    let entry = order.remove(from);
    order.insert(to, entry);
    true
}

/// Move `id` out of `source` and insert it into `destination` at `to`
/// (clamped to the end). Returns false when `id` is not in `source`.
pub fn move_between<T: PartialEq>(source: &mut Vec<T>, destination: &mut Vec<T>, id: &T, to: usize) -> bool {
    let Some(from) = source.iter().position(|e| e == id) else {
        return false;
    };
    let entry = source.remove(from);
    let to = to.min(destination.len());
    destination.insert(to, entry);
    true
}

/// Order entries by their submitted position, keeping submission order for
/// ties, and return them with fresh contiguous positions.
pub fn renumber<T>(mut entries: Vec<(i64, T)>) -> Vec<(i64, T)> {
    // sort_by_key is stable, so equal positions keep their submitted order
    entries.sort_by_key(|(pos, _)| *pos);
    entries
        .into_iter()
        .enumerate()
        .map(|(pos, (_, entry))| (pos as i64, entry))
        .collect()
}

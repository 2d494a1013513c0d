use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Board, BoardId, Item, ItemId, List, ListId};

/// The full list + item tree of one board, as returned by the combined load.
///
/// `lists` are kept sorted by `(position, id)` and `items` by their list's
/// rank first, then `(position, id)`. Mutators restore that order and keep
/// sibling positions contiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub board: Board,
    pub lists: Vec<List>,
    pub items: Vec<Item>,
}

impl BoardSnapshot {
    pub fn new(board: Board, lists: Vec<List>, items: Vec<Item>) -> Self {
        let mut snapshot = Self { board, lists, items };
        snapshot.normalize();
        snapshot
    }

    pub fn board_id(&self) -> BoardId {
        self.board.id
    }

    pub fn list(&self, id: ListId) -> Option<&List> {
        self.lists.iter().find(|l| l.id == id)
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// List ids in display order.
    pub fn list_order(&self) -> Vec<ListId> {
        self.lists.iter().map(|l| l.id).collect()
    }

    /// Item ids of one list in display order.
    pub fn item_order(&self, list_id: ListId) -> Vec<ItemId> {
        self.items_in(list_id).map(|i| i.id).collect()
    }

    pub fn items_in(&self, list_id: ListId) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |i| i.list_id == list_id)
    }

    /// Re-sort lists and items into display order.
    pub fn normalize(&mut self) {
        self.lists.sort_by_key(|l| (l.position, l.id));
        let rank: HashMap<ListId, usize> = self
            .lists
            .iter()
            .enumerate()
            .map(|(rank, l)| (l.id, rank))
            .collect();
        self.items.sort_by_key(|i| {
            (
                rank.get(&i.list_id).copied().unwrap_or(usize::MAX),
                i.position,
                i.id,
            )
        });
    }

    /// Assign positions `0..n-1` to the board's lists following `order`.
    ///
    /// Returns false (and changes nothing) unless `order` is a permutation of
    /// the lists currently in the snapshot.
    pub fn apply_list_order(&mut self, order: &[ListId]) -> bool {
        if order.len() != self.lists.len() || !order.iter().all(|id| self.list(*id).is_some()) {
            return false;
        }
        let positions: HashMap<ListId, i64> = order
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos as i64))
            .collect();
        if positions.len() != order.len() {
            return false;
        }
        for list in &mut self.lists {
            list.position = positions[&list.id];
        }
        self.normalize();
        true
    }

    /// Make `order` the complete content of `list_id`, moving items from other
    /// lists when needed. Items previously in `list_id` but missing from
    /// `order` make the call fail, as do unknown ids.
    pub fn apply_item_order(&mut self, list_id: ListId, order: &[ItemId]) -> bool {
        if self.list(list_id).is_none() || !order.iter().all(|id| self.item(*id).is_some()) {
            return false;
        }
        let positions: HashMap<ItemId, i64> = order
            .iter()
            .enumerate()
            .map(|(pos, id)| (*id, pos as i64))
            .collect();
        if positions.len() != order.len() {
            return false;
        }
        if self
            .items_in(list_id)
            .any(|item| !positions.contains_key(&item.id))
        {
            return false;
        }
        let mut sources = Vec::new();
        for item in &mut self.items {
            if let Some(pos) = positions.get(&item.id) {
                if item.list_id != list_id {
                    sources.push(item.list_id);
                    item.list_id = list_id;
                }
                item.position = *pos;
            }
        }
        sources.sort();
        sources.dedup();
        for source in sources {
            self.renumber_items(source);
        }
        self.normalize();
        true
    }

    /// Insert or replace a list. New lists without a sensible position are
    /// appended.
    pub fn upsert_list(&mut self, list: List) {
        match self.lists.iter_mut().find(|l| l.id == list.id) {
            Some(existing) => *existing = list,
            None => self.lists.push(list),
        }
        self.normalize();
    }

    /// Remove a list together with its items and close the gap it leaves.
    pub fn remove_list(&mut self, id: ListId) -> Option<List> {
        let index = self.lists.iter().position(|l| l.id == id)?;
        let removed = self.lists.remove(index);
        self.items.retain(|i| i.list_id != id);
        for (pos, list) in self.lists.iter_mut().enumerate() {
            list.position = pos as i64;
        }
        self.normalize();
        Some(removed)
    }

    pub fn upsert_item(&mut self, item: Item) {
        match self.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
        self.normalize();
    }

    /// Remove an item and close the gap among its former siblings.
    pub fn remove_item(&mut self, id: ItemId) -> Option<Item> {
        let index = self.items.iter().position(|i| i.id == id)?;
        let removed = self.items.remove(index);
        self.renumber_items(removed.list_id);
        self.normalize();
        Some(removed)
    }

    fn renumber_items(&mut self, list_id: ListId) {
        let mut siblings: Vec<&mut Item> =
            self.items.iter_mut().filter(|i| i.list_id == list_id).collect();
        siblings.sort_by_key(|i| (i.position, i.id));
        for (pos, item) in siblings.into_iter().enumerate() {
            item.position = pos as i64;
        }
    }
}

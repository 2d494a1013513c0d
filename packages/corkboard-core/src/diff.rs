/// Structural diff between two board snapshots.
///
/// Two snapshots are structurally equal when they hold the same list ids in
/// the same order, the same item ids in the same order within every list, and
/// equal display fields on every entity. Row positions and timestamps are not
/// compared directly: the order of ids already captures them.
use std::collections::HashMap;

use crate::snapshot::BoardSnapshot;
use crate::types::{BoardId, Item, ItemId, List, ListId};

/// A single structural difference between two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotChange {
    BoardSwitched {
        old: BoardId,
        new: BoardId,
    },
    BoardRenamed {
        old_title: String,
        new_title: String,
    },
    ListOrderChanged {
        old: Vec<ListId>,
        new: Vec<ListId>,
    },
    ListModified {
        list_id: ListId,
        field: &'static str,
    },
    ItemOrderChanged {
        list_id: ListId,
        old: Vec<ItemId>,
        new: Vec<ItemId>,
    },
    ItemModified {
        item_id: ItemId,
        field: &'static str,
    },
}

/// Compute every structural change from `old` to `new`.
pub fn diff_snapshots(old: &BoardSnapshot, new: &BoardSnapshot) -> Vec<SnapshotChange> {
    let mut changes = Vec::new();

    if old.board.id != new.board.id {
        changes.push(SnapshotChange::BoardSwitched {
            old: old.board.id,
            new: new.board.id,
        });
    }
    if old.board.title != new.board.title {
        changes.push(SnapshotChange::BoardRenamed {
            old_title: old.board.title.clone(),
            new_title: new.board.title.clone(),
        });
    }

    let old_lists = old.list_order();
    let new_lists = new.list_order();
    if old_lists != new_lists {
        changes.push(SnapshotChange::ListOrderChanged {
            old: old_lists.clone(),
            new: new_lists.clone(),
        });
    }

    let old_by_id: HashMap<ListId, &List> = old.lists.iter().map(|l| (l.id, l)).collect();
    for list in &new.lists {
        if let Some(prev) = old_by_id.get(&list.id) {
            if let Some(field) = changed_list_field(prev, list) {
                changes.push(SnapshotChange::ListModified {
                    list_id: list.id,
                    field,
                });
            }
        }
    }

    let mut containers = new_lists;
    for id in old_lists {
        if !containers.contains(&id) {
            containers.push(id);
        }
    }
    for list_id in containers {
        let old_items = old.item_order(list_id);
        let new_items = new.item_order(list_id);
        if old_items != new_items {
            changes.push(SnapshotChange::ItemOrderChanged {
                list_id,
                old: old_items,
                new: new_items,
            });
        }
    }

    let old_items: HashMap<ItemId, &Item> = old.items.iter().map(|i| (i.id, i)).collect();
    for item in &new.items {
        if let Some(prev) = old_items.get(&item.id) {
            if let Some(field) = changed_item_field(prev, item) {
                changes.push(SnapshotChange::ItemModified {
                    item_id: item.id,
                    field,
                });
            }
        }
    }

    changes
}

/// True when nothing a viewer could see differs between the two snapshots.
pub fn snapshots_match(old: &BoardSnapshot, new: &BoardSnapshot) -> bool {
    diff_snapshots(old, new).is_empty()
}

fn changed_list_field(old: &List, new: &List) -> Option<&'static str> {
    if old.title != new.title {
        Some("title")
    } else if old.color != new.color {
        Some("color")
    } else if old.collapsed != new.collapsed {
        Some("collapsed")
    } else {
        None
    }
}

fn changed_item_field(old: &Item, new: &Item) -> Option<&'static str> {
    if old.kind != new.kind {
        Some("kind")
    } else if old.title != new.title {
        Some("title")
    } else if old.url != new.url {
        Some("url")
    } else if old.content != new.content {
        Some("content")
    } else if old.favicon_url != new.favicon_url {
        Some("favicon_url")
    } else {
        None
    }
}

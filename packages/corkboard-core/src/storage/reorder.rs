/// Transactional ordering: bulk position rewrites, list move/copy between
/// boards, and gap closing after deletes.
///
/// A reorder batch is applied with a single `UPDATE ... CASE id WHEN ..`
/// statement scoped to the owner. If fewer rows change than were requested,
/// or a touched container does not end up as `0..n-1`, the transaction is
/// dropped and nothing is written.
use std::collections::{BTreeSet, HashMap};

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};

use super::pool::write_tx;
use super::sqlite::{
    board_tx, list_tx, next_list_position_tx, now_ms, touch_board_tx, LIST_COLUMNS,
};
use super::{StoreError, StoreResult};
use crate::ordering::{ItemReorder, ListReorder};
use crate::types::{BoardId, ItemId, List, ListId, UserId};

/// Which sibling table an ordering operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Siblings {
    Lists,
    Items,
}

impl Siblings {
    fn table(&self) -> &'static str {
        match self {
            Siblings::Lists => "lists",
            Siblings::Items => "items",
        }
    }

    fn container_column(&self) -> &'static str {
        match self {
            Siblings::Lists => "board_id",
            Siblings::Items => "list_id",
        }
    }

    fn container_name(&self) -> &'static str {
        match self {
            Siblings::Lists => "board",
            Siblings::Items => "list",
        }
    }
}

/// Row filter ANDed into a bulk update.
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    /// Lists of one board owned by `owner`.
    Board { owner: &'a UserId, board_id: BoardId },
    /// Items whose list is owned by `owner`.
    OwnedItems { owner: &'a UserId },
    /// Rows of one container, already verified by the caller.
    Container(i64),
}

#[derive(Debug, Clone, Copy)]
struct Assignment {
    id: i64,
    position: i64,
    container: Option<i64>,
}

/// Push a parameter and return its numbered placeholder.
fn bind(values: &mut Vec<SqlValue>, value: SqlValue) -> String {
    values.push(value);
    format!("?{}", values.len())
}

/// Rewrite positions (and containers) of many rows with one statement.
/// Returns the number of rows changed.
fn bulk_assign_tx(
    conn: &Connection,
    siblings: Siblings,
    assignments: &[Assignment],
    scope: Scope<'_>,
    now: i64,
) -> StoreResult<usize> {
    if assignments.is_empty() {
        return Ok(0);
    }
    let column = siblings.container_column();
    let mut values: Vec<SqlValue> = Vec::with_capacity(assignments.len() * 4 + 3);

    let mut sql = format!("UPDATE {} SET position = CASE id", siblings.table());
    for a in assignments {
        let id = bind(&mut values, SqlValue::Integer(a.id));
        let pos = bind(&mut values, SqlValue::Integer(a.position));
        sql.push_str(&format!(" WHEN {} THEN {}", id, pos));
    }
    sql.push_str(" END");

    let moves: Vec<&Assignment> = assignments.iter().filter(|a| a.container.is_some()).collect();
    if !moves.is_empty() {
        sql.push_str(&format!(", {} = CASE id", column));
        for a in moves {
            let id = bind(&mut values, SqlValue::Integer(a.id));
            let container = bind(&mut values, SqlValue::Integer(a.container.unwrap_or_default()));
            sql.push_str(&format!(" WHEN {} THEN {}", id, container));
        }
        sql.push_str(&format!(" ELSE {} END", column));
    }

    let updated_at = bind(&mut values, SqlValue::Integer(now));
    sql.push_str(&format!(", updated_at = {} WHERE id IN (", updated_at));
    let ids: Vec<String> = assignments
        .iter()
        .map(|a| bind(&mut values, SqlValue::Integer(a.id)))
        .collect();
    sql.push_str(&ids.join(", "));
    sql.push(')');

    match scope {
        Scope::Board { owner, board_id } => {
            let owner = bind(&mut values, SqlValue::Text(owner.as_str().to_string()));
            let board = bind(&mut values, SqlValue::Integer(board_id.0));
            sql.push_str(&format!(" AND user_id = {} AND board_id = {}", owner, board));
        }
        Scope::OwnedItems { owner } => {
            let owner = bind(&mut values, SqlValue::Text(owner.as_str().to_string()));
            sql.push_str(&format!(
                " AND list_id IN (SELECT id FROM lists WHERE user_id = {})",
                owner
            ));
        }
        Scope::Container(container) => {
            let container = bind(&mut values, SqlValue::Integer(container));
            sql.push_str(&format!(" AND {} = {}", column, container));
        }
    }

    Ok(conn.execute(&sql, params_from_iter(values))?)
}

fn positions_tx(conn: &Connection, siblings: Siblings, container: i64) -> StoreResult<Vec<(i64, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, position FROM {} WHERE {} = ?1 ORDER BY position, id",
        siblings.table(),
        siblings.container_column()
    ))?;
    let rows = stmt.query_map(params![container], |row| Ok((row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Fail with `Conflict` unless the container's positions are exactly `0..n-1`.
fn ensure_contiguous_tx(conn: &Connection, siblings: Siblings, container: i64) -> StoreResult<()> {
    let rows = positions_tx(conn, siblings, container)?;
    let contiguous = rows
        .iter()
        .enumerate()
        .all(|(index, (_, position))| *position == index as i64);
    if contiguous {
        return Ok(());
    }
    let positions: Vec<i64> = rows.iter().map(|(_, p)| *p).collect();
    Err(StoreError::Conflict(format!(
        "{} {} would hold positions {:?}; submit its complete final order",
        siblings.container_name(),
        container,
        positions
    )))
}

/// Close gaps left by deletes and moves. Relative order is kept.
pub(super) fn renumber_tx(conn: &Connection, siblings: Siblings, container: i64, now: i64) -> StoreResult<()> {
    let assignments: Vec<Assignment> = positions_tx(conn, siblings, container)?
        .into_iter()
        .enumerate()
        .filter(|(index, (_, position))| *position != *index as i64)
        .map(|(index, (id, _))| Assignment {
            id,
            position: index as i64,
            container: None,
        })
        .collect();
    bulk_assign_tx(conn, siblings, &assignments, Scope::Container(container), now)?;
    Ok(())
}

pub(super) fn reorder_lists(
    conn: &mut Connection,
    owner: &UserId,
    board_id: BoardId,
    batch: &ListReorder,
    max_batch: usize,
) -> StoreResult<usize> {
    batch.validate(max_batch)?;
    if batch
        .updates
        .iter()
        .any(|u| u.container.is_some_and(|c| c != board_id))
    {
        return Err(StoreError::Validation(
            "lists change boards through move, not reorder".to_string(),
        ));
    }

    let tx = write_tx(conn)?;
    board_tx(&tx, owner, board_id)?;
    let now = now_ms();
    let assignments: Vec<Assignment> = batch
        .updates
        .iter()
        .map(|u| Assignment {
            id: u.id.0,
            position: u.position,
            container: None,
        })
        .collect();
    let updated = bulk_assign_tx(
        &tx,
        Siblings::Lists,
        &assignments,
        Scope::Board { owner, board_id },
        now,
    )?;
    if updated < batch.len() {
        log::warn!(
            target: "corkboard.store.reorder",
            "List reorder on board {} matched {} of {} rows; rolled back",
            board_id,
            updated,
            batch.len()
        );
        return Err(StoreError::NotFound(format!(
            "{} of {} lists are not on board {}",
            batch.len() - updated,
            batch.len(),
            board_id
        )));
    }
    ensure_contiguous_tx(&tx, Siblings::Lists, board_id.0)?;
    touch_board_tx(&tx, board_id, now)?;
    tx.commit()?;
    log::debug!(target: "corkboard.store.reorder", "Reordered {} lists on board {}", updated, board_id);
    Ok(updated)
}

pub(super) fn reorder_items(
    conn: &mut Connection,
    owner: &UserId,
    batch: &ItemReorder,
    max_batch: usize,
) -> StoreResult<usize> {
    batch.validate(max_batch)?;
    let tx = write_tx(conn)?;

    // Current container of every requested item the owner can see.
    let current: HashMap<ItemId, ListId> = {
        let placeholders: Vec<String> = (2..batch.len() + 2).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "SELECT i.id, i.list_id FROM items i JOIN lists l ON l.id = i.list_id \
             WHERE l.user_id = ?1 AND i.id IN ({})",
            placeholders.join(", ")
        );
        let mut values = vec![SqlValue::Text(owner.as_str().to_string())];
        values.extend(batch.updates.iter().map(|u| SqlValue::Integer(u.id.0)));
        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), |row| {
            Ok((ItemId(row.get(0)?), ListId(row.get(1)?)))
        })?;
        rows.collect::<rusqlite::Result<HashMap<_, _>>>()?
    };
    if current.len() < batch.len() {
        let missing: Vec<String> = batch
            .ids()
            .into_iter()
            .filter(|id| !current.contains_key(id))
            .map(|id| id.to_string())
            .collect();
        log::warn!(
            target: "corkboard.store.reorder",
            "Item reorder for {} references unknown items {:?}",
            owner,
            missing
        );
        return Err(StoreError::NotFound(format!("items {}", missing.join(", "))));
    }

    let destinations: BTreeSet<ListId> = batch.updates.iter().filter_map(|u| u.container).collect();
    for list_id in &destinations {
        list_tx(&tx, owner, *list_id)?;
    }

    let now = now_ms();
    let assignments: Vec<Assignment> = batch
        .updates
        .iter()
        .map(|u| Assignment {
            id: u.id.0,
            position: u.position,
            container: u.container.map(|c| c.0),
        })
        .collect();
    let updated = bulk_assign_tx(&tx, Siblings::Items, &assignments, Scope::OwnedItems { owner }, now)?;
    if updated < batch.len() {
        log::warn!(
            target: "corkboard.store.reorder",
            "Item reorder matched {} of {} rows; rolled back",
            updated,
            batch.len()
        );
        return Err(StoreError::NotFound(format!(
            "{} of {} items could not be updated",
            batch.len() - updated,
            batch.len()
        )));
    }

    let touched: BTreeSet<ListId> = current.values().copied().chain(destinations).collect();
    let mut boards = BTreeSet::new();
    for list_id in &touched {
        ensure_contiguous_tx(&tx, Siblings::Items, list_id.0)?;
        boards.insert(list_tx(&tx, owner, *list_id)?.board_id);
    }
    for board_id in boards {
        touch_board_tx(&tx, board_id, now)?;
    }
    tx.commit()?;
    log::debug!(
        target: "corkboard.store.reorder",
        "Reordered {} items across {} lists",
        updated,
        touched.len()
    );
    Ok(updated)
}

pub(super) fn move_list(
    conn: &mut Connection,
    owner: &UserId,
    list_id: ListId,
    target: BoardId,
) -> StoreResult<List> {
    let tx = write_tx(conn)?;
    let list = list_tx(&tx, owner, list_id)?;
    board_tx(&tx, owner, target)?;
    if list.board_id == target {
        return Ok(list);
    }
    let now = now_ms();
    let position = next_list_position_tx(&tx, target)?;
    tx.execute(
        "UPDATE lists SET board_id = ?1, position = ?2, updated_at = ?3 WHERE id = ?4 AND user_id = ?5",
        params![target.0, position, now, list_id.0, owner.as_str()],
    )?;
    renumber_tx(&tx, Siblings::Lists, list.board_id.0, now)?;
    touch_board_tx(&tx, list.board_id, now)?;
    touch_board_tx(&tx, target, now)?;
    let moved = list_tx(&tx, owner, list_id)?;
    tx.commit()?;
    log::info!(
        target: "corkboard.store.reorder",
        "Moved list {} from board {} to board {}",
        list_id,
        list.board_id,
        target
    );
    Ok(moved)
}

pub(super) fn copy_list(
    conn: &mut Connection,
    owner: &UserId,
    list_id: ListId,
    target: BoardId,
) -> StoreResult<List> {
    let tx = write_tx(conn)?;
    list_tx(&tx, owner, list_id)?;
    board_tx(&tx, owner, target)?;
    let now = now_ms();
    let position = next_list_position_tx(&tx, target)?;
    tx.execute(
        "INSERT INTO lists (board_id, user_id, title, color, collapsed, position, created_at, updated_at) \
         SELECT ?1, user_id, title, color, collapsed, ?2, ?3, ?3 FROM lists WHERE id = ?4 AND user_id = ?5",
        params![target.0, position, now, list_id.0, owner.as_str()],
    )?;
    let copy_id = ListId(tx.last_insert_rowid());
    tx.execute(
        "INSERT INTO items (list_id, kind, title, url, content, favicon_url, position, created_at, updated_at) \
         SELECT ?1, kind, title, url, content, favicon_url, position, ?2, ?2 FROM items \
         WHERE list_id = ?3 ORDER BY position, id",
        params![copy_id.0, now, list_id.0],
    )?;
    renumber_tx(&tx, Siblings::Items, copy_id.0, now)?;
    touch_board_tx(&tx, target, now)?;
    let copy = tx.query_row(
        &format!("SELECT {} FROM lists l WHERE l.id = ?1", LIST_COLUMNS),
        params![copy_id.0],
        super::sqlite::row_to_list,
    )?;
    tx.commit()?;
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::super::sqlite::test_support::*;
    use super::super::sqlite::SqliteStorage;
    use super::super::BoardStorage;
    use super::*;
    use crate::ordering::PositionUpdate;
    use crate::types::{NewItem, NewList};

    fn order(store: &SqliteStorage, list_id: ListId) -> Vec<(ItemId, i64)> {
        let boards = store.list_boards(&alice()).unwrap();
        boards
            .iter()
            .filter_map(|b| store.load_board(&alice(), b.id).ok())
            .flat_map(|s| {
                s.items_in(list_id)
                    .map(|i| (i.id, i.position))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn new_list(title: &str) -> NewList {
        NewList {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_drag_last_item_to_top() {
        let (_dir, store) = open_store();
        let (_, list, items) = seeded(&store, 3);
        let (a, b, c) = (items[0].id, items[1].id, items[2].id);
        let batch = ItemReorder::from_order(None, &[c, a, b]);
        assert_eq!(store.reorder_items(&alice(), &batch).unwrap(), 3);
        assert_eq!(order(&store, list.id), vec![(c, 0), (a, 1), (b, 2)]);
    }

    #[test]
    fn test_retrying_a_reorder_is_idempotent() {
        let (_dir, store) = open_store();
        let (_, list, items) = seeded(&store, 3);
        let batch = ItemReorder::from_order(None, &[items[2].id, items[0].id, items[1].id]);
        store.reorder_items(&alice(), &batch).unwrap();
        let once = order(&store, list.id);
        store.reorder_items(&alice(), &batch).unwrap();
        assert_eq!(order(&store, list.id), once);
    }

    #[test]
    fn test_move_item_between_lists() {
        let (_dir, store) = open_store();
        let (board, source, items) = seeded(&store, 3);
        let destination = store.create_list(&alice(), board.id, &new_list("B")).unwrap();
        let kept = store
            .create_item(&alice(), destination.id, &NewItem::note("Kept", ""))
            .unwrap();

        let moved = items[1].id;
        let batch = ItemReorder::for_move(
            source.id,
            &[items[0].id, items[2].id],
            destination.id,
            &[moved, kept.id],
        );
        store.reorder_items(&alice(), &batch).unwrap();

        let snapshot = store.load_board(&alice(), board.id).unwrap();
        assert_eq!(snapshot.item_order(source.id), vec![items[0].id, items[2].id]);
        assert_eq!(snapshot.item_order(destination.id), vec![moved, kept.id]);
        assert_eq!(snapshot.item(moved).unwrap().list_id, destination.id);
    }

    #[test]
    fn test_move_with_only_destination_order_closes_source_when_last() {
        let (_dir, store) = open_store();
        let (board, source, items) = seeded(&store, 2);
        let destination = store.create_list(&alice(), board.id, &new_list("B")).unwrap();
        // Moving the last item leaves the source contiguous without resubmitting it.
        let batch = ItemReorder::from_order(Some(destination.id), &[items[1].id]);
        store.reorder_items(&alice(), &batch).unwrap();
        let snapshot = store.load_board(&alice(), board.id).unwrap();
        assert_eq!(snapshot.item_order(source.id), vec![items[0].id]);
        assert_eq!(snapshot.item_order(destination.id), vec![items[1].id]);
    }

    #[test]
    fn test_partial_order_is_rejected_without_writes() {
        let (_dir, store) = open_store();
        let (_, list, items) = seeded(&store, 3);
        let before = order(&store, list.id);
        // Only one entry: positions would become [0, 0, 2].
        let batch = ItemReorder::new(vec![PositionUpdate {
            id: items[1].id,
            position: 0,
            container: None,
        }]);
        let result = store.reorder_items(&alice(), &batch);
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(order(&store, list.id), before);
    }

    #[test]
    fn test_foreign_item_aborts_whole_batch() {
        let (_dir, store) = open_store();
        let (_, list, items) = seeded(&store, 2);
        let other_board = store.create_board(&mallory(), "Theirs").unwrap();
        let other_list = store.create_list(&mallory(), other_board.id, &new_list("X")).unwrap();
        let foreign = store
            .create_item(&mallory(), other_list.id, &NewItem::note("secret", ""))
            .unwrap();

        let before = order(&store, list.id);
        let batch = ItemReorder::from_order(None, &[items[1].id, items[0].id, foreign.id]);
        let result = store.reorder_items(&alice(), &batch);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(order(&store, list.id), before);
    }

    #[test]
    fn test_move_into_foreign_list_is_not_found() {
        let (_dir, store) = open_store();
        let (_, list, items) = seeded(&store, 1);
        let other_board = store.create_board(&mallory(), "Theirs").unwrap();
        let other_list = store.create_list(&mallory(), other_board.id, &new_list("X")).unwrap();
        let batch = ItemReorder::from_order(Some(other_list.id), &[items[0].id]);
        assert!(matches!(
            store.reorder_items(&alice(), &batch),
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(order(&store, list.id), vec![(items[0].id, 0)]);
    }

    #[test]
    fn test_mid_statement_failure_rolls_back() {
        let (_dir, store) = open_store();
        let (_, list, items) = seeded(&store, 3);
        {
            let conn = store.conn().unwrap();
            conn.execute_batch(&format!(
                "CREATE TRIGGER fail_mid_batch BEFORE UPDATE ON items WHEN NEW.id = {} \
                 BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
                items[1].id
            ))
            .unwrap();
        }
        let before = order(&store, list.id);
        let batch = ItemReorder::from_order(None, &[items[2].id, items[1].id, items[0].id]);
        let result = store.reorder_items(&alice(), &batch);
        assert!(matches!(result, Err(StoreError::Transient(_))));
        assert_eq!(order(&store, list.id), before);
    }

    #[test]
    fn test_reorder_lists() {
        let (_dir, store) = open_store();
        let (board, first, _) = seeded(&store, 0);
        let second = store.create_list(&alice(), board.id, &new_list("B")).unwrap();
        let third = store.create_list(&alice(), board.id, &new_list("C")).unwrap();
        let batch = ListReorder::from_order(None, &[third.id, first.id, second.id]);
        store.reorder_lists(&alice(), board.id, &batch).unwrap();
        let snapshot = store.load_board(&alice(), board.id).unwrap();
        assert_eq!(snapshot.list_order(), vec![third.id, first.id, second.id]);

        let elsewhere = ListReorder::from_order(Some(BoardId(board.id.0 + 1)), &[first.id]);
        assert!(matches!(
            store.reorder_lists(&alice(), board.id, &elsewhere),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            store.reorder_lists(&mallory(), board.id, &batch),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_move_list_appends_and_renumbers_source() {
        let (_dir, store) = open_store();
        let (home, first, items) = seeded(&store, 2);
        let second = store.create_list(&alice(), home.id, &new_list("B")).unwrap();
        let work = store.create_board(&alice(), "Work").unwrap();
        let existing = store.create_list(&alice(), work.id, &new_list("W")).unwrap();

        let moved = store.move_list(&alice(), first.id, work.id).unwrap();
        assert_eq!(moved.board_id, work.id);
        assert_eq!(moved.position, 1);

        let home_snapshot = store.load_board(&alice(), home.id).unwrap();
        assert_eq!(home_snapshot.lists.len(), 1);
        assert_eq!(home_snapshot.lists[0].id, second.id);
        assert_eq!(home_snapshot.lists[0].position, 0);

        let work_snapshot = store.load_board(&alice(), work.id).unwrap();
        assert_eq!(work_snapshot.list_order(), vec![existing.id, first.id]);
        assert_eq!(work_snapshot.item_order(first.id), items.iter().map(|i| i.id).collect::<Vec<_>>());
    }

    #[test]
    fn test_copy_list_duplicates_items_in_order() {
        let (_dir, store) = open_store();
        let (home, list, items) = seeded(&store, 3);
        let work = store.create_board(&alice(), "Work").unwrap();
        store
            .reorder_items(&alice(), &ItemReorder::from_order(None, &[items[2].id, items[0].id, items[1].id]))
            .unwrap();

        let copy = store.copy_list(&alice(), list.id, work.id).unwrap();
        assert_ne!(copy.id, list.id);
        assert_eq!(copy.position, 0);
        assert_eq!(copy.title, list.title);

        let copied: Vec<Option<String>> = store
            .load_board(&alice(), work.id)
            .unwrap()
            .items_in(copy.id)
            .map(|i| i.title.clone())
            .collect();
        let original: Vec<Option<String>> = store
            .load_board(&alice(), home.id)
            .unwrap()
            .items_in(list.id)
            .map(|i| i.title.clone())
            .collect();
        assert_eq!(copied, original);
        assert_eq!(original.len(), 3);
    }

    #[test]
    fn test_move_list_to_foreign_board_is_not_found() {
        let (_dir, store) = open_store();
        let (_, list, _) = seeded(&store, 0);
        let theirs = store.create_board(&mallory(), "Theirs").unwrap();
        assert!(matches!(
            store.move_list(&alice(), list.id, theirs.id),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.copy_list(&alice(), list.id, theirs.id),
            Err(StoreError::NotFound(_))
        ));
    }

    fn rotate_many(store: &SqliteStorage, owner: UserId, mut ids: Vec<ItemId>) -> Vec<ItemId> {
        for _ in 0..200 {
            ids.rotate_left(1);
            let batch = ItemReorder::from_order(None, &ids);
            assert_eq!(store.reorder_items(&owner, &batch).unwrap(), ids.len());
        }
        ids
    }

    #[test]
    fn test_concurrent_owners_reorder_without_busy_errors() {
        let (_dir, store) = open_store();
        let (_, list, items) = seeded(&store, 4);
        let board = store.create_board(&mallory(), "Theirs").unwrap();
        let theirs = store.create_list(&mallory(), board.id, &new_list("M")).unwrap();
        let their_items: Vec<ItemId> = (0..4)
            .map(|n| {
                store
                    .create_item(&mallory(), theirs.id, &NewItem::note(format!("M{}", n), ""))
                    .unwrap()
                    .id
            })
            .collect();
        let ours: Vec<ItemId> = items.iter().map(|i| i.id).collect();

        let shared = &store;
        let (ours, theirs_final) = std::thread::scope(|s| {
            let a = s.spawn(move || rotate_many(shared, alice(), ours));
            let b = s.spawn(move || rotate_many(shared, mallory(), their_items));
            (a.join().unwrap(), b.join().unwrap())
        });

        let positions: Vec<ItemId> = order(&store, list.id).into_iter().map(|(id, _)| id).collect();
        assert_eq!(positions, ours);
        let stored: Vec<ItemId> = store
            .load_board(&mallory(), board.id)
            .unwrap()
            .items_in(theirs.id)
            .map(|i| i.id)
            .collect();
        assert_eq!(stored, theirs_final);
    }
}

/// Board import. Export is a plain snapshot conversion, see `crate::transfer`.
use rusqlite::Connection;

use super::sqlite::{insert_board_tx, insert_item_tx, insert_list_tx, load_snapshot, now_ms};
use super::pool::write_tx;
use super::{StoreError, StoreResult};
use crate::snapshot::BoardSnapshot;
use crate::transfer::{BoardExport, EXPORT_FORMAT_VERSION};
use crate::types::UserId;

/// Recreate `export` as a new board of `owner`. Submitted positions only
/// decide the order; stored positions are always `0..n-1`.
pub(super) fn import_board(conn: &mut Connection, owner: &UserId, export: &BoardExport) -> StoreResult<BoardSnapshot> {
    if export.version > EXPORT_FORMAT_VERSION {
        return Err(StoreError::Validation(format!(
            "unsupported export version {} (max {})",
            export.version, EXPORT_FORMAT_VERSION
        )));
    }
    let export = export.clone().normalized();
    let now = now_ms();

    let tx = write_tx(conn)?;
    let board = insert_board_tx(&tx, owner, &export.title, now)?;
    for list in &export.lists {
        let created = insert_list_tx(&tx, owner, board.id, &list.to_new_list(), list.position, now)?;
        for item in &list.items {
            insert_item_tx(&tx, created.id, &item.to_new_item(), item.position, now)?;
        }
    }
    tx.commit()?;

    log::info!(
        target: "corkboard.store",
        "Imported board {} ({} lists) for {}",
        board.id,
        export.lists.len(),
        owner
    );
    load_snapshot(conn, owner, board.id)
}

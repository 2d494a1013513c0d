/// SQLite-backed `BoardStorage`.
///
/// - one pooled connection per call, every mutation inside one `IMMEDIATE`
///   transaction
/// - lists are scoped by `user_id` (and `board_id`), items through their list
/// - every list/item mutation touches the owning board's `updated_at`
use std::fs;

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::pool::{open_pool, write_tx, ConnectionPool, PooledConnection};
use super::{reorder, schema, transfer};
use super::{BoardStorage, OwnedEntity, OwnershipVerifier, StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::ordering::{ItemReorder, ListReorder};
use crate::snapshot::BoardSnapshot;
use crate::transfer::BoardExport;
use crate::types::*;

pub(super) const BOARD_COLUMNS: &str = "b.id, b.title, b.is_default, b.created_at, b.updated_at";
pub(super) const LIST_COLUMNS: &str = "l.id, l.board_id, l.title, l.color, l.collapsed, l.position";
pub(super) const ITEM_COLUMNS: &str =
    "i.id, i.list_id, i.kind, i.title, i.url, i.content, i.favicon_url, i.position";

pub struct SqliteStorage {
    pool: ConnectionPool,
    max_batch: usize,
}

impl SqliteStorage {
    /// Open (or create) the database and install the schema.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let pool = open_pool(&config.database_path, config.pool_size(), config.pool_timeout())?;
        let conn = pool.get()?;
        schema::install(&conn)?;
        drop(conn);
        log::info!(
            target: "corkboard.store",
            "Opened store at {} (pool size {})",
            config.database_path.display(),
            pool.max_size()
        );
        Ok(Self {
            pool,
            max_batch: config.max_batch.max(1),
        })
    }

    pub(super) fn conn(&self) -> StoreResult<PooledConnection> {
        Ok(self.pool.get()?)
    }
}

pub(super) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ── Row mapping ─────────────────────────────────────────────────────────

pub(super) fn row_to_board(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: BoardId(row.get(0)?),
        title: row.get(1)?,
        is_default: row.get::<_, i64>(2)? != 0,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

pub(super) fn row_to_list(row: &Row<'_>) -> rusqlite::Result<List> {
    Ok(List {
        id: ListId(row.get(0)?),
        board_id: BoardId(row.get(1)?),
        title: row.get(2)?,
        color: row.get(3)?,
        collapsed: row.get::<_, i64>(4)? != 0,
        position: row.get(5)?,
    })
}

pub(super) fn row_to_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    let kind: String = row.get(2)?;
    let kind = ItemKind::from_str(&kind).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(2, "kind".to_string(), rusqlite::types::Type::Text)
    })?;
    Ok(Item {
        id: ItemId(row.get(0)?),
        list_id: ListId(row.get(1)?),
        kind,
        title: row.get(3)?,
        url: row.get(4)?,
        content: row.get(5)?,
        favicon_url: row.get(6)?,
        position: row.get(7)?,
    })
}

// ── Owner-scoped lookups (usable inside a transaction) ──────────────────

pub(super) fn board_tx(conn: &Connection, owner: &UserId, board_id: BoardId) -> StoreResult<Board> {
    conn.query_row(
        &format!("SELECT {} FROM boards b WHERE b.id = ?1 AND b.user_id = ?2", BOARD_COLUMNS),
        params![board_id.0, owner.as_str()],
        row_to_board,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("board", board_id))
}

pub(super) fn list_tx(conn: &Connection, owner: &UserId, list_id: ListId) -> StoreResult<List> {
    conn.query_row(
        &format!("SELECT {} FROM lists l WHERE l.id = ?1 AND l.user_id = ?2", LIST_COLUMNS),
        params![list_id.0, owner.as_str()],
        row_to_list,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("list", list_id))
}

pub(super) fn item_tx(conn: &Connection, owner: &UserId, item_id: ItemId) -> StoreResult<Item> {
    conn.query_row(
        &format!(
            "SELECT {} FROM items i JOIN lists l ON l.id = i.list_id \
             WHERE i.id = ?1 AND l.user_id = ?2",
            ITEM_COLUMNS
        ),
        params![item_id.0, owner.as_str()],
        row_to_item,
    )
    .optional()?
    .ok_or_else(|| StoreError::not_found("item", item_id))
}

pub(super) fn touch_board_tx(conn: &Connection, board_id: BoardId, now: i64) -> StoreResult<()> {
    conn.execute(
        "UPDATE boards SET updated_at = ?1 WHERE id = ?2",
        params![now, board_id.0],
    )?;
    Ok(())
}

pub(super) fn next_list_position_tx(conn: &Connection, board_id: BoardId) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM lists WHERE board_id = ?1",
        params![board_id.0],
        |row| row.get(0),
    )?)
}

pub(super) fn next_item_position_tx(conn: &Connection, list_id: ListId) -> StoreResult<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM items WHERE list_id = ?1",
        params![list_id.0],
        |row| row.get(0),
    )?)
}

// ── Validation ──────────────────────────────────────────────────────────

fn required_title(title: &str, what: &str) -> StoreResult<String> {
    non_blank(Some(title)).ok_or_else(|| StoreError::Validation(format!("{} title must not be empty", what)))
}

/// Normalize item fields and enforce the per-kind rules: bookmarks need a
/// URL (the title falls back to it), notes need a title.
pub(super) fn validate_item(item: &NewItem) -> StoreResult<NewItem> {
    let title = non_blank(item.title.as_deref());
    let url = non_blank(item.url.as_deref());
    let content = item.content.clone().filter(|c| !c.trim().is_empty());
    let favicon_url = non_blank(item.favicon_url.as_deref());
    let title = match item.kind {
        ItemKind::Bookmark => {
            let url = url
                .as_ref()
                .ok_or_else(|| StoreError::Validation("bookmark url must not be empty".to_string()))?;
            Some(title.unwrap_or_else(|| url.clone()))
        }
        ItemKind::Note => Some(
            title.ok_or_else(|| StoreError::Validation("note title must not be empty".to_string()))?,
        ),
    };
    Ok(NewItem {
        kind: item.kind,
        title,
        url,
        content,
        favicon_url,
    })
}

// ── Inserts shared by create and import ─────────────────────────────────

pub(super) fn insert_board_tx(conn: &Connection, owner: &UserId, title: &str, now: i64) -> StoreResult<Board> {
    let title = required_title(title, "board")?;
    let has_default: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM boards WHERE user_id = ?1 AND is_default = 1)",
        params![owner.as_str()],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO boards (user_id, title, is_default, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        params![owner.as_str(), title, !has_default as i64, now],
    )?;
    Ok(Board {
        id: BoardId(conn.last_insert_rowid()),
        title,
        is_default: !has_default,
        created_at: now,
        updated_at: now,
    })
}

pub(super) fn insert_list_tx(
    conn: &Connection,
    owner: &UserId,
    board_id: BoardId,
    list: &NewList,
    position: i64,
    now: i64,
) -> StoreResult<List> {
    let title = required_title(&list.title, "list")?;
    let color = non_blank(list.color.as_deref());
    conn.execute(
        "INSERT INTO lists (board_id, user_id, title, color, collapsed, position, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![board_id.0, owner.as_str(), title, color, list.collapsed as i64, position, now],
    )?;
    Ok(List {
        id: ListId(conn.last_insert_rowid()),
        board_id,
        title,
        color,
        collapsed: list.collapsed,
        position,
    })
}

pub(super) fn insert_item_tx(
    conn: &Connection,
    list_id: ListId,
    item: &NewItem,
    position: i64,
    now: i64,
) -> StoreResult<Item> {
    let item = validate_item(item)?;
    conn.execute(
        "INSERT INTO items (list_id, kind, title, url, content, favicon_url, position, created_at, updated_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            list_id.0,
            item.kind.as_str(),
            item.title,
            item.url,
            item.content,
            item.favicon_url,
            position,
            now
        ],
    )?;
    Ok(Item {
        id: ItemId(conn.last_insert_rowid()),
        list_id,
        kind: item.kind,
        title: item.title,
        url: item.url,
        content: item.content,
        favicon_url: item.favicon_url,
        position,
    })
}

/// Read a whole board inside one read transaction, so lists and items come
/// from the same committed state.
pub(super) fn load_snapshot(conn: &mut Connection, owner: &UserId, board_id: BoardId) -> StoreResult<BoardSnapshot> {
    let tx = conn.transaction()?;
    let board = board_tx(&tx, owner, board_id)?;
    let lists = {
        let mut stmt = tx.prepare(&format!(
            "SELECT {} FROM lists l WHERE l.board_id = ?1 AND l.user_id = ?2 ORDER BY l.position, l.id",
            LIST_COLUMNS
        ))?;
        let rows = stmt.query_map(params![board_id.0, owner.as_str()], row_to_list)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    let items = {
        let mut stmt = tx.prepare(&format!(
            "SELECT {} FROM items i JOIN lists l ON l.id = i.list_id \
             WHERE l.board_id = ?1 AND l.user_id = ?2 \
             ORDER BY l.position, l.id, i.position, i.id",
            ITEM_COLUMNS
        ))?;
        let rows = stmt.query_map(params![board_id.0, owner.as_str()], row_to_item)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };
    tx.commit()?;
    Ok(BoardSnapshot::new(board, lists, items))
}

impl OwnershipVerifier for SqliteStorage {
    fn verify_ownership(&self, entity: OwnedEntity, user: &UserId) -> bool {
        let conn = match self.conn() {
            Ok(conn) => conn,
            Err(e) => {
                log::warn!(target: "corkboard.store", "Ownership check failed: {}", e);
                return false;
            }
        };
        let result = match entity {
            OwnedEntity::Board(id) => board_tx(&conn, user, id).map(|_| ()),
            OwnedEntity::List(id) => list_tx(&conn, user, id).map(|_| ()),
            OwnedEntity::Item(id) => item_tx(&conn, user, id).map(|_| ()),
        };
        match result {
            Ok(()) => true,
            Err(StoreError::NotFound(_)) => false,
            Err(e) => {
                log::warn!(target: "corkboard.store", "Ownership check for {:?} failed: {}", entity, e);
                false
            }
        }
    }
}

impl BoardStorage for SqliteStorage {
    fn list_boards(&self, owner: &UserId) -> StoreResult<Vec<Board>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM boards b WHERE b.user_id = ?1 ORDER BY b.updated_at DESC, b.id DESC",
            BOARD_COLUMNS
        ))?;
        let rows = stmt.query_map(params![owner.as_str()], row_to_board)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn create_board(&self, owner: &UserId, title: &str) -> StoreResult<Board> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let board = insert_board_tx(&tx, owner, title, now_ms())?;
        tx.commit()?;
        log::info!(target: "corkboard.store", "Created board {} for {}", board.id, owner);
        Ok(board)
    }

    fn rename_board(&self, owner: &UserId, board_id: BoardId, title: &str) -> StoreResult<Board> {
        let title = required_title(title, "board")?;
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let changed = tx.execute(
            "UPDATE boards SET title = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![title, now_ms(), board_id.0, owner.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("board", board_id));
        }
        let board = board_tx(&tx, owner, board_id)?;
        tx.commit()?;
        Ok(board)
    }

    fn set_default_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<Board> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let board = board_tx(&tx, owner, board_id)?;
        if board.is_default {
            return Ok(board);
        }
        // Clear first: the partial unique index allows one default per user.
        tx.execute(
            "UPDATE boards SET is_default = 0 WHERE user_id = ?1 AND is_default = 1",
            params![owner.as_str()],
        )?;
        tx.execute(
            "UPDATE boards SET is_default = 1 WHERE id = ?1 AND user_id = ?2",
            params![board_id.0, owner.as_str()],
        )?;
        let board = board_tx(&tx, owner, board_id)?;
        tx.commit()?;
        Ok(board)
    }

    fn delete_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let board = board_tx(&tx, owner, board_id)?;
        if board.is_default {
            return Err(StoreError::Conflict(format!(
                "board {} is the default board and cannot be deleted",
                board_id
            )));
        }
        tx.execute(
            "DELETE FROM boards WHERE id = ?1 AND user_id = ?2",
            params![board_id.0, owner.as_str()],
        )?;
        tx.commit()?;
        log::info!(target: "corkboard.store", "Deleted board {} for {}", board_id, owner);
        Ok(())
    }

    fn load_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<BoardSnapshot> {
        let mut conn = self.conn()?;
        load_snapshot(&mut conn, owner, board_id)
    }

    fn create_list(&self, owner: &UserId, board_id: BoardId, list: &NewList) -> StoreResult<List> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        board_tx(&tx, owner, board_id)?;
        let now = now_ms();
        let position = next_list_position_tx(&tx, board_id)?;
        let list = insert_list_tx(&tx, owner, board_id, list, position, now)?;
        touch_board_tx(&tx, board_id, now)?;
        tx.commit()?;
        Ok(list)
    }

    fn update_list(&self, owner: &UserId, list_id: ListId, patch: &ListPatch) -> StoreResult<List> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let mut list = list_tx(&tx, owner, list_id)?;
        if let Some(title) = &patch.title {
            list.title = required_title(title, "list")?;
        }
        if let Some(color) = &patch.color {
            list.color = non_blank(Some(color));
        }
        if let Some(collapsed) = patch.collapsed {
            list.collapsed = collapsed;
        }
        let now = now_ms();
        tx.execute(
            "UPDATE lists SET title = ?1, color = ?2, collapsed = ?3, updated_at = ?4 \
             WHERE id = ?5 AND user_id = ?6",
            params![list.title, list.color, list.collapsed as i64, now, list_id.0, owner.as_str()],
        )?;
        touch_board_tx(&tx, list.board_id, now)?;
        tx.commit()?;
        Ok(list)
    }

    fn delete_list(&self, owner: &UserId, list_id: ListId) -> StoreResult<()> {
        if !self.verify_ownership(OwnedEntity::List(list_id), owner) {
            return Err(StoreError::not_found("list", list_id));
        }
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let list = list_tx(&tx, owner, list_id)?;
        tx.execute(
            "DELETE FROM lists WHERE id = ?1 AND user_id = ?2",
            params![list_id.0, owner.as_str()],
        )?;
        let now = now_ms();
        reorder::renumber_tx(&tx, reorder::Siblings::Lists, list.board_id.0, now)?;
        touch_board_tx(&tx, list.board_id, now)?;
        tx.commit()?;
        Ok(())
    }

    fn create_item(&self, owner: &UserId, list_id: ListId, item: &NewItem) -> StoreResult<Item> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let list = list_tx(&tx, owner, list_id)?;
        let now = now_ms();
        let position = next_item_position_tx(&tx, list_id)?;
        let item = insert_item_tx(&tx, list_id, item, position, now)?;
        touch_board_tx(&tx, list.board_id, now)?;
        tx.commit()?;
        Ok(item)
    }

    fn update_item(&self, owner: &UserId, item_id: ItemId, patch: &ItemPatch) -> StoreResult<Item> {
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let current = item_tx(&tx, owner, item_id)?;
        let merged = validate_item(&NewItem {
            kind: current.kind,
            title: patch.title.clone().or(current.title),
            url: patch.url.clone().or(current.url),
            content: patch.content.clone().or(current.content),
            favicon_url: patch.favicon_url.clone().or(current.favicon_url),
        })?;
        let now = now_ms();
        tx.execute(
            "UPDATE items SET title = ?1, url = ?2, content = ?3, favicon_url = ?4, updated_at = ?5 WHERE id = ?6",
            params![merged.title, merged.url, merged.content, merged.favicon_url, now, item_id.0],
        )?;
        let list = list_tx(&tx, owner, current.list_id)?;
        touch_board_tx(&tx, list.board_id, now)?;
        tx.commit()?;
        Ok(Item {
            id: item_id,
            list_id: current.list_id,
            kind: merged.kind,
            title: merged.title,
            url: merged.url,
            content: merged.content,
            favicon_url: merged.favicon_url,
            position: current.position,
        })
    }

    fn delete_item(&self, owner: &UserId, item_id: ItemId) -> StoreResult<()> {
        if !self.verify_ownership(OwnedEntity::Item(item_id), owner) {
            return Err(StoreError::not_found("item", item_id));
        }
        let mut conn = self.conn()?;
        let tx = write_tx(&mut conn)?;
        let item = item_tx(&tx, owner, item_id)?;
        let list = list_tx(&tx, owner, item.list_id)?;
        tx.execute("DELETE FROM items WHERE id = ?1", params![item_id.0])?;
        let now = now_ms();
        reorder::renumber_tx(&tx, reorder::Siblings::Items, item.list_id.0, now)?;
        touch_board_tx(&tx, list.board_id, now)?;
        tx.commit()?;
        Ok(())
    }

    fn reorder_lists(&self, owner: &UserId, board_id: BoardId, batch: &ListReorder) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        reorder::reorder_lists(&mut conn, owner, board_id, batch, self.max_batch)
    }

    fn reorder_items(&self, owner: &UserId, batch: &ItemReorder) -> StoreResult<usize> {
        let mut conn = self.conn()?;
        reorder::reorder_items(&mut conn, owner, batch, self.max_batch)
    }

    fn move_list(&self, owner: &UserId, list_id: ListId, target: BoardId) -> StoreResult<List> {
        let mut conn = self.conn()?;
        reorder::move_list(&mut conn, owner, list_id, target)
    }

    fn copy_list(&self, owner: &UserId, list_id: ListId, target: BoardId) -> StoreResult<List> {
        let mut conn = self.conn()?;
        reorder::copy_list(&mut conn, owner, list_id, target)
    }

    fn export_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<BoardExport> {
        let snapshot = self.load_board(owner, board_id)?;
        Ok(BoardExport::from_snapshot(&snapshot))
    }

    fn import_board(&self, owner: &UserId, export: &BoardExport) -> StoreResult<BoardSnapshot> {
        let mut conn = self.conn()?;
        transfer::import_board(&mut conn, owner, export)
    }
}

/// SQLite schema for boards, lists and items.
///
/// Only what ownership scoping and ordering need: every list carries its
/// owner, items are owned through their list.
use rusqlite::Connection;

use super::StoreResult;

const SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS boards (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      user_id TEXT NOT NULL,
      title TEXT NOT NULL,
      is_default INTEGER NOT NULL DEFAULT 0,
      created_at INTEGER NOT NULL,
      updated_at INTEGER NOT NULL
    );

    -- At most one default board per user.
    CREATE UNIQUE INDEX IF NOT EXISTS idx_boards_single_default
      ON boards(user_id) WHERE is_default = 1;

    CREATE TABLE IF NOT EXISTS lists (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
      user_id TEXT NOT NULL,
      title TEXT NOT NULL,
      color TEXT,
      collapsed INTEGER NOT NULL DEFAULT 0,
      position INTEGER NOT NULL DEFAULT 0,
      created_at INTEGER NOT NULL,
      updated_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_lists_board_position ON lists(board_id, position, id);
    CREATE INDEX IF NOT EXISTS idx_lists_user ON lists(user_id);

    CREATE TABLE IF NOT EXISTS items (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      list_id INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
      kind TEXT NOT NULL,
      title TEXT,
      url TEXT,
      content TEXT,
      favicon_url TEXT,
      position INTEGER NOT NULL DEFAULT 0,
      created_at INTEGER NOT NULL,
      updated_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_items_list_position ON items(list_id, position, id);
"#;

pub(super) fn install(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SQL)?;
    Ok(())
}

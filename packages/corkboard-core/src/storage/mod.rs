pub mod pool;
mod reorder;
mod schema;
pub mod sqlite;
mod transfer;

use serde::{Deserialize, Serialize};

use crate::ordering::{ItemReorder, ListReorder};
use crate::snapshot::BoardSnapshot;
use crate::transfer::BoardExport;
use crate::types::*;

/// Ownership-scoped storage for boards, lists and items.
///
/// Every call names the authenticated owner. Entities the owner cannot see
/// are reported as `NotFound`, exactly like entities that do not exist.
pub trait BoardStorage: Send + Sync {
    /// Boards of the owner, most recently touched first.
    fn list_boards(&self, owner: &UserId) -> StoreResult<Vec<Board>>;

    /// Create a board. The owner's first board becomes the default.
    fn create_board(&self, owner: &UserId, title: &str) -> StoreResult<Board>;

    fn rename_board(&self, owner: &UserId, board_id: BoardId, title: &str) -> StoreResult<Board>;

    /// Make `board_id` the owner's single default board.
    fn set_default_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<Board>;

    /// Delete a board with its lists and items. The default board cannot be
    /// deleted.
    fn delete_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<()>;

    /// Combined load: the board with all of its lists and items.
    fn load_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<BoardSnapshot>;

    fn create_list(&self, owner: &UserId, board_id: BoardId, list: &NewList) -> StoreResult<List>;

    fn update_list(&self, owner: &UserId, list_id: ListId, patch: &ListPatch) -> StoreResult<List>;

    fn delete_list(&self, owner: &UserId, list_id: ListId) -> StoreResult<()>;

    fn create_item(&self, owner: &UserId, list_id: ListId, item: &NewItem) -> StoreResult<Item>;

    fn update_item(&self, owner: &UserId, item_id: ItemId, patch: &ItemPatch) -> StoreResult<Item>;

    fn delete_item(&self, owner: &UserId, item_id: ItemId) -> StoreResult<()>;

    /// Persist the final order of a board's lists in one transaction.
    /// Returns the number of rows rewritten.
    fn reorder_lists(&self, owner: &UserId, board_id: BoardId, batch: &ListReorder) -> StoreResult<usize>;

    /// Persist the final order of one or more lists' items, including moves
    /// between lists, in one transaction. Returns the number of rows rewritten.
    fn reorder_items(&self, owner: &UserId, batch: &ItemReorder) -> StoreResult<usize>;

    /// Move a list to the end of another board.
    fn move_list(&self, owner: &UserId, list_id: ListId, target: BoardId) -> StoreResult<List>;

    /// Copy a list and all of its items to the end of another board.
    fn copy_list(&self, owner: &UserId, list_id: ListId, target: BoardId) -> StoreResult<List>;

    fn export_board(&self, owner: &UserId, board_id: BoardId) -> StoreResult<BoardExport>;

    /// Recreate an exported board for the owner with fresh, contiguous
    /// positions.
    fn import_board(&self, owner: &UserId, export: &BoardExport) -> StoreResult<BoardSnapshot>;
}

/// Entity reference accepted by ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedEntity {
    Board(BoardId),
    List(ListId),
    Item(ItemId),
}

/// Ownership collaborator: does `user` own `entity`?
pub trait OwnershipVerifier: Send + Sync {
    fn verify_ownership(&self, entity: OwnedEntity, user: &UserId) -> bool;
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Missing, or owned by someone else. Callers cannot tell which.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection or transaction failure; the operation was rolled back.
    #[error("Store unavailable: {0}")]
    Transient(String),
}

/// Stable, serializable classification of a `StoreError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Transient,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Validation(_) => ErrorKind::Validation,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Transient(_) => ErrorKind::Transient,
        }
    }

    pub(crate) fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        StoreError::NotFound(format!("{} {}", what, id))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound("row".to_string()),
            other => StoreError::Transient(other.to_string()),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Transient(value.to_string())
    }
}

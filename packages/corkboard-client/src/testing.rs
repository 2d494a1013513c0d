//! In-process `BoardApi` backed by a temporary SQLite store, with switches
//! for simulating a failing server.
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use corkboard_core::fingerprint::SnapshotFingerprint;
use corkboard_core::ordering::{ItemReorder, ListReorder};
use corkboard_core::types::*;
use corkboard_core::{BoardStorage, ErrorKind, SqliteStorage, StoreConfig, StoreError};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::api::{BoardApi, Fetched};
use crate::error::{ClientError, ClientResult};

pub struct StoreApi {
    _dir: TempDir,
    pub store: SqliteStorage,
    pub user: UserId,
    pub fail_loads: AtomicBool,
    pub fail_reorders: AtomicBool,
    /// Report one row fewer than the store rewrote.
    pub short_reorders: AtomicBool,
    pub loads: AtomicUsize,
    /// Park `fetch_board` after it has read the store: it signals `fetched`
    /// and answers once `release` is notified.
    pub hold_fetch: AtomicBool,
    pub fetched: Notify,
    pub release: Notify,
}

impl StoreApi {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SqliteStorage::open(&StoreConfig::at(dir.path().join("fake.db"))).unwrap();
        Self {
            _dir: dir,
            store,
            user: UserId::new("alice"),
            fail_loads: AtomicBool::new(false),
            fail_reorders: AtomicBool::new(false),
            short_reorders: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            hold_fetch: AtomicBool::new(false),
            fetched: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Board with one list per entry of `items`, each holding that many notes.
    pub fn seed(&self, items: &[usize]) -> (Board, Vec<List>, Vec<Vec<Item>>) {
        let board = self.store.create_board(&self.user, "Home").unwrap();
        let mut lists = Vec::new();
        let mut contents = Vec::new();
        for (n, count) in items.iter().enumerate() {
            let list = self
                .store
                .create_list(
                    &self.user,
                    board.id,
                    &NewList {
                        title: format!("List {}", n),
                        ..NewList::default()
                    },
                )
                .unwrap();
            let created = (0..*count)
                .map(|i| {
                    self.store
                        .create_item(&self.user, list.id, &NewItem::note(format!("Note {}.{}", n, i), ""))
                        .unwrap()
                })
                .collect();
            lists.push(list);
            contents.push(created);
        }
        (board, lists, contents)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn unavailable() -> ClientError {
        ClientError::Api {
            status: 503,
            kind: Some(ErrorKind::Transient),
            message: "store unavailable".to_string(),
        }
    }
}

fn api_err(e: StoreError) -> ClientError {
    let status = match e.kind() {
        ErrorKind::NotFound => 404,
        ErrorKind::Validation => 422,
        ErrorKind::Conflict => 409,
        ErrorKind::Transient => 503,
    };
    ClientError::Api {
        status,
        kind: Some(e.kind()),
        message: e.to_string(),
    }
}

#[async_trait]
impl BoardApi for StoreApi {
    async fn list_boards(&self) -> ClientResult<Vec<Board>> {
        self.store.list_boards(&self.user).map_err(api_err)
    }

    async fn create_board(&self, title: &str) -> ClientResult<Board> {
        self.store.create_board(&self.user, title).map_err(api_err)
    }

    async fn fetch_board(&self, board_id: BoardId, known: Option<&SnapshotFingerprint>) -> ClientResult<Fetched> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let snapshot = self.store.load_board(&self.user, board_id).map_err(api_err)?;
        if self.hold_fetch.load(Ordering::SeqCst) {
            self.fetched.notify_one();
            self.release.notified().await;
        }
        let fingerprint = SnapshotFingerprint::of(&snapshot);
        if known == Some(&fingerprint) {
            return Ok(Fetched::NotModified);
        }
        Ok(Fetched::Modified {
            snapshot,
            fingerprint: Some(fingerprint),
        })
    }

    async fn create_list(&self, board_id: BoardId, list: &NewList) -> ClientResult<List> {
        self.store.create_list(&self.user, board_id, list).map_err(api_err)
    }

    async fn update_list(&self, list_id: ListId, patch: &ListPatch) -> ClientResult<List> {
        self.store.update_list(&self.user, list_id, patch).map_err(api_err)
    }

    async fn delete_list(&self, list_id: ListId) -> ClientResult<()> {
        self.store.delete_list(&self.user, list_id).map_err(api_err)
    }

    async fn move_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List> {
        self.store.move_list(&self.user, list_id, target).map_err(api_err)
    }

    async fn copy_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List> {
        self.store.copy_list(&self.user, list_id, target).map_err(api_err)
    }

    async fn create_item(&self, list_id: ListId, item: &NewItem) -> ClientResult<Item> {
        self.store.create_item(&self.user, list_id, item).map_err(api_err)
    }

    async fn update_item(&self, item_id: ItemId, patch: &ItemPatch) -> ClientResult<Item> {
        self.store.update_item(&self.user, item_id, patch).map_err(api_err)
    }

    async fn delete_item(&self, item_id: ItemId) -> ClientResult<()> {
        self.store.delete_item(&self.user, item_id).map_err(api_err)
    }

    async fn reorder_lists(&self, board_id: BoardId, batch: &ListReorder) -> ClientResult<usize> {
        if self.fail_reorders.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let updated = self.store.reorder_lists(&self.user, board_id, batch).map_err(api_err)?;
        Ok(self.reported(updated))
    }

    async fn reorder_items(&self, batch: &ItemReorder) -> ClientResult<usize> {
        if self.fail_reorders.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        let updated = self.store.reorder_items(&self.user, batch).map_err(api_err)?;
        Ok(self.reported(updated))
    }
}

impl StoreApi {
    fn reported(&self, updated: usize) -> usize {
        if self.short_reorders.load(Ordering::SeqCst) {
            updated.saturating_sub(1)
        } else {
            updated
        }
    }
}

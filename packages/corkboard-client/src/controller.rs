/// View controller: owns the board cache, the edit session and the event
/// channel, and mediates every call to the remote API.
///
/// Loads paint from the cache first and reconcile in the background.
/// Reorders are applied optimistically and rolled back by a reload when the
/// server refuses them.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use corkboard_core::diff::snapshots_match;
use corkboard_core::ordering::{ItemReorder, ListReorder};
use corkboard_core::types::*;
use corkboard_core::BoardSnapshot;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::api::{BoardApi, Fetched};
use crate::cache::{BoardCache, CachedBoard, LocalStore};
use crate::drag::{ItemSortable, ListSortable};
use crate::error::{ClientError, ClientResult};
use crate::events::{BoardEvent, EditOutcome, EventBus, PaintSource};
use crate::pending::{Draft, EditTarget, EntityKind, EntityRef, TempId};
use crate::session::{Closed, EditSession, Transition};

/// Outcome of a background reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The server agreed with the cache; nothing was repainted.
    Unchanged,
    /// The cache was replaced and the board repainted.
    Replaced,
    /// The fetch failed and the cached board stayed on screen.
    StaleKept,
    /// The cache changed locally while the fetch was in flight, so the
    /// fetched snapshot was dropped.
    Superseded,
}

/// Returned by `load_board`: the snapshot to paint right away, if any, and
/// the background reconciliation.
pub struct LoadHandle {
    pub cached: Option<BoardSnapshot>,
    pub refresh: JoinHandle<ClientResult<RefreshOutcome>>,
}

/// Container a reorder is submitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ReorderKey {
    Board(BoardId),
    List(ListId),
}

/// Marks containers as having a reorder in flight until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<ReorderKey>>>,
    keys: Vec<ReorderKey>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        for key in &self.keys {
            set.remove(key);
        }
    }
}

pub struct BoardController<A> {
    api: Arc<A>,
    cache: Arc<Mutex<BoardCache>>,
    store: Option<Arc<LocalStore>>,
    events: EventBus,
    session: EditSession,
    in_flight: Arc<Mutex<HashSet<ReorderKey>>>,
}

impl<A> Clone for BoardController<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            cache: self.cache.clone(),
            store: self.store.clone(),
            events: self.events.clone(),
            session: self.session.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl<A: BoardApi> BoardController<A> {
    pub fn new(api: A) -> Self {
        Self::build(api, BoardCache::default(), None)
    }

    /// Controller whose cache is mirrored to `store`. A slot left by a
    /// previous run is loaded for the first paint.
    pub fn with_store(api: A, store: LocalStore) -> Self {
        let slot = match store.load() {
            Ok(slot) => slot,
            Err(e) => {
                log::warn!(
                    target: "corkboard.client.cache",
                    "Ignoring unreadable cache {}: {}",
                    store.path().display(),
                    e
                );
                None
            }
        };
        Self::build(api, BoardCache::new(slot), Some(Arc::new(store)))
    }

    fn build(api: A, cache: BoardCache, store: Option<Arc<LocalStore>>) -> Self {
        Self {
            api: Arc::new(api),
            cache: Arc::new(Mutex::new(cache)),
            store,
            events: EventBus::default(),
            session: EditSession::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    /// Copy of the cached snapshot of `board_id`.
    pub fn cached(&self, board_id: BoardId) -> Option<BoardSnapshot> {
        self.cache().snapshot(board_id).cloned()
    }

    pub fn draft(&self) -> Option<Draft> {
        self.cache().draft().copied()
    }

    /// Drag engine for the list strip of `board_id`.
    pub fn list_sortable(&self, board_id: BoardId) -> ListSortable {
        ListSortable::new(board_id, &self.session)
    }

    /// Drag engine for the items of `list_id`.
    pub fn item_sortable(&self, list_id: ListId) -> ItemSortable {
        ItemSortable::new(list_id, &self.session)
    }

    fn cache(&self) -> MutexGuard<'_, BoardCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let Some(current) = self.cache().current().cloned() else {
            return;
        };
        if let Err(e) = store.save(&current) {
            log::warn!(target: "corkboard.client.cache", "Failed to persist board cache: {}", e);
        }
    }

    fn forget_persisted(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                log::warn!(target: "corkboard.client.cache", "Failed to clear board cache: {}", e);
            }
        }
    }

    // ── Loading ──────────────────────────────────────────────────────────

    /// Paint `board_id` from the cache when possible, then reconcile with the
    /// server in the background.
    pub fn load_board(&self, board_id: BoardId) -> LoadHandle {
        let cached = self.cached(board_id);
        if cached.is_some() {
            self.events.emit(BoardEvent::Painted {
                board_id,
                source: PaintSource::Cache,
            });
        }
        let this = self.clone();
        let refresh = tokio::spawn(async move { this.refresh(board_id).await });
        LoadHandle { cached, refresh }
    }

    /// Fetch the authoritative snapshot and replace the cache only if it
    /// differs structurally and nothing was changed locally meanwhile.
    pub async fn refresh(&self, board_id: BoardId) -> ClientResult<RefreshOutcome> {
        let (known, generation) = {
            let cache = self.cache();
            (cache.get(board_id).and_then(|c| c.fingerprint.clone()), cache.generation())
        };
        let fetched = self.api.fetch_board(board_id, known.as_ref()).await;

        let (snapshot, fingerprint) = match fetched {
            Ok(Fetched::NotModified) => {
                self.events.emit(BoardEvent::Unchanged { board_id });
                return Ok(RefreshOutcome::Unchanged);
            }
            Ok(Fetched::Modified { snapshot, fingerprint }) => (snapshot, fingerprint),
            Err(e) => return self.refresh_failed(board_id, e),
        };

        let (unchanged, switched_draft) = {
            let mut cache = self.cache();
            if cache.generation() != generation {
                log::debug!(
                    target: "corkboard.client.cache",
                    "Dropping fetch of board {} overtaken by a local change",
                    board_id
                );
                return Ok(RefreshOutcome::Superseded);
            }
            let unchanged = cache
                .snapshot(board_id)
                .is_some_and(|current| snapshots_match(current, &snapshot));
            (unchanged, cache.replace(snapshot, fingerprint))
        };
        if let Some(draft) = switched_draft {
            self.discard_draft_of_previous_board(draft);
        }
        self.persist();

        if unchanged {
            log::debug!(target: "corkboard.client.cache", "Board {} unchanged on server", board_id);
            self.events.emit(BoardEvent::Unchanged { board_id });
            Ok(RefreshOutcome::Unchanged)
        } else {
            self.events.emit(BoardEvent::Painted {
                board_id,
                source: PaintSource::Server,
            });
            Ok(RefreshOutcome::Replaced)
        }
    }

    fn refresh_failed(&self, board_id: BoardId, error: ClientError) -> ClientResult<RefreshOutcome> {
        let has_cache = self.cache().get(board_id).is_some();
        if has_cache {
            log::warn!(
                target: "corkboard.client.cache",
                "Refresh of board {} failed, keeping cached copy: {}",
                board_id,
                error
            );
            self.events.emit(BoardEvent::StaleKept {
                board_id,
                error: error.to_string(),
            });
            Ok(RefreshOutcome::StaleKept)
        } else {
            log::error!(target: "corkboard.client.cache", "Board {} could not be loaded: {}", board_id, error);
            self.events.emit(BoardEvent::LoadFailed {
                board_id,
                error: error.to_string(),
            });
            Err(ClientError::LoadFailed(board_id, error.to_string()))
        }
    }

    fn discard_draft_of_previous_board(&self, draft: Draft) {
        if let Some(closed) = self.session.close_if(draft.target(), EditOutcome::Switched) {
            self.events.emit(BoardEvent::EditEnded {
                target: closed.target,
                outcome: closed.outcome,
            });
        }
        self.events.emit(BoardEvent::DraftDiscarded {
            temp_id: draft.temp_id(),
        });
    }

    // ── Reordering ───────────────────────────────────────────────────────

    fn begin_reorder(&self, keys: Vec<ReorderKey>) -> ClientResult<InFlight> {
        let mut set = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(busy) = keys.iter().find(|k| set.contains(*k)) {
            return Err(ClientError::ReorderInFlight(format!("{:?}", busy)));
        }
        set.extend(keys.iter().copied());
        Ok(InFlight {
            set: self.in_flight.clone(),
            keys,
        })
    }

    fn ensure_drag_enabled(&self) -> ClientResult<()> {
        if self.session.drag_enabled() {
            Ok(())
        } else {
            Err(ClientError::DragDisabled)
        }
    }

    /// Persist a new list order for `board_id`, showing it immediately.
    pub async fn reorder_lists(&self, board_id: BoardId, batch: ListReorder) -> ClientResult<usize> {
        self.ensure_drag_enabled()?;
        let _guard = self.begin_reorder(vec![ReorderKey::Board(board_id)])?;

        let mut updates = batch.updates.clone();
        updates.sort_by_key(|u| u.position);
        let order: Vec<ListId> = updates.iter().map(|u| u.id).collect();
        let applied = self.cache().update(board_id, |s| s.apply_list_order(&order));

        let result = self.api.reorder_lists(board_id, &batch).await;
        self.finish_reorder(board_id, batch.len(), applied, result).await
    }

    /// Persist the final item order of every list in `batch`, including
    /// moves between lists, showing it immediately.
    pub async fn reorder_items(&self, board_id: BoardId, batch: ItemReorder) -> ClientResult<usize> {
        self.ensure_drag_enabled()?;

        let (groups, resolved) = {
            let cache = self.cache();
            item_groups(cache.snapshot(board_id), &batch)
        };
        let mut keys: Vec<ReorderKey> = groups.iter().map(|(list_id, _)| ReorderKey::List(*list_id)).collect();
        // Items whose list is unknown here lock the whole board.
        if !resolved {
            keys.push(ReorderKey::Board(board_id));
        }
        let _guard = self.begin_reorder(keys)?;

        let applied = {
            let mut cache = self.cache();
            let next = cache.snapshot(board_id).and_then(|s| apply_item_groups(s, &groups));
            match next {
                Some(next) => cache.update(board_id, move |s| {
                    *s = next;
                    true
                }),
                None => false,
            }
        };

        let result = self.api.reorder_items(&batch).await;
        self.finish_reorder(board_id, batch.len(), applied, result).await
    }

    async fn finish_reorder(
        &self,
        board_id: BoardId,
        requested: usize,
        applied: bool,
        result: ClientResult<usize>,
    ) -> ClientResult<usize> {
        let error = match result {
            Ok(updated) if updated == requested => {
                if applied {
                    self.persist();
                } else if let Err(e) = self.refresh(board_id).await {
                    log::warn!(target: "corkboard.client.reorder", "Reload after reorder failed: {}", e);
                }
                self.events.emit(BoardEvent::ReorderCommitted { board_id, updated });
                return Ok(updated);
            }
            Ok(updated) => ClientError::PartialReorder { requested, updated },
            Err(e) => e,
        };

        log::warn!(
            target: "corkboard.client.reorder",
            "Reorder on board {} rejected, reloading: {}",
            board_id,
            error
        );
        self.cache().invalidate();
        self.forget_persisted();
        self.events.emit(BoardEvent::ReorderRejected {
            board_id,
            error: error.to_string(),
        });
        if let Err(e) = self.refresh(board_id).await {
            log::warn!(target: "corkboard.client.reorder", "Reload after rejected reorder failed: {}", e);
        }
        Err(error)
    }

    // ── Editing ──────────────────────────────────────────────────────────

    /// Open `target` for editing, closing whatever was open before.
    pub fn configure(&self, target: EditTarget) -> Transition {
        let transition = self.session.configure(target);
        match transition {
            Transition::Unchanged => return transition,
            Transition::Opened => {}
            Transition::Switched { previous, discarded } => {
                self.events.emit(BoardEvent::EditEnded {
                    target: previous,
                    outcome: EditOutcome::Switched,
                });
                if let Some(temp_id) = discarded {
                    self.cache().take_draft(temp_id);
                    self.events.emit(BoardEvent::DraftDiscarded { temp_id });
                }
            }
        }
        self.events.emit(BoardEvent::EditStarted { target });
        transition
    }

    /// Close the open editor without saving. An unsaved draft is discarded.
    pub fn cancel_edit(&self) -> ClientResult<Closed> {
        let closed = self.session.close(EditOutcome::Cancelled).ok_or(ClientError::NoActiveEdit)?;
        self.events.emit(BoardEvent::EditEnded {
            target: closed.target,
            outcome: closed.outcome,
        });
        if let Some(temp_id) = closed.discarded {
            self.cache().take_draft(temp_id);
            self.events.emit(BoardEvent::DraftDiscarded { temp_id });
        }
        Ok(closed)
    }

    /// Start a new, unsaved list on `board_id` and open it for editing.
    pub fn begin_list_draft(&self, board_id: BoardId) -> TempId {
        self.begin_draft(Draft::List {
            temp_id: TempId::new(),
            board_id,
        })
    }

    /// Start a new, unsaved item in `list_id` and open it for editing.
    pub fn begin_item_draft(&self, list_id: ListId, kind: ItemKind) -> TempId {
        self.begin_draft(Draft::Item {
            temp_id: TempId::new(),
            list_id,
            kind,
        })
    }

    fn begin_draft(&self, draft: Draft) -> TempId {
        self.configure(draft.target());
        self.cache().set_draft(draft);
        draft.temp_id()
    }

    fn open_draft(&self, temp_id: TempId) -> ClientResult<Draft> {
        self.cache()
            .draft()
            .copied()
            .filter(|d| d.temp_id() == temp_id && self.session.current() == Some(d.target()))
            .ok_or(ClientError::NoActiveEdit)
    }

    /// Save the list draft. On failure the editor stays open.
    pub async fn commit_list_draft(&self, temp_id: TempId, list: NewList) -> ClientResult<List> {
        let Draft::List { board_id, .. } = self.open_draft(temp_id)? else {
            return Err(ClientError::NoActiveEdit);
        };
        require_text("list title", Some(&list.title))?;

        let created = self.api.create_list(board_id, &list).await?;
        self.cache().take_draft(temp_id);
        self.cache().update(board_id, |s| {
            s.upsert_list(created.clone());
            true
        });
        self.persist();
        self.saved(EditTarget::List(EntityRef::Pending(temp_id)), EntityKind::List, created.id.0, Some(temp_id));
        Ok(created)
    }

    /// Save the item draft. On failure the editor stays open.
    pub async fn commit_item_draft(&self, temp_id: TempId, mut item: NewItem) -> ClientResult<Item> {
        let Draft::Item { list_id, kind, .. } = self.open_draft(temp_id)? else {
            return Err(ClientError::NoActiveEdit);
        };
        item.kind = kind;
        validate_new_item(&item)?;

        let created = self.api.create_item(list_id, &item).await?;
        self.cache().take_draft(temp_id);
        self.update_board_of_list(list_id, |s| s.upsert_item(created.clone()));
        self.persist();
        self.saved(EditTarget::Item(EntityRef::Pending(temp_id)), EntityKind::Item, created.id.0, Some(temp_id));
        Ok(created)
    }

    pub async fn update_list(&self, list_id: ListId, patch: ListPatch) -> ClientResult<List> {
        if patch.title.is_some() {
            require_text("list title", patch.title.as_deref())?;
        }
        let list = self.api.update_list(list_id, &patch).await?;
        self.cache().update(list.board_id, |s| {
            s.upsert_list(list.clone());
            true
        });
        self.persist();
        self.saved(EditTarget::List(EntityRef::Persisted(list_id)), EntityKind::List, list_id.0, None);
        Ok(list)
    }

    pub async fn update_item(&self, item_id: ItemId, patch: ItemPatch) -> ClientResult<Item> {
        let item = self.api.update_item(item_id, &patch).await?;
        self.update_board_of_list(item.list_id, |s| s.upsert_item(item.clone()));
        self.persist();
        self.saved(EditTarget::Item(EntityRef::Persisted(item_id)), EntityKind::Item, item_id.0, None);
        Ok(item)
    }

    pub async fn delete_list(&self, list_id: ListId) -> ClientResult<()> {
        self.api.delete_list(list_id).await?;
        self.update_board_of_list(list_id, |s| {
            s.remove_list(list_id);
        });
        self.persist();
        self.deleted(EditTarget::List(EntityRef::Persisted(list_id)), EntityKind::List, list_id.0);
        Ok(())
    }

    pub async fn delete_item(&self, item_id: ItemId) -> ClientResult<()> {
        self.api.delete_item(item_id).await?;
        {
            let mut cache = self.cache();
            if let Some(board_id) = cache.current().map(|c| c.snapshot.board_id()) {
                cache.update(board_id, |s| s.remove_item(item_id).is_some());
            }
        }
        self.persist();
        self.deleted(EditTarget::Item(EntityRef::Persisted(item_id)), EntityKind::Item, item_id.0);
        Ok(())
    }

    /// Move a list to the end of `target`.
    pub async fn move_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List> {
        let source = self.board_of_list(list_id);
        let moved = self.api.move_list(list_id, target).await?;
        if source != Some(target) {
            self.update_board_of_list(list_id, |s| {
                s.remove_list(list_id);
            });
            self.persist();
        }
        self.reload_if_cached(target).await;
        self.events.emit(BoardEvent::EntitySaved {
            kind: EntityKind::List,
            id: moved.id.0,
            replaced: None,
        });
        Ok(moved)
    }

    /// Copy a list and its items to the end of `target`.
    pub async fn copy_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List> {
        let copy = self.api.copy_list(list_id, target).await?;
        self.reload_if_cached(target).await;
        self.events.emit(BoardEvent::EntitySaved {
            kind: EntityKind::List,
            id: copy.id.0,
            replaced: None,
        });
        Ok(copy)
    }

    async fn reload_if_cached(&self, board_id: BoardId) {
        let cached = self.cache().get(board_id).is_some();
        if cached {
            if let Err(e) = self.refresh(board_id).await {
                log::warn!(target: "corkboard.client.cache", "Reload of board {} failed: {}", board_id, e);
            }
        }
    }

    fn board_of_list(&self, list_id: ListId) -> Option<BoardId> {
        self.cache()
            .current()
            .and_then(|c| c.snapshot.list(list_id))
            .map(|l| l.board_id)
    }

    fn update_board_of_list<F>(&self, list_id: ListId, f: F)
    where
        F: FnOnce(&mut BoardSnapshot),
    {
        let mut cache = self.cache();
        let Some(board_id) = cache
            .current()
            .and_then(|c: &CachedBoard| c.snapshot.list(list_id))
            .map(|l| l.board_id)
        else {
            return;
        };
        cache.update(board_id, |s| {
            f(s);
            true
        });
    }

    fn saved(&self, target: EditTarget, kind: EntityKind, id: i64, replaced: Option<TempId>) {
        if let Some(closed) = self.session.close_if(target, EditOutcome::Saved) {
            self.events.emit(BoardEvent::EditEnded {
                target: closed.target,
                outcome: closed.outcome,
            });
        }
        self.events.emit(BoardEvent::EntitySaved { kind, id, replaced });
    }

    fn deleted(&self, target: EditTarget, kind: EntityKind, id: i64) {
        if let Some(closed) = self.session.close_if(target, EditOutcome::Cancelled) {
            self.events.emit(BoardEvent::EditEnded {
                target: closed.target,
                outcome: closed.outcome,
            });
        }
        self.events.emit(BoardEvent::EntityDeleted { kind, id });
    }
}

/// Split an item batch into per-list final orders. Entries without a
/// container stay in the list the cache places them in.
fn item_groups(snapshot: Option<&BoardSnapshot>, batch: &ItemReorder) -> (Vec<(ListId, Vec<ItemId>)>, bool) {
    let mut by_list: HashMap<ListId, Vec<(i64, ItemId)>> = HashMap::new();
    let mut lists = Vec::new();
    let mut resolved = true;
    for update in &batch.updates {
        let list_id = update
            .container
            .or_else(|| snapshot.and_then(|s| s.item(update.id)).map(|i| i.list_id));
        let Some(list_id) = list_id else {
            resolved = false;
            continue;
        };
        if !by_list.contains_key(&list_id) {
            lists.push(list_id);
        }
        by_list.entry(list_id).or_default().push((update.position, update.id));
    }
    let groups = lists
        .into_iter()
        .map(|list_id| {
            let mut entries = by_list.remove(&list_id).unwrap_or_default();
            entries.sort();
            (list_id, entries.into_iter().map(|(_, id)| id).collect())
        })
        .collect();
    (groups, resolved)
}

/// Apply every group to a copy of `snapshot`. A source list only accepts its
/// new order once the items leaving it have been claimed by their
/// destination, so groups are retried until none makes progress.
fn apply_item_groups(snapshot: &BoardSnapshot, groups: &[(ListId, Vec<ItemId>)]) -> Option<BoardSnapshot> {
    if groups.is_empty() {
        return None;
    }
    let mut next = snapshot.clone();
    let mut pending: Vec<&(ListId, Vec<ItemId>)> = groups.iter().collect();
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|(list_id, order)| !next.apply_item_order(*list_id, order));
        if pending.len() == before {
            return None;
        }
    }
    Some(next)
}

fn require_text(what: &str, value: Option<&str>) -> ClientResult<()> {
    if non_blank(value).is_none() {
        return Err(ClientError::Validation(format!("{} must not be empty", what)));
    }
    Ok(())
}

fn validate_new_item(item: &NewItem) -> ClientResult<()> {
    match item.kind {
        ItemKind::Bookmark => require_text("bookmark url", item.url.as_deref()),
        ItemKind::Note => require_text("note title", item.title.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StoreApi;
    use corkboard_core::BoardStorage;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn drain(rx: &mut broadcast::Receiver<BoardEvent>) -> Vec<BoardEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn server_order(api: &StoreApi, board_id: BoardId, list_id: ListId) -> Vec<ItemId> {
        api.store.load_board(&api.user, board_id).unwrap().item_order(list_id)
    }

    async fn loaded(items: &[usize]) -> (BoardController<StoreApi>, Board, Vec<List>, Vec<Vec<Item>>) {
        let api = StoreApi::new();
        let (board, lists, contents) = api.seed(items);
        let controller = BoardController::new(api);
        controller.refresh(board.id).await.unwrap();
        (controller, board, lists, contents)
    }

    #[tokio::test]
    async fn test_load_paints_cache_then_reconciles() {
        let api = StoreApi::new();
        let (board, _, _) = api.seed(&[3]);
        let controller = BoardController::new(api);
        let mut rx = controller.subscribe();

        let first = controller.load_board(board.id);
        assert!(first.cached.is_none());
        assert_eq!(first.refresh.await.unwrap().unwrap(), RefreshOutcome::Replaced);
        assert_eq!(
            drain(&mut rx),
            vec![BoardEvent::Painted {
                board_id: board.id,
                source: PaintSource::Server
            }]
        );

        let second = controller.load_board(board.id);
        assert_eq!(second.cached.as_ref().map(|s| s.items.len()), Some(3));
        assert_eq!(second.refresh.await.unwrap().unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(
            drain(&mut rx),
            vec![
                BoardEvent::Painted {
                    board_id: board.id,
                    source: PaintSource::Cache
                },
                BoardEvent::Unchanged { board_id: board.id },
            ]
        );
        assert_eq!(controller.api().loads(), 2);
    }

    #[tokio::test]
    async fn test_structurally_equal_snapshot_is_silent() {
        let (controller, board, _, _) = loaded(&[2]).await;
        // Drop the fingerprint so the server answers with a full snapshot.
        controller.cache().update(board.id, |_| true);
        let mut rx = controller.subscribe();

        assert_eq!(controller.refresh(board.id).await.unwrap(), RefreshOutcome::Unchanged);
        assert_eq!(drain(&mut rx), vec![BoardEvent::Unchanged { board_id: board.id }]);
    }

    #[tokio::test]
    async fn test_changed_server_state_replaces_cache() {
        let (controller, board, lists, _) = loaded(&[1]).await;
        let api = controller.api();
        api.store
            .update_list(
                &api.user,
                lists[0].id,
                &ListPatch {
                    color: Some("#ff0000".to_string()),
                    ..ListPatch::default()
                },
            )
            .unwrap();

        assert_eq!(controller.refresh(board.id).await.unwrap(), RefreshOutcome::Replaced);
        let cached = controller.cached(board.id).unwrap();
        assert_eq!(cached.lists[0].color.as_deref(), Some("#ff0000"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_cache() {
        let (controller, board, _, _) = loaded(&[2]).await;
        controller.api().fail_loads.store(true, Ordering::SeqCst);
        let mut rx = controller.subscribe();

        let handle = controller.load_board(board.id);
        assert!(handle.cached.is_some());
        assert_eq!(handle.refresh.await.unwrap().unwrap(), RefreshOutcome::StaleKept);
        assert!(controller.cached(board.id).is_some());
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, BoardEvent::StaleKept { .. })));
    }

    #[tokio::test]
    async fn test_failed_load_without_cache_is_surfaced() {
        let api = StoreApi::new();
        let (board, _, _) = api.seed(&[1]);
        api.fail_loads.store(true, Ordering::SeqCst);
        let controller = BoardController::new(api);
        let mut rx = controller.subscribe();

        let handle = controller.load_board(board.id);
        assert!(handle.cached.is_none());
        assert!(matches!(
            handle.refresh.await.unwrap(),
            Err(ClientError::LoadFailed(id, _)) if id == board.id
        ));
        assert!(matches!(drain(&mut rx).as_slice(), [BoardEvent::LoadFailed { .. }]));
    }

    #[tokio::test]
    async fn test_reorder_commits_and_persists() {
        let dir = TempDir::new().unwrap();
        let api = StoreApi::new();
        let (board, lists, contents) = api.seed(&[3]);
        let controller = BoardController::with_store(api, LocalStore::new(dir.path().join("cache.json")));
        controller.refresh(board.id).await.unwrap();
        let ids: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();

        let batch = controller
            .item_sortable(lists[0].id)
            .drop_within(&ids, 2, 0)
            .unwrap()
            .unwrap();
        assert_eq!(controller.reorder_items(board.id, batch).await.unwrap(), 3);

        let expected = vec![ids[2], ids[0], ids[1]];
        assert_eq!(controller.cached(board.id).unwrap().item_order(lists[0].id), expected);
        assert_eq!(server_order(controller.api(), board.id, lists[0].id), expected);
        let persisted = LocalStore::new(dir.path().join("cache.json")).load().unwrap().unwrap();
        assert_eq!(persisted.snapshot.item_order(lists[0].id), expected);
    }

    #[tokio::test]
    async fn test_in_flight_fetch_does_not_undo_reorder() {
        let dir = TempDir::new().unwrap();
        let api = StoreApi::new();
        let (board, lists, contents) = api.seed(&[3]);
        let controller = BoardController::with_store(api, LocalStore::new(dir.path().join("cache.json")));
        controller.refresh(board.id).await.unwrap();
        // Without a fingerprint the server answers with the full snapshot.
        controller.cache().update(board.id, |_| true);
        let ids: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();

        controller.api().hold_fetch.store(true, Ordering::SeqCst);
        let handle = controller.load_board(board.id);
        controller.api().fetched.notified().await;
        controller.api().hold_fetch.store(false, Ordering::SeqCst);

        let expected = vec![ids[2], ids[0], ids[1]];
        let batch = ItemReorder::from_order(Some(lists[0].id), &expected);
        controller.reorder_items(board.id, batch).await.unwrap();
        controller.api().release.notify_one();
        assert_eq!(handle.refresh.await.unwrap().unwrap(), RefreshOutcome::Superseded);

        assert_eq!(controller.cached(board.id).unwrap().item_order(lists[0].id), expected);
        assert_eq!(server_order(controller.api(), board.id, lists[0].id), expected);
        let persisted = LocalStore::new(dir.path().join("cache.json")).load().unwrap().unwrap();
        assert_eq!(persisted.snapshot.item_order(lists[0].id), expected);

        // The next load reconciles normally.
        assert_eq!(controller.refresh(board.id).await.unwrap(), RefreshOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_cross_list_move_applies_locally() {
        let (controller, board, lists, contents) = loaded(&[2, 1]).await;
        let a: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();
        let b: Vec<ItemId> = contents[1].iter().map(|i| i.id).collect();

        let source = controller.item_sortable(lists[0].id);
        let destination = controller.item_sortable(lists[1].id);
        let batch = source.drop_into(&destination, &a, &b, a[1], 0).unwrap().unwrap();
        controller.reorder_items(board.id, batch).await.unwrap();

        let cached = controller.cached(board.id).unwrap();
        assert_eq!(cached.item_order(lists[0].id), vec![a[0]]);
        assert_eq!(cached.item_order(lists[1].id), vec![a[1], b[0]]);
        assert_eq!(cached.item(a[1]).unwrap().list_id, lists[1].id);
        assert_eq!(server_order(controller.api(), board.id, lists[1].id), vec![a[1], b[0]]);
    }

    #[tokio::test]
    async fn test_reorder_lists_commits() {
        let (controller, board, lists, _) = loaded(&[0, 0, 0]).await;
        let order: Vec<ListId> = lists.iter().map(|l| l.id).collect();
        let batch = controller
            .list_sortable(board.id)
            .drop_within(&order, 0, 2)
            .unwrap()
            .unwrap();
        let mut rx = controller.subscribe();

        assert_eq!(controller.reorder_lists(board.id, batch).await.unwrap(), 3);
        let expected = vec![order[1], order[2], order[0]];
        assert_eq!(controller.cached(board.id).unwrap().list_order(), expected);
        assert_eq!(
            drain(&mut rx),
            vec![BoardEvent::ReorderCommitted {
                board_id: board.id,
                updated: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_rejected_reorder_reloads_from_server() {
        let (controller, board, lists, contents) = loaded(&[3]).await;
        let ids: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();
        controller.api().fail_reorders.store(true, Ordering::SeqCst);
        let mut rx = controller.subscribe();

        let batch = ItemReorder::from_order(Some(lists[0].id), &[ids[2], ids[0], ids[1]]);
        assert!(controller.reorder_items(board.id, batch).await.is_err());

        assert_eq!(controller.cached(board.id).unwrap().item_order(lists[0].id), ids);
        let events = drain(&mut rx);
        assert!(matches!(events.first(), Some(BoardEvent::ReorderRejected { .. })));
        assert!(events.contains(&BoardEvent::Painted {
            board_id: board.id,
            source: PaintSource::Server
        }));
    }

    #[tokio::test]
    async fn test_short_reorder_count_is_rejected() {
        let (controller, board, lists, contents) = loaded(&[2]).await;
        let ids: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();
        controller.api().short_reorders.store(true, Ordering::SeqCst);

        let batch = ItemReorder::from_order(Some(lists[0].id), &[ids[1], ids[0]]);
        assert!(matches!(
            controller.reorder_items(board.id, batch).await,
            Err(ClientError::PartialReorder {
                requested: 2,
                updated: 1
            })
        ));
        // The cache now mirrors what the server committed.
        assert_eq!(
            controller.cached(board.id).unwrap().item_order(lists[0].id),
            server_order(controller.api(), board.id, lists[0].id)
        );
    }

    #[tokio::test]
    async fn test_one_reorder_per_container() {
        let (controller, board, lists, contents) = loaded(&[2]).await;
        let ids: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();
        let _busy = controller.begin_reorder(vec![ReorderKey::List(lists[0].id)]).unwrap();

        let batch = ItemReorder::from_order(Some(lists[0].id), &[ids[1], ids[0]]);
        assert!(matches!(
            controller.reorder_items(board.id, batch).await,
            Err(ClientError::ReorderInFlight(_))
        ));
        assert_eq!(server_order(controller.api(), board.id, lists[0].id), ids);
    }

    #[tokio::test]
    async fn test_uncached_item_reorder_locks_the_board() {
        let api = StoreApi::new();
        let (board, lists, contents) = api.seed(&[2]);
        let controller = BoardController::new(api);
        let ids: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();

        // Nothing cached, so the batch's list cannot be resolved locally.
        let busy = controller.begin_reorder(vec![ReorderKey::Board(board.id)]).unwrap();
        let batch = ItemReorder::from_order(None, &[ids[1], ids[0]]);
        assert!(matches!(
            controller.reorder_items(board.id, batch.clone()).await,
            Err(ClientError::ReorderInFlight(_))
        ));
        assert_eq!(server_order(controller.api(), board.id, lists[0].id), ids);

        drop(busy);
        assert_eq!(controller.reorder_items(board.id, batch).await.unwrap(), 2);
        assert_eq!(server_order(controller.api(), board.id, lists[0].id), vec![ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn test_drag_disabled_while_editing() {
        let (controller, board, lists, contents) = loaded(&[2]).await;
        let ids: Vec<ItemId> = contents[0].iter().map(|i| i.id).collect();
        let engine = controller.item_sortable(lists[0].id);

        controller.configure(EditTarget::Item(EntityRef::Persisted(ids[0])));
        assert!(!engine.is_enabled());
        let batch = ItemReorder::from_order(Some(lists[0].id), &[ids[1], ids[0]]);
        assert!(matches!(
            controller.reorder_items(board.id, batch).await,
            Err(ClientError::DragDisabled)
        ));

        controller.cancel_edit().unwrap();
        assert!(engine.is_enabled());
        assert!(matches!(controller.cancel_edit(), Err(ClientError::NoActiveEdit)));
    }

    #[tokio::test]
    async fn test_switching_edit_discards_draft() {
        let (controller, board, _, contents) = loaded(&[1]).await;
        let temp = controller.begin_list_draft(board.id);
        assert!(controller.draft().is_some());
        let mut rx = controller.subscribe();

        let other = EditTarget::Item(EntityRef::Persisted(contents[0][0].id));
        controller.configure(other);

        assert!(controller.draft().is_none());
        assert_eq!(controller.session().current(), Some(other));
        assert_eq!(
            drain(&mut rx),
            vec![
                BoardEvent::EditEnded {
                    target: EditTarget::List(EntityRef::Pending(temp)),
                    outcome: EditOutcome::Switched
                },
                BoardEvent::DraftDiscarded { temp_id: temp },
                BoardEvent::EditStarted { target: other },
            ]
        );
    }

    #[tokio::test]
    async fn test_commit_item_draft() {
        let (controller, board, lists, _) = loaded(&[0]).await;
        let temp = controller.begin_item_draft(lists[0].id, ItemKind::Note);

        let err = controller
            .commit_item_draft(temp, NewItem::note("  ", "body"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(controller.session().is_editing());
        assert!(controller.draft().is_some());

        let mut rx = controller.subscribe();
        let item = controller
            .commit_item_draft(temp, NewItem::note("Groceries", "milk"))
            .await
            .unwrap();
        assert!(!controller.session().is_editing());
        assert!(controller.draft().is_none());
        assert_eq!(controller.cached(board.id).unwrap().item_order(lists[0].id), vec![item.id]);
        assert!(drain(&mut rx).contains(&BoardEvent::EntitySaved {
            kind: EntityKind::Item,
            id: item.id.0,
            replaced: Some(temp),
        }));
    }

    #[tokio::test]
    async fn test_commit_list_draft_and_cancel() {
        let (controller, board, _, _) = loaded(&[0]).await;
        let temp = controller.begin_list_draft(board.id);
        let closed = controller.cancel_edit().unwrap();
        assert_eq!(closed.discarded, Some(temp));
        assert!(matches!(
            controller.commit_list_draft(temp, NewList::default()).await,
            Err(ClientError::NoActiveEdit)
        ));

        let temp = controller.begin_list_draft(board.id);
        let list = controller
            .commit_list_draft(
                temp,
                NewList {
                    title: "Later".to_string(),
                    ..NewList::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(list.position, 1);
        assert_eq!(controller.cached(board.id).unwrap().lists.len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_write_through() {
        let (controller, board, lists, contents) = loaded(&[2]).await;
        let item = contents[0][0].id;

        controller.configure(EditTarget::Item(EntityRef::Persisted(item)));
        controller
            .update_item(
                item,
                ItemPatch {
                    title: Some("Renamed".to_string()),
                    ..ItemPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(!controller.session().is_editing());
        let cached = controller.cached(board.id).unwrap();
        assert_eq!(cached.item(item).unwrap().title.as_deref(), Some("Renamed"));

        controller.delete_item(item).await.unwrap();
        let cached = controller.cached(board.id).unwrap();
        assert_eq!(cached.item_order(lists[0].id), vec![contents[0][1].id]);
        assert_eq!(cached.item(contents[0][1].id).unwrap().position, 0);

        assert!(matches!(
            controller.update_list(lists[0].id, ListPatch {
                title: Some(" ".to_string()),
                ..ListPatch::default()
            })
            .await,
            Err(ClientError::Validation(_))
        ));
        controller.delete_list(lists[0].id).await.unwrap();
        assert!(controller.cached(board.id).unwrap().lists.is_empty());
    }

    #[tokio::test]
    async fn test_move_list_leaves_cached_board() {
        let (controller, board, lists, _) = loaded(&[1, 1]).await;
        let other = controller.api().create_board("Archive").await.unwrap();

        let moved = controller.move_list(lists[0].id, other.id).await.unwrap();
        assert_eq!(moved.board_id, other.id);
        let cached = controller.cached(board.id).unwrap();
        assert_eq!(cached.list_order(), vec![lists[1].id]);
        assert_eq!(cached.lists[0].position, 0);

        let copy = controller.copy_list(lists[1].id, other.id).await.unwrap();
        assert_eq!(copy.position, 1);
    }

    #[tokio::test]
    async fn test_durable_cache_paints_after_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let api = StoreApi::new();
        let (board, _, _) = api.seed(&[2]);
        let first = BoardController::with_store(api, LocalStore::new(&path));
        first.refresh(board.id).await.unwrap();
        let snapshot = first.cached(board.id).unwrap();

        let offline = StoreApi::new();
        offline.fail_loads.store(true, Ordering::SeqCst);
        let second = BoardController::with_store(offline, LocalStore::new(&path));
        let handle = second.load_board(board.id);
        assert_eq!(handle.cached, Some(snapshot));
        assert_eq!(handle.refresh.await.unwrap().unwrap(), RefreshOutcome::StaleKept);
    }

    #[test]
    fn test_item_groups_fill_missing_containers() {
        let snapshot = BoardSnapshot::new(
            Board {
                id: BoardId(1),
                title: "Home".to_string(),
                is_default: true,
                created_at: 0,
                updated_at: 0,
            },
            vec![],
            vec![],
        );
        let batch = ItemReorder::from_order(None, &[ItemId(1)]);
        let (groups, resolved) = item_groups(Some(&snapshot), &batch);
        assert!(groups.is_empty());
        assert!(!resolved);
        assert!(apply_item_groups(&snapshot, &[]).is_none());

        let batch = ItemReorder::from_order(Some(ListId(7)), &[ItemId(2), ItemId(1)]);
        let (groups, resolved) = item_groups(None, &batch);
        assert_eq!(groups, vec![(ListId(7), vec![ItemId(2), ItemId(1)])]);
        assert!(resolved);
    }
}

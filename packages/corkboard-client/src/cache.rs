/// Single-slot board cache and its durable local copy.
///
/// The slot holds the last board shown; switching boards replaces it. The
/// local store only serves the first paint after a restart, the server
/// always wins once it answers.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use corkboard_core::fingerprint::SnapshotFingerprint;
use corkboard_core::types::BoardId;
use corkboard_core::BoardSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::ClientResult;
use crate::pending::{Draft, TempId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBoard {
    pub snapshot: BoardSnapshot,
    /// Server fingerprint of `snapshot`; cleared by local mutations.
    #[serde(default)]
    pub fingerprint: Option<SnapshotFingerprint>,
}

#[derive(Debug, Default)]
pub struct BoardCache {
    slot: Option<CachedBoard>,
    draft: Option<Draft>,
    /// Bumped by every local mutation and invalidation.
    generation: u64,
}

impl BoardCache {
    pub fn new(slot: Option<CachedBoard>) -> Self {
        Self {
            slot,
            draft: None,
            generation: 0,
        }
    }

    /// A fetch started at generation `g` may only be applied while
    /// `generation()` is still `g`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, board_id: BoardId) -> Option<&CachedBoard> {
        self.slot.as_ref().filter(|c| c.snapshot.board_id() == board_id)
    }

    pub fn snapshot(&self, board_id: BoardId) -> Option<&BoardSnapshot> {
        self.get(board_id).map(|c| &c.snapshot)
    }

    pub fn current(&self) -> Option<&CachedBoard> {
        self.slot.as_ref()
    }

    /// Put a fresh server snapshot in the slot. Switching boards drops the
    /// pending draft with the old board.
    pub fn replace(&mut self, snapshot: BoardSnapshot, fingerprint: Option<SnapshotFingerprint>) -> Option<Draft> {
        let switched = self
            .slot
            .as_ref()
            .is_some_and(|c| c.snapshot.board_id() != snapshot.board_id());
        self.slot = Some(CachedBoard { snapshot, fingerprint });
        if switched {
            self.draft.take()
        } else {
            None
        }
    }

    pub fn invalidate(&mut self) -> Option<CachedBoard> {
        self.generation += 1;
        self.slot.take()
    }

    /// Mutate the cached snapshot of `board_id`. Returns what `f` returned,
    /// or false when that board is not cached.
    pub fn update<F>(&mut self, board_id: BoardId, f: F) -> bool
    where
        F: FnOnce(&mut BoardSnapshot) -> bool,
    {
        let Some(slot) = self.slot.as_mut().filter(|c| c.snapshot.board_id() == board_id) else {
            return false;
        };
        let changed = f(&mut slot.snapshot);
        if changed {
            slot.fingerprint = None;
            self.generation += 1;
        }
        changed
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.draft.as_ref()
    }

    /// Hold `draft` as the only pending entity, returning the one it replaces.
    pub fn set_draft(&mut self, draft: Draft) -> Option<Draft> {
        self.draft.replace(draft)
    }

    /// Remove the draft if it is `temp_id`.
    pub fn take_draft(&mut self, temp_id: TempId) -> Option<Draft> {
        if self.draft.as_ref().is_some_and(|d| d.temp_id() == temp_id) {
            self.draft.take()
        } else {
            None
        }
    }
}

/// Durable JSON copy of the cache slot.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> ClientResult<Option<CachedBoard>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, cached: &CachedBoard) -> ClientResult<()> {
        let content = serde_json::to_string(cached)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        atomic_write(&self.path, &content)?;
        Ok(())
    }

    pub fn clear(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
    let tmp_path = path.with_extension("corkboard.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;

    // fsync directory for rename durability
    if let Some(dir) = path.parent() {
        if let Ok(d) = fs::File::open(dir) {
            let _ = d.sync_all();
        }
    }
    Ok(())
}

/// Client-side identities for entities that may not exist on the server yet.
use corkboard_core::types::{BoardId, ItemId, ItemKind, ListId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Client-generated id of an unsaved entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(pub Uuid);

impl TempId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "temp-{}", self.0)
    }
}

/// Either a draft that only lives in the client, or a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "id", rename_all = "snake_case")]
pub enum EntityRef<Id> {
    Pending(TempId),
    Persisted(Id),
}

impl<Id: Copy> EntityRef<Id> {
    pub fn pending(&self) -> Option<TempId> {
        match self {
            EntityRef::Pending(temp) => Some(*temp),
            EntityRef::Persisted(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    List,
    Item,
}

/// The entity an edit session is configuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ref", rename_all = "lowercase")]
pub enum EditTarget {
    List(EntityRef<ListId>),
    Item(EntityRef<ItemId>),
}

impl EditTarget {
    pub fn kind(&self) -> EntityKind {
        match self {
            EditTarget::List(_) => EntityKind::List,
            EditTarget::Item(_) => EntityKind::Item,
        }
    }

    /// The temp id when the target has never been saved.
    pub fn pending(&self) -> Option<TempId> {
        match self {
            EditTarget::List(r) => r.pending(),
            EditTarget::Item(r) => r.pending(),
        }
    }
}

/// An unsaved entity held in the cache while its editor is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Draft {
    List { temp_id: TempId, board_id: BoardId },
    Item { temp_id: TempId, list_id: ListId, kind: ItemKind },
}

impl Draft {
    pub fn temp_id(&self) -> TempId {
        match self {
            Draft::List { temp_id, .. } | Draft::Item { temp_id, .. } => *temp_id,
        }
    }

    pub fn target(&self) -> EditTarget {
        match self {
            Draft::List { temp_id, .. } => EditTarget::List(EntityRef::Pending(*temp_id)),
            Draft::Item { temp_id, .. } => EditTarget::Item(EntityRef::Pending(*temp_id)),
        }
    }
}

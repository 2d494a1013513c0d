/// Neutral export structure for a whole board.
///
/// Positions in an export are advisory: `normalized` re-ranks lists and items
/// by their submitted positions (submission order breaks ties) and rewrites
/// them to `0..n-1`, so untrusted input can never introduce gaps or
/// duplicates.
use serde::{Deserialize, Serialize};

use crate::ordering::renumber;
use crate::snapshot::BoardSnapshot;
use crate::types::{ItemKind, NewItem, NewList};

pub const EXPORT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardExport {
    #[serde(default = "default_version")]
    pub version: u32,
    pub title: String,
    #[serde(default)]
    pub lists: Vec<ListExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExport {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub items: Vec<ItemExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemExport {
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub position: i64,
}

fn default_version() -> u32 {
    EXPORT_FORMAT_VERSION
}

impl BoardExport {
    /// Serialize a snapshot. Positions in the output are already contiguous.
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Self {
        let lists = snapshot
            .lists
            .iter()
            .enumerate()
            .map(|(list_pos, list)| ListExport {
                title: list.title.clone(),
                color: list.color.clone(),
                collapsed: list.collapsed,
                position: list_pos as i64,
                items: snapshot
                    .items_in(list.id)
                    .enumerate()
                    .map(|(item_pos, item)| ItemExport {
                        kind: item.kind,
                        title: item.title.clone(),
                        url: item.url.clone(),
                        content: item.content.clone(),
                        favicon_url: item.favicon_url.clone(),
                        position: item_pos as i64,
                    })
                    .collect(),
            })
            .collect();
        Self {
            version: EXPORT_FORMAT_VERSION,
            title: snapshot.board.title.clone(),
            lists,
        }
    }

    /// Sort lists and items by submitted position and renumber them.
    pub fn normalized(self) -> Self {
        let lists = renumber(self.lists.into_iter().map(|l| (l.position, l)).collect())
            .into_iter()
            .map(|(position, mut list)| {
                let items = std::mem::take(&mut list.items);
                list.items = renumber(items.into_iter().map(|i| (i.position, i)).collect())
                    .into_iter()
                    .map(|(position, mut item)| {
                        item.position = position;
                        item
                    })
                    .collect();
                list.position = position;
                list
            })
            .collect();
        Self {
            version: self.version,
            title: self.title,
            lists,
        }
    }
}

impl ListExport {
    pub fn to_new_list(&self) -> NewList {
        NewList {
            title: self.title.clone(),
            color: self.color.clone(),
            collapsed: self.collapsed,
        }
    }
}

impl ItemExport {
    pub fn to_new_item(&self) -> NewItem {
        NewItem {
            kind: self.kind,
            title: self.title.clone(),
            url: self.url.clone(),
            content: self.content.clone(),
            favicon_url: self.favicon_url.clone(),
        }
    }
}

/// Remote board API used by the controller, and its reqwest implementation.
use async_trait::async_trait;
use corkboard_core::fingerprint::SnapshotFingerprint;
use corkboard_core::ordering::{ItemReorder, ListReorder};
use corkboard_core::types::*;
use corkboard_core::{BoardSnapshot, ErrorKind};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Result of a combined load.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    Modified {
        snapshot: BoardSnapshot,
        fingerprint: Option<SnapshotFingerprint>,
    },
    /// The server confirmed the fingerprint the caller already holds.
    NotModified,
}

#[async_trait]
pub trait BoardApi: Send + Sync + 'static {
    async fn list_boards(&self) -> ClientResult<Vec<Board>>;

    async fn create_board(&self, title: &str) -> ClientResult<Board>;

    /// Combined load. `known` is sent as `If-None-Match`.
    async fn fetch_board(&self, board_id: BoardId, known: Option<&SnapshotFingerprint>) -> ClientResult<Fetched>;

    async fn create_list(&self, board_id: BoardId, list: &NewList) -> ClientResult<List>;

    async fn update_list(&self, list_id: ListId, patch: &ListPatch) -> ClientResult<List>;

    async fn delete_list(&self, list_id: ListId) -> ClientResult<()>;

    async fn move_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List>;

    async fn copy_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List>;

    async fn create_item(&self, list_id: ListId, item: &NewItem) -> ClientResult<Item>;

    async fn update_item(&self, item_id: ItemId, patch: &ItemPatch) -> ClientResult<Item>;

    async fn delete_item(&self, item_id: ItemId) -> ClientResult<()>;

    /// Returns the number of rows the server rewrote.
    async fn reorder_lists(&self, board_id: BoardId, batch: &ListReorder) -> ClientResult<usize>;

    /// Returns the number of rows the server rewrote.
    async fn reorder_items(&self, batch: &ItemReorder) -> ClientResult<usize>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct UpdatedBody {
    updated: usize,
}

#[derive(Deserialize)]
struct BoardsBody {
    boards: Vec<Board>,
}

pub struct HttpBoardApi {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
    identity_header: String,
}

impl HttpBoardApi {
    pub fn new(base_url: &str, user_id: &str, identity_header: &str) -> ClientResult<Self> {
        if user_id.trim().is_empty() {
            return Err(ClientError::Validation("user id must not be empty".to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            identity_header: identity_header.to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        Self::new(&config.base_url, &config.user_id, &config.identity_header)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(self.identity_header.as_str(), self.user_id.as_str())
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Response> {
        let resp = builder.send().await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_MODIFIED {
            return Ok(resp);
        }
        Err(api_error(resp).await)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ClientResult<T> {
        let resp = self.send(builder).await?;
        Ok(resp.json().await?)
    }
}

/// Turn an error response into `ClientError::Api`, keeping the server's
/// error kind when the body carries one.
async fn api_error(resp: Response) -> ClientError {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => ClientError::Api {
            status,
            kind: body
                .kind
                .and_then(|k| serde_json::from_value::<ErrorKind>(serde_json::Value::String(k)).ok()),
            message: body.error,
        },
        Err(_) => ClientError::Api {
            status,
            kind: None,
            message: text,
        },
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn list_boards(&self) -> ClientResult<Vec<Board>> {
        let body: BoardsBody = self.send_json(self.request(Method::GET, "/boards")).await?;
        Ok(body.boards)
    }

    async fn create_board(&self, title: &str) -> ClientResult<Board> {
        let builder = self
            .request(Method::POST, "/boards")
            .json(&serde_json::json!({ "title": title }));
        self.send_json(builder).await
    }

    async fn fetch_board(&self, board_id: BoardId, known: Option<&SnapshotFingerprint>) -> ClientResult<Fetched> {
        let mut builder = self.request(Method::GET, &format!("/boards/{}", board_id));
        if let Some(fingerprint) = known {
            builder = builder.header("if-none-match", fingerprint.etag());
        }
        let resp = self.send(builder).await?;
        if resp.status() == StatusCode::NOT_MODIFIED {
            return Ok(Fetched::NotModified);
        }
        let fingerprint = resp
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .and_then(SnapshotFingerprint::from_etag);
        let snapshot: BoardSnapshot = resp.json().await?;
        Ok(Fetched::Modified { snapshot, fingerprint })
    }

    async fn create_list(&self, board_id: BoardId, list: &NewList) -> ClientResult<List> {
        let builder = self
            .request(Method::POST, &format!("/boards/{}/lists", board_id))
            .json(list);
        self.send_json(builder).await
    }

    async fn update_list(&self, list_id: ListId, patch: &ListPatch) -> ClientResult<List> {
        let builder = self.request(Method::PATCH, &format!("/lists/{}", list_id)).json(patch);
        self.send_json(builder).await
    }

    async fn delete_list(&self, list_id: ListId) -> ClientResult<()> {
        self.send(self.request(Method::DELETE, &format!("/lists/{}", list_id)))
            .await?;
        Ok(())
    }

    async fn move_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List> {
        let builder = self
            .request(Method::POST, &format!("/lists/{}/move", list_id))
            .json(&serde_json::json!({ "boardId": target }));
        self.send_json(builder).await
    }

    async fn copy_list(&self, list_id: ListId, target: BoardId) -> ClientResult<List> {
        let builder = self
            .request(Method::POST, &format!("/lists/{}/copy", list_id))
            .json(&serde_json::json!({ "boardId": target }));
        self.send_json(builder).await
    }

    async fn create_item(&self, list_id: ListId, item: &NewItem) -> ClientResult<Item> {
        let builder = self
            .request(Method::POST, &format!("/lists/{}/items", list_id))
            .json(item);
        self.send_json(builder).await
    }

    async fn update_item(&self, item_id: ItemId, patch: &ItemPatch) -> ClientResult<Item> {
        let builder = self.request(Method::PATCH, &format!("/items/{}", item_id)).json(patch);
        self.send_json(builder).await
    }

    async fn delete_item(&self, item_id: ItemId) -> ClientResult<()> {
        self.send(self.request(Method::DELETE, &format!("/items/{}", item_id)))
            .await?;
        Ok(())
    }

    async fn reorder_lists(&self, board_id: BoardId, batch: &ListReorder) -> ClientResult<usize> {
        let builder = self
            .request(Method::PUT, &format!("/boards/{}/lists/order", board_id))
            .json(batch);
        let body: UpdatedBody = self.send_json(builder).await?;
        Ok(body.updated)
    }

    async fn reorder_items(&self, batch: &ItemReorder) -> ClientResult<usize> {
        let builder = self.request(Method::PUT, "/items/order").json(batch);
        let body: UpdatedBody = self.send_json(builder).await?;
        Ok(body.updated)
    }
}

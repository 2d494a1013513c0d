use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use corkboard_core::{BoardStorage, ErrorKind, StoreError, StoreResult};
use serde::Serialize;

mod boards;
mod items;
mod lists;

use crate::state::AppState;

/// Axum REST API routes. Every route except `/status` requires the identity
/// header.
///
///   GET    /boards                      -> list the caller's boards
///   POST   /boards                      -> create a board
///   POST   /boards/import               -> import an exported board
///   GET    /boards/:boardId             -> board + lists + items (+ ETag)
///   PATCH  /boards/:boardId             -> rename
///   DELETE /boards/:boardId             -> delete (not the default board)
///   POST   /boards/:boardId/default     -> make default
///   GET    /boards/:boardId/export      -> neutral export structure
///   POST   /boards/:boardId/lists       -> append a list
///   PUT    /boards/:boardId/lists/order -> persist list order
///   PATCH  /lists/:listId               -> update title/color/collapsed
///   DELETE /lists/:listId               -> delete list and its items
///   POST   /lists/:listId/move          -> move to the end of another board
///   POST   /lists/:listId/copy          -> copy to the end of another board
///   POST   /lists/:listId/items         -> append an item
///   PUT    /items/order                 -> persist item order / moves
///   PATCH  /items/:itemId               -> update item fields
///   DELETE /items/:itemId               -> delete item
///   GET    /status                      -> health check
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route("/boards/import", post(boards::import_board))
        .route(
            "/boards/{board_id}",
            get(boards::get_board)
                .patch(boards::rename_board)
                .delete(boards::delete_board),
        )
        .route("/boards/{board_id}/default", post(boards::set_default_board))
        .route("/boards/{board_id}/export", get(boards::export_board))
        .route("/boards/{board_id}/lists", post(lists::create_list))
        .route("/boards/{board_id}/lists/order", put(lists::reorder_lists))
        .route(
            "/lists/{list_id}",
            axum::routing::patch(lists::update_list).delete(lists::delete_list),
        )
        .route("/lists/{list_id}/move", post(lists::move_list))
        .route("/lists/{list_id}/copy", post(lists::copy_list))
        .route("/lists/{list_id}/items", post(items::create_item))
        .route("/items/order", put(items::reorder_items))
        .route(
            "/items/{item_id}",
            axum::routing::patch(items::update_item).delete(items::delete_item),
        )
        .route("/status", get(status))
}

async fn status(axum::extract::State(state): axum::extract::State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "port": state.port,
        "bind_address": state.bind_address,
    }))
}

// ── Shared types and helpers used across sub-modules ────────────────────

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Missing or empty identity header")]
    Unauthenticated,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => match e.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Store(e) => match e.kind() {
                ErrorKind::NotFound => "not_found",
                ErrorKind::Validation => "validation",
                ErrorKind::Conflict => "conflict",
                ErrorKind::Transient => "transient",
            },
            ApiError::Unauthenticated => "unauthenticated",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

/// Run a blocking store call off the async workers. Failures are logged
/// under `target` before being returned.
async fn with_store<T, F>(state: &AppState, target: &'static str, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&dyn BoardStorage) -> StoreResult<T> + Send + 'static,
{
    let storage = state.storage.clone();
    let result = match tokio::task::spawn_blocking(move || f(storage.as_ref())).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::Internal(format!("store task failed: {}", e))),
    };
    if let Err(e) = &result {
        log_api_issue(e.status(), target, e.to_string());
    }
    result
}

fn insert_header_safe(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match value.parse() {
        Ok(parsed) => {
            headers.insert(name, parsed);
        }
        Err(e) => {
            log::warn!("Failed to set header {}={} ({})", name, value, e);
        }
    }
}

fn log_api_issue(status: StatusCode, target: &'static str, message: impl AsRef<str>) {
    let message = message.as_ref();
    if status.is_server_error() {
        log::error!(target: target, "{}", message);
    } else {
        log::warn!(target: target, "{}", message);
    }
}

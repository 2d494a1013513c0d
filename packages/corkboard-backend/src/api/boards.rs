use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use corkboard_core::fingerprint::SnapshotFingerprint;
use corkboard_core::transfer::BoardExport;
use corkboard_core::types::{Board, BoardId};
use corkboard_core::BoardSnapshot;
use serde::Deserialize;

use super::{insert_header_safe, with_store, ApiError};
use crate::auth::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct BoardTitleBody {
    title: String,
}

pub async fn list_boards(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let boards = with_store(&state, "corkboard.api.list_boards", move |store| store.list_boards(&user)).await?;
    Ok(Json(serde_json::json!({ "boards": boards })))
}

pub async fn create_board(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<BoardTitleBody>,
) -> Result<(StatusCode, Json<Board>), ApiError> {
    let board = with_store(&state, "corkboard.api.create_board", move |store| {
        store.create_board(&user, &body.title)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(board)))
}

/// Combined load. Answers `304 Not Modified` when `If-None-Match` carries the
/// current snapshot fingerprint.
pub async fn get_board(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(board_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let board_id = BoardId(board_id);
    let snapshot: BoardSnapshot = with_store(&state, "corkboard.api.get_board", move |store| {
        store.load_board(&user, board_id)
    })
    .await?;

    let fingerprint = SnapshotFingerprint::of(&snapshot);
    let etag = fingerprint.etag();
    let mut resp_headers = HeaderMap::new();
    insert_header_safe(&mut resp_headers, "etag", &etag);

    // Check If-None-Match for conditional response
    if let Some(if_none_match) = headers.get("if-none-match") {
        if let Ok(value) = if_none_match.to_str() {
            let matches = value
                .split(',')
                .any(|tag| tag.trim() == "*" || SnapshotFingerprint::from_etag(tag).as_ref() == Some(&fingerprint));
            if matches {
                return Ok((StatusCode::NOT_MODIFIED, resp_headers).into_response());
            }
        }
    }

    Ok((StatusCode::OK, resp_headers, Json(snapshot)).into_response())
}

pub async fn rename_board(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(board_id): Path<i64>,
    Json(body): Json<BoardTitleBody>,
) -> Result<Json<Board>, ApiError> {
    let board = with_store(&state, "corkboard.api.rename_board", move |store| {
        store.rename_board(&user, BoardId(board_id), &body.title)
    })
    .await?;
    Ok(Json(board))
}

pub async fn delete_board(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(board_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    with_store(&state, "corkboard.api.delete_board", move |store| {
        store.delete_board(&user, BoardId(board_id))
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_default_board(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(board_id): Path<i64>,
) -> Result<Json<Board>, ApiError> {
    let board = with_store(&state, "corkboard.api.set_default", move |store| {
        store.set_default_board(&user, BoardId(board_id))
    })
    .await?;
    Ok(Json(board))
}

pub async fn export_board(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(board_id): Path<i64>,
) -> Result<Json<BoardExport>, ApiError> {
    let export = with_store(&state, "corkboard.api.export", move |store| {
        store.export_board(&user, BoardId(board_id))
    })
    .await?;
    Ok(Json(export))
}

pub async fn import_board(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(export): Json<BoardExport>,
) -> Result<(StatusCode, Json<BoardSnapshot>), ApiError> {
    let snapshot = with_store(&state, "corkboard.api.import", move |store| {
        store.import_board(&user, &export)
    })
    .await?;
    log::info!(
        target: "corkboard.api.import",
        "Imported board {} with {} lists",
        snapshot.board.id,
        snapshot.lists.len()
    );
    Ok((StatusCode::CREATED, Json(snapshot)))
}

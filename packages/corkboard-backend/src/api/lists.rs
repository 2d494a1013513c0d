use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use corkboard_core::ordering::ListReorder;
use corkboard_core::types::{BoardId, List, ListId, ListPatch, NewList};
use serde::Deserialize;

use super::{with_store, ApiError};
use crate::auth::CurrentUser;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetBoardBody {
    board_id: BoardId,
}

pub async fn create_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(board_id): Path<i64>,
    Json(body): Json<NewList>,
) -> Result<(StatusCode, Json<List>), ApiError> {
    let list = with_store(&state, "corkboard.api.create_list", move |store| {
        store.create_list(&user, BoardId(board_id), &body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

/// Body: `[{ "id", "position", "container_id"? }, ...]`, the board's final
/// list order.
pub async fn reorder_lists(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(board_id): Path<i64>,
    Json(batch): Json<ListReorder>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let requested = batch.len();
    let updated = with_store(&state, "corkboard.api.reorder", move |store| {
        store.reorder_lists(&user, BoardId(board_id), &batch)
    })
    .await?;
    log::debug!(
        target: "corkboard.api.reorder",
        "Board {}: {} of {} lists repositioned",
        board_id,
        updated,
        requested
    );
    Ok(Json(serde_json::json!({ "updated": updated })))
}

pub async fn update_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
    Json(patch): Json<ListPatch>,
) -> Result<Json<List>, ApiError> {
    let list = with_store(&state, "corkboard.api.update_list", move |store| {
        store.update_list(&user, ListId(list_id), &patch)
    })
    .await?;
    Ok(Json(list))
}

pub async fn delete_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    with_store(&state, "corkboard.api.delete_list", move |store| {
        store.delete_list(&user, ListId(list_id))
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
    Json(body): Json<TargetBoardBody>,
) -> Result<Json<List>, ApiError> {
    let list = with_store(&state, "corkboard.api.move_list", move |store| {
        store.move_list(&user, ListId(list_id), body.board_id)
    })
    .await?;
    Ok(Json(list))
}

pub async fn copy_list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
    Json(body): Json<TargetBoardBody>,
) -> Result<(StatusCode, Json<List>), ApiError> {
    let list = with_store(&state, "corkboard.api.copy_list", move |store| {
        store.copy_list(&user, ListId(list_id), body.board_id)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(list)))
}

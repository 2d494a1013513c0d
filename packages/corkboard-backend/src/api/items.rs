use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use corkboard_core::ordering::ItemReorder;
use corkboard_core::types::{Item, ItemId, ItemPatch, ListId, NewItem};

use super::{with_store, ApiError};
use crate::auth::CurrentUser;
use crate::state::AppState;

pub async fn create_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(list_id): Path<i64>,
    Json(body): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let item = with_store(&state, "corkboard.api.create_item", move |store| {
        store.create_item(&user, ListId(list_id), &body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// Body: the final order of every list touched by the drag. Entries with
/// `container_id` move the item to that list.
pub async fn reorder_items(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(batch): Json<ItemReorder>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = with_store(&state, "corkboard.api.reorder", move |store| {
        store.reorder_items(&user, &batch)
    })
    .await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

pub async fn update_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<i64>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<Item>, ApiError> {
    let item = with_store(&state, "corkboard.api.update_item", move |store| {
        store.update_item(&user, ItemId(item_id), &patch)
    })
    .await?;
    Ok(Json(item))
}

pub async fn delete_item(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(item_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    with_store(&state, "corkboard.api.delete_item", move |store| {
        store.delete_item(&user, ItemId(item_id))
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

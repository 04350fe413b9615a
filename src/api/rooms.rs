//! Room endpoints.

use super::{AppState, Caller, cached_json, run_blocking};
use crate::cache::{MutationKind, NS_ROOMS};
use crate::error::{ApiError, ApiResult};
use crate::types::{NewRoom, Room, RoomUpdate};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::Value;

/// `GET /api/rooms`
pub async fn list_rooms(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    cached_json(&state, NS_ROOMS, "all".to_string(), |db| db.list_rooms()).await
}

/// `POST /api/rooms`
pub async fn create_room(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewRoom>,
) -> ApiResult<(StatusCode, Json<Room>)> {
    let room = run_blocking(&state, move |db| db.create_room(input)).await?;
    tracing::info!(caller = caller.as_str(), room_id = %room.id, "Room created via API");
    state.invalidate(&[MutationKind::RoomChanged]);
    Ok((StatusCode::CREATED, Json(room)))
}

/// `GET /api/rooms/{id}`
pub async fn get_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let key = format!("details:{}", room_id);
    cached_json(&state, NS_ROOMS, key, move |db| {
        db.get_room(&room_id)?
            .ok_or_else(|| anyhow::Error::from(ApiError::room_not_found(&room_id)))
    })
    .await
}

/// `PUT /api/rooms/{id}`
pub async fn update_room(
    State(state): State<AppState>,
    caller: Caller,
    Path(room_id): Path<String>,
    Json(update): Json<RoomUpdate>,
) -> ApiResult<Json<Room>> {
    let room = run_blocking(&state, move |db| db.update_room(&room_id, update)).await?;
    tracing::info!(caller = caller.as_str(), room_id = %room.id, "Room updated via API");
    state.invalidate(&[MutationKind::RoomChanged]);
    Ok(Json(room))
}

/// `DELETE /api/rooms/{id}`
pub async fn delete_room(
    State(state): State<AppState>,
    caller: Caller,
    Path(room_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = room_id.clone();
    run_blocking(&state, move |db| db.delete_room(&id)).await?;
    tracing::info!(caller = caller.as_str(), room_id = %room_id, "Room deleted via API");
    state.invalidate(&[MutationKind::RoomChanged]);
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/rooms/{id}/stats`
pub async fn get_room_stats(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let key = format!("stats:{}", room_id);
    cached_json(&state, NS_ROOMS, key, move |db| db.room_stats(&room_id)).await
}

//! Room endpoints
//!
//! `GET /api/rooms/:room` takes a join code; the nested routes under the same
//! segment take the room id.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dropboard_common::models::RoomView;
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_id, ApiJson};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub owner_id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub code: String,
    pub user_id: Uuid,
}

/// Body of leave and close requests
#[derive(Debug, Deserialize)]
pub struct MemberRequest {
    pub user_id: Uuid,
}

/// POST /api/rooms
pub async fn create_room(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CreateRoomRequest>,
) -> ApiResult<(StatusCode, Json<RoomView>)> {
    let room = state
        .service
        .create_room(request.owner_id, request.name.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// POST /api/rooms/join
pub async fn join_room(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<JoinRoomRequest>,
) -> ApiResult<Json<RoomView>> {
    Ok(Json(state.service.join_room(&request.code, request.user_id).await?))
}

/// GET /api/rooms/:code
pub async fn get_room(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<RoomView>> {
    Ok(Json(state.service.get_room(&code).await?))
}

/// POST /api/rooms/:room_id/leave
pub async fn leave_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ApiJson(request): ApiJson<MemberRequest>,
) -> ApiResult<StatusCode> {
    let room_id = parse_id(&room_id, "room id")?;
    state.service.leave_room(room_id, request.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/rooms/:room_id/close
pub async fn close_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ApiJson(request): ApiJson<MemberRequest>,
) -> ApiResult<StatusCode> {
    let room_id = parse_id(&room_id, "room id")?;
    state.service.close_room(room_id, request.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn room_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rooms", post(create_room))
        .route("/api/rooms/join", post(join_room))
        .route("/api/rooms/:room", get(get_room))
        .route("/api/rooms/:room/leave", post(leave_room))
        .route("/api/rooms/:room/close", post(close_room))
}

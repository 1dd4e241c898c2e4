//! Leaderboard endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use dropboard_common::models::{LeaderboardEntry, LeaderboardWindow, Leaderboards};
use serde::Deserialize;

use super::{parse_id, ApiQuery};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    /// `daily` (default) or `all_time`
    pub window: Option<String>,
}

/// GET /api/rooms/:room_id/leaderboard
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let room_id = parse_id(&room_id, "room id")?;
    let window = match query.window.as_deref() {
        Some(raw) => raw.parse::<LeaderboardWindow>()?,
        None => LeaderboardWindow::Daily,
    };
    Ok(Json(state.service.get_leaderboard(room_id, window).await?))
}

/// GET /api/rooms/:room_id/leaderboards
pub async fn get_leaderboards(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> ApiResult<Json<Leaderboards>> {
    let room_id = parse_id(&room_id, "room id")?;
    Ok(Json(state.service.get_leaderboards(room_id).await?))
}

pub fn leaderboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/rooms/:room/leaderboard", get(get_leaderboard))
        .route("/api/rooms/:room/leaderboards", get(get_leaderboards))
}

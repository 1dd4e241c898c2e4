//! User and profile endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use dropboard_common::models::{BadgeInfo, Profile, User};
use serde::Deserialize;

use super::{parse_id, ApiJson};
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

/// POST /api/users
pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.service.register_user(&request.username).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users/:user_id
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<User>> {
    let user_id = parse_id(&user_id, "user id")?;
    Ok(Json(state.service.get_user(user_id).await?))
}

/// GET /api/users/:user_id/profile
///
/// Recomputes streak and badges before answering.
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Profile>> {
    let user_id = parse_id(&user_id, "user id")?;
    Ok(Json(state.service.get_profile(user_id).await?))
}

/// GET /api/badges
pub async fn badge_catalog(State(state): State<AppState>) -> Json<Vec<BadgeInfo>> {
    Json(state.service.badge_catalog())
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", post(register_user))
        .route("/api/users/:user_id", get(get_user))
        .route("/api/users/:user_id/profile", get(get_profile))
        .route("/api/badges", get(badge_catalog))
}

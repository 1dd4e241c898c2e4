//! Submission and upload endpoints

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use dropboard_common::models::{AnalysisTriple, Submission, SubmissionResult};
use serde::Deserialize;
use uuid::Uuid;

use super::{parse_id, ApiJson, ApiQuery};
use crate::analysis::MAX_IMAGE_BYTES;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Manually entered sub-scores
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub user_id: Uuid,
    pub size: i64,
    pub color: i64,
    pub texture: i64,
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// RFC 3339 lower bound on `created_at`
    pub since: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub user_id: String,
    pub utc_offset_minutes: Option<i32>,
}

/// POST /api/rooms/:room_id/submissions
pub async fn submit(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ApiJson(request): ApiJson<SubmitRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionResult>)> {
    let room_id = parse_id(&room_id, "room id")?;
    let analysis = AnalysisTriple::new(request.size, request.color, request.texture);
    let result = state
        .service
        .submit(room_id, request.user_id, analysis, request.utc_offset_minutes)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/rooms/:room_id/submissions
pub async fn list_submissions(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<Vec<Submission>>> {
    let room_id = parse_id(&room_id, "room id")?;
    let since = query.since.as_deref().map(parse_since).transpose()?;
    Ok(Json(state.service.list_submissions(room_id, since).await?))
}

/// POST /api/rooms/:room_id/uploads
///
/// Body is the raw image.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    ApiQuery(query): ApiQuery<UploadQuery>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<SubmissionResult>)> {
    let room_id = parse_id(&room_id, "room id")?;
    let user_id = parse_id(&query.user_id, "user id")?;
    let result = state
        .service
        .submit_image(room_id, user_id, &body, query.utc_offset_minutes)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

fn parse_since(raw: &str) -> ApiResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ApiError::BadRequest(format!("Invalid since timestamp: {:?}", raw)))
}

pub fn submission_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/rooms/:room/submissions",
            get(list_submissions).post(submit),
        )
        // Oversized images must reach the handler to be refused with a JSON error
        .route(
            "/api/rooms/:room/uploads",
            post(upload_image).layer(DefaultBodyLimit::max(2 * MAX_IMAGE_BYTES)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_since_accepts_offsets() {
        let parsed = parse_since("2024-05-10T14:00:00+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-10T12:00:00+00:00");
        assert!(parse_since("yesterday").is_err());
    }
}

//! Submission store
//!
//! Append-only log of scored submissions. There is no update or delete path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dropboard_common::models::{ScoreCard, Submission};
use dropboard_common::time::{from_millis, Clock, MAX_UTC_OFFSET_MINUTES};
use dropboard_common::{uuid_utils, Error, Result};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

const SUBMISSION_COLUMNS: &str = "id, room_id, user_id, size_score, color_score, texture_score, \
     total_score, analysis_text, utc_offset_minutes, created_at_ms";

/// Scored submissions, per room and per user
#[derive(Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SubmissionStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Append a submission for a member of an active room
    ///
    /// Membership check and insert are a single statement. The timestamp is
    /// clamped so it never precedes the user's previous submission.
    pub async fn record(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        card: &ScoreCard,
        utc_offset_minutes: i32,
    ) -> Result<Submission> {
        validate_offset(utc_offset_minutes)?;

        let id = uuid_utils::generate();
        let now_ms = self.clock.now().timestamp_millis();

        let created_at_ms: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO submissions (id, room_id, user_id, size_score, color_score, texture_score,
                                     total_score, analysis_text, utc_offset_minutes, created_at_ms)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?,
                   MAX(?, COALESCE((SELECT MAX(created_at_ms) FROM submissions WHERE user_id = ?), 0))
            WHERE EXISTS (
                SELECT 1 FROM room_members m
                JOIN rooms r ON r.id = m.room_id
                WHERE m.room_id = ? AND m.user_id = ? AND r.archived_at_ms IS NULL
            )
            RETURNING created_at_ms
            "#,
        )
        .bind(id.to_string())
        .bind(room_id.to_string())
        .bind(user_id.to_string())
        .bind(i64::from(card.size_score))
        .bind(i64::from(card.color_score))
        .bind(i64::from(card.texture_score))
        .bind(i64::from(card.total_score))
        .bind(&card.analysis_text)
        .bind(utc_offset_minutes)
        .bind(now_ms)
        .bind(user_id.to_string())
        .bind(room_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let Some(created_at_ms) = created_at_ms else {
            return Err(self.rejection(room_id, user_id).await?);
        };

        if created_at_ms != now_ms {
            debug!(
                "Clamped submission time for user {} from {} to {}",
                user_id, now_ms, created_at_ms
            );
        }
        info!(
            "Recorded submission {} in room {} by user {}: {}/150",
            id, room_id, user_id, card.total_score
        );

        Ok(Submission {
            id,
            room_id,
            user_id,
            size_score: card.size_score,
            color_score: card.color_score,
            texture_score: card.texture_score,
            total_score: card.total_score,
            analysis_text: card.analysis_text.clone(),
            utc_offset_minutes,
            created_at: from_millis(created_at_ms),
        })
    }

    /// Submissions in a room, oldest first
    pub async fn list_by_room(
        &self,
        room_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Submission>> {
        let since_ms = since.map(|t| t.timestamp_millis()).unwrap_or(i64::MIN);
        let rows = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions \
             WHERE room_id = ? AND created_at_ms >= ? ORDER BY created_at_ms, seq"
        ))
        .bind(room_id.to_string())
        .bind(since_ms)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(submission_from_row).collect()
    }

    /// Every submission a user has made, across rooms, oldest first
    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Submission>> {
        let mut conn = self.pool.acquire().await?;
        user_history(&mut conn, user_id).await
    }

    /// Explain why a guarded insert matched no row
    async fn rejection(&self, room_id: Uuid, user_id: Uuid) -> Result<Error> {
        let active: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM rooms WHERE id = ? AND archived_at_ms IS NULL")
                .bind(room_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(match active {
            Some(_) => Error::NotAMember { room_id, user_id },
            None => Error::RoomNotFound(room_id.to_string()),
        })
    }
}

/// A user's submissions read on `conn`, so callers can read inside their own
/// transaction
pub async fn user_history(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Vec<Submission>> {
    let rows = sqlx::query(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions \
         WHERE user_id = ? ORDER BY created_at_ms, seq"
    ))
    .bind(user_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(submission_from_row).collect()
}

fn validate_offset(utc_offset_minutes: i32) -> Result<()> {
    if utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return Err(Error::InvalidInput(format!(
            "utc_offset_minutes must be within ±{}",
            MAX_UTC_OFFSET_MINUTES
        )));
    }
    Ok(())
}

fn submission_from_row(row: &SqliteRow) -> Result<Submission> {
    Ok(Submission {
        id: uuid_utils::parse_stored(&row.get::<String, _>("id"))?,
        room_id: uuid_utils::parse_stored(&row.get::<String, _>("room_id"))?,
        user_id: uuid_utils::parse_stored(&row.get::<String, _>("user_id"))?,
        size_score: row.get::<i64, _>("size_score") as u32,
        color_score: row.get::<i64, _>("color_score") as u32,
        texture_score: row.get::<i64, _>("texture_score") as u32,
        total_score: row.get::<i64, _>("total_score") as u32,
        analysis_text: row.get("analysis_text"),
        utc_offset_minutes: row.get::<i64, _>("utc_offset_minutes") as i32,
        created_at: from_millis(row.get("created_at_ms")),
    })
}

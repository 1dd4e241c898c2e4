//! Leaderboard aggregator
//!
//! Standings are derived on every read from the submission log; nothing is
//! cached or stored.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use dropboard_common::models::{LeaderboardEntry, LeaderboardWindow, Leaderboards, Submission};
use dropboard_common::time::{start_of_utc_day, Clock};
use dropboard_common::{uuid_utils, Result};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::store::SubmissionStore;

/// Computes room standings from stored submissions
#[derive(Clone)]
pub struct LeaderboardAggregator {
    pool: SqlitePool,
    store: SubmissionStore,
    clock: Arc<dyn Clock>,
}

impl LeaderboardAggregator {
    pub fn new(pool: SqlitePool, store: SubmissionStore, clock: Arc<dyn Clock>) -> Self {
        Self { pool, store, clock }
    }

    /// Ranked standings for one window
    pub async fn compute(&self, room_id: Uuid, window: LeaderboardWindow) -> Result<Vec<LeaderboardEntry>> {
        let now = self.clock.now();
        let since = match window {
            LeaderboardWindow::Daily => Some(start_of_utc_day(now)),
            LeaderboardWindow::AllTime => None,
        };

        let submissions = self.store.list_by_room(room_id, since).await?;
        let usernames = self.usernames(room_id).await?;
        let entries = rank_entries(&submissions, &usernames, window, now.date_naive());

        debug!(
            "Leaderboard {:?} for room {}: {} entries from {} submissions",
            window,
            room_id,
            entries.len(),
            submissions.len()
        );
        Ok(entries)
    }

    /// Daily and all-time standings from a single read of the log
    pub async fn compute_both(&self, room_id: Uuid) -> Result<Leaderboards> {
        let today = self.clock.today();
        let submissions = self.store.list_by_room(room_id, None).await?;
        let usernames = self.usernames(room_id).await?;

        Ok(Leaderboards {
            daily: rank_entries(&submissions, &usernames, LeaderboardWindow::Daily, today),
            all_time: rank_entries(&submissions, &usernames, LeaderboardWindow::AllTime, today),
        })
    }

    /// Names of everyone who has submitted in the room, members or not
    async fn usernames(&self, room_id: Uuid) -> Result<HashMap<Uuid, String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT u.id, u.username
            FROM submissions s JOIN users u ON u.id = s.user_id
            WHERE s.room_id = ?
            "#,
        )
        .bind(room_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<(Uuid, String)> {
                Ok((
                    uuid_utils::parse_stored(&row.get::<String, _>("id"))?,
                    row.get::<String, _>("username"),
                ))
            })
            .collect()
    }
}

/// Group, sort and rank a room's submissions
///
/// Order: score descending, then fewer submissions first, then username,
/// then user id. Ranks run 1..n without gaps.
pub fn rank_entries(
    submissions: &[Submission],
    usernames: &HashMap<Uuid, String>,
    window: LeaderboardWindow,
    today: NaiveDate,
) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<Uuid, (u32, u32)> = HashMap::new();
    for submission in submissions {
        if window == LeaderboardWindow::Daily && submission.created_at.date_naive() != today {
            continue;
        }
        let (score, count) = totals.entry(submission.user_id).or_default();
        *score += submission.total_score;
        *count += 1;
    }

    let mut entries: Vec<LeaderboardEntry> = totals
        .into_iter()
        .map(|(user_id, (score, submission_count))| LeaderboardEntry {
            user_id,
            username: usernames.get(&user_id).cloned().unwrap_or_default(),
            score,
            submission_count,
            rank: 0,
        })
        .collect();

    entries.sort_by(compare_entries);
    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index as u32 + 1;
    }
    entries
}

fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.score
        .cmp(&a.score)
        .then(a.submission_count.cmp(&b.submission_count))
        .then_with(|| a.username.cmp(&b.username))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

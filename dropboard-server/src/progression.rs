//! Progression tracker
//!
//! Streaks, personal bests and badges are recomputed from a user's full
//! submission history. The stored counters on the user row are a cache of the
//! last recomputation; the badge set is only ever added to.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use dropboard_common::models::{BadgeType, Profile, Submission};
use dropboard_common::time::{local_hour, Clock};
use dropboard_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::identity::UserDirectory;
use crate::scoring::MAX_TOTAL_SCORE;
use crate::store::user_history;

/// Submissions on one UTC day needed for Triple Drop
pub const TRIPLE_DROP_COUNT: usize = 3;
/// Consecutive days needed for Weekly Master
pub const WEEKLY_MASTER_DAYS: u32 = 7;
/// Lifetime submissions needed for Century Club
pub const CENTURY_CLUB_COUNT: u32 = 100;
/// Local hours before this count as Early Bird
pub const EARLY_BIRD_BEFORE_HOUR: u32 = 6;
/// Local hours from this on count as Night Owl
pub const NIGHT_OWL_FROM_HOUR: u32 = 23;

/// Progression derived from a complete submission history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total_submissions: u32,
    pub best_score: u32,
    pub average_score: u32,
    pub streak_count: u32,
    /// Badges the history qualifies for
    pub badges: BTreeSet<BadgeType>,
}

impl ProgressSnapshot {
    /// Derive progression from `history` as seen on UTC day `today`
    pub fn from_history(history: &[Submission], today: NaiveDate) -> Self {
        if history.is_empty() {
            return Self::default();
        }

        let total_submissions = history.len() as u32;
        let best_score = history.iter().map(|s| s.total_score).max().unwrap_or(0);
        let sum: u64 = history.iter().map(|s| u64::from(s.total_score)).sum();
        let average_score = ((sum as f64) / f64::from(total_submissions)).round() as u32;

        let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for submission in history {
            *per_day.entry(submission.created_at.date_naive()).or_default() += 1;
        }
        let days: Vec<NaiveDate> = per_day.keys().copied().collect();

        let mut badges = BTreeSet::new();
        if per_day.values().any(|&count| count >= TRIPLE_DROP_COUNT) {
            badges.insert(BadgeType::TripleDrop);
        }
        if longest_run(&days) >= WEEKLY_MASTER_DAYS {
            badges.insert(BadgeType::WeeklyMaster);
        }
        if best_score >= MAX_TOTAL_SCORE {
            badges.insert(BadgeType::PerfectScore);
        }
        if total_submissions >= CENTURY_CLUB_COUNT {
            badges.insert(BadgeType::CenturyClub);
        }
        for submission in history {
            let hour = local_hour(submission.created_at, submission.utc_offset_minutes);
            if hour < EARLY_BIRD_BEFORE_HOUR {
                badges.insert(BadgeType::EarlyBird);
            }
            if hour >= NIGHT_OWL_FROM_HOUR {
                badges.insert(BadgeType::NightOwl);
            }
        }

        Self {
            total_submissions,
            best_score,
            average_score,
            streak_count: current_streak(&days, today),
            badges,
        }
    }
}

/// Length of the consecutive-day run ending on the last active day
///
/// Zero unless that day is `today` or the day before.
pub fn current_streak(days: &[NaiveDate], today: NaiveDate) -> u32 {
    let Some(&last) = days.last() else {
        return 0;
    };
    let yesterday = today.checked_sub_days(Days::new(1));
    if last != today && Some(last) != yesterday {
        return 0;
    }

    let mut streak = 1;
    for pair in days.windows(2).rev() {
        if pair[0].succ_opt() == Some(pair[1]) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Longest run of consecutive days anywhere in `days` (sorted, distinct)
pub fn longest_run(days: &[NaiveDate]) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for &day in days {
        run = match previous.and_then(|p| p.succ_opt()) {
            Some(next) if next == day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

/// Keeps user rows and badges in step with submission history
#[derive(Clone)]
pub struct ProgressionTracker {
    pool: SqlitePool,
    users: UserDirectory,
    clock: Arc<dyn Clock>,
}

impl ProgressionTracker {
    pub fn new(pool: SqlitePool, users: UserDirectory, clock: Arc<dyn Clock>) -> Self {
        Self { pool, users, clock }
    }

    /// Recompute and persist a user's progression
    ///
    /// Returns the snapshot with `badges` widened to everything ever earned.
    pub async fn refresh(&self, user_id: Uuid) -> Result<ProgressSnapshot> {
        let mut tx = self.pool.begin().await?;

        // Take the write lock before reading history: a refresh that commits
        // last has then seen every submission committed before it.
        let locked = sqlx::query("UPDATE users SET total_submissions = total_submissions WHERE id = ?")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() == 0 {
            return Err(Error::UserNotFound(user_id));
        }

        let history = user_history(&mut tx, user_id).await?;
        let now = self.clock.now();
        let mut snapshot = ProgressSnapshot::from_history(&history, now.date_naive());

        sqlx::query(
            "UPDATE users SET streak_count = ?, total_submissions = ?, best_score = ? WHERE id = ?",
        )
        .bind(i64::from(snapshot.streak_count))
        .bind(i64::from(snapshot.total_submissions))
        .bind(i64::from(snapshot.best_score))
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;

        for badge in &snapshot.badges {
            let awarded = sqlx::query(
                "INSERT OR IGNORE INTO user_badges (user_id, badge, earned_at_ms) VALUES (?, ?, ?)",
            )
            .bind(user_id.to_string())
            .bind(badge.as_str())
            .bind(now.timestamp_millis())
            .execute(&mut *tx)
            .await?;

            if awarded.rows_affected() > 0 {
                info!("User {} earned badge {}", user_id, badge.label());
            }
        }
        tx.commit().await?;

        snapshot.badges.extend(self.users.badges(user_id).await?);
        debug!(
            "Progress for user {}: {} submissions, best {}, streak {}",
            user_id, snapshot.total_submissions, snapshot.best_score, snapshot.streak_count
        );
        Ok(snapshot)
    }

    /// Fresh profile for display
    pub async fn profile(&self, user_id: Uuid) -> Result<Profile> {
        let snapshot = self.refresh(user_id).await?;
        let user = self.users.get(user_id).await?;

        Ok(Profile {
            user_id,
            username: user.username,
            streak_count: snapshot.streak_count,
            total_submissions: snapshot.total_submissions,
            best_score: snapshot.best_score,
            average_score: snapshot.average_score,
            badges: snapshot.badges,
        })
    }
}

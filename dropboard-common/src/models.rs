//! Domain records
//!
//! Fixed-shape records exchanged between the stores, the aggregators and the
//! HTTP layer. Entities reference each other by id only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Registered user with progression counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub streak_count: u32,
    pub total_submissions: u32,
    pub best_score: u32,
    pub badges: BTreeSet<BadgeType>,
    pub created_at: DateTime<Utc>,
}

/// Code-addressable competitive group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub owner_id: Uuid,
    pub member_ids: BTreeSet<Uuid>,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Room {
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.member_ids.contains(&user_id)
    }
}

/// Public view of a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub member_count: usize,
}

impl From<&Room> for RoomView {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id,
            code: room.code.clone(),
            name: room.name.clone(),
            member_count: room.member_ids.len(),
        }
    }
}

/// Raw sub-scores as produced by the image analysis collaborator
///
/// Unvalidated: the scoring engine rejects values outside 1..=50.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisTriple {
    pub size: i64,
    pub color: i64,
    pub texture: i64,
}

impl AnalysisTriple {
    pub fn new(size: i64, color: i64, texture: i64) -> Self {
        Self { size, color, texture }
    }
}

/// Validated scoring result, ready to be recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub size_score: u32,
    pub color_score: u32,
    pub texture_score: u32,
    pub total_score: u32,
    pub analysis_text: String,
}

/// One immutable scored entry by a user in a room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub room_id: Uuid,
    pub user_id: Uuid,
    pub size_score: u32,
    pub color_score: u32,
    pub texture_score: u32,
    pub total_score: u32,
    pub analysis_text: String,
    pub utc_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
}

/// What the submitter sees after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub id: Uuid,
    pub total_score: u32,
    pub size_score: u32,
    pub color_score: u32,
    pub texture_score: u32,
    pub analysis_text: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Submission> for SubmissionResult {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id,
            total_score: s.total_score,
            size_score: s.size_score,
            color_score: s.color_score,
            texture_score: s.texture_score,
            analysis_text: s.analysis_text.clone(),
            created_at: s.created_at,
        }
    }
}

/// Time range a leaderboard covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardWindow {
    /// Current UTC calendar day
    Daily,
    /// Full history
    AllTime,
}

impl FromStr for LeaderboardWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(LeaderboardWindow::Daily),
            "all_time" | "alltime" | "all-time" => Ok(LeaderboardWindow::AllTime),
            other => Err(Error::InvalidInput(format!("Unknown leaderboard window: {other}"))),
        }
    }
}

/// Derived leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: Uuid,
    pub username: String,
    pub score: u32,
    pub submission_count: u32,
    pub rank: u32,
}

/// Both standings for a room, as the room page shows them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaderboards {
    pub daily: Vec<LeaderboardEntry>,
    pub all_time: Vec<LeaderboardEntry>,
}

/// Permanently earned achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BadgeType {
    TripleDrop,
    WeeklyMaster,
    PerfectScore,
    CenturyClub,
    EarlyBird,
    NightOwl,
}

impl BadgeType {
    pub const ALL: [BadgeType; 6] = [
        BadgeType::TripleDrop,
        BadgeType::WeeklyMaster,
        BadgeType::PerfectScore,
        BadgeType::CenturyClub,
        BadgeType::EarlyBird,
        BadgeType::NightOwl,
    ];

    /// Identifier used in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeType::TripleDrop => "TripleDrop",
            BadgeType::WeeklyMaster => "WeeklyMaster",
            BadgeType::PerfectScore => "PerfectScore",
            BadgeType::CenturyClub => "CenturyClub",
            BadgeType::EarlyBird => "EarlyBird",
            BadgeType::NightOwl => "NightOwl",
        }
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            BadgeType::TripleDrop => "Triple Drop",
            BadgeType::WeeklyMaster => "Weekly Master",
            BadgeType::PerfectScore => "Perfect Score",
            BadgeType::CenturyClub => "Century Club",
            BadgeType::EarlyBird => "Early Bird",
            BadgeType::NightOwl => "Night Owl",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BadgeType::TripleDrop => "Upload 3 times in one day",
            BadgeType::WeeklyMaster => "7-day upload streak",
            BadgeType::PerfectScore => "Score 150/150",
            BadgeType::CenturyClub => "100 total uploads",
            BadgeType::EarlyBird => "Upload before 6 AM",
            BadgeType::NightOwl => "Upload after 11 PM",
        }
    }
}

impl fmt::Display for BadgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BadgeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BadgeType::ALL
            .into_iter()
            .find(|badge| badge.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown badge: {s}")))
    }
}

/// Badge catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeInfo {
    pub badge: BadgeType,
    pub label: String,
    pub description: String,
}

impl From<BadgeType> for BadgeInfo {
    fn from(badge: BadgeType) -> Self {
        Self {
            badge,
            label: badge.label().to_string(),
            description: badge.description().to_string(),
        }
    }
}

/// User progression as shown on the profile page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub streak_count: u32,
    pub total_submissions: u32,
    pub best_score: u32,
    pub average_score: u32,
    pub badges: BTreeSet<BadgeType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_parses_both_spellings() {
        assert_eq!("daily".parse::<LeaderboardWindow>().unwrap(), LeaderboardWindow::Daily);
        assert_eq!("all_time".parse::<LeaderboardWindow>().unwrap(), LeaderboardWindow::AllTime);
        assert_eq!("allTime".parse::<LeaderboardWindow>().unwrap(), LeaderboardWindow::AllTime);
        assert!("weekly".parse::<LeaderboardWindow>().is_err());
    }

    #[test]
    fn test_window_serializes_snake_case() {
        let json = serde_json::to_string(&LeaderboardWindow::AllTime).unwrap();
        assert_eq!(json, "\"all_time\"");
    }

    #[test]
    fn test_badge_storage_names_parse_back() {
        for badge in BadgeType::ALL {
            assert_eq!(badge.as_str().parse::<BadgeType>().unwrap(), badge);
        }
        assert!("Legend".parse::<BadgeType>().is_err());
    }

    #[test]
    fn test_room_view_counts_members() {
        let owner = Uuid::new_v4();
        let room = Room {
            id: Uuid::new_v4(),
            code: "ABC123".to_string(),
            name: "Poop Room".to_string(),
            owner_id: owner,
            member_ids: [owner, Uuid::new_v4()].into_iter().collect(),
            created_at: Utc::now(),
            archived_at: None,
        };
        let view = RoomView::from(&room);
        assert_eq!(view.member_count, 2);
        assert_eq!(view.code, "ABC123");
    }
}

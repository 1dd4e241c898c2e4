//! Dropboard service facade
//!
//! Composes the user directory, room registry, submission store, leaderboard
//! aggregator, progression tracker and image analyzer into the operations the
//! HTTP layer exposes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dropboard_common::config::Config;
use dropboard_common::models::{
    AnalysisTriple, BadgeInfo, BadgeType, LeaderboardEntry, LeaderboardWindow, Leaderboards,
    Profile, RoomView, Submission, SubmissionResult, User,
};
use dropboard_common::time::{Clock, SystemClock};
use dropboard_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{self, ImageAnalyzer};
use crate::identity::UserDirectory;
use crate::leaderboard::LeaderboardAggregator;
use crate::progression::ProgressionTracker;
use crate::registry::{CodeGenerator, RandomCodes, RoomRegistry};
use crate::scoring;
use crate::store::SubmissionStore;

/// Pluggable collaborators; production uses [`ServiceDeps::system`]
pub struct ServiceDeps {
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<dyn CodeGenerator>,
    pub analyzer: Arc<dyn ImageAnalyzer>,
}

impl ServiceDeps {
    /// Wall clock, random codes and the configured analyzer
    pub fn system(config: &Config) -> Result<Self> {
        Ok(Self {
            clock: Arc::new(SystemClock),
            codes: Arc::new(RandomCodes),
            analyzer: Arc::from(analysis::from_config(&config.analyzer)?),
        })
    }
}

/// All Dropboard operations over one database
pub struct DropService {
    users: UserDirectory,
    rooms: RoomRegistry,
    store: SubmissionStore,
    leaderboards: LeaderboardAggregator,
    progression: ProgressionTracker,
    analyzer: Arc<dyn ImageAnalyzer>,
    analysis_timeout: Duration,
}

impl DropService {
    pub fn new(pool: SqlitePool, config: &Config, deps: ServiceDeps) -> Self {
        let ServiceDeps {
            clock,
            codes,
            analyzer,
        } = deps;

        let users = UserDirectory::new(pool.clone(), clock.clone());
        let rooms = RoomRegistry::new(pool.clone(), clock.clone(), codes, config.room.clone());
        let store = SubmissionStore::new(pool.clone(), clock.clone());
        let leaderboards = LeaderboardAggregator::new(pool.clone(), store.clone(), clock.clone());
        let progression = ProgressionTracker::new(pool, users.clone(), clock);

        if !analyzer.is_available() {
            warn!("No image analyzer configured; image uploads will be refused");
        }

        Self {
            users,
            rooms,
            store,
            leaderboards,
            progression,
            analyzer,
            analysis_timeout: Duration::from_millis(config.analyzer.timeout_ms),
        }
    }

    /// Production wiring from configuration
    pub fn from_config(pool: SqlitePool, config: &Config) -> Result<Self> {
        Ok(Self::new(pool, config, ServiceDeps::system(config)?))
    }

    pub async fn register_user(&self, username: &str) -> Result<User> {
        self.users.register(username).await
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.users.get(user_id).await
    }

    pub async fn create_room(&self, owner_id: Uuid, name: Option<&str>) -> Result<RoomView> {
        let room = self.rooms.create_room(owner_id, name).await?;
        Ok(RoomView::from(&room))
    }

    pub async fn join_room(&self, code: &str, user_id: Uuid) -> Result<RoomView> {
        let room = self.rooms.join_room(code, user_id).await?;
        Ok(RoomView::from(&room))
    }

    pub async fn get_room(&self, code: &str) -> Result<RoomView> {
        let room = self.rooms.resolve(code).await?;
        Ok(RoomView::from(&room))
    }

    pub async fn leave_room(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        self.rooms.leave_room(room_id, user_id).await
    }

    pub async fn close_room(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        self.rooms.close_room(room_id, user_id).await
    }

    /// Score an analysis triple and record it for a room member
    pub async fn submit(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        analysis: AnalysisTriple,
        utc_offset_minutes: Option<i32>,
    ) -> Result<SubmissionResult> {
        let card = scoring::score(&analysis)?;
        self.users.ensure_exists(user_id).await?;

        let submission = self
            .store
            .record(room_id, user_id, &card, utc_offset_minutes.unwrap_or(0))
            .await?;
        // The submission is committed; stale counters heal on the next refresh
        if let Err(e) = self.progression.refresh(user_id).await {
            warn!(
                "Progress refresh for user {} failed after recording submission {}: {}",
                user_id, submission.id, e
            );
        }

        Ok(SubmissionResult::from(&submission))
    }

    /// Analyze an uploaded photo, then score and record it
    ///
    /// Nothing is stored unless analysis completes within the configured
    /// timeout and yields an in-range triple.
    pub async fn submit_image(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        image: &[u8],
        utc_offset_minutes: Option<i32>,
    ) -> Result<SubmissionResult> {
        analysis::validate_image(image)?;

        // Refuse outsiders before paying for analysis
        let room = self.rooms.get(room_id).await?;
        if !room.is_member(user_id) {
            return Err(Error::NotAMember { room_id, user_id });
        }

        let triple = match tokio::time::timeout(self.analysis_timeout, self.analyzer.analyze(image)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Image analysis via {} timed out after {:?}",
                    self.analyzer.source_id(),
                    self.analysis_timeout
                );
                return Err(Error::AnalysisUnavailable(format!(
                    "Analysis timed out after {} ms",
                    self.analysis_timeout.as_millis()
                )));
            }
        };

        info!(
            "Analyzed upload for user {} in room {}: size={} color={} texture={}",
            user_id, room.code, triple.size, triple.color, triple.texture
        );
        self.submit(room_id, user_id, triple, utc_offset_minutes).await
    }

    pub async fn list_submissions(
        &self,
        room_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Submission>> {
        self.rooms.get(room_id).await?;
        self.store.list_by_room(room_id, since).await
    }

    pub async fn get_leaderboard(
        &self,
        room_id: Uuid,
        window: LeaderboardWindow,
    ) -> Result<Vec<LeaderboardEntry>> {
        self.rooms.get(room_id).await?;
        self.leaderboards.compute(room_id, window).await
    }

    pub async fn get_leaderboards(&self, room_id: Uuid) -> Result<Leaderboards> {
        self.rooms.get(room_id).await?;
        self.leaderboards.compute_both(room_id).await
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<Profile> {
        self.progression.profile(user_id).await
    }

    pub fn badge_catalog(&self) -> Vec<BadgeInfo> {
        BadgeType::ALL.into_iter().map(BadgeInfo::from).collect()
    }
}

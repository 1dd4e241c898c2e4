//! User directory
//!
//! Registers users and reads them back together with their earned badges.
//! Progression counters on the user row are written only by
//! [`crate::progression`].

use std::collections::BTreeSet;
use std::sync::Arc;

use dropboard_common::error::is_unique_violation;
use dropboard_common::models::{BadgeType, User};
use dropboard_common::time::{from_millis, Clock};
use dropboard_common::{uuid_utils, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;

/// Users and their badges
#[derive(Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Register a new user
    ///
    /// Names are unique ignoring ASCII case. The check is the database's
    /// unique index, so two concurrent registrations cannot both succeed.
    pub async fn register(&self, username: &str) -> Result<User> {
        let username = validate_username(username)?;
        let id = uuid_utils::generate();
        let created_at = self.clock.now();

        let result = sqlx::query(
            "INSERT INTO users (id, username, created_at_ms) VALUES (?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&username)
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!("Registered user {} ({})", username, id);
                self.get(id).await
            }
            Err(e) if is_unique_violation(&e) => {
                warn!("Registration refused, username taken: {}", username);
                Err(Error::DuplicateUsername(username))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by id
    pub async fn get(&self, user_id: Uuid) -> Result<User> {
        let row = sqlx::query(
            r#"
            SELECT id, username, streak_count, total_submissions, best_score, created_at_ms
            FROM users WHERE id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::UserNotFound(user_id))?;

        let badges = self.badges(user_id).await?;
        user_from_row(&row, badges)
    }

    /// Look up a user by name, ignoring case
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => self.get(uuid_utils::parse_stored(&id)?).await.map(Some),
            None => Ok(None),
        }
    }

    /// Fail with `UserNotFound` unless the user exists
    pub async fn ensure_exists(&self, user_id: Uuid) -> Result<()> {
        ensure_user_exists(&self.pool, user_id).await
    }

    /// Badges the user has earned so far
    pub async fn badges(&self, user_id: Uuid) -> Result<BTreeSet<BadgeType>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT badge FROM user_badges WHERE user_id = ?")
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        let mut badges = BTreeSet::new();
        for name in names {
            match name.parse::<BadgeType>() {
                Ok(badge) => {
                    badges.insert(badge);
                }
                // Unknown names come from a newer build; ignore rather than fail the read
                Err(_) => warn!("Ignoring unknown badge {:?} for user {}", name, user_id),
            }
        }
        Ok(badges)
    }
}

/// Fail with `UserNotFound` unless a user row with this id exists
pub async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> Result<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;
    exists.map(|_| ()).ok_or(Error::UserNotFound(user_id))
}

/// Trim and check a requested username
pub fn validate_username(raw: &str) -> Result<String> {
    let username = raw.trim();
    let len = username.chars().count();

    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(Error::InvalidInput(format!(
            "Username must be {}-{} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::InvalidInput(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(username.to_string())
}

fn user_from_row(row: &SqliteRow, badges: BTreeSet<BadgeType>) -> Result<User> {
    Ok(User {
        id: uuid_utils::parse_stored(&row.get::<String, _>("id"))?,
        username: row.get("username"),
        streak_count: row.get::<i64, _>("streak_count") as u32,
        total_submissions: row.get::<i64, _>("total_submissions") as u32,
        best_score: row.get::<i64, _>("best_score") as u32,
        badges,
        created_at: from_millis(row.get("created_at_ms")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropboard_common::db::init_memory_database;
    use dropboard_common::time::SystemClock;

    async fn directory() -> UserDirectory {
        let pool = init_memory_database().await.unwrap();
        UserDirectory::new(pool, Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn test_register_starts_with_empty_progress() {
        let users = directory().await;
        let user = users.register("  PoopMaster42 ").await.unwrap();

        assert_eq!(user.username, "PoopMaster42");
        assert_eq!(user.streak_count, 0);
        assert_eq!(user.total_submissions, 0);
        assert_eq!(user.best_score, 0);
        assert!(user.badges.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_username_ignores_case() {
        let users = directory().await;
        users.register("TurdNinja").await.unwrap();

        match users.register("turdninja").await {
            Err(Error::DuplicateUsername(name)) => assert_eq!(name, "turdninja"),
            other => panic!("Expected DuplicateUsername, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_find_by_username_ignores_case() {
        let users = directory().await;
        let user = users.register("BrownBomber").await.unwrap();

        let found = users.find_by_username("BROWNBOMBER").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(users.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let users = directory().await;
        let missing = Uuid::new_v4();
        assert!(matches!(users.get(missing).await, Err(Error::UserNotFound(id)) if id == missing));
        assert!(users.ensure_exists(missing).await.is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username("emoji💩").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
        assert_eq!(validate_username(" ok_name ").unwrap(), "ok_name");
    }
}

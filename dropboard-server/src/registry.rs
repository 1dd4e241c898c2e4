//! Room registry
//!
//! Allocates collision-free room codes, resolves codes to rooms and tracks
//! membership. Code allocation is an atomic check-and-insert: the partial
//! unique index on active codes rejects a colliding insert, and the registry
//! simply draws another code.

use std::collections::BTreeSet;
use std::sync::Arc;

use dropboard_common::config::RoomConfig;
use dropboard_common::error::is_unique_violation;
use dropboard_common::models::Room;
use dropboard_common::room_code::{self, CODE_SPACE};
use dropboard_common::time::{from_millis, Clock};
use dropboard_common::{uuid_utils, Error, Result};

use crate::identity::ensure_user_exists;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Longest accepted room name
pub const MAX_ROOM_NAME_LEN: usize = 64;

/// Source of candidate room codes
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> String;
}

/// Uniformly random codes over `A-Z0-9`
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodes;

impl CodeGenerator for RandomCodes {
    fn next_code(&self) -> String {
        room_code::generate_code(&mut rand::thread_rng())
    }
}

/// Active rooms and their members
#[derive(Clone)]
pub struct RoomRegistry {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
    settings: RoomConfig,
}

impl RoomRegistry {
    pub fn new(
        pool: SqlitePool,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
        settings: RoomConfig,
    ) -> Self {
        Self {
            pool,
            clock,
            codes,
            settings,
        }
    }

    /// Create a room owned by (and containing) `owner_id`
    pub async fn create_room(&self, owner_id: Uuid, name: Option<&str>) -> Result<Room> {
        self.ensure_user(owner_id).await?;
        let name = self.room_name(name)?;

        let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE archived_at_ms IS NULL")
            .fetch_one(&self.pool)
            .await?;
        if active as u64 >= CODE_SPACE {
            warn!("Room code space saturated ({} active rooms)", active);
            return Err(Error::CapacityExhausted { attempts: 0 });
        }

        let attempts = self.settings.code_attempts;
        for attempt in 1..=attempts {
            let code = self.codes.next_code();
            if !room_code::is_valid(&code) {
                return Err(Error::Internal(format!("Code generator produced {:?}", code)));
            }

            let id = uuid_utils::generate();
            let now_ms = self.clock.now().timestamp_millis();
            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query(
                "INSERT INTO rooms (id, code, name, owner_id, created_at_ms) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(&code)
            .bind(&name)
            .bind(owner_id.to_string())
            .bind(now_ms)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    debug!("Room code {} collided (attempt {}/{})", code, attempt, attempts);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            sqlx::query("INSERT INTO room_members (room_id, user_id, joined_at_ms) VALUES (?, ?, ?)")
                .bind(id.to_string())
                .bind(owner_id.to_string())
                .bind(now_ms)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            info!("Created room {} ({}) for owner {}", code, id, owner_id);
            return self.get(id).await;
        }

        warn!("Gave up allocating a room code after {} attempts", attempts);
        Err(Error::CapacityExhausted { attempts })
    }

    /// Add `user_id` to the active room with this code
    ///
    /// Joining a room twice is a no-op.
    pub async fn join_room(&self, code: &str, user_id: Uuid) -> Result<Room> {
        self.ensure_user(user_id).await?;
        let room = self.resolve(code).await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO room_members (room_id, user_id, joined_at_ms) VALUES (?, ?, ?)",
        )
        .bind(room.id.to_string())
        .bind(user_id.to_string())
        .bind(self.clock.now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!("User {} already in room {}", user_id, room.code);
            return Ok(room);
        }

        info!("User {} joined room {}", user_id, room.code);
        self.get(room.id).await
    }

    /// Find the active room for a code typed in any case
    pub async fn resolve(&self, code: &str) -> Result<Room> {
        let code = room_code::normalize(code);
        let row = sqlx::query(
            r#"
            SELECT id, code, name, owner_id, created_at_ms, archived_at_ms
            FROM rooms WHERE code = ? AND archived_at_ms IS NULL
            "#,
        )
        .bind(&code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::RoomNotFound(code.clone()))?;

        self.room_from_row(&row).await
    }

    /// Look up an active room by id
    pub async fn get(&self, room_id: Uuid) -> Result<Room> {
        let row = sqlx::query(
            r#"
            SELECT id, code, name, owner_id, created_at_ms, archived_at_ms
            FROM rooms WHERE id = ? AND archived_at_ms IS NULL
            "#,
        )
        .bind(room_id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;

        self.room_from_row(&row).await
    }

    /// Remove `user_id` from the room; leaving a room one is not in is a no-op
    pub async fn leave_room(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        let room = self.get(room_id).await?;

        let result = sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("User {} left room {}", user_id, room.code);
        }
        Ok(())
    }

    /// Archive the room; only its owner may close it
    ///
    /// The code stops resolving immediately and may be issued again.
    pub async fn close_room(&self, room_id: Uuid, user_id: Uuid) -> Result<()> {
        let room = self.get(room_id).await?;
        if room.owner_id != user_id {
            return Err(Error::NotRoomOwner { room_id, user_id });
        }

        sqlx::query("UPDATE rooms SET archived_at_ms = ? WHERE id = ? AND archived_at_ms IS NULL")
            .bind(self.clock.now().timestamp_millis())
            .bind(room_id.to_string())
            .execute(&self.pool)
            .await?;

        info!("Closed room {} ({})", room.code, room_id);
        Ok(())
    }

    async fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        ensure_user_exists(&self.pool, user_id).await
    }

    fn room_name(&self, requested: Option<&str>) -> Result<String> {
        match requested.map(str::trim).filter(|n| !n.is_empty()) {
            None => Ok(self.settings.default_name.clone()),
            Some(name) if name.chars().count() > MAX_ROOM_NAME_LEN => Err(Error::InvalidInput(
                format!("Room name must be at most {} characters", MAX_ROOM_NAME_LEN),
            )),
            Some(name) => Ok(name.to_string()),
        }
    }

    async fn room_from_row(&self, row: &SqliteRow) -> Result<Room> {
        let id = uuid_utils::parse_stored(&row.get::<String, _>("id"))?;

        let member_rows: Vec<String> =
            sqlx::query_scalar("SELECT user_id FROM room_members WHERE room_id = ?")
                .bind(id.to_string())
                .fetch_all(&self.pool)
                .await?;
        let member_ids = member_rows
            .iter()
            .map(|s| uuid_utils::parse_stored(s))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Room {
            id,
            code: row.get("code"),
            name: row.get("name"),
            owner_id: uuid_utils::parse_stored(&row.get::<String, _>("owner_id"))?,
            member_ids,
            created_at: from_millis(row.get("created_at_ms")),
            archived_at: row.get::<Option<i64>, _>("archived_at_ms").map(from_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserDirectory;
    use dropboard_common::db::init_memory_database;
    use dropboard_common::time::SystemClock;
    use std::sync::Mutex;

    /// Replays a fixed list of codes, then repeats the last one forever
    struct ScriptedCodes(Mutex<Vec<String>>);

    impl ScriptedCodes {
        fn new(codes: &[&str]) -> Self {
            let mut codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
            codes.reverse();
            Self(Mutex::new(codes))
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn next_code(&self) -> String {
            let mut codes = self.0.lock().unwrap();
            if codes.len() > 1 {
                codes.pop().unwrap()
            } else {
                codes[0].clone()
            }
        }
    }

    async fn setup(codes: Arc<dyn CodeGenerator>) -> (RoomRegistry, UserDirectory) {
        let pool = init_memory_database().await.unwrap();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let settings = RoomConfig {
            code_attempts: 5,
            ..RoomConfig::default()
        };
        (
            RoomRegistry::new(pool.clone(), clock.clone(), codes, settings),
            UserDirectory::new(pool, clock),
        )
    }

    #[tokio::test]
    async fn test_create_room_makes_owner_first_member() {
        let (rooms, users) = setup(Arc::new(RandomCodes)).await;
        let owner = users.register("owner").await.unwrap();

        let room = rooms.create_room(owner.id, None).await.unwrap();

        assert!(room_code::is_valid(&room.code));
        assert_eq!(room.name, "Poop Room");
        assert_eq!(room.owner_id, owner.id);
        assert_eq!(room.member_ids.len(), 1);
        assert!(room.is_member(owner.id));
    }

    #[tokio::test]
    async fn test_create_room_custom_name_trimmed() {
        let (rooms, users) = setup(Arc::new(RandomCodes)).await;
        let owner = users.register("owner").await.unwrap();

        let room = rooms.create_room(owner.id, Some("  Office Throne ")).await.unwrap();
        assert_eq!(room.name, "Office Throne");

        let long = "x".repeat(MAX_ROOM_NAME_LEN + 1);
        assert!(matches!(
            rooms.create_room(owner.id, Some(&long)).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_create_room_unknown_owner() {
        let (rooms, _) = setup(Arc::new(RandomCodes)).await;
        assert!(matches!(
            rooms.create_room(Uuid::new_v4(), None).await,
            Err(Error::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_collision_retries_with_next_code() {
        let (rooms, users) = setup(Arc::new(ScriptedCodes::new(&["AAAAAA", "AAAAAA", "BBBBBB"]))).await;
        let owner = users.register("owner").await.unwrap();

        let first = rooms.create_room(owner.id, None).await.unwrap();
        let second = rooms.create_room(owner.id, None).await.unwrap();

        assert_eq!(first.code, "AAAAAA");
        assert_eq!(second.code, "BBBBBB");
    }

    #[tokio::test]
    async fn test_exhausted_attempts_is_recoverable_error() {
        let (rooms, users) = setup(Arc::new(ScriptedCodes::new(&["AAAAAA"]))).await;
        let owner = users.register("owner").await.unwrap();

        rooms.create_room(owner.id, None).await.unwrap();
        match rooms.create_room(owner.id, None).await {
            Err(Error::CapacityExhausted { attempts }) => assert_eq!(attempts, 5),
            other => panic!("Expected CapacityExhausted, got {:?}", other),
        }

        // Registry still usable afterwards
        assert_eq!(rooms.resolve("aaaaaa").await.unwrap().code, "AAAAAA");
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_case_insensitive() {
        let (rooms, users) = setup(Arc::new(RandomCodes)).await;
        let owner = users.register("owner").await.unwrap();
        let guest = users.register("guest").await.unwrap();
        let room = rooms.create_room(owner.id, None).await.unwrap();

        let joined = rooms.join_room(&room.code.to_lowercase(), guest.id).await.unwrap();
        assert_eq!(joined.member_ids.len(), 2);

        let again = rooms.join_room(&room.code, guest.id).await.unwrap();
        assert_eq!(again.member_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_join_unknown_code() {
        let (rooms, users) = setup(Arc::new(RandomCodes)).await;
        let user = users.register("someone").await.unwrap();

        match rooms.join_room("ZZZZZZ", user.id).await {
            Err(Error::RoomNotFound(code)) => assert_eq!(code, "ZZZZZZ"),
            other => panic!("Expected RoomNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_leave_room_removes_membership() {
        let (rooms, users) = setup(Arc::new(RandomCodes)).await;
        let owner = users.register("owner").await.unwrap();
        let guest = users.register("guest").await.unwrap();
        let room = rooms.create_room(owner.id, None).await.unwrap();
        rooms.join_room(&room.code, guest.id).await.unwrap();

        rooms.leave_room(room.id, guest.id).await.unwrap();
        // Leaving twice is fine
        rooms.leave_room(room.id, guest.id).await.unwrap();

        let room = rooms.get(room.id).await.unwrap();
        assert!(!room.is_member(guest.id));
        assert_eq!(room.member_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_close_room_frees_code() {
        let (rooms, users) = setup(Arc::new(ScriptedCodes::new(&["CLOSED"]))).await;
        let owner = users.register("owner").await.unwrap();
        let guest = users.register("guest").await.unwrap();
        let room = rooms.create_room(owner.id, None).await.unwrap();

        assert!(matches!(
            rooms.close_room(room.id, guest.id).await,
            Err(Error::NotRoomOwner { .. })
        ));

        rooms.close_room(room.id, owner.id).await.unwrap();
        assert!(matches!(rooms.resolve("CLOSED").await, Err(Error::RoomNotFound(_))));
        assert!(matches!(rooms.get(room.id).await, Err(Error::RoomNotFound(_))));

        let reissued = rooms.create_room(owner.id, None).await.unwrap();
        assert_eq!(reissued.code, "CLOSED");
        assert_ne!(reissued.id, room.id);
    }
}

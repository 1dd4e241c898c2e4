//! Common error types for Dropboard

use thiserror::Error;
use uuid::Uuid;

/// Common result type for Dropboard operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every Dropboard component
///
/// Every domain variant is recoverable: callers get enough context to retry or
/// correct their input. Only `Database`, `Io` and `Config` indicate
/// infrastructure trouble.
#[derive(Error, Debug)]
pub enum Error {
    /// No active room matches the given code or id
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// User is not a member of the room it tried to act in
    #[error("User {user_id} is not a member of room {room_id}")]
    NotAMember { room_id: Uuid, user_id: Uuid },

    /// Only the room owner may perform this operation
    #[error("User {user_id} does not own room {room_id}")]
    NotRoomOwner { room_id: Uuid, user_id: Uuid },

    /// Analysis sub-score outside the accepted range
    #[error("Invalid analysis input: {field} = {value} (expected 1..=50)")]
    InvalidAnalysisInput { field: &'static str, value: i64 },

    /// Image analysis collaborator failed, timed out or returned garbage
    #[error("Analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    /// No free room code could be allocated
    #[error("Room code space exhausted after {attempts} attempts")]
    CapacityExhausted { attempts: u32 },

    /// Username already taken (case-insensitive)
    #[error("Username already taken: {0}")]
    DuplicateUsername(String),

    /// Referenced user does not exist
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable identifier used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::RoomNotFound(_) => "ROOM_NOT_FOUND",
            Error::NotAMember { .. } => "NOT_A_MEMBER",
            Error::NotRoomOwner { .. } => "NOT_ROOM_OWNER",
            Error::InvalidAnalysisInput { .. } => "INVALID_ANALYSIS_INPUT",
            Error::AnalysisUnavailable(_) => "ANALYSIS_UNAVAILABLE",
            Error::CapacityExhausted { .. } => "CAPACITY_EXHAUSTED",
            Error::DuplicateUsername(_) => "DUPLICATE_USERNAME",
            Error::UserNotFound(_) => "USER_NOT_FOUND",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// True when a sqlx error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_analysis_names_field() {
        let err = Error::InvalidAnalysisInput { field: "color", value: 51 };
        assert_eq!(err.code(), "INVALID_ANALYSIS_INPUT");
        assert!(err.to_string().contains("color = 51"));
    }

    #[test]
    fn test_not_a_member_message() {
        let room_id = Uuid::nil();
        let user_id = Uuid::nil();
        let err = Error::NotAMember { room_id, user_id };
        assert!(err.to_string().contains("not a member"));
    }
}

//! # Dropboard Common Library
//!
//! Shared code for the Dropboard service including:
//! - Error taxonomy
//! - Domain records (users, rooms, submissions, leaderboards, badges)
//! - Configuration loading
//! - Database schema initialization
//! - Clock, id and room code helpers

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod room_code;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};

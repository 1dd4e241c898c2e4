//! dropboard-server library
//!
//! Room-based scoring service: users join rooms by short code, submit scored
//! entries and compete on daily and all-time leaderboards while earning
//! streaks and badges.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod analysis;
pub mod api;
pub mod error;
pub mod identity;
pub mod leaderboard;
pub mod progression;
pub mod registry;
pub mod scoring;
pub mod service;
pub mod store;

pub use service::{DropService, ServiceDeps};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DropService>,
}

impl AppState {
    pub fn new(service: DropService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::health_routes())
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::user_routes())
        .merge(api::room_routes())
        .merge(api::submission_routes())
        .merge(api::leaderboard_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

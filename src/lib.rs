// Public API for integration tests and potential library usage

pub mod api;
pub mod broadcast;
pub mod config;
pub mod engine;
pub mod protocol;
pub mod session;
pub mod state;
pub mod types;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// All HTTP and WebSocket routes
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws/club", get(ws::ws_club_handler))
        .route("/ws/algorithm", get(ws::ws_algorithm_handler))
        .route("/api/club/{session_id}", get(api::get_session))
        .route("/health", get(api::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! HTTP endpoints next to the sockets.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::state::AppState;

/// Read the current snapshot of a session.
///
/// GET /api/club/{session_id}
///
/// Unknown sessions return the bootstrap snapshot. Any failure maps to a
/// bare 500; the body never says which tier failed.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Response {
    match state.coordinator.get_session(&session_id).await {
        Ok(session) => Json(session).into_response(),
        Err(e) => {
            tracing::error!("Session read failed for {}: {}", session_id, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

//! Health and readiness endpoints

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyResponse {
    /// Peer mesh dialed and cascade key derived
    connected: bool,
    /// Registration barrier released
    registered: bool,
}

/// GET /health - liveness
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// GET /ready - protocol readiness
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    Json(ReadyResponse {
        connected: state.server.connected(),
        registered: state.server.reg_done(),
    })
}

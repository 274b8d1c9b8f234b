//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::core::ServerState;

pub async fn health_check(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let snapshot = state.store.current();
    Json(serde_json::json!({
        "status": "ok",
        "service": "dashboard-server",
        "version": env!("CARGO_PKG_VERSION"),
        "sites": snapshot.sites.len(),
        "generation": snapshot.generation,
    }))
}

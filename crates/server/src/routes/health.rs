//! Liveness and readiness probes.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health
///
/// Always answers 200 with the service name and version. Says nothing
/// about dependencies.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "shoptalk-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health/ready
///
/// Probes the database with a trivial query and answers 503 until it
/// responds, so load balancers hold traffic during startup.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    let probe = sqlx::query("SELECT 1").fetch_one(state.pool()).await;
    if probe.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

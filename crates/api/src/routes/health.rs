use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when both the database and ACE-Step answer, else `degraded`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub db_healthy: bool,
    pub acestep_healthy: bool,
    /// Background poll tasks still running.
    pub active_polls: usize,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = acemusic_db::health_check(&state.pool).await.is_ok();
    let acestep_healthy = match state.generation.client().health().await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "ACE-Step health check failed");
            false
        }
    };

    let status = if db_healthy && acestep_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        acestep_healthy,
        active_polls: state.generation.active_polls(),
    })
}

/// Mount health check routes at the root.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

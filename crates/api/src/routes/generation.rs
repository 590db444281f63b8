//! Route definitions for job submission and ACE-Step passthroughs.
//!
//! Mounted under `/api`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generation::generate))
        .route("/models", get(generation::list_models))
        .route("/format_input", post(generation::format_input))
}

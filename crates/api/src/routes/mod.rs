pub mod generation;
pub mod health;
pub mod pages;
pub mod tracks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /generate                        submit from the HTML form (POST)
/// /models                          models offered by ACE-Step (GET)
/// /format_input                    caption/lyrics formatter (POST)
///
/// /tracks                          list (GET)
/// /tracks/{id}                     get (GET), delete (DELETE)
/// /tracks/{id}/status              progress/result fragment (GET)
/// /tracks/{id}/download            audio attachment (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(generation::router())
        .nest("/tracks", tracks::router())
}

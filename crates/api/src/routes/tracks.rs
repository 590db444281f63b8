//! Route definitions for the track library.
//!
//! Mounted at `/api/tracks`.
//!
//! ```text
//! GET    /                    list_tracks
//! GET    /{id}                get_track
//! DELETE /{id}                delete_track
//! GET    /{id}/status         track_status
//! GET    /{id}/download       download_track
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::tracks;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(tracks::list_tracks))
        .route("/{id}", get(tracks::get_track).delete(tracks::delete_track))
        .route("/{id}/status", get(tracks::track_status))
        .route("/{id}/download", get(tracks::download_track))
}

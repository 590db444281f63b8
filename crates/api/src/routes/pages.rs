use axum::routing::get;
use axum::Router;

use crate::handlers::pages;
use crate::state::AppState;

/// Browser pages, mounted at the root.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/generate", get(pages::generate_page))
        .route("/library", get(pages::library_page))
}

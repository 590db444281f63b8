use std::sync::Arc;

use acemusic_pipeline::GenerationService;

use crate::config::ServerConfig;
use crate::templates::Templates;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: acemusic_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Submission and background polling; also owns the ACE-Step client.
    pub generation: GenerationService,
    /// Compiled HTML templates.
    pub templates: Arc<Templates>,
}

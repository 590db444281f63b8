//! Full-page HTML views.

use acemusic_core::generation::{AudioFormat, DEFAULT_GUIDANCE_SCALE, DEFAULT_INFERENCE_STEPS};
use acemusic_core::status::TrackStatus;
use acemusic_db::repositories::TrackRepo;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse};
use serde::Deserialize;

use crate::error::AppResult;
use crate::handlers::tracks::TrackView;
use crate::query::TrackListParams;
use crate::state::AppState;
use crate::templates::{GENERATE_PAGE, LIBRARY_PAGE};

/// GET / redirects to the generate page.
pub async fn home() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/generate")])
}

/// Optional pre-fill for the generate form, used by "re-generate".
#[derive(Debug, Default, Deserialize)]
pub struct GeneratePageParams {
    pub prompt: Option<String>,
    pub audio_duration: Option<String>,
    pub audio_format: Option<String>,
}

/// GET /generate
pub async fn generate_page(
    State(state): State<AppState>,
    Query(params): Query<GeneratePageParams>,
) -> AppResult<Html<String>> {
    let config = &state.config;

    // Non-positive or unparseable durations fall back to the default.
    let duration = params
        .audio_duration
        .as_deref()
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(config.default_duration);
    let format = params
        .audio_format
        .as_deref()
        .and_then(|raw| raw.parse::<AudioFormat>().ok())
        .unwrap_or(config.default_format);
    let formats: Vec<&str> = AudioFormat::ALL.iter().map(|f| f.as_str()).collect();

    state.templates.render(
        GENERATE_PAGE,
        minijinja::context! {
            prefill_prompt => params.prompt.unwrap_or_default(),
            prefill_duration => duration,
            prefill_format => format.as_str(),
            formats,
            model => &config.default_model,
            defaults => minijinja::context! {
                inference_steps => DEFAULT_INFERENCE_STEPS,
                guidance_scale => DEFAULT_GUIDANCE_SCALE,
            },
        },
    )
}

/// GET /library
pub async fn library_page(
    State(state): State<AppState>,
    Query(params): Query<TrackListParams>,
) -> AppResult<Html<String>> {
    let filter = params.to_filter()?;
    let tracks = TrackRepo::list(&state.pool, &filter).await?;
    let views: Vec<TrackView<'_>> = tracks.iter().map(TrackView::from).collect();
    let statuses: Vec<&str> = TrackStatus::ALL.iter().map(|s| s.as_str()).collect();

    state.templates.render(
        LIBRARY_PAGE,
        minijinja::context! {
            tracks => views,
            search => filter.search.unwrap_or_default(),
            status => filter.status.map(|s| s.as_str()).unwrap_or_default(),
            statuses,
        },
    )
}

//! Handlers for reading, streaming, and deleting tracks.

use std::path::Path as FsPath;

use acemusic_core::error::CoreError;
use acemusic_core::naming::download_file_name;
use acemusic_core::status::TrackStatus;
use acemusic_core::types::DbId;
use acemusic_db::models::track::Track;
use acemusic_db::repositories::TrackRepo;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::query::TrackListParams;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::templates::{PROGRESS_FRAGMENT, RESULT_FRAGMENT};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load a track or fail with 404.
async fn ensure_track_exists(pool: &acemusic_db::DbPool, id: DbId) -> AppResult<Track> {
    TrackRepo::find_by_id(pool, id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Track", id }))
}

/// URL of a completed track's file under the `/audio` mount.
pub fn audio_url(track: &Track) -> Option<String> {
    if track.status != TrackStatus::Completed {
        return None;
    }
    let name = FsPath::new(track.file_path.as_deref()?).file_name()?;
    Some(format!("/audio/{}", name.to_string_lossy()))
}

/// A track plus the links the HTML views need.
#[derive(Serialize)]
pub struct TrackView<'a> {
    #[serde(flatten)]
    pub track: &'a Track,
    pub audio_url: Option<String>,
}

impl<'a> From<&'a Track> for TrackView<'a> {
    fn from(track: &'a Track) -> Self {
        Self {
            track,
            audio_url: audio_url(track),
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/tracks
// ---------------------------------------------------------------------------

/// List tracks, newest first, optionally filtered.
pub async fn list_tracks(
    State(state): State<AppState>,
    Query(params): Query<TrackListParams>,
) -> AppResult<Json<DataResponse<Vec<Track>>>> {
    let filter = params.to_filter()?;
    let tracks = TrackRepo::list(&state.pool, &filter).await?;
    Ok(Json(DataResponse { data: tracks }))
}

// ---------------------------------------------------------------------------
// GET /api/tracks/{id}
// ---------------------------------------------------------------------------

pub async fn get_track(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Track>>> {
    let track = ensure_track_exists(&state.pool, id).await?;
    Ok(Json(DataResponse { data: track }))
}

// ---------------------------------------------------------------------------
// GET /api/tracks/{id}/status
// ---------------------------------------------------------------------------

/// Progress, result, or error fragment for the htmx poller.
pub async fn track_status(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Html<String>> {
    let track = ensure_track_exists(&state.pool, id).await?;

    match track.status {
        TrackStatus::Queued | TrackStatus::Generating => state
            .templates
            .render(PROGRESS_FRAGMENT, minijinja::context! { track }),
        TrackStatus::Completed => {
            let audio_url = audio_url(&track);
            state
                .templates
                .render(RESULT_FRAGMENT, minijinja::context! { track, audio_url })
        }
        TrackStatus::Failed => {
            let message = track
                .error_message
                .as_deref()
                .unwrap_or("Generation failed.");
            state.templates.error_fragment(message)
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/tracks/{id}/download
// ---------------------------------------------------------------------------

/// Stream the audio file as an attachment named after the prompt.
pub async fn download_track(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Response> {
    let track = ensure_track_exists(&state.pool, id).await?;
    let Some(file_path) = track.file_path.as_deref() else {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "AudioFile",
            id,
        }));
    };

    let file = match tokio::fs::File::open(file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(track_id = id, path = file_path, "Audio file missing on disk");
            return Err(AppError::Core(CoreError::NotFound {
                entity: "AudioFile",
                id,
            }));
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    let filename = download_file_name(&track.prompt, track.audio_format);
    let stream = ReaderStream::new(file);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, track.audio_format.mime_type().to_string()),
            (header::CONTENT_LENGTH, file_size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// DELETE /api/tracks/{id}
// ---------------------------------------------------------------------------

/// Delete the record and its audio file. Answers with an empty body so the
/// htmx caller can swap the row out.
pub async fn delete_track(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Html<&'static str>> {
    state
        .generation
        .delete_track(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Track", id }))?;
    Ok(Html(""))
}

//! Track entity model and DTOs.

use acemusic_core::generation::{AudioFormat, GenerationRequest};
use acemusic_core::status::TrackStatus;
use acemusic_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `tracks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Track {
    pub id: DbId,
    pub task_id: String,
    pub prompt: String,
    pub lyrics: Option<String>,
    pub audio_duration: f64,
    pub bpm: Option<i32>,
    pub key_scale: Option<String>,
    pub time_signature: Option<String>,
    pub seed: i64,
    pub batch_size: i32,
    #[sqlx(try_from = "String")]
    pub audio_format: AudioFormat,
    pub task_type: String,
    pub vocal_language: String,
    pub inference_steps: i32,
    pub guidance_scale: f64,
    pub thinking: bool,
    /// The request exactly as it was submitted.
    pub generation_params: Json<serde_json::Value>,
    #[sqlx(try_from = "String")]
    pub status: TrackStatus,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    /// Seconds from the start of polling to the finished download.
    pub generation_time: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for inserting a freshly submitted track.
#[derive(Debug, Clone)]
pub struct CreateTrack {
    pub task_id: String,
    pub prompt: String,
    pub lyrics: Option<String>,
    pub audio_duration: f64,
    pub bpm: Option<i32>,
    pub key_scale: Option<String>,
    pub time_signature: Option<String>,
    pub seed: i64,
    pub batch_size: i32,
    pub audio_format: AudioFormat,
    pub task_type: String,
    pub vocal_language: String,
    pub inference_steps: i32,
    pub guidance_scale: f64,
    pub thinking: bool,
    pub generation_params: serde_json::Value,
}

impl CreateTrack {
    /// Denormalize `request` for the row accepted under `task_id`.
    ///
    /// Empty optional strings are stored as NULL.
    pub fn from_request(task_id: impl Into<String>, request: &GenerationRequest) -> Self {
        Self {
            task_id: task_id.into(),
            prompt: request.prompt.clone(),
            lyrics: non_empty(&request.lyrics),
            audio_duration: request.audio_duration,
            bpm: request.bpm,
            key_scale: non_empty(&request.key_scale),
            time_signature: non_empty(&request.time_signature),
            seed: request.seed,
            batch_size: request.batch_size,
            audio_format: request.audio_format,
            task_type: request.task_type.clone(),
            vocal_language: request.vocal_language.clone(),
            inference_steps: request.inference_steps,
            guidance_scale: request.guidance_scale,
            thinking: request.thinking,
            generation_params: serde_json::to_value(request).unwrap_or_default(),
        }
    }
}

/// DTO for patching a track. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateTrack {
    pub status: Option<TrackStatus>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub generation_time: Option<f64>,
    pub error_message: Option<String>,
}

/// Filter for [`TrackRepo::list`](crate::repositories::TrackRepo::list).
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    /// Case-insensitive substring of the prompt or lyrics.
    pub search: Option<String>,
    pub status: Option<TrackStatus>,
    /// Defaults to 200, clamped to 1..=1000.
    pub limit: Option<i64>,
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

//! Repository for the `tracks` table.
//!
//! Status writes go through [`TrackRepo::update`], which enforces the
//! forward-only lifecycle and keeps `file_path`/`file_size` and
//! `error_message` consistent with the status.

use acemusic_core::status::TrackStatus;
use acemusic_core::types::DbId;
use chrono::Utc;
use sqlx::types::Json;

use crate::error::RepoError;
use crate::models::track::{CreateTrack, Track, TrackFilter, UpdateTrack};
use crate::DbPool;

/// Column list for `tracks` queries.
const COLUMNS: &str = "\
    id, task_id, prompt, lyrics, audio_duration, bpm, key_scale, time_signature, \
    seed, batch_size, audio_format, task_type, vocal_language, inference_steps, \
    guidance_scale, thinking, generation_params, status, file_path, file_size, \
    generation_time, error_message, created_at, updated_at";

/// Default page size for listing.
const DEFAULT_LIMIT: i64 = 200;

/// Maximum page size for listing.
const MAX_LIMIT: i64 = 1000;

/// Provides CRUD operations for tracks.
pub struct TrackRepo;

impl TrackRepo {
    /// Insert a new track with status `queued`.
    pub async fn create(pool: &DbPool, input: &CreateTrack) -> Result<Track, RepoError> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO tracks \
                (task_id, prompt, lyrics, audio_duration, bpm, key_scale, time_signature, \
                 seed, batch_size, audio_format, task_type, vocal_language, inference_steps, \
                 guidance_scale, thinking, generation_params, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18) \
             RETURNING {COLUMNS}"
        );
        let track = sqlx::query_as::<_, Track>(&query)
            .bind(&input.task_id)
            .bind(&input.prompt)
            .bind(&input.lyrics)
            .bind(input.audio_duration)
            .bind(input.bpm)
            .bind(&input.key_scale)
            .bind(&input.time_signature)
            .bind(input.seed)
            .bind(input.batch_size)
            .bind(input.audio_format.as_str())
            .bind(&input.task_type)
            .bind(&input.vocal_language)
            .bind(input.inference_steps)
            .bind(input.guidance_scale)
            .bind(input.thinking)
            .bind(Json(&input.generation_params))
            .bind(TrackStatus::Queued.as_str())
            .bind(now)
            .fetch_one(pool)
            .await?;
        Ok(track)
    }

    /// Find a track by its primary key.
    pub async fn find_by_id(pool: &DbPool, id: DbId) -> Result<Option<Track>, RepoError> {
        let query = format!("SELECT {COLUMNS} FROM tracks WHERE id = ?1");
        let track = sqlx::query_as::<_, Track>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(track)
    }

    /// Find a track by the remote service's task id.
    pub async fn find_by_task_id(
        pool: &DbPool,
        task_id: &str,
    ) -> Result<Option<Track>, RepoError> {
        let query = format!("SELECT {COLUMNS} FROM tracks WHERE task_id = ?1");
        let track = sqlx::query_as::<_, Track>(&query)
            .bind(task_id)
            .fetch_optional(pool)
            .await?;
        Ok(track)
    }

    /// List tracks, newest first.
    ///
    /// `search` matches prompt or lyrics case-insensitively; LIKE wildcards
    /// in it are matched literally.
    pub async fn list(pool: &DbPool, filter: &TrackFilter) -> Result<Vec<Track>, RepoError> {
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let query = format!(
            "SELECT {COLUMNS} FROM tracks \
             WHERE (?1 IS NULL OR prompt LIKE ?1 ESCAPE '\\' OR lyrics LIKE ?1 ESCAPE '\\') \
               AND (?2 IS NULL OR status = ?2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT ?3"
        );
        let tracks = sqlx::query_as::<_, Track>(&query)
            .bind(pattern)
            .bind(filter.status.map(TrackStatus::as_str))
            .bind(limit)
            .fetch_all(pool)
            .await?;
        Ok(tracks)
    }

    /// Tracks still `queued` or `generating`, oldest first.
    pub async fn list_unfinished(pool: &DbPool) -> Result<Vec<Track>, RepoError> {
        let query = format!(
            "SELECT {COLUMNS} FROM tracks \
             WHERE status IN (?1, ?2) \
             ORDER BY created_at ASC, id ASC"
        );
        let tracks = sqlx::query_as::<_, Track>(&query)
            .bind(TrackStatus::Queued.as_str())
            .bind(TrackStatus::Generating.as_str())
            .fetch_all(pool)
            .await?;
        Ok(tracks)
    }

    /// Patch a track. Returns `None` if the row does not exist.
    ///
    /// The current row is re-read inside the transaction and the merged
    /// result must respect the status lifecycle: forward-only transitions,
    /// `file_path`/`file_size` present iff completed, `error_message`
    /// present iff failed. `updated_at` is always refreshed.
    pub async fn update(
        pool: &DbPool,
        id: DbId,
        input: &UpdateTrack,
    ) -> Result<Option<Track>, RepoError> {
        let mut tx = pool.begin().await?;

        // Write first so the transaction holds the write lock before reading.
        let touched = sqlx::query("UPDATE tracks SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Ok(None);
        }

        let query = format!("SELECT {COLUMNS} FROM tracks WHERE id = ?1");
        let current = sqlx::query_as::<_, Track>(&query)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        let merged = merge_update(&current, input).inspect_err(|e| {
            tracing::warn!(track_id = id, error = %e, "Rejected track update");
        })?;

        let query = format!(
            "UPDATE tracks SET \
                status = ?2, file_path = ?3, file_size = ?4, \
                generation_time = ?5, error_message = ?6, updated_at = ?7 \
             WHERE id = ?1 \
             RETURNING {COLUMNS}"
        );
        let track = sqlx::query_as::<_, Track>(&query)
            .bind(id)
            .bind(merged.status.as_str())
            .bind(&merged.file_path)
            .bind(merged.file_size)
            .bind(merged.generation_time)
            .bind(&merged.error_message)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(track))
    }

    /// Move a track to `generating`.
    pub async fn mark_generating(pool: &DbPool, id: DbId) -> Result<Option<Track>, RepoError> {
        let input = UpdateTrack {
            status: Some(TrackStatus::Generating),
            ..Default::default()
        };
        Self::update(pool, id, &input).await
    }

    /// Record a finished download.
    pub async fn mark_completed(
        pool: &DbPool,
        id: DbId,
        file_path: &str,
        file_size: i64,
        generation_time: f64,
    ) -> Result<Option<Track>, RepoError> {
        let input = UpdateTrack {
            status: Some(TrackStatus::Completed),
            file_path: Some(file_path.to_string()),
            file_size: Some(file_size),
            generation_time: Some(generation_time),
            ..Default::default()
        };
        Self::update(pool, id, &input).await
    }

    /// Record a failure with its message.
    pub async fn mark_failed(
        pool: &DbPool,
        id: DbId,
        message: &str,
    ) -> Result<Option<Track>, RepoError> {
        let input = UpdateTrack {
            status: Some(TrackStatus::Failed),
            error_message: Some(message.to_string()),
            ..Default::default()
        };
        Self::update(pool, id, &input).await
    }

    /// Delete a track. Returns the deleted row, or `None` if it did not exist.
    pub async fn delete(pool: &DbPool, id: DbId) -> Result<Option<Track>, RepoError> {
        let mut tx = pool.begin().await?;
        let query = format!("DELETE FROM tracks WHERE id = ?1 RETURNING {COLUMNS}");
        let track = sqlx::query_as::<_, Track>(&query)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(track)
    }
}

/// Mutable columns after applying an update.
#[derive(Debug, PartialEq)]
struct MergedTrack {
    status: TrackStatus,
    file_path: Option<String>,
    file_size: Option<i64>,
    generation_time: Option<f64>,
    error_message: Option<String>,
}

fn merge_update(current: &Track, input: &UpdateTrack) -> Result<MergedTrack, RepoError> {
    let status = input.status.unwrap_or(current.status);
    if !current.status.can_transition_to(status) {
        return Err(RepoError::InvalidTransition {
            from: current.status,
            to: status,
        });
    }

    let merged = MergedTrack {
        status,
        file_path: input.file_path.clone().or_else(|| current.file_path.clone()),
        file_size: input.file_size.or(current.file_size),
        generation_time: input.generation_time.or(current.generation_time),
        error_message: input
            .error_message
            .clone()
            .or_else(|| current.error_message.clone()),
    };

    let completed = status == TrackStatus::Completed;
    let has_file = merged.file_path.is_some() && merged.file_size.is_some();
    let has_any_file = merged.file_path.is_some() || merged.file_size.is_some();
    if completed && !has_file {
        return Err(RepoError::Invariant(
            "completed track requires file_path and file_size".into(),
        ));
    }
    if !completed && has_any_file {
        return Err(RepoError::Invariant(format!(
            "file_path/file_size may only be set on completed tracks (status {status})"
        )));
    }

    let failed = status == TrackStatus::Failed;
    if failed != merged.error_message.is_some() {
        return Err(RepoError::Invariant(format!(
            "error_message must be set iff the track failed (status {status})"
        )));
    }

    Ok(merged)
}

/// Escape LIKE metacharacters for use with `ESCAPE '\'`.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

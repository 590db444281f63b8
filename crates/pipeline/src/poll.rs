//! The detached poll loop that takes a queued track to a terminal status.

use std::path::Path;

use acemusic_acestep::AceStepError;
use acemusic_core::naming::{audio_file_name, round_to_tenths};
use acemusic_core::types::DbId;
use acemusic_db::models::track::Track;
use acemusic_db::repositories::TrackRepo;
use acemusic_db::RepoError;
use tokio::time::Instant;

use crate::service::GenerationService;

impl GenerationService {
    /// Wait for `task_id` to finish and record the outcome on `track_id`.
    ///
    /// Never returns an error: failures are written to the row as
    /// `failed` and logged. A track deleted at any point turns the remaining
    /// writes into no-ops.
    pub async fn poll_and_update(&self, track_id: DbId, task_id: &str) {
        if let Err(e) = self.drive(track_id, task_id).await {
            tracing::error!(track_id, task_id, error = %e, "Poll loop aborted");
        }
    }

    async fn drive(&self, track_id: DbId, task_id: &str) -> Result<(), RepoError> {
        let Some(track) = TrackRepo::find_by_id(&self.pool, track_id).await? else {
            tracing::debug!(track_id, task_id, "Track gone before polling started");
            return Ok(());
        };
        if track.status.is_terminal() {
            tracing::debug!(track_id, task_id, status = %track.status, "Track already finished");
            return Ok(());
        }

        if TrackRepo::mark_generating(&self.pool, track_id).await?.is_none() {
            tracing::debug!(track_id, task_id, "Track gone before generation started");
            return Ok(());
        }
        tracing::info!(track_id, task_id, "Track generating");
        let started = Instant::now();

        let outcome = self
            .client
            .wait_for_completion(
                task_id,
                self.settings.poll_interval,
                self.settings.poll_timeout,
            )
            .await;

        match outcome {
            Ok(result) => self.store_result(&track, task_id, &result.result, started).await,
            Err(AceStepError::TaskTimeout { .. }) => {
                let message = format!(
                    "Timeout after {}s",
                    self.settings.poll_timeout.as_secs_f64()
                );
                tracing::warn!(track_id, task_id, "Generation timed out");
                self.record_failure(track_id, &message).await
            }
            Err(e) => {
                tracing::error!(track_id, task_id, error = %e, "Generation failed");
                self.record_failure(track_id, &e.to_string()).await
            }
        }
    }

    /// Download the finished audio and mark the track completed.
    async fn store_result(
        &self,
        track: &Track,
        task_id: &str,
        result_path: &str,
        started: Instant,
    ) -> Result<(), RepoError> {
        let destination = self
            .settings
            .output_dir
            .join(audio_file_name(task_id, track.audio_format));

        let path = match self.client.download_audio(result_path, &destination).await {
            Ok(path) => path,
            Err(e) => {
                tracing::error!(track_id = track.id, task_id, error = %e, "Download failed");
                return self.record_failure(track.id, &e.to_string()).await;
            }
        };

        let file_size = match tokio::fs::metadata(&path).await {
            Ok(meta) => i64::try_from(meta.len()).unwrap_or(i64::MAX),
            Err(e) => {
                tracing::error!(track_id = track.id, task_id, error = %e, "Downloaded file unreadable");
                return self
                    .record_failure(track.id, &format!("Audio download failed: {e}"))
                    .await;
            }
        };
        let generation_time = round_to_tenths(started.elapsed().as_secs_f64());
        let file_path = path.to_string_lossy();

        let completed =
            TrackRepo::mark_completed(&self.pool, track.id, &file_path, file_size, generation_time)
                .await;
        match completed {
            Err(e) => {
                tracing::error!(track_id = track.id, task_id, error = %e, "Failed to record completion");
                remove_orphan(&path).await;
                return self.record_failure(track.id, &e.to_string()).await;
            }
            Ok(Some(_)) => {
                tracing::info!(
                    track_id = track.id,
                    task_id,
                    path = %file_path,
                    file_size,
                    generation_time,
                    "Track completed",
                );
            }
            Ok(None) => {
                tracing::debug!(track_id = track.id, task_id, "Track deleted during generation");
                remove_orphan(&path).await;
            }
        }
        Ok(())
    }

    async fn record_failure(&self, track_id: DbId, message: &str) -> Result<(), RepoError> {
        if TrackRepo::mark_failed(&self.pool, track_id, message)
            .await?
            .is_none()
        {
            tracing::debug!(track_id, "Track deleted before failure could be recorded");
        }
        Ok(())
    }
}

async fn remove_orphan(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove orphaned audio file");
        }
    }
}

//! [`GenerationService`]: the bridge between HTTP handlers, the ACE-Step
//! client, and the track store.
//!
//! Submission is synchronous and fails without leaving a record. Everything
//! after the record exists runs in a detached poll loop whose outcome is
//! written to the row.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use acemusic_acestep::AceStepApi;
use acemusic_core::generation::{validate_generation_request, GenerationRequest};
use acemusic_core::types::DbId;
use acemusic_db::models::track::{CreateTrack, Track};
use acemusic_db::repositories::TrackRepo;
use acemusic_db::DbPool;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::PipelineError;

/// How long [`GenerationService::shutdown`] waits for poll loops to unwind.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Where results go and how the remote task is polled.
#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Directory downloaded audio is written to.
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    /// Wall-clock budget for one task, measured from the first poll.
    pub poll_timeout: Duration,
}

/// Submits generations and drives each one to a terminal status.
///
/// Cheap to clone; clones share the pool, client, and the set of running
/// poll loops.
#[derive(Clone)]
pub struct GenerationService {
    pub(crate) pool: DbPool,
    pub(crate) client: Arc<AceStepApi>,
    pub(crate) settings: Arc<PollSettings>,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

impl GenerationService {
    pub fn new(pool: DbPool, client: Arc<AceStepApi>, settings: PollSettings) -> Self {
        Self {
            pool,
            client,
            settings: Arc::new(settings),
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn client(&self) -> &Arc<AceStepApi> {
        &self.client
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Number of poll loops currently running.
    pub fn active_polls(&self) -> usize {
        self.tracker.len()
    }

    /// Validate and submit `request`, record it as `queued`, and start
    /// polling in the background.
    ///
    /// Returns the new track as soon as it is stored. No record is created
    /// when validation or submission fails.
    pub async fn submit_generation(
        &self,
        request: GenerationRequest,
    ) -> Result<Track, PipelineError> {
        validate_generation_request(&request)?;

        let task_id = self.client.submit(&request).await?;
        let track = TrackRepo::create(&self.pool, &CreateTrack::from_request(&task_id, &request))
            .await?;

        tracing::info!(
            track_id = track.id,
            task_id = %task_id,
            duration = request.audio_duration,
            format = %request.audio_format,
            "Generation queued",
        );

        self.spawn_poll(track.id, task_id);
        Ok(track)
    }

    /// Re-attach a poll loop to every track a previous process left
    /// `queued` or `generating`. Returns how many were resumed.
    pub async fn resume_unfinished(&self) -> Result<usize, PipelineError> {
        let tracks = TrackRepo::list_unfinished(&self.pool).await?;
        let count = tracks.len();
        for track in tracks {
            tracing::info!(
                track_id = track.id,
                task_id = %track.task_id,
                status = %track.status,
                "Resuming poll loop",
            );
            self.spawn_poll(track.id, track.task_id);
        }
        Ok(count)
    }

    /// Delete a track and then its audio file.
    ///
    /// Returns `None` if the track does not exist. A file that is already
    /// gone is not an error.
    pub async fn delete_track(&self, id: DbId) -> Result<Option<Track>, PipelineError> {
        let Some(track) = TrackRepo::delete(&self.pool, id).await? else {
            return Ok(None);
        };

        if let Some(path) = track.file_path.as_deref() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => tracing::debug!(track_id = id, path, "Audio file removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(track_id = id, path, error = %e, "Failed to remove audio file");
                }
            }
        }

        tracing::info!(track_id = id, task_id = %track.task_id, "Track deleted");
        Ok(Some(track))
    }

    /// Stop every poll loop, wait briefly for them to unwind, and close the
    /// client. Interrupted tracks keep their status and are resumed on the
    /// next start.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();

        if tokio::time::timeout(SHUTDOWN_GRACE, self.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.len(),
                "Poll loops still running after shutdown grace period",
            );
        }

        self.client.close().await;
        tracing::info!("Generation service stopped");
    }

    /// Run [`poll_and_update`](Self::poll_and_update) on the tracker behind
    /// a panic boundary, until it finishes or shutdown is requested.
    fn spawn_poll(&self, track_id: DbId, task_id: String) {
        let service = self.clone();
        let cancel = self.cancel.clone();

        self.tracker.spawn(async move {
            let work = AssertUnwindSafe(service.poll_and_update(track_id, &task_id)).catch_unwind();
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(track_id, task_id = %task_id, "Poll loop interrupted by shutdown");
                }
                outcome = work => {
                    if let Err(panic) = outcome {
                        tracing::error!(
                            track_id,
                            task_id = %task_id,
                            panic = panic_message(panic.as_ref()),
                            "Poll loop panicked",
                        );
                    }
                }
            }
        });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

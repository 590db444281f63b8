//! Shared helpers for lifecycle tests.

use std::sync::Arc;
use std::time::Duration;

use acemusic_acestep::{AceStepApi, AceStepConfig};
use acemusic_core::types::DbId;
use acemusic_db::models::track::Track;
use acemusic_db::repositories::TrackRepo;
use acemusic_pipeline::{GenerationService, PollSettings};
use acemusic_testkit::FakeAceStep;
use tempfile::TempDir;

/// A service wired to a fake ACE-Step, a temp database, and a temp output
/// directory. Keep it alive for the duration of the test.
pub struct Harness {
    pub service: GenerationService,
    pub fake: FakeAceStep,
    pub output_dir: TempDir,
    _db_dir: TempDir,
}

pub async fn harness(fake: FakeAceStep, poll_interval: Duration, poll_timeout: Duration) -> Harness {
    let db_dir = tempfile::tempdir().expect("db temp dir");
    let url = format!("sqlite://{}", db_dir.path().join("test.db").display());
    let pool = acemusic_db::create_pool(&url).await.expect("create pool");
    acemusic_db::run_migrations(&pool).await.expect("migrations");

    let client = AceStepApi::new(&AceStepConfig::new(fake.base_url.clone())).expect("client");
    let output_dir = tempfile::tempdir().expect("output temp dir");
    let settings = PollSettings {
        output_dir: output_dir.path().to_path_buf(),
        poll_interval,
        poll_timeout,
    };

    Harness {
        service: GenerationService::new(pool, Arc::new(client), settings),
        fake,
        output_dir,
        _db_dir: db_dir,
    }
}

/// Wait until every background poll loop has finished.
pub async fn wait_idle(service: &GenerationService) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while service.active_polls() > 0 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for poll loops to finish"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until the track satisfies `done`, returning it.
pub async fn wait_for_track(
    service: &GenerationService,
    id: DbId,
    done: impl Fn(&Track) -> bool,
) -> Track {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(track) = TrackRepo::find_by_id(service.pool(), id).await.unwrap() {
            if done(&track) {
                return track;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for track {id}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

//! Integration tests for `TrackRepo` against a real SQLite database.

mod common;

use acemusic_core::generation::{AudioFormat, GenerationRequest};
use acemusic_core::status::TrackStatus;
use acemusic_db::models::track::{CreateTrack, TrackFilter, UpdateTrack};
use acemusic_db::repositories::TrackRepo;
use acemusic_db::{DbPool, RepoError};
use assert_matches::assert_matches;
use common::test_db;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn insert(pool: &DbPool, task_id: &str, prompt: &str) -> acemusic_db::models::track::Track {
    TrackRepo::create(
        pool,
        &CreateTrack::from_request(task_id, &GenerationRequest::new(prompt)),
    )
    .await
    .expect("create track")
}

// ---------------------------------------------------------------------------
// Create / find
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_stores_request_fields_as_queued() {
    let db = test_db().await;
    let request = GenerationRequest {
        lyrics: "[chorus]\nla la".into(),
        audio_duration: 42.5,
        bpm: Some(120),
        key_scale: "A minor".into(),
        seed: 1234,
        audio_format: AudioFormat::Wav,
        thinking: true,
        ..GenerationRequest::new("dark synthwave")
    };

    let created = TrackRepo::create(&db.pool, &CreateTrack::from_request("t-42", &request))
        .await
        .unwrap();
    let found = TrackRepo::find_by_task_id(&db.pool, "t-42")
        .await
        .unwrap()
        .expect("track by task id");

    assert_eq!(found.id, created.id);
    assert_eq!(found.status, TrackStatus::Queued);
    assert_eq!(found.prompt, "dark synthwave");
    assert_eq!(found.lyrics.as_deref(), Some("[chorus]\nla la"));
    assert_eq!(found.audio_duration, 42.5);
    assert_eq!(found.bpm, Some(120));
    assert_eq!(found.key_scale.as_deref(), Some("A minor"));
    assert_eq!(found.time_signature, None);
    assert_eq!(found.seed, 1234);
    assert_eq!(found.audio_format, AudioFormat::Wav);
    assert!(found.thinking);
    assert_eq!(found.generation_params.0["bpm"], 120);
    assert_eq!(found.file_path, None);
    assert_eq!(found.error_message, None);
    assert_eq!(found.created_at, found.updated_at);
}

#[tokio::test]
async fn duplicate_task_id_is_rejected() {
    let db = test_db().await;
    insert(&db.pool, "dup", "one").await;

    let err = TrackRepo::create(
        &db.pool,
        &CreateTrack::from_request("dup", &GenerationRequest::new("two")),
    )
    .await
    .unwrap_err();
    assert_matches!(err, RepoError::Database(sqlx::Error::Database(_)));
}

#[tokio::test]
async fn find_missing_returns_none() {
    let db = test_db().await;
    assert!(TrackRepo::find_by_id(&db.pool, 999).await.unwrap().is_none());
    assert!(TrackRepo::find_by_task_id(&db.pool, "nope")
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_matches_prompt_newest_first() {
    let db = test_db().await;
    let first = insert(&db.pool, "a", "jazz piano").await;
    insert(&db.pool, "b", "rock guitar").await;
    let third = insert(&db.pool, "c", "Jazz vocal").await;

    let filter = TrackFilter {
        search: Some("jazz".into()),
        ..Default::default()
    };
    let found = TrackRepo::list(&db.pool, &filter).await.unwrap();

    let ids: Vec<_> = found.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![third.id, first.id]);
}

#[tokio::test]
async fn search_matches_lyrics_and_treats_wildcards_literally() {
    let db = test_db().await;
    let request = GenerationRequest {
        lyrics: "we sing of 100% joy".into(),
        ..GenerationRequest::new("anthem")
    };
    let anthem = TrackRepo::create(&db.pool, &CreateTrack::from_request("a", &request))
        .await
        .unwrap();
    insert(&db.pool, "b", "1000 miles").await;

    let by_lyrics = TrackFilter {
        search: Some("SING".into()),
        ..Default::default()
    };
    let found = TrackRepo::list(&db.pool, &by_lyrics).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, anthem.id);

    let percent = TrackFilter {
        search: Some("100%".into()),
        ..Default::default()
    };
    let found = TrackRepo::list(&db.pool, &percent).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, anthem.id);
}

#[tokio::test]
async fn list_filters_by_status_and_clamps_limit() {
    let db = test_db().await;
    let a = insert(&db.pool, "a", "one").await;
    insert(&db.pool, "b", "two").await;
    insert(&db.pool, "c", "three").await;
    TrackRepo::mark_failed(&db.pool, a.id, "boom").await.unwrap();

    let failed = TrackRepo::list(
        &db.pool,
        &TrackFilter {
            status: Some(TrackStatus::Failed),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, a.id);

    let one = TrackRepo::list(
        &db.pool,
        &TrackFilter {
            limit: Some(0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(one.len(), 1);

    let all = TrackRepo::list(&db.pool, &TrackFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn list_unfinished_returns_queued_and_generating_oldest_first() {
    let db = test_db().await;
    let a = insert(&db.pool, "a", "one").await;
    let b = insert(&db.pool, "b", "two").await;
    let c = insert(&db.pool, "c", "three").await;
    TrackRepo::mark_generating(&db.pool, b.id).await.unwrap();
    TrackRepo::mark_failed(&db.pool, c.id, "boom").await.unwrap();

    let ids: Vec<_> = TrackRepo::list_unfinished(&db.pool)
        .await
        .unwrap()
        .iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(ids, vec![a.id, b.id]);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_lifecycle_to_completed() {
    let db = test_db().await;
    let track = insert(&db.pool, "t1", "lofi").await;

    let generating = TrackRepo::mark_generating(&db.pool, track.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(generating.status, TrackStatus::Generating);
    assert!(generating.updated_at >= track.updated_at);

    let done = TrackRepo::mark_completed(&db.pool, track.id, "outputs/t1.mp3", 2048, 12.3)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status, TrackStatus::Completed);
    assert_eq!(done.file_path.as_deref(), Some("outputs/t1.mp3"));
    assert_eq!(done.file_size, Some(2048));
    assert_eq!(done.generation_time, Some(12.3));
    assert_eq!(done.error_message, None);
}

#[tokio::test]
async fn terminal_status_never_reverts() {
    let db = test_db().await;
    let track = insert(&db.pool, "t1", "lofi").await;
    TrackRepo::mark_failed(&db.pool, track.id, "Task t1 failed: OOM")
        .await
        .unwrap();

    let err = TrackRepo::mark_generating(&db.pool, track.id)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        RepoError::InvalidTransition {
            from: TrackStatus::Failed,
            to: TrackStatus::Generating
        }
    );

    let err = TrackRepo::mark_completed(&db.pool, track.id, "x.mp3", 1, 1.0)
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::InvalidTransition { .. });

    let reloaded = TrackRepo::find_by_id(&db.pool, track.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, TrackStatus::Failed);
    assert_eq!(reloaded.error_message.as_deref(), Some("Task t1 failed: OOM"));
}

#[tokio::test]
async fn invariant_violation_leaves_row_untouched() {
    let db = test_db().await;
    let track = insert(&db.pool, "t1", "lofi").await;

    let input = UpdateTrack {
        status: Some(TrackStatus::Completed),
        ..Default::default()
    };
    let err = TrackRepo::update(&db.pool, track.id, &input)
        .await
        .unwrap_err();
    assert_matches!(err, RepoError::Invariant(_));

    let reloaded = TrackRepo::find_by_id(&db.pool, track.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reloaded.status, TrackStatus::Queued);
    assert_eq!(reloaded.updated_at, track.updated_at);
}

#[tokio::test]
async fn update_of_missing_row_returns_none() {
    let db = test_db().await;
    let result = TrackRepo::mark_generating(&db.pool, 404).await.unwrap();
    assert!(result.is_none());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_returns_row_then_none() {
    let db = test_db().await;
    let track = insert(&db.pool, "t1", "lofi").await;

    let deleted = TrackRepo::delete(&db.pool, track.id).await.unwrap();
    assert_eq!(deleted.map(|t| t.task_id).as_deref(), Some("t1"));

    assert!(TrackRepo::delete(&db.pool, track.id).await.unwrap().is_none());
    assert!(TrackRepo::find_by_id(&db.pool, track.id)
        .await
        .unwrap()
        .is_none());
    assert!(TrackRepo::mark_failed(&db.pool, track.id, "late")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn health_check_succeeds_on_open_pool() {
    let db = test_db().await;
    acemusic_db::health_check(&db.pool).await.unwrap();
}

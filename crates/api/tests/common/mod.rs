//! Shared helpers for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use acemusic_acestep::AceStepApi;
use acemusic_api::config::ServerConfig;
use acemusic_api::router::build_app_router;
use acemusic_api::state::AppState;
use acemusic_api::templates::Templates;
use acemusic_core::generation::GenerationRequest;
use acemusic_core::types::DbId;
use acemusic_db::models::track::{CreateTrack, Track};
use acemusic_db::repositories::TrackRepo;
use acemusic_pipeline::GenerationService;
use acemusic_testkit::FakeAceStep;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

/// The full router wired to a fake ACE-Step, a temp database and a temp
/// output directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub fake: FakeAceStep,
    pub output_dir: TempDir,
    _db_dir: TempDir,
}

/// Build a `ServerConfig` pointing at `fake` with fast polling.
pub fn test_config(fake: &FakeAceStep, db_url: &str, output_dir: &TempDir) -> ServerConfig {
    let output_dir = output_dir.path().display().to_string();
    let db_url = db_url.to_string();
    let acestep_url = fake.base_url.clone();
    ServerConfig::from_lookup(move |var| match var {
        "DATABASE_URL" => Some(db_url.clone()),
        "ACESTEP_API_URL" => Some(acestep_url.clone()),
        "OUTPUT_DIR" => Some(output_dir.clone()),
        "POLL_INTERVAL_SECS" => Some("0.05".into()),
        "POLL_TIMEOUT_SECS" => Some("5".into()),
        "CORS_ORIGINS" => Some("http://localhost:8000".into()),
        _ => None,
    })
    .expect("test config")
}

pub async fn test_app(fake: FakeAceStep) -> TestApp {
    let db_dir = tempfile::tempdir().expect("db temp dir");
    let db_url = format!("sqlite://{}", db_dir.path().join("test.db").display());
    let output_dir = tempfile::tempdir().expect("output temp dir");
    let config = test_config(&fake, &db_url, &output_dir);

    let pool = acemusic_db::create_pool(&config.database_url)
        .await
        .expect("create pool");
    acemusic_db::run_migrations(&pool).await.expect("migrations");

    let client = AceStepApi::new(&config.acestep_config()).expect("client");
    let generation = GenerationService::new(pool.clone(), Arc::new(client), config.poll_settings());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        generation,
        templates: Arc::new(Templates::new().expect("templates")),
    };
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        fake,
        output_dir,
        _db_dir: db_dir,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response {
    app.router.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// POST an `application/x-www-form-urlencoded` body.
pub async fn post_form(app: &TestApp, uri: &str, form: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a queued track directly, bypassing ACE-Step.
pub async fn seed_track(app: &TestApp, task_id: &str, request: &GenerationRequest) -> Track {
    TrackRepo::create(&app.state.pool, &CreateTrack::from_request(task_id, request))
        .await
        .unwrap()
}

/// Insert a completed track whose audio file exists in the output dir.
pub async fn seed_completed(app: &TestApp, task_id: &str, prompt: &str, bytes: &[u8]) -> Track {
    let request = GenerationRequest::new(prompt);
    let track = seed_track(app, task_id, &request).await;
    let path = app
        .output_dir
        .path()
        .join(format!("{task_id}.{}", request.audio_format));
    std::fs::write(&path, bytes).unwrap();

    TrackRepo::mark_generating(&app.state.pool, track.id)
        .await
        .unwrap();
    TrackRepo::mark_completed(
        &app.state.pool,
        track.id,
        &path.display().to_string(),
        bytes.len() as i64,
        1.5,
    )
    .await
    .unwrap()
    .unwrap()
}

/// Poll the store until `done` holds for track `id`.
pub async fn wait_for_track(app: &TestApp, id: DbId, done: impl Fn(&Track) -> bool) -> Track {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(track) = TrackRepo::find_by_id(&app.state.pool, id).await.unwrap() {
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

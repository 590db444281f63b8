//! In-process fake of the ACE-Step REST API for integration tests.
//!
//! [`FakeAceStep`] binds an axum server to `127.0.0.1:0` and answers
//! `/release_task`, `/query_result`, `/v1/audio` and the informational
//! endpoints from a scripted configuration, recording what it receives.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

pub use axum::http::StatusCode as FakeStatus;

/// A bare `/query_result` body with one entry.
pub fn poll_entry(task_id: &str, status: i64, result: &str) -> Value {
    json!([{ "task_id": task_id, "status": status, "result": result }])
}

/// Wrap a `/query_result` list under `key` (`"results"` or `"data"`).
pub fn wrapped(key: &str, entries: Value) -> Value {
    json!({ key: entries })
}

/// Scripted behaviour for a [`FakeAceStep`].
pub struct FakeAceStepBuilder {
    task_id: String,
    submit_status: StatusCode,
    polls: Vec<Value>,
    audio: Vec<u8>,
    audio_status: StatusCode,
}

impl Default for FakeAceStepBuilder {
    fn default() -> Self {
        Self {
            task_id: "t1".to_string(),
            submit_status: StatusCode::OK,
            polls: Vec::new(),
            audio: b"ID3fake-audio-bytes".to_vec(),
            audio_status: StatusCode::OK,
        }
    }
}

impl FakeAceStepBuilder {
    /// Task id returned by `/release_task`.
    pub fn task_id(mut self, task_id: &str) -> Self {
        self.task_id = task_id.to_string();
        self
    }

    /// Non-2xx makes `/release_task` fail with that status.
    pub fn submit_status(mut self, status: StatusCode) -> Self {
        self.submit_status = status;
        self
    }

    /// `/query_result` bodies served in order; the last one repeats forever.
    /// With no script the endpoint answers `[]`.
    pub fn polls(mut self, polls: Vec<Value>) -> Self {
        self.polls = polls;
        self
    }

    pub fn audio(mut self, bytes: &[u8]) -> Self {
        self.audio = bytes.to_vec();
        self
    }

    /// Non-2xx makes `/v1/audio` fail with that status.
    pub fn audio_status(mut self, status: StatusCode) -> Self {
        self.audio_status = status;
        self
    }

    pub async fn start(self) -> FakeAceStep {
        let state = Arc::new(FakeState {
            task_id: self.task_id,
            submit_status: self.submit_status,
            polls: Mutex::new(self.polls.into()),
            audio: self.audio,
            audio_status: self.audio_status,
            submissions: Mutex::new(Vec::new()),
            poll_bodies: Mutex::new(Vec::new()),
            audio_paths: Mutex::new(Vec::new()),
            auth_headers: Mutex::new(Vec::new()),
            poll_count: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/health", get(health))
            .route("/v1/models", get(models))
            .route("/release_task", post(release_task))
            .route("/query_result", post(query_result))
            .route("/v1/audio", get(audio))
            .route("/format_input", post(format_input))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake ACE-Step listener");
        let addr = listener.local_addr().expect("fake ACE-Step local addr");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake ACE-Step server");
        });

        FakeAceStep {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }
}

/// A running fake service. Aborted on drop.
pub struct FakeAceStep {
    pub base_url: String,
    state: Arc<FakeState>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeAceStep {
    pub fn builder() -> FakeAceStepBuilder {
        FakeAceStepBuilder::default()
    }

    /// JSON bodies received by `/release_task`.
    pub fn submissions(&self) -> Vec<Value> {
        self.state.submissions.lock().unwrap().clone()
    }

    /// JSON bodies received by `/query_result`.
    pub fn poll_bodies(&self) -> Vec<Value> {
        self.state.poll_bodies.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.state.poll_count.load(Ordering::SeqCst)
    }

    /// `path` query values received by `/v1/audio`.
    pub fn audio_paths(&self) -> Vec<String> {
        self.state.audio_paths.lock().unwrap().clone()
    }

    /// `Authorization` header of every request, in arrival order.
    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.state.auth_headers.lock().unwrap().clone()
    }
}

impl Drop for FakeAceStep {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct FakeState {
    task_id: String,
    submit_status: StatusCode,
    polls: Mutex<VecDeque<Value>>,
    audio: Vec<u8>,
    audio_status: StatusCode,
    submissions: Mutex<Vec<Value>>,
    poll_bodies: Mutex<Vec<Value>>,
    audio_paths: Mutex<Vec<String>>,
    auth_headers: Mutex<Vec<Option<String>>>,
    poll_count: AtomicUsize,
}

impl FakeState {
    fn note_auth(&self, headers: &HeaderMap) {
        let value = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.auth_headers.lock().unwrap().push(value);
    }

    fn next_poll(&self) -> Value {
        let mut polls = self.polls.lock().unwrap();
        match polls.len() {
            0 => json!([]),
            1 => polls[0].clone(),
            _ => polls.pop_front().unwrap_or_else(|| json!([])),
        }
    }
}

type Shared = State<Arc<FakeState>>;

async fn health(State(state): Shared, headers: HeaderMap) -> Json<Value> {
    state.note_auth(&headers);
    Json(json!({ "status": "ok" }))
}

async fn models(State(state): Shared, headers: HeaderMap) -> Json<Value> {
    state.note_auth(&headers);
    Json(json!({ "models": [{ "name": "acestep-v15-turbo", "is_default": true }] }))
}

async fn release_task(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.note_auth(&headers);
    state.submissions.lock().unwrap().push(body);
    if !state.submit_status.is_success() {
        return (state.submit_status, "submission rejected").into_response();
    }
    Json(json!({ "task_id": state.task_id })).into_response()
}

async fn query_result(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    state.note_auth(&headers);
    state.poll_bodies.lock().unwrap().push(body);
    state.poll_count.fetch_add(1, Ordering::SeqCst);
    Json(state.next_poll())
}

#[derive(Deserialize)]
struct AudioQuery {
    path: String,
}

async fn audio(State(state): Shared, headers: HeaderMap, Query(query): Query<AudioQuery>) -> Response {
    state.note_auth(&headers);
    state.audio_paths.lock().unwrap().push(query.path);
    if !state.audio_status.is_success() {
        return (state.audio_status, "no such file").into_response();
    }
    state.audio.clone().into_response()
}

async fn format_input(State(state): Shared, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    state.note_auth(&headers);
    let prompt = body["prompt"].as_str().unwrap_or_default();
    Json(json!({
        "caption": format!("{prompt}, polished"),
        "lyrics": body["lyrics"].clone(),
    }))
}

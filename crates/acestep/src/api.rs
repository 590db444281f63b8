//! REST client for the ACE-Step HTTP endpoints.
//!
//! One [`AceStepApi`] owns one pooled [`reqwest::Client`] for its whole
//! lifetime. [`AceStepApi::close`] releases it; every later call fails with
//! [`AceStepError::Closed`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use acemusic_core::generation::GenerationRequest;
use acemusic_core::naming::audio_file_name;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::{AceStepError, TransportError};
use crate::wire::{self, ModelInfo, TaskResult, TaskState};

/// Default per-request HTTP timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default temperature for `/format_input`.
pub const DEFAULT_FORMAT_TEMPERATURE: f64 = 0.85;

/// Connection settings for [`AceStepApi`].
#[derive(Debug, Clone)]
pub struct AceStepConfig {
    /// Base HTTP URL, e.g. `http://localhost:8001`.
    pub base_url: String,
    /// Bearer token; `None` or empty sends no `Authorization` header.
    pub api_key: Option<String>,
    /// Timeout applied to each individual HTTP request.
    pub request_timeout: Duration,
}

impl AceStepConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP client for a single ACE-Step service.
pub struct AceStepApi {
    session: RwLock<Option<reqwest::Client>>,
    api_url: String,
}

impl AceStepApi {
    /// Build a client and its connection pool.
    pub fn new(config: &AceStepConfig) -> Result<Self, AceStepError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| AceStepError::InvalidConfig(format!("API key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AceStepError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            session: RwLock::new(Some(client)),
            api_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Release the HTTP session. Safe to call more than once.
    pub async fn close(&self) {
        if self.session.write().await.take().is_some() {
            tracing::debug!(api_url = %self.api_url, "ACE-Step client closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.session.read().await.is_none()
    }

    // ---- informational endpoints ----

    /// `GET /health`. Returns the service's status payload as-is.
    pub async fn health(&self) -> Result<serde_json::Value, AceStepError> {
        let client = self.session().await?;
        let response = client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| AceStepError::Connectivity(e.into()))?;
        Self::read_body(response)
            .await
            .and_then(|body| serde_json::from_slice(&body).map_err(TransportError::from))
            .map_err(AceStepError::Connectivity)
    }

    /// `GET /v1/models`.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, AceStepError> {
        let client = self.session().await?;
        let response = client
            .get(self.url("/v1/models"))
            .send()
            .await
            .map_err(|e| AceStepError::Connectivity(e.into()))?;
        Self::read_body(response)
            .await
            .and_then(|body| wire::parse_models(&body).map_err(TransportError::from))
            .map_err(AceStepError::Connectivity)
    }

    /// `POST /format_input`: ask the service's language model to polish a
    /// caption and lyrics.
    pub async fn format_input(
        &self,
        prompt: &str,
        lyrics: &str,
        temperature: f64,
    ) -> Result<serde_json::Value, AceStepError> {
        let client = self.session().await?;
        let body = serde_json::json!({
            "prompt": prompt,
            "lyrics": lyrics,
            "temperature": temperature,
        });
        let response = client
            .post(self.url("/format_input"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AceStepError::Connectivity(e.into()))?;
        Self::read_body(response)
            .await
            .and_then(|body| serde_json::from_slice(&body).map_err(TransportError::from))
            .map_err(AceStepError::Connectivity)
    }

    // ---- generation ----

    /// `POST /release_task`. Returns the service-assigned task id.
    pub async fn submit(&self, request: &GenerationRequest) -> Result<String, AceStepError> {
        let client = self.session().await?;
        let response = client
            .post(self.url("/release_task"))
            .json(request)
            .send()
            .await
            .map_err(|e| AceStepError::Submission(e.into()))?;
        let task_id = Self::read_body(response)
            .await
            .and_then(|body| wire::parse_submit_response(&body).map_err(TransportError::from))
            .map_err(AceStepError::Submission)?;

        tracing::info!(%task_id, prompt = %request.prompt, "Task submitted to ACE-Step");
        Ok(task_id)
    }

    /// `POST /query_result` for a batch of task ids.
    pub async fn poll_batch(&self, task_ids: &[String]) -> Result<Vec<TaskResult>, AceStepError> {
        let client = self.session().await?;
        let body = serde_json::json!({ "task_id_list": task_ids });
        let response = client
            .post(self.url("/query_result"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AceStepError::Poll(e.into()))?;
        Self::read_body(response)
            .await
            .and_then(|body| wire::parse_query_results(&body).map_err(TransportError::from))
            .map_err(AceStepError::Poll)
    }

    /// Poll one task every `poll_interval` until it succeeds, fails, or
    /// `timeout` elapses (monotonic clock).
    ///
    /// The deadline is checked between polls; an in-flight request is never
    /// cancelled. An empty poll response counts as "still running".
    pub async fn wait_for_completion(
        &self,
        task_id: &str,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TaskResult, AceStepError> {
        let start = Instant::now();
        let ids = [task_id.to_string()];

        loop {
            if start.elapsed() > timeout {
                return Err(AceStepError::TaskTimeout {
                    task_id: task_id.to_string(),
                    timeout,
                });
            }

            let results = self.poll_batch(&ids).await?;
            let position = results.iter().position(|r| r.task_id == task_id);
            let current = match position {
                Some(index) => results.into_iter().nth(index),
                None => results.into_iter().next(),
            };

            if let Some(result) = current {
                match result.state {
                    TaskState::Succeeded => return Ok(result),
                    TaskState::Failed => {
                        return Err(AceStepError::TaskFailed {
                            task_id: task_id.to_string(),
                            message: result.result,
                        })
                    }
                    TaskState::Running => {
                        tracing::trace!(%task_id, "Task still running");
                    }
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// `GET /v1/audio?path=...`, saving the bytes to `destination`.
    ///
    /// Parent directories are created as needed. Returns `destination`.
    pub async fn download_audio(
        &self,
        result_path: &str,
        destination: &Path,
    ) -> Result<PathBuf, AceStepError> {
        let client = self.session().await?;

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AceStepError::Download(e.into()))?;
        }

        let response = client
            .get(self.url("/v1/audio"))
            .query(&[("path", result_path)])
            .send()
            .await
            .map_err(|e| AceStepError::Download(e.into()))?;
        let bytes = Self::read_body(response)
            .await
            .map_err(AceStepError::Download)?;

        tokio::fs::write(destination, &bytes)
            .await
            .map_err(|e| AceStepError::Download(e.into()))?;

        tracing::debug!(
            path = %destination.display(),
            bytes = bytes.len(),
            "Audio downloaded",
        );
        Ok(destination.to_path_buf())
    }

    /// Submit, wait, and download in one call.
    ///
    /// The file is named `{task_id}.{format}` inside `output_dir` unless
    /// `file_name` is given.
    pub async fn generate_and_download(
        &self,
        request: &GenerationRequest,
        output_dir: &Path,
        file_name: Option<&str>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<PathBuf, AceStepError> {
        let task_id = self.submit(request).await?;
        let result = self
            .wait_for_completion(&task_id, poll_interval, timeout)
            .await?;

        let file_name = match file_name {
            Some(name) => name.to_string(),
            None => audio_file_name(&task_id, request.audio_format),
        };
        self.download_audio(&result.result, &output_dir.join(file_name))
            .await
    }

    // ---- private helpers ----

    async fn session(&self) -> Result<reqwest::Client, AceStepError> {
        self.session.read().await.clone().ok_or(AceStepError::Closed)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Return the body of a 2xx response, or a [`TransportError::Status`]
    /// carrying the status and body text.
    async fn read_body(response: reqwest::Response) -> Result<Vec<u8>, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

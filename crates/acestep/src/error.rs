//! Error taxonomy for the ACE-Step client.

use std::time::Duration;

/// Low-level failure talking to the service, wrapped by the
/// operation-specific [`AceStepError`] variants.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("ACE-Step API error ({status}): {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The body did not match any known response shape.
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Writing a downloaded file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by [`AceStepApi`](crate::AceStepApi) operations.
#[derive(Debug, thiserror::Error)]
pub enum AceStepError {
    /// Health, model listing, or prompt formatting failed.
    #[error("ACE-Step service unreachable: {0}")]
    Connectivity(#[source] TransportError),

    /// The service rejected or never received a task submission.
    #[error("Task submission failed: {0}")]
    Submission(#[source] TransportError),

    /// A status poll failed.
    #[error("Status poll failed: {0}")]
    Poll(#[source] TransportError),

    /// Fetching or saving the generated audio failed.
    #[error("Audio download failed: {0}")]
    Download(#[source] TransportError),

    /// The service reported the task as failed.
    #[error("Task {task_id} failed: {message}")]
    TaskFailed { task_id: String, message: String },

    /// The task did not finish before the local deadline.
    #[error("Task {task_id} did not complete within {}s", .timeout.as_secs_f64())]
    TaskTimeout { task_id: String, timeout: Duration },

    /// The client was closed; no further requests are possible.
    #[error("ACE-Step client is closed")]
    Closed,

    /// The client could not be constructed from its configuration.
    #[error("Invalid ACE-Step client configuration: {0}")]
    InvalidConfig(String),
}

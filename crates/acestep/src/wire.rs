//! Wire types for the ACE-Step REST API and response normalization.
//!
//! Different service versions return the same logical payload either as a
//! bare JSON array or wrapped in an object (`{"results": [...]}`,
//! `{"data": [...]}`). Each response is parsed into an untagged enum and
//! then collapsed into one canonical shape before anything else sees it.

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Task status
// ---------------------------------------------------------------------------

/// Remote task state, encoded on the wire as `0`, `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum TaskState {
    /// `0`: queued or running.
    Running,
    /// `1`: finished; `result` holds the server-side audio path.
    Succeeded,
    /// `2`: failed; `result` holds the error message.
    Failed,
}

impl TaskState {
    pub fn code(self) -> i64 {
        match self {
            TaskState::Running => 0,
            TaskState::Succeeded => 1,
            TaskState::Failed => 2,
        }
    }
}

impl TryFrom<i64> for TaskState {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TaskState::Running),
            1 => Ok(TaskState::Succeeded),
            2 => Ok(TaskState::Failed),
            other => Err(format!("unknown task status code {other}")),
        }
    }
}

/// One entry of a `/query_result` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    #[serde(rename = "status")]
    pub state: TaskState,
    /// Audio path on success, error text on failure, usually empty otherwise.
    #[serde(default, deserialize_with = "lenient_string")]
    pub result: String,
}

/// Accept `null`, a string, or any other JSON value (stringified).
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QueryResultResponse {
    Bare(Vec<TaskResult>),
    Wrapped {
        #[serde(default)]
        results: Option<Vec<TaskResult>>,
        #[serde(default)]
        data: Option<Vec<TaskResult>>,
    },
}

impl QueryResultResponse {
    fn into_results(self) -> Vec<TaskResult> {
        match self {
            QueryResultResponse::Bare(results) => results,
            QueryResultResponse::Wrapped { results, data } => {
                results.or(data).unwrap_or_default()
            }
        }
    }
}

/// Parse a `/query_result` body in any supported shape.
pub fn parse_query_results(body: &[u8]) -> Result<Vec<TaskResult>, serde_json::Error> {
    serde_json::from_slice::<QueryResultResponse>(body).map(QueryResultResponse::into_results)
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TaskIdPayload {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SubmitResponse {
    Direct(TaskIdPayload),
    Wrapped { data: TaskIdPayload },
}

/// Extract the task id from a `/release_task` body.
pub fn parse_submit_response(body: &[u8]) -> Result<String, serde_json::Error> {
    let response: SubmitResponse = serde_json::from_slice(body)?;
    Ok(match response {
        SubmitResponse::Direct(payload) | SubmitResponse::Wrapped { data: payload } => {
            payload.task_id
        }
    })
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// A model advertised by `/v1/models`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawModel")]
pub struct ModelInfo {
    pub name: String,
    /// Any other descriptor fields, passed through untouched.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawModel {
    Name(String),
    Descriptor {
        #[serde(alias = "id", alias = "model", alias = "model_name")]
        name: String,
        #[serde(flatten)]
        details: serde_json::Map<String, serde_json::Value>,
    },
}

impl From<RawModel> for ModelInfo {
    fn from(raw: RawModel) -> Self {
        match raw {
            RawModel::Name(name) => ModelInfo {
                name,
                details: serde_json::Map::new(),
            },
            RawModel::Descriptor { name, details } => ModelInfo { name, details },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelsResponse {
    Bare(Vec<ModelInfo>),
    Wrapped {
        #[serde(default)]
        models: Option<Vec<ModelInfo>>,
        #[serde(default)]
        data: Option<Vec<ModelInfo>>,
    },
}

/// Parse a `/v1/models` body in any supported shape.
pub fn parse_models(body: &[u8]) -> Result<Vec<ModelInfo>, serde_json::Error> {
    Ok(match serde_json::from_slice::<ModelsResponse>(body)? {
        ModelsResponse::Bare(models) => models,
        ModelsResponse::Wrapped { models, data } => models.or(data).unwrap_or_default(),
    })
}

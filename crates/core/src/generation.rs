//! Generation request value object and its validation rules.
//!
//! [`GenerationRequest`] is serialized verbatim as the `/release_task` body
//! and stored alongside each track so a generation can be reproduced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default track length in seconds.
pub const DEFAULT_AUDIO_DURATION_SECS: f64 = 120.0;
/// Task type understood by the remote service for prompt-to-music jobs.
pub const DEFAULT_TASK_TYPE: &str = "text2music";
/// Default vocal language code.
pub const DEFAULT_VOCAL_LANGUAGE: &str = "en";
/// Diffusion steps used by the turbo model.
pub const DEFAULT_INFERENCE_STEPS: i32 = 8;
/// Classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f64 = 7.0;
/// Seed value asking the remote service to pick a random seed.
pub const RANDOM_SEED: i64 = -1;

// ---------------------------------------------------------------------------
// Audio format
// ---------------------------------------------------------------------------

/// Output container requested from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Flac,
}

impl AudioFormat {
    /// Every supported format, in the order offered by the UI.
    pub const ALL: [AudioFormat; 3] = [AudioFormat::Mp3, AudioFormat::Wav, AudioFormat::Flac];

    /// Wire name, also used as the file extension.
    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
        }
    }

    /// MIME type used when serving the file.
    pub fn mime_type(self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            "flac" => Ok(AudioFormat::Flac),
            other => Err(CoreError::Validation(format!(
                "Unsupported audio format '{other}'. Expected one of: mp3, wav, flac"
            ))),
        }
    }
}

impl TryFrom<String> for AudioFormat {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Generation request
// ---------------------------------------------------------------------------

/// Parameters for one music generation job.
///
/// Empty `lyrics`, `key_scale` and `time_signature` mean "not set"; they are
/// still sent as empty strings because the remote service reads empty lyrics
/// as an instrumental request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub lyrics: String,
    pub audio_duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<i32>,
    pub key_scale: String,
    pub time_signature: String,
    pub seed: i64,
    pub batch_size: i32,
    pub audio_format: AudioFormat,
    pub task_type: String,
    pub vocal_language: String,
    pub inference_steps: i32,
    pub guidance_scale: f64,
    pub thinking: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            lyrics: String::new(),
            audio_duration: DEFAULT_AUDIO_DURATION_SECS,
            bpm: None,
            key_scale: String::new(),
            time_signature: String::new(),
            seed: RANDOM_SEED,
            batch_size: 1,
            audio_format: AudioFormat::default(),
            task_type: DEFAULT_TASK_TYPE.to_string(),
            vocal_language: DEFAULT_VOCAL_LANGUAGE.to_string(),
            inference_steps: DEFAULT_INFERENCE_STEPS,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            thinking: false,
        }
    }
}

impl GenerationRequest {
    /// A request with the given prompt and every other field at its default.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Empty lyrics ask the remote service for an instrumental track.
    pub fn is_instrumental(&self) -> bool {
        self.lyrics.trim().is_empty()
    }
}

/// Validate a request before it is sent to the remote service.
pub fn validate_generation_request(request: &GenerationRequest) -> Result<(), CoreError> {
    if request.prompt.trim().is_empty() {
        return Err(CoreError::Validation("Prompt is required.".into()));
    }
    if !request.audio_duration.is_finite() || request.audio_duration <= 0.0 {
        return Err(CoreError::Validation(format!(
            "audio_duration must be a positive number of seconds, got {}",
            request.audio_duration
        )));
    }
    if request.batch_size < 1 {
        return Err(CoreError::Validation(format!(
            "batch_size must be at least 1, got {}",
            request.batch_size
        )));
    }
    if request.inference_steps < 1 {
        return Err(CoreError::Validation(format!(
            "inference_steps must be at least 1, got {}",
            request.inference_steps
        )));
    }
    if !request.guidance_scale.is_finite() {
        return Err(CoreError::Validation(
            "guidance_scale must be a finite number".into(),
        ));
    }
    if let Some(bpm) = request.bpm {
        if bpm <= 0 {
            return Err(CoreError::Validation(format!(
                "bpm must be positive, got {bpm}"
            )));
        }
    }
    Ok(())
}

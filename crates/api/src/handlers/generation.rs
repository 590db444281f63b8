//! Handlers for submitting generation jobs and the ACE-Step passthroughs.

use std::str::FromStr;

use acemusic_acestep::api::DEFAULT_FORMAT_TEMPERATURE;
use acemusic_acestep::ModelInfo;
use acemusic_core::error::CoreError;
use acemusic_core::generation::{
    AudioFormat, GenerationRequest, DEFAULT_GUIDANCE_SCALE, DEFAULT_INFERENCE_STEPS, RANDOM_SEED,
};
use acemusic_pipeline::PipelineError;
use axum::extract::State;
use axum::response::Html;
use axum::{Form, Json};
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;
use crate::templates::PROGRESS_FRAGMENT;

// ---------------------------------------------------------------------------
// Form parsing
// ---------------------------------------------------------------------------

/// The generate form as posted by the browser.
///
/// Every field arrives as text so bad input can be reported inside the
/// page instead of as a bare 422.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GenerateForm {
    pub prompt: String,
    pub lyrics: String,
    pub audio_duration: String,
    pub audio_format: String,
    pub bpm: String,
    pub key_scale: String,
    pub time_signature: String,
    pub seed: String,
    pub inference_steps: String,
    pub guidance_scale: String,
    /// Checkbox: present (usually `on`) when ticked.
    pub thinking: Option<String>,
}

/// Parse `raw`, or fall back to `default` when blank.
fn parse_or<T: FromStr>(field: &str, raw: &str, default: T) -> Result<T, CoreError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    raw.parse()
        .map_err(|_| CoreError::Validation(format!("{field} must be a number, got '{raw}'")))
}

impl GenerateForm {
    /// Build a request, filling blanks from configuration defaults.
    pub fn into_request(self, config: &ServerConfig) -> Result<GenerationRequest, CoreError> {
        let audio_format = match self.audio_format.trim() {
            "" => config.default_format,
            raw => raw.parse::<AudioFormat>()?,
        };
        let bpm = match self.bpm.trim() {
            "" => None,
            raw => Some(parse_or("bpm", raw, 0)?),
        };

        Ok(GenerationRequest {
            audio_duration: parse_or("audio_duration", &self.audio_duration, config.default_duration)?,
            bpm,
            seed: parse_or("seed", &self.seed, RANDOM_SEED)?,
            batch_size: config.default_batch_size,
            audio_format,
            inference_steps: parse_or("inference_steps", &self.inference_steps, DEFAULT_INFERENCE_STEPS)?,
            guidance_scale: parse_or("guidance_scale", &self.guidance_scale, DEFAULT_GUIDANCE_SCALE)?,
            thinking: self.thinking.is_some_and(|v| !v.is_empty() && v != "off"),
            key_scale: self.key_scale.trim().to_string(),
            time_signature: self.time_signature.trim().to_string(),
            lyrics: self.lyrics.trim().to_string(),
            prompt: self.prompt.trim().to_string(),
            ..GenerationRequest::default()
        })
    }
}

// ---------------------------------------------------------------------------
// POST /api/generate
// ---------------------------------------------------------------------------

/// Submit a job from the generate form.
///
/// Always answers 200 with an HTML fragment: progress on success, the
/// error fragment on bad input or a failed submission.
pub async fn generate(
    State(state): State<AppState>,
    Form(form): Form<GenerateForm>,
) -> AppResult<Html<String>> {
    if form.prompt.trim().is_empty() {
        return state.templates.error_fragment("Prompt is required.");
    }

    let request = match form.into_request(&state.config) {
        Ok(request) => request,
        Err(CoreError::Validation(msg)) => return state.templates.error_fragment(&msg),
        Err(e) => return state.templates.error_fragment(&e.to_string()),
    };

    match state.generation.submit_generation(request).await {
        Ok(track) => state
            .templates
            .render(PROGRESS_FRAGMENT, minijinja::context! { track }),
        Err(PipelineError::Validation(CoreError::Validation(msg))) => {
            state.templates.error_fragment(&msg)
        }
        Err(e) => {
            tracing::error!(error = %e, "Generation submission failed");
            state
                .templates
                .error_fragment(&format!("Failed to submit: {e}"))
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/models
// ---------------------------------------------------------------------------

pub async fn list_models(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<ModelInfo>>>> {
    let models = state.generation.client().list_models().await?;
    Ok(Json(DataResponse { data: models }))
}

// ---------------------------------------------------------------------------
// POST /api/format_input
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FormatInputRequest {
    pub prompt: String,
    #[serde(default)]
    pub lyrics: String,
    pub temperature: Option<f64>,
}

/// Pass a caption and lyrics through the service's formatter.
pub async fn format_input(
    State(state): State<AppState>,
    Json(input): Json<FormatInputRequest>,
) -> AppResult<Json<DataResponse<serde_json::Value>>> {
    if input.prompt.trim().is_empty() {
        return Err(AppError::BadRequest("prompt must not be empty".into()));
    }
    let temperature = input.temperature.unwrap_or(DEFAULT_FORMAT_TEMPERATURE);
    let formatted = state
        .generation
        .client()
        .format_input(&input.prompt, &input.lyrics, temperature)
        .await?;
    Ok(Json(DataResponse { data: formatted }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn config() -> ServerConfig {
        ServerConfig::from_lookup(|_| None).unwrap()
    }

    #[test]
    fn blank_fields_take_defaults() {
        let form = GenerateForm {
            prompt: " lo-fi beats ".into(),
            ..Default::default()
        };
        let config = config();
        let request = form.into_request(&config).unwrap();

        assert_eq!(request.prompt, "lo-fi beats");
        assert_eq!(request.audio_duration, config.default_duration);
        assert_eq!(request.audio_format, config.default_format);
        assert_eq!(request.bpm, None);
        assert_eq!(request.seed, RANDOM_SEED);
        assert_eq!(request.inference_steps, DEFAULT_INFERENCE_STEPS);
        assert!(!request.thinking);
        assert!(request.is_instrumental());
    }

    #[test]
    fn filled_fields_are_parsed() {
        let form = GenerateForm {
            prompt: "jazz".into(),
            lyrics: "la la".into(),
            audio_duration: "45.5".into(),
            audio_format: "FLAC".into(),
            bpm: "96".into(),
            key_scale: "D minor".into(),
            time_signature: "3".into(),
            seed: "42".into(),
            inference_steps: "20".into(),
            guidance_scale: "5.5".into(),
            thinking: Some("on".into()),
        };
        let request = form.into_request(&config()).unwrap();

        assert_eq!(request.audio_duration, 45.5);
        assert_eq!(request.audio_format, AudioFormat::Flac);
        assert_eq!(request.bpm, Some(96));
        assert_eq!(request.key_scale, "D minor");
        assert_eq!(request.seed, 42);
        assert_eq!(request.inference_steps, 20);
        assert_eq!(request.guidance_scale, 5.5);
        assert!(request.thinking);
        assert!(!request.is_instrumental());
    }

    #[test]
    fn non_numeric_bpm_is_a_validation_error() {
        let form = GenerateForm {
            prompt: "jazz".into(),
            bpm: "fast".into(),
            ..Default::default()
        };
        let err = form.into_request(&config()).unwrap_err();
        assert_matches!(err, CoreError::Validation(msg) if msg.contains("bpm"));
    }

    #[test]
    fn unknown_format_is_a_validation_error() {
        let form = GenerateForm {
            prompt: "jazz".into(),
            audio_format: "ogg".into(),
            ..Default::default()
        };
        assert_matches!(
            form.into_request(&config()),
            Err(CoreError::Validation(_))
        );
    }
}

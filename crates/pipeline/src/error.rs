use acemusic_acestep::AceStepError;
use acemusic_core::error::CoreError;
use acemusic_db::RepoError;

/// Errors surfaced synchronously by [`GenerationService`](crate::GenerationService).
///
/// Failures after a track exists never show up here; they are recorded on
/// the row instead.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error(transparent)]
    Submit(#[from] AceStepError),

    #[error(transparent)]
    Store(#[from] RepoError),
}

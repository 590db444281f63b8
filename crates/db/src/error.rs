use acemusic_core::status::TrackStatus;

/// Errors returned by the repositories.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TrackStatus, to: TrackStatus },

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

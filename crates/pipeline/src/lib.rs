//! Generation lifecycle: submit to ACE-Step, poll in the background,
//! download the result, and record the outcome on the track row.

pub mod error;
mod poll;
pub mod service;

pub use error::PipelineError;
pub use service::{GenerationService, PollSettings};

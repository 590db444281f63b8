//! HTTP client for the ACE-Step music generation service.
//!
//! Wraps task submission, batch status polling, result download, and the
//! informational endpoints. Response shapes that vary between service
//! versions are normalized in [`wire`].

pub mod api;
pub mod error;
pub mod wire;

pub use api::{AceStepApi, AceStepConfig};
pub use error::{AceStepError, TransportError};
pub use wire::{ModelInfo, TaskResult, TaskState};

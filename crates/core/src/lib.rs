//! Domain types shared by every ACE Music crate.
//!
//! Nothing in here performs I/O: generation request value objects, track
//! status rules, validation, and file naming conventions.

pub mod error;
pub mod generation;
pub mod naming;
pub mod status;
pub mod types;

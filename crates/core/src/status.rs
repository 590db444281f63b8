//! Track lifecycle status and its forward-only transition rule.
//!
//! ```text
//! queued -> generating -> completed
//!    \            \
//!     \------------+----> failed
//! ```
//!
//! `completed` and `failed` are terminal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status of a persisted track, stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Queued,
    Generating,
    Completed,
    Failed,
}

impl TrackStatus {
    pub const ALL: [TrackStatus; 4] = [
        TrackStatus::Queued,
        TrackStatus::Generating,
        TrackStatus::Completed,
        TrackStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TrackStatus::Queued => "queued",
            TrackStatus::Generating => "generating",
            TrackStatus::Completed => "completed",
            TrackStatus::Failed => "failed",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TrackStatus::Completed | TrackStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            TrackStatus::Queued => 0,
            TrackStatus::Generating => 1,
            TrackStatus::Completed | TrackStatus::Failed => 2,
        }
    }

    /// Whether a row currently in `self` may be written with status `next`.
    ///
    /// Re-writing the same non-terminal status is allowed; terminal states
    /// accept nothing.
    pub fn can_transition_to(self, next: TrackStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        self == next || next.rank() > self.rank()
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TrackStatus::Queued),
            "generating" => Ok(TrackStatus::Generating),
            "completed" => Ok(TrackStatus::Completed),
            "failed" => Ok(TrackStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown track status '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for TrackStatus {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

//! Stage status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Every unit completed.
    Ok,
    /// The stage completed but surfaced features it could not place.
    Partial,
    /// Nothing was left to do.
    Skip,
    /// The stage failed.
    Fail,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Partial => write!(f, "partial"),
            Self::Skip => write!(f, "skip"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl StageStatus {
    /// Returns true unless the stage failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Fail)
    }

    /// Combines two outcomes, keeping the worse one.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        fn rank(s: StageStatus) -> u8 {
            match s {
                StageStatus::Skip => 0,
                StageStatus::Ok => 1,
                StageStatus::Partial => 2,
                StageStatus::Fail => 3,
            }
        }
        if rank(other) > rank(self) {
            other
        } else {
            self
        }
    }
}

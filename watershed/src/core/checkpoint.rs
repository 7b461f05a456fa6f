//! Resumable progress markers.

use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// How far a stage has progressed through its ordered units.
///
/// `completed` counts units from the start of the ordered list; units
/// `[0, completed)` are done. The count only moves forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingCheckpoint {
    /// Stage key.
    pub stage: String,
    /// Run that last advanced the checkpoint.
    pub run_id: String,
    /// Number of leading units completed.
    pub completed: usize,
    /// Number of units the stage had when it last ran.
    pub total: usize,
    /// When the checkpoint last changed.
    pub updated_at: Timestamp,
}

impl ProcessingCheckpoint {
    /// A checkpoint with no completed units.
    pub fn new(stage: impl Into<String>, run_id: impl Into<String>, total: usize) -> Self {
        Self {
            stage: stage.into(),
            run_id: run_id.into(),
            completed: 0,
            total,
            updated_at: now_utc(),
        }
    }

    /// Moves the completed count forward. Returns false, and leaves the
    /// checkpoint untouched, if `completed` would not increase it.
    pub fn advance_to(&mut self, completed: usize) -> bool {
        if completed <= self.completed {
            return false;
        }
        self.completed = completed;
        self.updated_at = now_utc();
        true
    }

    /// Returns true once every unit is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_never_regresses() {
        let mut cp = ProcessingCheckpoint::new("fill", "run-1", 5);
        assert!(cp.advance_to(3));
        assert!(!cp.advance_to(2));
        assert!(!cp.advance_to(3));
        assert_eq!(cp.completed, 3);
        assert!(!cp.is_complete());
        assert!(cp.advance_to(5));
        assert!(cp.is_complete());
    }
}

//! Run identity.

use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one pipeline invocation.
///
/// The run id is written into every checkpoint the run advances, so a
/// checkpoint can be traced back to the invocation that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: Timestamp,
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdentity {
    /// A fresh identity with a random run id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    /// An identity with a specific run id.
    #[must_use]
    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: now_utc(),
        }
    }

    /// The run id as text.
    #[must_use]
    pub fn run_id_str(&self) -> String {
        self.run_id.to_string()
    }
}

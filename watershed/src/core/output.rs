//! Stage reports.

use super::{Artifact, StageStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a stage did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage key.
    pub stage: String,
    /// Outcome.
    pub status: StageStatus,
    /// Units processed in this run.
    pub units_processed: usize,
    /// Units skipped because a checkpoint covered them.
    pub units_skipped: usize,
    /// Wall-clock duration.
    pub duration_ms: f64,
    /// Artifacts written.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    /// Non-fatal problems worth surfacing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Extra stage-specific values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, serde_json::Value>,
    /// Error message for failed stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageReport {
    fn with_status(stage: impl Into<String>, status: StageStatus) -> Self {
        Self {
            stage: stage.into(),
            status,
            units_processed: 0,
            units_skipped: 0,
            duration_ms: 0.0,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            data: BTreeMap::new(),
            error: None,
        }
    }

    /// A successful report.
    #[must_use]
    pub fn ok(stage: impl Into<String>) -> Self {
        Self::with_status(stage, StageStatus::Ok)
    }

    /// A report for a stage with nothing to do.
    #[must_use]
    pub fn skip(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_status(stage, StageStatus::Skip).with_data("skip_reason", reason.into())
    }

    /// A failed report.
    #[must_use]
    pub fn fail(stage: impl Into<String>, error: impl Into<String>) -> Self {
        let mut report = Self::with_status(stage, StageStatus::Fail);
        report.error = Some(error.into());
        report
    }

    /// Sets the unit counts.
    #[must_use]
    pub fn with_units(mut self, processed: usize, skipped: usize) -> Self {
        self.units_processed = processed;
        self.units_skipped = skipped;
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Adds an artifact.
    #[must_use]
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Adds artifacts.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        self.artifacts.extend(artifacts);
        self
    }

    /// Adds a warning and marks the report partial.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self.status = self.status.worst(StageStatus::Partial);
        self
    }

    /// Adds a data value.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Returns true unless the stage failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

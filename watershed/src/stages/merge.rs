//! Consolidating named classes into one city-wide class per theme.

use super::{Stage, StageKey};
use crate::context::PipelineContext;
use crate::core::{Artifact, FeatureClass, NamedFeatureSet, StageReport, Theme};
use crate::errors::{Result, WatershedError};
use crate::observability::TraceScope;
use crate::pipeline::RunMode;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Instant;
use tracing::info;

/// Result of merging one theme.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The merged class as written.
    pub merged: FeatureClass,
    /// Names of the classes merged, in order.
    pub inputs: Vec<String>,
    /// SHA-256 of the written class.
    pub digest: String,
}

/// Merges every named class of a theme.
#[derive(Debug, Clone)]
pub struct MergeStage {
    theme: Theme,
    stage: String,
}

impl MergeStage {
    /// Creates the stage for `theme`.
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            stage: StageKey::Merge(theme).name(),
        }
    }

    /// Loads the theme's named classes, leaving out the merged output.
    pub fn load_inputs(ctx: &PipelineContext, theme: Theme) -> Result<NamedFeatureSet> {
        let ws = ctx.workspace();
        let mut set = NamedFeatureSet::new(theme);
        for name in ws.list_classes(theme.dataset())? {
            if name != theme.merged_name() {
                set.insert(ws.read_class(theme.dataset(), &name)?)?;
            }
        }
        Ok(set)
    }

    /// Concatenates the theme's classes in natural order and overwrites
    /// the merged class. Returns `None` when there is nothing to merge.
    pub fn merge_all(ctx: &PipelineContext, theme: Theme) -> Result<Option<MergeOutcome>> {
        let ws = ctx.workspace();
        let _guard = ws.lock();
        let inputs = Self::load_inputs(ctx, theme)?;
        if inputs.is_empty() {
            return Ok(None);
        }
        let names: Vec<String> = inputs.names().into_iter().map(str::to_string).collect();
        let mut features = Vec::with_capacity(inputs.feature_count());
        features.extend(inputs.iter().flat_map(|class| class.features.iter().cloned()));
        let merged = FeatureClass::new(theme.merged_name(), theme.kind()).with_features(features);
        ws.write_class(theme.dataset(), &merged)?;
        let digest = hex::encode(Sha256::digest(serde_json::to_vec(&merged)?));
        Ok(Some(MergeOutcome {
            merged,
            inputs: names,
            digest,
        }))
    }
}

#[async_trait]
impl Stage for MergeStage {
    fn name(&self) -> &str {
        &self.stage
    }

    async fn execute(&self, ctx: &PipelineContext, _mode: RunMode) -> Result<StageReport> {
        let started = Instant::now();
        let scope = TraceScope::enter(format!("Merge {}", self.theme));
        let task_ctx = ctx.clone();
        let theme = self.theme;
        let outcome = match tokio::task::spawn_blocking(move || Self::merge_all(&task_ctx, theme)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                scope.fail(&err);
                return Err(err);
            }
            Err(join) => {
                let err: WatershedError = join.into();
                scope.fail(&err);
                return Err(err);
            }
        };
        scope.complete();

        let Some(outcome) = outcome else {
            return Ok(StageReport::skip(&self.stage, format!("no named classes in {}", self.theme.dataset())));
        };
        info!(
            theme = %self.theme,
            inputs = outcome.inputs.len(),
            features = outcome.merged.len(),
            digest = %outcome.digest,
            "Merged"
        );
        Ok(StageReport::ok(&self.stage)
            .with_units(outcome.inputs.len(), 0)
            .with_artifact(Artifact::features(
                self.theme.dataset(),
                self.theme.merged_name(),
                outcome.merged.len(),
            ))
            .with_data("inputs", outcome.inputs)
            .with_data("digest", outcome.digest)
            .with_duration_ms(started.elapsed().as_secs_f64() * 1000.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{GeometryKind, VectorFeature};
    use crate::testing::scenario_config;
    use geo::LineString;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn named(name: &str, n: usize) -> FeatureClass {
        let features = (0..n)
            .map(|i| VectorFeature::new(LineString::from(vec![(0.0, i as f64), (5.0, i as f64)])))
            .collect();
        FeatureClass::new(name, GeometryKind::Line).with_features(features)
    }

    fn seeded(dir: &TempDir) -> PipelineContext {
        let ctx = PipelineContext::new(scenario_config(dir.path())).unwrap();
        let ws = ctx.workspace();
        for (name, n) in [("S_Q10", 1), ("S_Q2", 2), ("S_Q1", 3)] {
            ws.write_class(Theme::Streams.dataset(), &named(name, n)).unwrap();
        }
        ctx
    }

    #[tokio::test]
    async fn test_merge_concatenates_in_natural_order() {
        let dir = TempDir::new().unwrap();
        let ctx = seeded(&dir);

        assert_eq!(MergeStage::load_inputs(&ctx, Theme::Streams).unwrap().feature_count(), 6);
        let outcome = MergeStage::merge_all(&ctx, Theme::Streams).unwrap().unwrap();
        assert_eq!(outcome.inputs, vec!["S_Q1", "S_Q2", "S_Q10"]);
        assert_eq!(outcome.merged.len(), 6);
    }

    #[tokio::test]
    async fn test_rerun_excludes_merged_output_and_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let ctx = seeded(&dir);
        let stage = MergeStage::new(Theme::Streams);

        let first = stage.execute(&ctx, RunMode::Fresh).await.unwrap();
        let path = ctx.workspace().class_path(Theme::Streams.dataset(), "StreamsMerged");
        let bytes = std::fs::read(&path).unwrap();
        let second = stage.execute(&ctx, RunMode::Fresh).await.unwrap();

        assert_eq!(first.data["digest"], second.data["digest"]);
        assert_eq!(std::fs::read(&path).unwrap(), bytes);
        assert_eq!(second.data["inputs"].as_array().unwrap().len(), 3);
        let merged = ctx.workspace().read_class(Theme::Streams.dataset(), "StreamsMerged").unwrap();
        assert_eq!(merged.len(), 6);
    }

    #[tokio::test]
    async fn test_empty_dataset_is_skipped() {
        let dir = TempDir::new().unwrap();
        let ctx = PipelineContext::new(scenario_config(dir.path())).unwrap();
        let report = MergeStage::new(Theme::ContourLines).execute(&ctx, RunMode::Fresh).await.unwrap();
        assert_eq!(report.status, crate::core::StageStatus::Skip);
    }
}

//! Contour lines and polygons.

use super::{Stage, TileOp};
use crate::context::PipelineContext;
use crate::core::StageReport;
use crate::errors::Result;
use crate::pipeline::{RunMode, UnitRunner};
use async_trait::async_trait;
use std::time::Instant;

/// Line steps, in order.
const LINE_STEPS: [TileOp; 4] = [
    TileOp::ContourLines,
    TileOp::SimplifyLines,
    TileOp::SmoothLines,
    TileOp::TrimLines,
];

/// Polygon steps, in order.
const POLYGON_STEPS: [TileOp; 2] = [TileOp::ContourPolygons, TileOp::TrimPolygons];

/// Generates, generalizes and trims contours for every tile.
///
/// Each step keeps its own checkpoint. A start point given to the stage
/// applies to the first line step; every later step resumes from its own
/// checkpoint.
#[derive(Debug, Clone, Default)]
pub struct ContourPipeline;

impl ContourPipeline {
    /// Creates the stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Stage for ContourPipeline {
    fn name(&self) -> &str {
        "contouring"
    }

    async fn execute(&self, ctx: &PipelineContext, mode: RunMode) -> Result<StageReport> {
        let started = Instant::now();
        let runner = UnitRunner::new(ctx);
        let mut report = StageReport::ok(self.name());
        let mut step_mode = mode;
        for op in LINE_STEPS.into_iter().chain(POLYGON_STEPS) {
            let step = runner.run(op, step_mode).await?;
            report = merge_step(report, step);
            step_mode = mode.downstream();
        }
        Ok(report.with_duration_ms(started.elapsed().as_secs_f64() * 1000.0))
    }
}

/// Folds a step report into its stage report.
pub(crate) fn merge_step(mut report: StageReport, step: StageReport) -> StageReport {
    report.units_processed += step.units_processed;
    report.units_skipped += step.units_skipped;
    report.status = report.status.worst(step.status);
    report.warnings.extend(step.warnings.iter().cloned());
    report.artifacts.extend(step.artifacts.iter().cloned());
    report.data.insert(step.stage.clone(), serde_json::json!({
        "status": step.status,
        "processed": step.units_processed,
        "skipped": step.units_skipped,
        "data": step.data,
    }));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FeatureClass, StageStatus};
    use crate::stages::TileManager;
    use crate::testing::{scenario_config, seed_workspace};
    use crate::workspace::Location;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    async fn tiled_context(dir: &TempDir) -> PipelineContext {
        let ctx = PipelineContext::new(scenario_config(dir.path())).unwrap();
        seed_workspace(&ctx);
        TileManager::new().execute(&ctx, RunMode::Fresh).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_lines_cover_every_level_per_tile() {
        let dir = TempDir::new().unwrap();
        let ctx = tiled_context(&dir).await;

        let report = ContourPipeline::new().execute(&ctx, RunMode::Fresh).await.unwrap();
        assert_eq!(report.status, StageStatus::Ok);

        let ws = ctx.workspace();
        let raw = ws.list_classes(Location::ContourLines).unwrap();
        assert_eq!(raw, vec!["contours_lines_000", "contours_lines_001", "contours_lines_002"]);
        let expected: BTreeSet<i64> = (1..=10).map(|k| k * 50).collect();
        for name in raw {
            let class = ws.read_class(Location::ContourLines, &name).unwrap();
            let levels: BTreeSet<i64> = class
                .features
                .iter()
                .filter_map(|f| f.attribute("Contour")?.as_f64())
                .map(|v| v.round() as i64)
                .collect();
            assert_eq!(levels, expected, "{name}");
        }
        assert_eq!(ws.list_classes(Location::ContourLinesTrimmed).unwrap().len(), 3);
        assert_eq!(ws.list_classes(Location::ContourPolygonsTrimmed).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_trimmed_lines_stay_inside_their_region() {
        use geo::BoundingRect;
        let dir = TempDir::new().unwrap();
        let ctx = tiled_context(&dir).await;
        ContourPipeline::new().execute(&ctx, RunMode::Fresh).await.unwrap();

        let regions = ctx.regions().unwrap();
        for (i, name) in ctx.workspace().list_classes(Location::ContourLinesTrimmed).unwrap().iter().enumerate() {
            let class: FeatureClass = ctx.workspace().read_class(Location::ContourLinesTrimmed, name).unwrap();
            let core = regions.sections()[i].extent().unwrap();
            for feature in &class.features {
                let bounds = feature.geometry.bounding_rect().unwrap();
                assert!(bounds.min().x >= core.min_x - 1e-9 && bounds.max().x <= core.max_x + 1e-9);
            }
        }
    }

    #[tokio::test]
    async fn test_resume_after_completion_does_no_work() {
        let dir = TempDir::new().unwrap();
        let ctx = tiled_context(&dir).await;
        ContourPipeline::new().execute(&ctx, RunMode::Fresh).await.unwrap();

        let report = ContourPipeline::new().execute(&ctx, RunMode::Resume).await.unwrap();
        assert_eq!(report.units_processed, 0);
        assert_eq!(report.units_skipped, 18);
    }
}

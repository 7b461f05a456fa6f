//! Stage groups and whole-run reports.

use super::RunMode;
use crate::context::PipelineContext;
use crate::core::{StageReport, StageStatus, Theme};
use crate::events::names;
use crate::errors::{ConfigurationError, WatershedError};
use crate::observability::{scoped, TraceScope};
use crate::stages::{ContourPipeline, HydrologyPipeline, MergeStage, NameAssigner, Stage, TileManager};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Instant;
use tracing::error;

/// A set of stages run by one entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageGroup {
    /// Split the DEM into tiles.
    Tiling,
    /// Contour lines and polygons, then their names.
    Contouring,
    /// Stream network, then its names.
    Hydrology,
    /// Merge every theme.
    Merge,
    /// Everything, in order.
    All,
}

impl StageGroup {
    /// The stages of the group, in run order.
    #[must_use]
    pub fn stages(self) -> Vec<Box<dyn Stage>> {
        match self {
            Self::Tiling => vec![Box::new(TileManager::new())],
            Self::Contouring => vec![
                Box::new(ContourPipeline::new()),
                Box::new(NameAssigner::new(Theme::ContourLines)),
                Box::new(NameAssigner::new(Theme::ContourPolygons)),
            ],
            Self::Hydrology => vec![
                Box::new(HydrologyPipeline::new()),
                Box::new(NameAssigner::new(Theme::Streams)),
            ],
            Self::Merge => Theme::ALL
                .into_iter()
                .map(|theme| Box::new(MergeStage::new(theme)) as Box<dyn Stage>)
                .collect(),
            Self::All => [Self::Tiling, Self::Contouring, Self::Hydrology, Self::Merge]
                .into_iter()
                .flat_map(Self::stages)
                .collect(),
        }
    }

    /// Snake-case name.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Tiling => "tiling",
            Self::Contouring => "contouring",
            Self::Hydrology => "hydrology",
            Self::Merge => "merge",
            Self::All => "all",
        }
    }
}

impl fmt::Display for StageGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What a group run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run id.
    pub run_id: String,
    /// The group that ran.
    pub group: StageGroup,
    /// One report per stage that started.
    pub stages: Vec<StageReport>,
    /// Wall-clock duration.
    pub duration_ms: f64,
    /// Error of the stage that stopped the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    /// Worst status across stages.
    #[must_use]
    pub fn status(&self) -> StageStatus {
        self.stages
            .iter()
            .fold(StageStatus::Skip, |acc, s| acc.worst(s.status))
    }

    /// Returns true if no stage failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status().is_success()
    }

    /// Report of a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    fn count(&self, key: &str) -> usize {
        self.stages
            .iter()
            .filter_map(|s| s.data.get(key)?.as_u64())
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .sum()
    }

    /// Features that matched several regions.
    #[must_use]
    pub fn ambiguous_count(&self) -> usize {
        self.count("ambiguous")
    }

    /// Features that matched no region.
    #[must_use]
    pub fn orphaned_count(&self) -> usize {
        self.count("orphaned")
    }
}

/// Runs a group's stages in order, stopping at the first failure.
///
/// A start point applies to the first stage only; later stages resume from
/// their own checkpoints. Tiling has no unit index, so a start point for the
/// tiling or all groups fails the run before any stage starts.
pub async fn run_group(ctx: &PipelineContext, group: StageGroup, mode: RunMode) -> RunReport {
    let started = Instant::now();
    let mut report = RunReport {
        run_id: ctx.identity().run_id_str(),
        group,
        stages: Vec::new(),
        duration_ms: 0.0,
        error: None,
    };
    let scope = TraceScope::enter(format!("Run {group}"));
    if let (RunMode::From(k), StageGroup::Tiling | StageGroup::All) = (mode, group) {
        let err: WatershedError =
            ConfigurationError::new(format!("start point {k} is not accepted by the '{group}' group"))
                .with_field("start_point")
                .into();
        error!(group = %group, error = %err, "Run rejected");
        report.stages.push(StageReport::fail(group.key(), err.to_string()));
        report.error = Some(err.to_string());
        scope.fail(&err);
        report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        return report;
    }
    let mut failure: Option<WatershedError> = None;
    let mut stage_mode = mode;
    for stage in group.stages() {
        let name = stage.name().to_string();
        ctx.events()
            .try_emit(names::STAGE_STARTED, Some(json!({ "stage": name, "mode": stage_mode })));
        match scoped(&name, stage.execute(ctx, stage_mode)).await {
            Ok(stage_report) => {
                ctx.events().try_emit(
                    names::STAGE_COMPLETED,
                    Some(json!({ "stage": name, "status": stage_report.status })),
                );
                report.stages.push(stage_report);
            }
            Err(err) => {
                error!(stage = %name, error = %err, tile_local = err.is_tile_local(), "Stage failed");
                ctx.events()
                    .try_emit(names::STAGE_FAILED, Some(json!({ "stage": name, "error": err.to_dict() })));
                report.stages.push(
                    StageReport::fail(&name, err.to_string())
                        .with_data("error", serde_json::to_value(err.to_dict()).unwrap_or_default()),
                );
                report.error = Some(err.to_string());
                failure = Some(err);
                break;
            }
        }
        stage_mode = mode.downstream();
    }
    match &failure {
        Some(err) => scope.fail(err),
        None => {
            scope.complete();
        }
    }
    report.duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scenario_config, seed_workspace};
    use crate::workspace::Location;
    use tempfile::TempDir;

    #[test]
    fn test_all_runs_every_group_in_order() {
        let names: Vec<String> = StageGroup::All
            .stages()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "tiling",
                "contouring",
                "naming_contour_lines",
                "naming_contour_polygons",
                "hydrology",
                "naming_streams",
                "merge_contour_lines",
                "merge_contour_polygons",
                "merge_streams",
            ]
        );
    }

    #[test]
    fn test_report_counts_surface_naming_problems() {
        let report = RunReport {
            run_id: "r".to_string(),
            group: StageGroup::Contouring,
            stages: vec![
                StageReport::ok("naming_contour_lines").with_data("ambiguous", 2).with_data("orphaned", 1),
                StageReport::ok("naming_contour_polygons").with_data("ambiguous", 1),
            ],
            duration_ms: 0.0,
            error: None,
        };
        assert_eq!(report.ambiguous_count(), 3);
        assert_eq!(report.orphaned_count(), 1);
        assert!(report.is_success());
    }

    #[test]
    fn test_failed_stage_fails_report() {
        let report = RunReport {
            run_id: "r".to_string(),
            group: StageGroup::Tiling,
            stages: vec![StageReport::fail("tiling", "no DEM")],
            duration_ms: 0.0,
            error: Some("no DEM".to_string()),
        };
        assert!(!report.is_success());
        assert_eq!(report.status(), StageStatus::Fail);
    }

    #[tokio::test]
    async fn test_start_point_is_rejected_for_tiling_groups() {
        let dir = TempDir::new().unwrap();
        let ctx = PipelineContext::new(scenario_config(dir.path())).unwrap();
        seed_workspace(&ctx);

        for group in [StageGroup::All, StageGroup::Tiling] {
            let report = run_group(&ctx, group, RunMode::From(1)).await;
            assert!(!report.is_success());
            assert_eq!(report.stages.len(), 1);
            assert!(report.error.as_deref().unwrap().starts_with("Configuration error"));
        }
        assert!(ctx.workspace().list_rasters(Location::Tiles).unwrap().is_empty());
    }
}

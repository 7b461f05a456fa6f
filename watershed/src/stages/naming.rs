//! Naming features after the quarter section that contains them.

use super::{Stage, StageKey};
use crate::context::PipelineContext;
use crate::core::{FeatureClass, RegionLayer, StageReport, Theme, VectorFeature};
use crate::errors::{AmbiguousMatchError, ConfigurationError, OrphanedFeatureError, Result, WatershedError};
use crate::events::names;
use crate::observability::TraceScope;
use crate::pipeline::{start_index, RunMode, WorkUnit};
use crate::utils::sanitize_code;
use crate::workspace::Location;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// What naming did with a theme's features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamingReport {
    /// Features written under a region name.
    pub named: usize,
    /// Features contained by one region but too short to keep.
    pub below_min_length: usize,
    /// Features no region contains.
    pub orphaned: Vec<OrphanedFeatureError>,
    /// Features several regions contain.
    pub ambiguous: Vec<AmbiguousMatchError>,
    /// Features written per final name.
    pub per_name: BTreeMap<String, usize>,
}

impl NamingReport {
    fn absorb(&mut self, other: Self) {
        self.named += other.named;
        self.below_min_length += other.below_min_length;
        self.orphaned.extend(other.orphaned);
        self.ambiguous.extend(other.ambiguous);
        for (name, n) in other.per_name {
            *self.per_name.entry(name).or_default() += n;
        }
    }
}

/// Builds the final class name for every region: `<prefix>_<code>` with
/// separators stripped from the code.
///
/// Two codes that sanitize to the same name would merge unrelated regions,
/// so that is rejected.
pub fn final_names(regions: &RegionLayer, prefix: &str) -> Result<BTreeMap<String, String>> {
    let mut names = BTreeMap::new();
    let mut owners: BTreeMap<String, &str> = BTreeMap::new();
    for region in regions.sections() {
        let name = format!("{prefix}_{}", sanitize_code(&region.code));
        if let Some(other) = owners.insert(name.clone(), &region.code) {
            return Err(ConfigurationError::new(format!(
                "region codes '{other}' and '{}' both become '{name}'",
                region.code
            ))
            .with_field("reference.id_field")
            .into());
        }
        names.insert(region.code.clone(), name);
    }
    Ok(names)
}

/// Renames one theme's per-unit features into per-region classes.
#[derive(Debug, Clone)]
pub struct NameAssigner {
    theme: Theme,
    stage: String,
}

/// Features of one input class, grouped by destination.
#[derive(Debug, Default)]
struct Assignment {
    named: BTreeMap<String, Vec<VectorFeature>>,
    orphaned: Vec<VectorFeature>,
    ambiguous: Vec<VectorFeature>,
    report: NamingReport,
}

impl NameAssigner {
    /// Creates the stage for `theme`.
    #[must_use]
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            stage: StageKey::Naming(theme).name(),
        }
    }

    /// The theme.
    #[must_use]
    pub fn theme(&self) -> Theme {
        self.theme
    }

    fn unassigned_name(&self, ctx: &PipelineContext) -> String {
        format!("{}_Unassigned", self.theme.naming(&ctx.config().naming).prefix)
    }

    fn ambiguous_name(&self, ctx: &PipelineContext) -> String {
        format!("{}_Ambiguous", self.theme.naming(&ctx.config().naming).prefix)
    }

    /// Decides where each feature of `class` goes.
    ///
    /// Containment is checked first. A feature contained by exactly one
    /// region is kept only if it is longer than the theme's minimum length.
    /// In strict mode the first orphaned or ambiguous feature is an error.
    fn assign(
        &self,
        ctx: &PipelineContext,
        class: FeatureClass,
        regions: &RegionLayer,
        names: &BTreeMap<String, String>,
    ) -> Result<Assignment> {
        let naming = &ctx.config().naming;
        let theme = self.theme.naming(naming);
        let mut out = Assignment::default();

        for (index, feature) in class.features.into_iter().enumerate() {
            let mut codes = ctx
                .engine()
                .containing_regions(&feature.geometry, regions.sections(), naming.containment_tolerance)?;
            match codes.len() {
                0 => {
                    let orphan = OrphanedFeatureError {
                        source_class: class.name.clone(),
                        feature_index: index,
                        length: feature.length(),
                    };
                    warn!(class = %class.name, index, length = orphan.length, "Feature has no containing region");
                    ctx.events()
                        .try_emit(names::FEATURE_ORPHANED, Some(serde_json::to_value(&orphan)?));
                    if naming.strict {
                        return Err(orphan.into());
                    }
                    out.report.orphaned.push(orphan);
                    out.orphaned.push(feature);
                }
                1 => {
                    let code = codes.remove(0);
                    if feature.length() <= theme.min_length {
                        out.report.below_min_length += 1;
                        continue;
                    }
                    let name = names.get(&code).ok_or_else(|| {
                        WatershedError::unexpected(format!("region '{code}' has no final name"))
                    })?;
                    out.report.named += 1;
                    *out.report.per_name.entry(name.clone()).or_default() += 1;
                    out.named.entry(name.clone()).or_default().push(feature);
                }
                _ => {
                    let ambiguous = AmbiguousMatchError {
                        source_class: class.name.clone(),
                        feature_index: index,
                        candidates: codes,
                    };
                    warn!(class = %class.name, index, candidates = ?ambiguous.candidates, "Feature matches several regions");
                    ctx.events()
                        .try_emit(names::FEATURE_AMBIGUOUS, Some(serde_json::to_value(&ambiguous)?));
                    if naming.strict {
                        return Err(ambiguous.into());
                    }
                    out.report.ambiguous.push(ambiguous);
                    out.ambiguous.push(feature);
                }
            }
        }
        Ok(out)
    }

    /// Names one input class and writes its contributions.
    fn name_class(
        &self,
        ctx: &PipelineContext,
        unit: &WorkUnit,
        regions: &RegionLayer,
        names: &BTreeMap<String, String>,
    ) -> Result<NamingReport> {
        let ws = ctx.workspace();
        let class = ws.read_class(self.theme.naming_input(), &unit.name)?;
        let assignment = self.assign(ctx, class, regions, names)?;

        for (name, features) in assignment.named {
            ws.upsert_contribution(self.theme.dataset(), &name, self.theme.kind(), &unit.name, features)?;
        }
        for (name, features) in [
            (self.unassigned_name(ctx), assignment.orphaned),
            (self.ambiguous_name(ctx), assignment.ambiguous),
        ] {
            if !features.is_empty() || ws.has_class(Location::Unassigned, &name) {
                ws.upsert_contribution(Location::Unassigned, &name, self.theme.kind(), &unit.name, features)?;
            }
        }
        Ok(assignment.report)
    }
}

#[async_trait]
impl Stage for NameAssigner {
    fn name(&self) -> &str {
        &self.stage
    }

    async fn execute(&self, ctx: &PipelineContext, mode: RunMode) -> Result<StageReport> {
        let started = Instant::now();
        let ws = ctx.workspace();
        let inputs = ws.list_classes(self.theme.naming_input())?;
        if inputs.is_empty() {
            return Ok(StageReport::skip(&self.stage, format!("no classes in {}", self.theme.naming_input())));
        }
        let regions = ctx.regions()?;
        let names_by_code = final_names(&regions, &self.theme.naming(&ctx.config().naming).prefix)?;

        let total = inputs.len();
        let (start, mut checkpoint) = start_index(ctx, &self.stage, mode, total)?;
        if mode == RunMode::Fresh {
            ws.clear(self.theme.dataset())?;
            ws.delete_class(Location::Unassigned, &self.unassigned_name(ctx))?;
            ws.delete_class(Location::Unassigned, &self.ambiguous_name(ctx))?;
        }

        let store = ctx.checkpoints();
        let mut summary = NamingReport::default();
        for (index, name) in inputs.into_iter().enumerate().skip(start) {
            let unit = WorkUnit::new(index, name);
            let scope = TraceScope::for_unit("Rename", &unit.name);
            let task = (self.clone(), ctx.clone(), unit.clone(), regions.clone(), names_by_code.clone());
            let span = scope.span().clone();
            let outcome = tokio::task::spawn_blocking(move || {
                let (stage, ctx, unit, regions, names) = task;
                span.in_scope(|| stage.name_class(&ctx, &unit, &regions, &names))
            })
            .await
            .map_err(Into::into)
            .and_then(|r| r);
            let report = match outcome {
                Ok(report) => {
                    scope.complete();
                    report
                }
                Err(err) => {
                    scope.fail(&err);
                    return Err(err);
                }
            };
            summary.absorb(report);
            if checkpoint.advance_to(index + 1) {
                checkpoint.run_id = ctx.identity().run_id_str();
                store.save(&checkpoint)?;
            }
            ctx.events().try_emit(
                names::UNIT_COMPLETED,
                Some(json!({ "stage": self.stage, "unit": unit.name, "index": index })),
            );
        }

        info!(
            theme = %self.theme,
            named = summary.named,
            below_min_length = summary.below_min_length,
            orphaned = summary.orphaned.len(),
            ambiguous = summary.ambiguous.len(),
            "Naming finished"
        );
        let mut report = StageReport::ok(&self.stage)
            .with_units(total - start, start)
            .with_data("orphaned", summary.orphaned.len())
            .with_data("ambiguous", summary.ambiguous.len());
        if !summary.orphaned.is_empty() {
            report = report.with_warning(format!(
                "{} feature(s) have no containing region; see {}",
                summary.orphaned.len(),
                self.unassigned_name(ctx)
            ));
        }
        if !summary.ambiguous.is_empty() {
            report = report.with_warning(format!(
                "{} feature(s) match several regions; see {}",
                summary.ambiguous.len(),
                self.ambiguous_name(ctx)
            ));
        }
        Ok(report
            .with_data("naming", serde_json::to_value(&summary)?)
            .with_duration_ms(started.elapsed().as_secs_f64() * 1000.0))
    }
}

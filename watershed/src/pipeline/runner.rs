//! Checkpointed execution of per-tile operations.

use crate::context::PipelineContext;
use crate::core::{Artifact, ProcessingCheckpoint, StageReport};
use crate::errors::{ConfigurationError, Result};
use crate::events::names;
use crate::observability::TraceScope;
use crate::stages::{StageKey, TileOp};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use tracing::{info, warn};

/// Where a stage starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Clear outputs and start from the first unit.
    #[default]
    Fresh,
    /// Continue after the last checkpointed unit.
    Resume,
    /// Start at a given unit index. The index may not be past the
    /// checkpoint.
    From(usize),
}

impl RunMode {
    /// The mode for the steps after the first one of a group: an explicit
    /// start point only applies to the first step.
    #[must_use]
    pub fn downstream(self) -> Self {
        match self {
            Self::From(_) => Self::Resume,
            other => other,
        }
    }
}

/// One input item of a per-tile operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnit {
    /// Position in natural order.
    pub index: usize,
    /// Input name.
    pub name: String,
}

impl WorkUnit {
    /// Creates a unit.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
        }
    }
}

/// Resolves the first unit index to process and prepares the checkpoint.
///
/// A fresh run resets the checkpoint. A checkpoint recorded for a different
/// number of units is stale and is ignored.
pub fn start_index(
    ctx: &PipelineContext,
    stage: &str,
    mode: RunMode,
    total: usize,
) -> Result<(usize, ProcessingCheckpoint)> {
    let store = ctx.checkpoints();
    let run_id = ctx.identity().run_id_str();
    if mode == RunMode::Fresh {
        store.reset(stage)?;
        return Ok((0, ProcessingCheckpoint::new(stage, run_id, total)));
    }
    let checkpoint = match store.load(stage)? {
        Some(cp) if cp.total == total => cp,
        Some(cp) => {
            warn!(stage, recorded = cp.total, total, "Ignoring checkpoint for a different unit count");
            ProcessingCheckpoint::new(stage, run_id, total)
        }
        None => ProcessingCheckpoint::new(stage, run_id, total),
    };
    let start = match mode {
        RunMode::From(k) if k > checkpoint.completed => {
            return Err(ConfigurationError::new(format!(
                "start point {k} is past the checkpoint of '{stage}' ({} of {total} done)",
                checkpoint.completed
            ))
            .with_field("start_point")
            .into())
        }
        RunMode::From(k) => k,
        _ => checkpoint.completed.min(total),
    };
    Ok((start, checkpoint))
}

/// Runs a [`TileOp`] over the units of its input location.
#[derive(Debug)]
pub struct UnitRunner<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> UnitRunner<'a> {
    /// Creates a runner.
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Processes the units in natural order from the resolved start point.
    ///
    /// Up to `parallelism` units run at once on the blocking pool. The
    /// checkpoint only ever covers a contiguous prefix of completed units,
    /// so a unit that fails or is interrupted is never marked done.
    pub async fn run(&self, op: TileOp, mode: RunMode) -> Result<StageReport> {
        let started = Instant::now();
        let stage = StageKey::Tile(op).name();
        let (input, output) = op.io();
        op.validate(input, output)?;

        let ws = self.ctx.workspace();
        let inputs = if op.reads_rasters() {
            ws.list_rasters(input)?
        } else {
            ws.list_classes(input)?
        };
        if inputs.is_empty() {
            return Ok(StageReport::skip(stage, format!("no units in {input}")));
        }
        let total = inputs.len();
        let (start, mut checkpoint) = start_index(self.ctx, &stage, mode, total)?;
        if mode == RunMode::Fresh {
            ws.clear(output)?;
        }
        info!(stage = %stage, total, start, "Processing units");

        let store = self.ctx.checkpoints();
        let run_id = self.ctx.identity().run_id_str();
        let parallelism = self.ctx.config().parallelism.max(1);

        let units = inputs
            .into_iter()
            .enumerate()
            .skip(start)
            .map(|(index, name)| WorkUnit::new(index, name));
        let mut results = stream::iter(units)
            .map(|unit| {
                let ctx = self.ctx.clone();
                async move {
                    let scope = TraceScope::for_unit(op.label(), &unit.name);
                    let span = scope.span().clone();
                    let task_unit = unit.clone();
                    let result = match tokio::task::spawn_blocking(move || span.in_scope(|| op.run(&ctx, &task_unit))).await {
                        Ok(result) => result,
                        Err(join) => Err(join.into()),
                    };
                    match &result {
                        Ok(_) => {
                            scope.complete();
                        }
                        Err(err) => scope.fail(err),
                    }
                    (unit, result)
                }
            })
            .buffered(parallelism);

        let mut artifacts: Vec<Artifact> = Vec::new();
        let mut discarded = 0;
        while let Some((unit, result)) = results.next().await {
            let artifact = result?;
            if let Artifact::Features { discarded: n, .. } = &artifact {
                discarded += n;
            }
            if checkpoint.advance_to(unit.index + 1) {
                checkpoint.run_id.clone_from(&run_id);
                store.save(&checkpoint)?;
                self.ctx.events().try_emit(
                    names::CHECKPOINT_ADVANCED,
                    Some(json!({ "stage": stage, "completed": checkpoint.completed, "total": total })),
                );
            }
            self.ctx.events().try_emit(
                names::UNIT_COMPLETED,
                Some(json!({ "stage": stage, "unit": unit.name, "index": unit.index })),
            );
            artifacts.push(artifact);
        }

        let processed = artifacts.len();
        info!(stage = %stage, processed, skipped = start, discarded, "Units processed");
        Ok(StageReport::ok(stage)
            .with_units(processed, start)
            .with_artifacts(artifacts)
            .with_data("discarded", discarded)
            .with_duration_ms(started.elapsed().as_secs_f64() * 1000.0))
    }
}

/// Returns true if a single-shot step has a complete checkpoint.
pub fn step_done(ctx: &PipelineContext, key: StageKey) -> Result<bool> {
    Ok(ctx
        .checkpoints()
        .load(&key.name())?
        .is_some_and(|cp| cp.is_complete()))
}

/// Records a single-shot step as complete.
pub fn mark_done(ctx: &PipelineContext, key: StageKey) -> Result<()> {
    let mut checkpoint = ProcessingCheckpoint::new(key.name(), ctx.identity().run_id_str(), 1);
    checkpoint.advance_to(1);
    ctx.checkpoints().save(&checkpoint)
}

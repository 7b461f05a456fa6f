//! Command-line entry points, one per stage group.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use watershed::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "watershed", version, about = "Terrain and hydrology pipeline")]
struct Cli {
    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline configuration file.
    #[arg(long, global = true, default_value = "watershed.json")]
    config: PathBuf,

    /// Overrides the configured workspace root.
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Log file. Defaults to `watershed.log` under the workspace root.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Write the log file as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_log: bool,

    /// Continue from the last checkpoint instead of starting fresh.
    #[arg(long, global = true, default_value_t = false, conflicts_with = "start_point")]
    resume: bool,

    /// Restart the first step at this unit index. Not accepted by `tile` or `all`.
    #[arg(long, global = true)]
    start_point: Option<usize>,

    /// Maximum number of tiles processed concurrently.
    #[arg(long, global = true)]
    parallelism: Option<usize>,

    /// Print the run report as JSON on stdout.
    #[arg(long, global = true, default_value_t = false)]
    report: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Split the DEM into one tile per quarter section.
    Tile,
    /// Generate, trim and name contour lines and polygons.
    Contour,
    /// Route flow, extract streams and name them.
    Hydrology,
    /// Merge every named theme.
    Merge,
    /// Run every group in order.
    All,
}

impl From<Command> for StageGroup {
    fn from(command: Command) -> Self {
        match command {
            Command::Tile => Self::Tiling,
            Command::Contour => Self::Contouring,
            Command::Hydrology => Self::Hydrology,
            Command::Merge => Self::Merge,
            Command::All => Self::All,
        }
    }
}

impl RunArgs {
    fn mode(&self) -> RunMode {
        match (self.start_point, self.resume) {
            (Some(k), _) => RunMode::From(k),
            (None, true) => RunMode::Resume,
            (None, false) => RunMode::Fresh,
        }
    }

    fn load_config(&self) -> std::result::Result<PipelineConfig, WatershedError> {
        let mut config = PipelineConfig::from_file(&self.config)?;
        if let Some(root) = &self.workspace {
            config = config.with_root(root);
        }
        if let Some(parallelism) = self.parallelism {
            config = config.with_parallelism(parallelism);
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match cli.run.load_config() {
        Ok(config) => config,
        Err(err) => {
            // No workspace root yet, so the console is the only sink.
            init_logging(&LogConfig::default())?;
            info!(config = %cli.run.config.display(), "Script Execution Start");
            let _ = run_guarded(async move { Err::<(), _>(err) }).await;
            return Ok(ExitCode::FAILURE);
        }
    };

    let log_file = cli
        .run
        .log_file
        .clone()
        .unwrap_or_else(|| config.workspace.root.join("watershed.log"));
    init_logging(
        &LogConfig::new(config.log_level.clone())
            .with_file(log_file)
            .with_json(cli.run.json_log),
    )?;

    let group = StageGroup::from(cli.command);
    let mode = cli.run.mode();
    info!(group = %group, mode = ?mode, config = %cli.run.config.display(), "Script Execution Start");

    let outcome = run_guarded(async move {
        let ctx = PipelineContext::new(config)?;
        info!(run_id = %ctx.identity().run_id, "Run context ready");
        Ok(run_group(&ctx, group, mode).await)
    })
    .await;

    let Ok(report) = outcome else {
        return Ok(ExitCode::FAILURE);
    };
    if cli.run.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    if !report.is_success() {
        return Ok(ExitCode::FAILURE);
    }
    let ambiguous = report.ambiguous_count();
    if ambiguous > 0 {
        warn!(ambiguous, "Features matched more than one quarter section");
        return Ok(ExitCode::from(2));
    }
    info!(status = %report.status(), duration_ms = report.duration_ms, "Run finished");
    Ok(ExitCode::SUCCESS)
}

//! Run command - render frames of a synthetic scene
//!
//! Every frame goes through the full pipeline (quality evaluation, depth sort,
//! batched transform and upload) against [`SimulatedCoprocessor`].

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use splatstorm_core::stats::math_debug_stats;
use splatstorm_core::{
    DebugStat, MathStatsSnapshot, PerfStats, PipelineConfig, QualityLevel, SplatPipeline,
    TransformPath,
};

use crate::scene;
use crate::sim::SimulatedCoprocessor;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Number of splats in the scene
    #[arg(short, long, default_value = "10000")]
    pub splats: usize,

    /// Frames to render
    #[arg(short, long, default_value = "120")]
    pub frames: u64,

    /// Starting quality level (fallback, low, medium, high, ultra)
    #[arg(short, long)]
    pub quality: Option<QualityLevel>,

    /// Use the fixed-point transform path
    #[arg(long)]
    pub fixed: bool,

    /// Target frame rate for the quality controller
    #[arg(long)]
    pub target_fps: Option<f32>,

    /// Disable adaptive quality
    #[arg(long)]
    pub no_adaptive: bool,

    /// Simulated coprocessor time per batch, in microseconds
    #[arg(long, default_value = "50")]
    pub busy_us: u64,

    /// Scene seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Orbit the camera, forcing a sort every frame
    #[arg(long)]
    pub orbit: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// End-of-run numbers
#[derive(Debug, Serialize)]
struct RunSummary {
    frames: u64,
    final_quality: QualityLevel,
    upgrades: u32,
    downgrades: u32,
    full_sorts: u64,
    skipped_sorts: u64,
    batches_sent: u64,
    splats_sent: u64,
    coprocessor_resets: u64,
    perf: PerfStats,
    math: MathStatsSnapshot,
}

fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::load_default().context("Failed to load default config")?,
    };

    if let Some(quality) = args.quality {
        config.initial_quality = quality;
    }
    if let Some(fps) = args.target_fps {
        config.target_fps = fps;
    }
    if args.fixed {
        config.transform_path = TransformPath::Fixed;
    }
    if args.no_adaptive {
        config.adaptive_quality = false;
    }
    config.validate()?;
    Ok(config)
}

/// Execute the run command
pub fn execute(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let mut splats = scene::generate(args.splats, args.seed);
    let coprocessor = SimulatedCoprocessor::new(Duration::from_micros(args.busy_us));
    let mut pipeline =
        SplatPipeline::new(config, coprocessor).context("Failed to create pipeline")?;

    tracing::info!(
        splats = args.splats,
        frames = args.frames,
        orbit = args.orbit,
        "Starting run"
    );

    for frame in 0..args.frames {
        if args.orbit {
            pipeline.notify_camera_moved();
        }
        let mvp = scene::camera(frame, args.orbit);
        let report = pipeline
            .render_frame(&mut splats, &mvp)
            .with_context(|| format!("Frame {frame} failed"))?;
        if report.quality_change.is_change() {
            tracing::info!(frame = report.frame, change = ?report.quality_change, "Quality changed");
        }
    }

    let sort = pipeline.sort_stats();
    let quality = pipeline.quality_state();
    let summary = RunSummary {
        frames: args.frames,
        final_quality: quality.level(),
        upgrades: quality.upgrades(),
        downgrades: quality.downgrades(),
        full_sorts: sort.full_sorts,
        skipped_sorts: sort.skipped_sorts,
        batches_sent: pipeline.coprocessor().batches(),
        splats_sent: pipeline.coprocessor().splats(),
        coprocessor_resets: pipeline.coprocessor().resets(),
        perf: pipeline.perf_stats(),
        math: pipeline.math_stats(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut rows = vec![
        DebugStat::number("Final quality", summary.final_quality),
        DebugStat::number("Upgrades", summary.upgrades),
        DebugStat::number("Downgrades", summary.downgrades),
        DebugStat::number("Splats sent", summary.splats_sent),
        DebugStat::number("Coprocessor resets", summary.coprocessor_resets),
    ];
    rows.extend(summary.perf.debug_stats());
    rows.extend(sort.debug_stats());
    rows.extend(math_debug_stats(&summary.math));

    println!("Splat pipeline run ({} splats)", args.splats);
    for row in rows {
        println!("  {row}");
    }
    Ok(())
}

//! Per-frame splat pipeline
//!
//! [`SplatPipeline`] owns every piece of per-pipeline state: arithmetic
//! counters, lookup tables, the depth sorter, the batch scheduler and the
//! performance monitor. Nothing is global, so independent pipelines can run
//! side by side.
//!
//! One [`render_frame`](SplatPipeline::render_frame) call runs:
//!
//! 1. Quality evaluation from the FPS history (may change the batch size)
//! 2. Depth sort, skipped when the view is unchanged
//! 3. Batched transform + upload, waiting for the coprocessor after each batch
//! 4. Frame timing, which feeds the next quality evaluation

use std::time::{Duration, Instant};

use glam::Mat4;
use splatstorm_shared::{FixedMath, MathStatsSnapshot, PackedSplat};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::coprocessor::Coprocessor;
use crate::lut::LookupTables;
use crate::perf::{PerfMonitor, PerfStats, WaitOutcome};
use crate::scheduler::{
    BatchPlan, BatchScheduler, QualityChange, QualityLevel, QualityState, SchedulerError,
};
use crate::sort::{DepthSorter, SortAlgorithm, SortError, SortOutcome, SortStats};
use crate::transform::TransformPath;

#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Sort(#[from] SortError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PipelineError {
    /// Negative status code of the failing subsystem
    pub fn status_code(&self) -> i32 {
        match self {
            Self::Sort(e) => e.status_code(),
            Self::Scheduler(e) => e.status_code(),
            Self::Config(_) => -20,
        }
    }
}

/// Everything that happened during one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Level the frame was rendered at
    pub quality: QualityLevel,
    pub quality_change: QualityChange,
    pub sort: SortOutcome,
    pub plan: BatchPlan,
    pub batches: usize,
    pub splats: usize,
    /// Timed-out waits; the frame still completed
    pub timeouts: usize,
    pub long_waits: usize,
    pub frame_time: Duration,
    pub fps: f32,
}

pub struct SplatPipeline<C: Coprocessor> {
    config: PipelineConfig,
    math: FixedMath,
    tables: LookupTables,
    sorter: Option<DepthSorter>,
    scheduler: BatchScheduler,
    perf: PerfMonitor,
    coprocessor: C,
    frame: u64,
    /// Host feeds the FPS history; frame timing no longer does
    external_fps: bool,
}

impl<C: Coprocessor> SplatPipeline<C> {
    /// Validate `config`, generate lookup tables and allocate the batch
    /// buffer. The sorter is sized on the first frame or by
    /// [`init_sort`](Self::init_sort).
    pub fn new(config: PipelineConfig, coprocessor: C) -> Result<Self, PipelineError> {
        config.validate()?;

        let math = FixedMath::new();
        let mut tables = LookupTables::new();
        tables.generate_all(&math);

        let scheduler = BatchScheduler::new(&config)?;
        let perf = PerfMonitor::new(config.long_wait(), config.warning_escalation);

        let external_fps = config.external_fps;
        info!(
            target_fps = config.target_fps,
            quality = %config.initial_quality,
            adaptive = config.adaptive_quality,
            sort = %config.sort_algorithm,
            transform = %config.transform_path,
            external_fps,
            "Splat pipeline created"
        );

        Ok(Self {
            config,
            math,
            tables,
            sorter: None,
            scheduler,
            perf,
            coprocessor,
            frame: 0,
            external_fps,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Frames rendered so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // ------------------------------------------------------------------------
    // Sorting
    // ------------------------------------------------------------------------

    /// (Re)allocate sorter scratch for `count` splats.
    ///
    /// On failure the previous sorter is dropped, and sorting reports
    /// [`SortError::NotInitialized`] until a later call succeeds.
    pub fn init_sort(&mut self, count: usize) -> Result<(), SortError> {
        self.sorter = None;
        let mut sorter = DepthSorter::new(count, self.config.sort_algorithm)?;
        sorter.set_frame(self.frame);
        self.sorter = Some(sorter);
        Ok(())
    }

    /// Sort `splats` outside of [`render_frame`](Self::render_frame).
    pub fn run_sort(&mut self, splats: &mut [PackedSplat]) -> Result<SortOutcome, SortError> {
        self.sorter
            .as_mut()
            .ok_or(SortError::NotInitialized)?
            .run(splats)
    }

    pub fn notify_camera_moved(&mut self) {
        if let Some(sorter) = self.sorter.as_mut() {
            sorter.notify_camera_moved();
        }
    }

    /// Stats of the current sorter, zeroed before the first one exists
    pub fn sort_stats(&self) -> SortStats {
        self.sorter
            .as_ref()
            .map(DepthSorter::stats)
            .unwrap_or_default()
    }

    pub fn sorter(&self) -> Option<&DepthSorter> {
        self.sorter.as_ref()
    }

    /// Used from the next full sort on
    pub fn set_sort_algorithm(&mut self, algorithm: SortAlgorithm) {
        self.config.sort_algorithm = algorithm;
        if let Some(sorter) = self.sorter.as_mut() {
            sorter.set_algorithm(algorithm);
        }
    }

    // ------------------------------------------------------------------------
    // Quality
    // ------------------------------------------------------------------------

    pub fn set_quality(&mut self, level: QualityLevel) -> QualityChange {
        self.scheduler.set_quality(level)
    }

    pub fn quality(&self) -> QualityLevel {
        self.scheduler.quality()
    }

    pub fn quality_state(&self) -> &QualityState {
        self.scheduler.quality_state()
    }

    pub fn set_adaptive(&mut self, adaptive: bool) {
        self.config.adaptive_quality = adaptive;
        self.scheduler.set_adaptive(adaptive);
    }

    pub fn set_transform_path(&mut self, path: TransformPath) {
        self.config.transform_path = path;
        self.scheduler.set_transform_path(path);
    }

    /// Feed a frame rate measured by the host (e.g. vsync-locked presentation).
    ///
    /// From the first sample on, the FPS history and the throttle only see
    /// host samples; [`render_frame`](Self::render_frame) keeps timing frames
    /// for [`FrameReport::fps`] and the frame-time average.
    pub fn record_fps_sample(&mut self, fps: f32) {
        if !self.external_fps {
            debug!("Host frame rate samples take over from frame timing");
            self.external_fps = true;
        }
        self.perf.record_fps_sample(fps);
        self.scheduler.record_fps(fps);
    }

    /// Frame rate comes from [`record_fps_sample`](Self::record_fps_sample)
    pub fn uses_external_fps(&self) -> bool {
        self.external_fps
    }

    // ------------------------------------------------------------------------
    // Frame
    // ------------------------------------------------------------------------

    /// Sort, transform and upload one frame.
    ///
    /// `splats` may be reordered by the sort but positions are never
    /// overwritten; transforms happen in the batch buffer. A change in splat
    /// count re-initializes the sorter. Coprocessor timeouts do not fail the
    /// frame.
    pub fn render_frame(
        &mut self,
        splats: &mut [PackedSplat],
        mvp: &Mat4,
    ) -> Result<FrameReport, PipelineError> {
        let start = Instant::now();
        self.frame += 1;

        let quality_change = self.scheduler.begin_frame();

        match self.sorter.as_ref().map(DepthSorter::count) {
            Some(count) if count == splats.len() => {}
            Some(count) => {
                warn!(
                    old = count,
                    new = splats.len(),
                    "Splat count changed, re-initializing sorter"
                );
                self.init_sort(splats.len())?;
            }
            None => self.init_sort(splats.len())?,
        }
        let sorter = self.sorter.as_mut().ok_or(SortError::NotInitialized)?;
        sorter.set_frame(self.frame);
        let sort = sorter.run(splats)?;

        let quality = self.scheduler.quality();
        let perf = &mut self.perf;
        let mut long_waits = 0;
        let run = self.scheduler.process(
            splats,
            mvp,
            &self.math,
            &mut self.coprocessor,
            |result| {
                if perf.record_wait(result) == WaitOutcome::Long {
                    long_waits += 1;
                }
            },
        );

        let frame_time = start.elapsed();
        let fps = if self.external_fps {
            self.perf
                .record_frame_totals(frame_time, run.splats, run.batches)
        } else {
            let fps = self.perf.record_frame(frame_time, run.splats, run.batches);
            self.scheduler.record_fps(fps);
            fps
        };

        debug!(
            frame = self.frame,
            %quality,
            ?sort,
            batches = run.batches,
            splats = run.splats,
            throttled = run.plan.throttled,
            timeouts = run.timeouts,
            fps,
            "Frame rendered"
        );

        Ok(FrameReport {
            frame: self.frame,
            quality,
            quality_change,
            sort,
            plan: run.plan,
            batches: run.batches,
            splats: run.splats,
            timeouts: run.timeouts,
            long_waits,
            frame_time,
            fps,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn perf_stats(&self) -> PerfStats {
        self.perf.stats()
    }

    pub fn math(&self) -> &FixedMath {
        &self.math
    }

    pub fn math_stats(&self) -> MathStatsSnapshot {
        self.math.stats()
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Regenerate tables; a no-op unless they were reset
    pub fn generate_tables(&mut self) -> bool {
        self.tables.generate_all(&self.math)
    }

    pub fn coprocessor(&self) -> &C {
        &self.coprocessor
    }

    pub fn coprocessor_mut(&mut self) -> &mut C {
        &mut self.coprocessor
    }

    pub fn into_coprocessor(self) -> C {
        self.coprocessor
    }
}

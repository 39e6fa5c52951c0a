//! Adaptive quality and batch scheduling
//!
//! - [`QualityState`] - picks a [`QualityLevel`] from the rolling FPS average
//! - [`BatchBuffer`] - fixed-capacity staging memory for one batch
//! - [`BatchScheduler`] - splits the per-frame splat budget into batches, then
//!   transforms and hands each one to the [`Coprocessor`] in order
//!
//! Level changes and batch-size reconfiguration only happen in
//! [`BatchScheduler::begin_frame`] and [`BatchScheduler::set_quality`], never
//! while batches are in flight.

mod batch;
mod quality;

use std::time::Duration;

use glam::Mat4;
use splatstorm_shared::constants::MAX_BATCH_SIZE;
use splatstorm_shared::{FixedMath, PackedSplat};
use thiserror::Error;
use tracing::{debug, trace};

pub use batch::BatchBuffer;
pub use quality::{
    FPS_HISTORY_LEN, FpsHistory, QualityChange, QualityLevel, QualityState, QualityThresholds,
};

use crate::config::PipelineConfig;
use crate::coprocessor::{Completed, Coprocessor, TimedOut};
use crate::transform::{TransformPath, transform_batch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("failed to allocate batch buffer for {capacity} splats")]
    BatchAlloc { capacity: usize },
}

impl SchedulerError {
    pub fn status_code(&self) -> i32 {
        match self {
            Self::BatchAlloc { .. } => -10,
        }
    }
}

/// How one frame's splats will be cut into batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    /// Splats processed this frame
    pub splat_budget: usize,
    /// Effective batch size after throttling
    pub batch_size: usize,
    /// Batch size was halved because the last frame ran slow
    pub throttled: bool,
}

impl BatchPlan {
    pub fn batch_count(&self) -> usize {
        self.splat_budget.div_ceil(self.batch_size)
    }
}

/// What [`BatchScheduler::process`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRun {
    pub plan: BatchPlan,
    pub batches: usize,
    pub splats: usize,
    pub timeouts: usize,
}

pub struct BatchScheduler {
    quality: QualityState,
    buffer: BatchBuffer,
    transform_path: TransformPath,
    timeout: Duration,
    throttle_ratio: f32,
    current_fps: f32,
}

impl BatchScheduler {
    pub fn new(config: &PipelineConfig) -> Result<Self, SchedulerError> {
        let quality = QualityState::new(
            config.initial_quality,
            config.target_fps,
            config.adaptive_quality,
        )
        .with_thresholds(QualityThresholds {
            upgrade: config.upgrade_ratio,
            downgrade: config.downgrade_ratio,
        });

        let mut buffer = BatchBuffer::new(MAX_BATCH_SIZE)?;
        buffer.set_max_batch_size(quality.level().batch_size());

        Ok(Self {
            quality,
            buffer,
            transform_path: config.transform_path,
            timeout: config.coprocessor_timeout(),
            throttle_ratio: config.throttle_ratio,
            current_fps: 0.0,
        })
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality.level()
    }

    pub fn quality_state(&self) -> &QualityState {
        &self.quality
    }

    pub fn max_batch_size(&self) -> usize {
        self.buffer.max_batch_size()
    }

    pub fn transform_path(&self) -> TransformPath {
        self.transform_path
    }

    pub fn set_transform_path(&mut self, path: TransformPath) {
        self.transform_path = path;
    }

    pub fn set_adaptive(&mut self, adaptive: bool) {
        self.quality.set_adaptive(adaptive);
    }

    /// Manual level change. Call between frames.
    pub fn set_quality(&mut self, level: QualityLevel) -> QualityChange {
        let change = self.quality.set_level(level);
        self.reconfigure();
        change
    }

    /// Run the adaptive evaluation and resize batches for the new level.
    pub fn begin_frame(&mut self) -> QualityChange {
        let change = self.quality.evaluate();
        if change.is_change() {
            self.reconfigure();
        }
        change
    }

    fn reconfigure(&mut self) {
        let size = self
            .buffer
            .set_max_batch_size(self.quality.level().batch_size());
        debug!(level = %self.quality.level(), max_batch_size = size, "Batch size reconfigured");
    }

    /// Feed a measured frame rate into the history and the throttle.
    pub fn record_fps(&mut self, fps: f32) {
        self.current_fps = fps;
        self.quality.record_fps(fps);
    }

    pub fn current_fps(&self) -> f32 {
        self.current_fps
    }

    /// Budget and batch size for `count` available splats.
    ///
    /// Throttling only applies once a frame rate has been measured and halves
    /// the batch size for this frame alone.
    pub fn plan(&self, count: usize) -> BatchPlan {
        let max_batch = self.buffer.max_batch_size();
        let target = self.quality.target_fps();
        let throttled = self.current_fps > 0.0 && self.current_fps < target * self.throttle_ratio;
        let batch_size = if throttled {
            (max_batch / 2).max(1)
        } else {
            max_batch
        };

        BatchPlan {
            splat_budget: count.min(self.quality.level().max_splats()),
            batch_size,
            throttled,
        }
    }

    /// Transform and send `splats` batch by batch.
    ///
    /// Each batch is copied into the staging buffer, so `splats` itself is
    /// never modified. After every send the scheduler waits for completion and
    /// reports the result to `on_wait`; a timeout resets the coprocessor and
    /// processing moves on to the next batch.
    pub fn process<C: Coprocessor>(
        &mut self,
        splats: &[PackedSplat],
        mvp: &Mat4,
        math: &FixedMath,
        coprocessor: &mut C,
        mut on_wait: impl FnMut(Result<Completed, TimedOut>),
    ) -> BatchRun {
        let plan = self.plan(splats.len());
        let mut run = BatchRun {
            plan,
            batches: 0,
            splats: 0,
            timeouts: 0,
        };
        if plan.splat_budget == 0 {
            return run;
        }

        for chunk in splats[..plan.splat_budget].chunks(plan.batch_size) {
            let batch = self.buffer.fill(chunk);
            transform_batch(self.transform_path, batch, mvp, math);
            coprocessor.send_batch(batch);
            trace!(index = run.batches, len = batch.len(), "Batch sent");

            let result = coprocessor.wait_for_completion(self.timeout);
            if result.is_err() {
                run.timeouts += 1;
                coprocessor.reset();
            }
            on_wait(result);

            run.batches += 1;
            run.splats += chunk.len();
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coprocessor::NullCoprocessor;

    fn scheduler(level: QualityLevel) -> BatchScheduler {
        let config = PipelineConfig {
            initial_quality: level,
            ..Default::default()
        };
        BatchScheduler::new(&config).unwrap()
    }

    #[test]
    fn test_plan_caps_budget_by_quality() {
        let s = scheduler(QualityLevel::Low);
        let plan = s.plan(10_000);
        assert_eq!(plan.splat_budget, 4_000);
        assert_eq!(plan.batch_size, 64);
        assert!(!plan.throttled);

        assert_eq!(s.plan(10).splat_budget, 10);
    }

    #[test]
    fn test_throttle_is_per_frame() {
        let mut s = scheduler(QualityLevel::High);
        s.record_fps(30.0);
        let plan = s.plan(1000);
        assert!(plan.throttled);
        assert_eq!(plan.batch_size, 128);
        // Configured size untouched
        assert_eq!(s.max_batch_size(), 256);

        s.record_fps(59.0);
        assert_eq!(s.plan(1000).batch_size, 256);
    }

    #[test]
    fn test_process_batches_in_order() {
        let mut s = scheduler(QualityLevel::High);
        let splats = vec![PackedSplat::default(); 1000];
        let mut null = NullCoprocessor::new();
        let mut waits = 0;
        let run = s.process(&splats, &Mat4::IDENTITY, &FixedMath::new(), &mut null, |r| {
            assert!(r.is_ok());
            waits += 1;
        });
        assert_eq!(run.batches, 4);
        assert_eq!(run.splats, 1000);
        assert_eq!(waits, 4);
        assert_eq!(null.batches(), 4);
        assert_eq!(run.plan.batch_count(), 4);
    }

    #[test]
    fn test_process_leaves_source_untouched() {
        let mut s = scheduler(QualityLevel::Medium);
        let splats = vec![PackedSplat::default(); 3];
        let before = splats.clone();
        let mvp = Mat4::from_translation(glam::Vec3::new(5.0, 5.0, 5.0));
        s.process(&splats, &mvp, &FixedMath::new(), &mut NullCoprocessor::new(), |_| {});
        assert_eq!(splats, before);
    }

    #[test]
    fn test_empty_frame_sends_nothing() {
        let mut s = scheduler(QualityLevel::High);
        let mut null = NullCoprocessor::new();
        let run = s.process(&[], &Mat4::IDENTITY, &FixedMath::new(), &mut null, |_| {});
        assert_eq!(run.batches, 0);
        assert_eq!(null.batches(), 0);
    }

    #[test]
    fn test_level_change_reconfigures_batch_size() {
        let mut s = scheduler(QualityLevel::High);
        s.set_quality(QualityLevel::Ultra);
        assert_eq!(s.max_batch_size(), 512);

        for _ in 0..FPS_HISTORY_LEN {
            s.record_fps(10.0);
        }
        assert!(s.begin_frame().is_change());
        assert_eq!(s.quality(), QualityLevel::High);
        assert_eq!(s.max_batch_size(), 256);
    }

    #[test]
    fn test_status_code() {
        assert_eq!(SchedulerError::BatchAlloc { capacity: 1 }.status_code(), -10);
    }
}

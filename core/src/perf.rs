//! Frame timing and coprocessor wait accounting

use std::time::Duration;

use serde::Serialize;
use tracing::{error, warn};

use crate::coprocessor::{Completed, TimedOut};
use crate::scheduler::FpsHistory;
use crate::stats::DebugStat;

/// Aggregated performance numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerfStats {
    /// Mean of the rolling FPS window
    pub avg_fps: f32,
    pub avg_frame_time_ms: f32,
    pub total_frames: u64,
    /// Splats processed per frame, averaged over all frames
    pub avg_splat_count: f32,
    pub current_fps: f32,
    pub total_batches: u64,
    /// Coprocessor timeouts plus long waits
    pub warnings: u32,
}

impl PerfStats {
    pub fn debug_stats(&self) -> Vec<DebugStat> {
        vec![
            DebugStat::new("Average FPS", format!("{:.1}", self.avg_fps)),
            DebugStat::new("Current FPS", format!("{:.1}", self.current_fps)),
            DebugStat::millis("Average frame time", self.avg_frame_time_ms),
            DebugStat::number("Frames", self.total_frames),
            DebugStat::new("Average splats", format!("{:.0}", self.avg_splat_count)),
            DebugStat::number("Batches", self.total_batches),
            DebugStat::number("Warnings", self.warnings),
        ]
    }
}

/// Classification of one coprocessor wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Ok,
    /// Completed, but slower than the long-wait threshold
    Long,
    TimedOut,
}

pub struct PerfMonitor {
    current_fps: f32,
    history: FpsHistory,
    total_frames: u64,
    total_frame_time: Duration,
    total_splats: u64,
    total_batches: u64,
    warnings: u32,
    long_wait: Duration,
    escalation: u32,
}

impl PerfMonitor {
    pub fn new(long_wait: Duration, escalation: u32) -> Self {
        Self {
            current_fps: 0.0,
            history: FpsHistory::default(),
            total_frames: 0,
            total_frame_time: Duration::ZERO,
            total_splats: 0,
            total_batches: 0,
            warnings: 0,
            long_wait,
            escalation: escalation.max(1),
        }
    }

    /// Account a frame that took `frame_time` and push its rate into the
    /// FPS history.
    pub fn record_frame(&mut self, frame_time: Duration, splats: usize, batches: usize) -> f32 {
        let fps = self.record_frame_totals(frame_time, splats, batches);
        self.record_fps_sample(fps);
        fps
    }

    /// Like [`record_frame`](Self::record_frame), but leaves the FPS history
    /// to samples fed through [`record_fps_sample`](Self::record_fps_sample).
    pub fn record_frame_totals(
        &mut self,
        frame_time: Duration,
        splats: usize,
        batches: usize,
    ) -> f32 {
        self.total_frames += 1;
        self.total_frame_time += frame_time;
        self.total_splats += splats as u64;
        self.total_batches += batches as u64;

        let ms = frame_time.as_secs_f32() * 1000.0;
        if ms > 0.0 { 1000.0 / ms } else { 0.0 }
    }

    /// Feed an externally measured frame rate.
    pub fn record_fps_sample(&mut self, fps: f32) {
        self.current_fps = fps;
        self.history.push(fps);
    }

    pub fn current_fps(&self) -> f32 {
        self.current_fps
    }

    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    /// Count a timeout or long wait. Never fails.
    pub fn record_wait(&mut self, result: Result<Completed, TimedOut>) -> WaitOutcome {
        match result {
            Ok(Completed { waited }) if waited > self.long_wait => {
                warn!(
                    waited_ms = waited.as_secs_f32() * 1000.0,
                    budget_ms = self.long_wait.as_secs_f32() * 1000.0,
                    "Coprocessor wait exceeded budget"
                );
                self.add_warning();
                WaitOutcome::Long
            }
            Ok(_) => WaitOutcome::Ok,
            Err(TimedOut { waited }) => {
                warn!(
                    waited_ms = waited.as_secs_f32() * 1000.0,
                    warnings = self.warnings + 1,
                    "Coprocessor completion timeout"
                );
                self.add_warning();
                WaitOutcome::TimedOut
            }
        }
    }

    fn add_warning(&mut self) {
        self.warnings += 1;
        if self.warnings % self.escalation == 0 {
            error!(
                warnings = self.warnings,
                "Coprocessor keeps stalling, frames are degraded"
            );
        }
    }

    pub fn stats(&self) -> PerfStats {
        let frames = self.total_frames.max(1);
        PerfStats {
            avg_fps: self.history.average().unwrap_or(0.0),
            avg_frame_time_ms: self.total_frame_time.as_secs_f32() * 1000.0 / frames as f32,
            total_frames: self.total_frames,
            avg_splat_count: self.total_splats as f32 / frames as f32,
            current_fps: self.current_fps,
            total_batches: self.total_batches,
            warnings: self.warnings,
        }
    }
}

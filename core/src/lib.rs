//! Splatstorm Core - adaptive splat rendering pipeline
//!
//! Drives large point-splat scenes through a fixed-throughput coprocessor at a
//! target frame rate.
//!
//! # Architecture
//!
//! - [`LookupTables`] - precomputed fixed-point tables built once at startup
//! - [`DepthSorter`] - temporal-coherent back-to-front ordering
//! - [`BatchScheduler`] - quality-driven batching, transform and upload
//! - [`Coprocessor`] - the upload/completion collaborator implemented by hosts
//! - [`SplatPipeline`] - composes all of the above into one per-frame call

pub mod config;
pub mod coprocessor;
pub mod lut;
pub mod perf;
pub mod pipeline;
pub mod scheduler;
pub mod sort;
pub mod stats;
pub mod transform;

pub use config::{ConfigError, PipelineConfig};
pub use coprocessor::{Completed, Coprocessor, NullCoprocessor, TimedOut, poll_until_idle};
pub use lut::{LookupTables, LutMemory};
pub use perf::{PerfMonitor, PerfStats, WaitOutcome};
pub use pipeline::{FrameReport, PipelineError, SplatPipeline};
pub use scheduler::{
    BatchPlan, BatchScheduler, QualityChange, QualityLevel, QualityState, SchedulerError,
};
pub use sort::{
    DepthKey, DepthSorter, SortAlgorithm, SortError, SortOutcome, SortStats, bucket_sort,
    quick_sort, radix_sort, sort_indices,
};
pub use stats::DebugStat;
pub use transform::TransformPath;

// Re-export shared types for convenience
pub use splatstorm_shared::{Fixed16, FixedMath, MathStatsSnapshot, PackedSplat, Splat};

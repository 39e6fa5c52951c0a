//! Shared types for the Splatstorm renderer.
//!
//! - [`fixed`] - saturating Q16.16 arithmetic with diagnostic counters
//! - [`splat`] - splat primitives and the 64-byte transfer layout
//! - [`constants`] - table and transfer geometry

pub mod constants;
pub mod fixed;
pub mod splat;

pub use fixed::{Fixed8, Fixed16, FixedMath, MathStats, MathStatsSnapshot};
pub use splat::{PackedSplat, Splat, SplatViews, pack_color_rgba8, unpack_color_rgba8};

//! Table and transfer geometry shared by the renderer and its tools.
//!
//! Downstream math indexes the lookup tables by these fixed dimensions, so they
//! are part of the wire contract and must not drift.

// ============================================================================
// Lookup Tables
// ============================================================================

/// Entries in each 1D table (exp, sqrt, recip, sin, cos)
pub const LUT_SIZE: usize = 256;

/// Squared cutoff radius of the Gaussian; the exp table spans `[0, LUT_THRESHOLD_SQ]`
pub const LUT_THRESHOLD_SQ: f32 = 9.0;

/// Upper bound of the sqrt and reciprocal table domains
pub const MAX_EIG_VAL: f32 = 10.0;

/// Resolution per axis of the 2D covariance-inverse table
pub const COV_INV_LUT_RES: usize = 128;

/// Lower bound applied to the covariance determinant before inverting.
///
/// Tunable; it is a numeric guard, not a physical quantity.
pub const COV_DET_FLOOR: f32 = 0.001;

/// Texels per side of one footprint cell
pub const FOOTPRINT_RES: usize = 32;

/// Footprint cells per atlas side
pub const ATLAS_CELLS: usize = 8;

/// Texels per side of the footprint atlas
pub const ATLAS_SIZE: usize = FOOTPRINT_RES * ATLAS_CELLS;

/// Theta/phi resolution of the spherical-harmonics lighting table
pub const SH_LUT_RES: usize = 256;

// ============================================================================
// Sorting
// ============================================================================

/// Buckets used by the depth bucket sort
pub const NUM_DEPTH_BUCKETS: usize = 256;

/// Minimum depth range before bucketing (avoids division by zero)
pub const DEPTH_EPSILON: f32 = 0.001;

// ============================================================================
// Transfer
// ============================================================================

/// Cache line size; one [`PackedSplat`](crate::PackedSplat) fills exactly one line
pub const CACHE_LINE: usize = 64;

/// Alignment required for DMA-eligible batch memory
pub const DMA_ALIGNMENT: usize = 128;

/// Largest batch any quality level uses
pub const MAX_BATCH_SIZE: usize = 512;

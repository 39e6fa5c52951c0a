//! Back-to-front depth ordering
//!
//! - [`DepthSorter`] - temporal-coherent bucket sort that reorders the live
//!   splat buffer in place and skips work while the view is static
//! - [`bucket_sort`] / [`radix_sort`] / [`quick_sort`] - index-based total
//!   orders that leave the splat payload untouched
//!
//! Every algorithm emits farther splats (larger depth) first, which is what
//! over-blending of translucent splats needs.

mod bucket;
mod quick;
mod radix;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use splatstorm_shared::{PackedSplat, Splat};
use thiserror::Error;

pub use bucket::{DepthSorter, SortOutcome, SortStats, bucket_sort};
pub use quick::quick_sort;
pub use radix::{depth_key, radix_sort};

/// Anything with a view depth.
pub trait DepthKey {
    fn depth(&self) -> f32;
}

impl DepthKey for PackedSplat {
    #[inline]
    fn depth(&self) -> f32 {
        self.position[2]
    }
}

impl DepthKey for Splat {
    #[inline]
    fn depth(&self) -> f32 {
        self.position[2]
    }
}

impl DepthKey for f32 {
    #[inline]
    fn depth(&self) -> f32 {
        *self
    }
}

/// Which ordering algorithm the sorter runs on a full sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortAlgorithm {
    /// Bucketed reorder of the splat buffer
    #[default]
    Bucket,
    /// 4-pass LSD radix sort over integerized depth keys
    Radix,
    /// Middle-pivot quicksort
    Quick,
}

impl SortAlgorithm {
    pub const ALL: [SortAlgorithm; 3] = [Self::Bucket, Self::Radix, Self::Quick];

    pub fn name(self) -> &'static str {
        match self {
            Self::Bucket => "bucket",
            Self::Radix => "radix",
            Self::Quick => "quick",
        }
    }
}

impl fmt::Display for SortAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SortAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bucket" => Ok(Self::Bucket),
            "radix" => Ok(Self::Radix),
            "quick" | "quicksort" => Ok(Self::Quick),
            other => Err(format!("unknown sort algorithm '{other}'")),
        }
    }
}

/// Sorter failures.
///
/// Allocation failures abort initialization; the sorter is unusable until
/// [`DepthSorter::new`] succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SortError {
    #[error("failed to allocate depth scratch for {count} splats")]
    DepthAlloc { count: usize },
    #[error("failed to allocate bucket scratch for {count} splats")]
    BucketAlloc { count: usize },
    #[error("failed to allocate temporary sort buffer for {count} splats")]
    TempAlloc { count: usize },
    #[error("failed to allocate index scratch for {count} splats")]
    IndexAlloc { count: usize },
    #[error("sorter has not been initialized")]
    NotInitialized,
    #[error("sorter sized for {expected} splats, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

impl SortError {
    /// Negative status code, distinct per failure site
    pub fn status_code(&self) -> i32 {
        match self {
            Self::DepthAlloc { .. } => -1,
            Self::BucketAlloc { .. } => -2,
            Self::TempAlloc { .. } => -3,
            Self::IndexAlloc { .. } => -4,
            Self::NotInitialized => -5,
            Self::CountMismatch { .. } => -6,
        }
    }
}

/// Identity indices `0..len` ordered back-to-front with `algorithm`.
pub fn sort_indices<T: DepthKey>(items: &[T], algorithm: SortAlgorithm) -> Vec<u32> {
    let mut indices: Vec<u32> = (0..items.len() as u32).collect();
    match algorithm {
        SortAlgorithm::Bucket => {
            bucket_sort(items, &mut indices);
        }
        SortAlgorithm::Radix => radix_sort(items, &mut indices),
        SortAlgorithm::Quick => quick_sort(items, &mut indices),
    }
    indices
}

/// True if `indices` visits `items` farthest-first.
pub fn is_back_to_front<T: DepthKey>(items: &[T], indices: &[u32]) -> bool {
    indices
        .windows(2)
        .all(|w| items[w[0] as usize].depth() >= items[w[1] as usize].depth())
}

//! Temporal-coherent bucket sort over the live splat buffer

use std::time::{Duration, Instant};

use splatstorm_shared::PackedSplat;
use splatstorm_shared::constants::{DEPTH_EPSILON, NUM_DEPTH_BUCKETS};
use tracing::{debug, trace};

use super::radix::radix_sort_with;
use super::{DepthKey, SortAlgorithm, SortError, quick_sort};
use crate::stats::DebugStat;

/// Result of one [`DepthSorter::run`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOutcome {
    /// Full reorder performed
    Sorted,
    /// Previous order reused (static view)
    Skipped,
}

/// Sorter statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SortStats {
    /// Frame of the last full sort
    pub last_sort_frame: u64,
    /// Non-empty buckets in the last bucket sort (0 for index algorithms)
    pub buckets_used: usize,
    /// Wall-clock time of the last full sort
    pub sort_time: Duration,
    pub full_sorts: u64,
    pub skipped_sorts: u64,
    /// (min, max) depth seen by the last full sort
    pub depth_range: (f32, f32),
}

impl SortStats {
    pub fn debug_stats(&self) -> Vec<DebugStat> {
        vec![
            DebugStat::number("Last sort frame", self.last_sort_frame),
            DebugStat::number("Buckets used", self.buckets_used),
            DebugStat::millis("Sort time", self.sort_time.as_secs_f32() * 1000.0),
            DebugStat::number("Full sorts", self.full_sorts),
            DebugStat::number("Skipped sorts", self.skipped_sorts),
            DebugStat::new(
                "Depth range",
                format!("{:.3} .. {:.3}", self.depth_range.0, self.depth_range.1),
            ),
        ]
    }
}

/// Depth sorter bound to a fixed splat count.
///
/// Scratch buffers are allocated once in [`DepthSorter::new`] and never grow.
/// A different splat count needs a new sorter.
pub struct DepthSorter {
    count: usize,
    algorithm: SortAlgorithm,
    /// One depth per splat
    depths: Vec<f32>,
    /// Bucket per splat; doubles as radix key storage
    buckets: Vec<u32>,
    /// Output order as source indices
    order: Vec<u32>,
    order_scratch: Vec<u32>,
    temp: Vec<PackedSplat>,
    histogram: [u32; NUM_DEPTH_BUCKETS],
    current_frame: u64,
    camera_moved: bool,
    stats: SortStats,
}

fn try_alloc<T>(count: usize, err: SortError) -> Result<Vec<T>, SortError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(count).map_err(|_| err)?;
    Ok(buf)
}

impl DepthSorter {
    pub fn new(count: usize, algorithm: SortAlgorithm) -> Result<Self, SortError> {
        let depths = try_alloc(count, SortError::DepthAlloc { count })?;
        let buckets = try_alloc(count, SortError::BucketAlloc { count })?;
        let temp = try_alloc(count, SortError::TempAlloc { count })?;
        let order = try_alloc(count, SortError::IndexAlloc { count })?;
        let mut order_scratch = try_alloc(count, SortError::IndexAlloc { count })?;
        order_scratch.resize(count, 0);

        debug!(count, %algorithm, "Depth sorter initialized");

        Ok(Self {
            count,
            algorithm,
            depths,
            buckets,
            order,
            order_scratch,
            temp,
            histogram: [0; NUM_DEPTH_BUCKETS],
            current_frame: 0,
            // Forces the first sort
            camera_moved: true,
            stats: SortStats::default(),
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn algorithm(&self) -> SortAlgorithm {
        self.algorithm
    }

    /// Takes effect on the next full sort; does not force one.
    pub fn set_algorithm(&mut self, algorithm: SortAlgorithm) {
        self.algorithm = algorithm;
    }

    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Advance the frame counter. Called once per rendered frame.
    pub fn advance_frame(&mut self) -> u64 {
        self.current_frame += 1;
        self.current_frame
    }

    /// Carry a frame counter over from a previous sorter
    pub fn set_frame(&mut self, frame: u64) {
        self.current_frame = frame;
    }

    /// Force a full sort on the next [`run`](Self::run)
    pub fn notify_camera_moved(&mut self) {
        self.camera_moved = true;
        trace!("Camera moved, next sort is forced");
    }

    pub fn camera_moved(&self) -> bool {
        self.camera_moved
    }

    pub fn stats(&self) -> SortStats {
        self.stats
    }

    /// Histogram of the last bucket sort
    pub fn bucket_histogram(&self) -> &[u32; NUM_DEPTH_BUCKETS] {
        &self.histogram
    }

    /// True if the current order can be reused this frame.
    fn can_skip(&self) -> bool {
        if self.camera_moved {
            return false;
        }
        let last = self.stats.last_sort_frame;
        last == self.current_frame || last + 1 == self.current_frame
    }

    /// Order `splats` back-to-front, unless the order from the current or the
    /// previous frame is still valid.
    pub fn run(&mut self, splats: &mut [PackedSplat]) -> Result<SortOutcome, SortError> {
        if splats.len() != self.count {
            return Err(SortError::CountMismatch {
                expected: self.count,
                actual: splats.len(),
            });
        }

        if self.can_skip() {
            self.stats.skipped_sorts += 1;
            trace!(frame = self.current_frame, "Skipping sort, view unchanged");
            return Ok(SortOutcome::Skipped);
        }

        let start = Instant::now();
        let buckets_used = match self.algorithm {
            SortAlgorithm::Bucket => self.bucket_order(splats),
            SortAlgorithm::Radix => {
                self.identity_order(splats);
                radix_sort_with(
                    &*splats,
                    &mut self.order,
                    &mut self.buckets,
                    &mut self.order_scratch,
                );
                0
            }
            SortAlgorithm::Quick => {
                self.identity_order(splats);
                quick_sort(&*splats, &mut self.order);
                0
            }
        };
        self.apply_order(splats);

        self.stats.last_sort_frame = self.current_frame;
        self.stats.buckets_used = buckets_used;
        self.stats.sort_time = start.elapsed();
        self.stats.full_sorts += 1;
        self.camera_moved = false;

        debug!(
            frame = self.current_frame,
            count = self.count,
            algorithm = %self.algorithm,
            buckets_used,
            min_depth = self.stats.depth_range.0,
            max_depth = self.stats.depth_range.1,
            "Depth sort complete"
        );
        Ok(SortOutcome::Sorted)
    }

    /// Fill `depths` and record the observed range
    fn extract_depths(&mut self, splats: &[PackedSplat]) -> (f32, f32) {
        self.depths.clear();
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for splat in splats {
            let depth = splat.depth();
            self.depths.push(depth);
            min = min.min(depth);
            max = max.max(depth);
        }
        if splats.is_empty() {
            (min, max) = (0.0, 0.0);
        }
        self.stats.depth_range = (min, max);
        (min, max)
    }

    fn identity_order(&mut self, splats: &[PackedSplat]) {
        self.extract_depths(splats);
        self.order.clear();
        self.order.extend(0..self.count as u32);
    }

    /// Bucket the splats farthest-first and build `order`. Returns the number
    /// of non-empty buckets.
    fn bucket_order(&mut self, splats: &[PackedSplat]) -> usize {
        self.extract_depths(splats);
        self.order_scratch.clear();
        self.order_scratch.extend(0..self.count as u32);
        self.order.clear();
        self.order.resize(self.count, 0);
        bucket_pass(
            &self.depths,
            &self.order_scratch,
            &mut self.order,
            &mut self.buckets,
            &mut self.histogram,
        )
    }

    /// Gather `splats` through `order` into `temp` and copy back
    fn apply_order(&mut self, splats: &mut [PackedSplat]) {
        self.temp.clear();
        self.temp.extend(self.order.iter().map(|&i| splats[i as usize]));
        splats.copy_from_slice(&self.temp);
    }
}

/// Bucket sort of `indices` by the depth of the items they point at.
///
/// Same order as a [`DepthSorter`] running [`SortAlgorithm::Bucket`]: farthest
/// bucket first, exact depth within a bucket, ties by item index. Only
/// `indices` is permuted. Returns the number of non-empty buckets.
pub fn bucket_sort<T: DepthKey>(items: &[T], indices: &mut [u32]) -> usize {
    if indices.len() < 2 {
        return indices.len();
    }
    let depths: Vec<f32> = items.iter().map(DepthKey::depth).collect();
    let source = indices.to_vec();
    let mut buckets = Vec::with_capacity(source.len());
    let mut histogram = [0u32; NUM_DEPTH_BUCKETS];
    bucket_pass(&depths, &source, indices, &mut buckets, &mut histogram)
}

/// Scatter `source` into `out` farthest-first. `depths` is indexed by the
/// values in `source`; `out` must be as long as `source`.
fn bucket_pass(
    depths: &[f32],
    source: &[u32],
    out: &mut [u32],
    buckets: &mut Vec<u32>,
    histogram: &mut [u32; NUM_DEPTH_BUCKETS],
) -> usize {
    histogram.fill(0);
    buckets.clear();
    if source.is_empty() {
        return 0;
    }

    let depth_of = |i: u32| depths[i as usize];
    let (min, max) = source
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &i| {
            (lo.min(depth_of(i)), hi.max(depth_of(i)))
        });
    let range = (max - min).max(DEPTH_EPSILON);
    let scale = NUM_DEPTH_BUCKETS as f32 / range;

    // Bucket 0 holds the farthest splats
    for &i in source {
        let bucket = (((max - depth_of(i)) * scale) as usize).min(NUM_DEPTH_BUCKETS - 1);
        buckets.push(bucket as u32);
        histogram[bucket] += 1;
    }

    // Prefix sums give each bucket's end offset
    let mut cursor = [0u32; NUM_DEPTH_BUCKETS];
    let mut running = 0;
    for (end, &count) in cursor.iter_mut().zip(histogram.iter()) {
        running += count;
        *end = running;
    }

    // Reverse source order, filling each bucket from its end backward,
    // keeps equal buckets in source order
    for (k, &bucket) in buckets.iter().enumerate().rev() {
        let slot = &mut cursor[bucket as usize];
        *slot -= 1;
        out[*slot as usize] = source[k];
    }

    // Order within each bucket by exact depth, ties by source index
    let mut start = 0usize;
    for &count in histogram.iter() {
        let end = start + count as usize;
        if count > 1 {
            out[start..end].sort_unstable_by(|&a, &b| {
                depth_of(b).total_cmp(&depth_of(a)).then(a.cmp(&b))
            });
        }
        start = end;
    }

    histogram.iter().filter(|&&c| c > 0).count()
}

//! Saturating fixed-point arithmetic
//!
//! Coprocessor-bound math runs on [`Fixed16`] (Q16.16 in an `i32`) instead of
//! floats. Nothing here ever traps: every out-of-range result saturates to the
//! nearest boundary and bumps a diagnostic counter in [`MathStats`].
//!
//! The counters live behind an `Arc` of atomics so a telemetry thread can read
//! them while the render thread keeps writing. Relaxed ordering is enough since
//! the values are diagnostic only and never feed back into a numeric result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

// ============================================================================
// Format Constants
// ============================================================================

/// Binary point position of [`Fixed16`]
pub const FIXED16_SHIFT: u32 = 16;
/// Scale factor between [`Fixed16`] bits and real value (2^16)
pub const FIXED16_SCALE: f32 = (1u32 << FIXED16_SHIFT) as f32;
/// Largest float accepted by [`FixedMath::from_f32`] before saturating
pub const FIXED16_FLOAT_MAX: f32 = 32767.999;
/// Smallest float accepted by [`FixedMath::from_f32`] before saturating
pub const FIXED16_FLOAT_MIN: f32 = -32768.0;

/// Binary point position of [`Fixed8`]
pub const FIXED8_SHIFT: u32 = 8;
/// Scale factor between [`Fixed8`] bits and real value (2^8)
pub const FIXED8_SCALE: f32 = (1u32 << FIXED8_SHIFT) as f32;
/// Largest float accepted by [`FixedMath::float_to_fixed8`] before saturating
pub const FIXED8_FLOAT_MAX: f32 = 127.996;
/// Smallest float accepted by [`FixedMath::float_to_fixed8`] before saturating
pub const FIXED8_FLOAT_MIN: f32 = -128.0;

// ============================================================================
// Value Types
// ============================================================================

/// Signed Q16.16 fixed-point value.
///
/// A plain value type. Arithmetic goes through [`FixedMath`] so that every
/// saturation is counted.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
#[repr(transparent)]
pub struct Fixed16(i32);

impl Fixed16 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << FIXED16_SHIFT);
    pub const HALF: Self = Self(1 << (FIXED16_SHIFT - 1));
    pub const MAX: Self = Self(i32::MAX);
    pub const MIN: Self = Self(i32::MIN);
    /// π rounded to the nearest Q16.16 step
    pub const PI: Self = Self(205_887);
    /// 2π rounded to the nearest Q16.16 step
    pub const TWO_PI: Self = Self(411_775);

    /// Wrap raw Q16.16 bits
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw Q16.16 bits
    #[inline]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Whole number; every `i16` is representable so this cannot saturate.
    #[inline]
    pub const fn from_int(n: i16) -> Self {
        Self((n as i32) << FIXED16_SHIFT)
    }

    /// Lossy conversion back to float
    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / FIXED16_SCALE
    }

    /// True if the value sits on either range boundary.
    ///
    /// A boundary value may be legitimate; only [`MathStats`] can tell.
    #[inline]
    pub fn is_boundary(self) -> bool {
        self == Self::MAX || self == Self::MIN
    }
}

/// Signed Q8.8 fixed-point value used for compact covariance terms.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize,
    Deserialize,
)]
#[repr(transparent)]
pub struct Fixed8(i16);

impl Fixed8 {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1 << FIXED8_SHIFT);
    pub const MAX: Self = Self(i16::MAX);
    pub const MIN: Self = Self(i16::MIN);

    #[inline]
    pub const fn from_bits(bits: i16) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn to_bits(self) -> i16 {
        self.0
    }

    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / FIXED8_SCALE
    }
}

// ============================================================================
// Diagnostic Counters
// ============================================================================

/// Monotonic operation/saturation counters.
#[derive(Debug, Default)]
pub struct MathStats {
    operations: AtomicU64,
    overflows: AtomicU64,
    underflows: AtomicU64,
}

/// Point-in-time copy of [`MathStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MathStatsSnapshot {
    pub operations: u64,
    pub overflows: u64,
    pub underflows: u64,
}

impl MathStats {
    pub fn snapshot(&self) -> MathStatsSnapshot {
        MathStatsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            overflows: self.overflows.load(Ordering::Relaxed),
            underflows: self.underflows.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters
    pub fn reset(&self) {
        self.operations.store(0, Ordering::Relaxed);
        self.overflows.store(0, Ordering::Relaxed);
        self.underflows.store(0, Ordering::Relaxed);
    }

    #[inline]
    fn add_operations(&self, n: u64) {
        self.operations.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    fn overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn underflow(&self) {
        self.underflows.fetch_add(1, Ordering::Relaxed);
    }
}

// ============================================================================
// Arithmetic Context
// ============================================================================

/// Saturating arithmetic bound to one set of counters.
///
/// Each pipeline owns its own context, so independent pipelines (and tests)
/// never share counters.
#[derive(Debug, Clone, Default)]
pub struct FixedMath {
    stats: Arc<MathStats>,
}

impl FixedMath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the counters for readers on other threads
    pub fn stats_handle(&self) -> Arc<MathStats> {
        Arc::clone(&self.stats)
    }

    pub fn stats(&self) -> MathStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Count an overflow detected outside the arithmetic ops, e.g. a zero
    /// homogeneous coordinate.
    pub fn record_overflow(&self) {
        self.stats.overflow();
    }

    /// Narrow a wide intermediate, saturating and counting on overflow.
    #[inline]
    fn narrow(&self, wide: i64) -> Fixed16 {
        if wide > i32::MAX as i64 {
            self.stats.overflow();
            Fixed16::MAX
        } else if wide < i32::MIN as i64 {
            self.stats.underflow();
            Fixed16::MIN
        } else {
            Fixed16(wide as i32)
        }
    }

    #[inline]
    pub fn add(&self, a: Fixed16, b: Fixed16) -> Fixed16 {
        self.stats.add_operations(1);
        self.narrow(a.0 as i64 + b.0 as i64)
    }

    #[inline]
    pub fn sub(&self, a: Fixed16, b: Fixed16) -> Fixed16 {
        self.stats.add_operations(1);
        self.narrow(a.0 as i64 - b.0 as i64)
    }

    #[inline]
    pub fn mul(&self, a: Fixed16, b: Fixed16) -> Fixed16 {
        self.stats.add_operations(1);
        self.narrow((a.0 as i64 * b.0 as i64) >> FIXED16_SHIFT)
    }

    /// Division by zero yields `MAX` for a non-negative dividend and `MIN`
    /// otherwise, counted as an overflow either way.
    #[inline]
    pub fn div(&self, a: Fixed16, b: Fixed16) -> Fixed16 {
        self.stats.add_operations(1);
        if b.0 == 0 {
            self.stats.overflow();
            return if a.0 >= 0 { Fixed16::MAX } else { Fixed16::MIN };
        }
        self.narrow(((a.0 as i64) << FIXED16_SHIFT) / b.0 as i64)
    }

    /// `a * b + c`. A saturated product is returned as-is without adding `c`.
    #[inline]
    pub fn mad(&self, a: Fixed16, b: Fixed16, c: Fixed16) -> Fixed16 {
        self.stats.add_operations(1);
        let product = (a.0 as i64 * b.0 as i64) >> FIXED16_SHIFT;
        if product > i32::MAX as i64 {
            self.stats.overflow();
            return Fixed16::MAX;
        }
        if product < i32::MIN as i64 {
            self.stats.underflow();
            return Fixed16::MIN;
        }
        self.narrow(product + c.0 as i64)
    }

    /// Component-wise [`mad`](Self::mad)
    pub fn vec3_mad(&self, a: [Fixed16; 3], b: [Fixed16; 3], c: [Fixed16; 3]) -> [Fixed16; 3] {
        [
            self.mad(a[0], b[0], c[0]),
            self.mad(a[1], b[1], c[1]),
            self.mad(a[2], b[2], c[2]),
        ]
    }

    /// Clamp into `[lo, hi]`, swapping the bounds first if they are reversed.
    #[inline]
    pub fn clamp(&self, value: Fixed16, lo: Fixed16, hi: Fixed16) -> Fixed16 {
        self.stats.add_operations(1);
        let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
        if value < lo {
            lo
        } else if value > hi {
            hi
        } else {
            value
        }
    }

    /// Float to Q16.16, saturating outside `[-32768.0, 32767.999]`.
    ///
    /// NaN maps to zero without touching the saturation counters.
    #[inline]
    pub fn from_f32(&self, value: f32) -> Fixed16 {
        self.stats.add_operations(1);
        if value.is_nan() {
            return Fixed16::ZERO;
        }
        if value > FIXED16_FLOAT_MAX {
            self.stats.overflow();
            return Fixed16::MAX;
        }
        if value < FIXED16_FLOAT_MIN {
            self.stats.underflow();
            return Fixed16::MIN;
        }
        Fixed16((value * FIXED16_SCALE) as i32)
    }

    /// Float to Q8.8, saturating outside `[-128.0, 127.996]`.
    #[inline]
    pub fn float_to_fixed8(&self, value: f32) -> Fixed8 {
        self.stats.add_operations(1);
        if value.is_nan() {
            return Fixed8::ZERO;
        }
        if value > FIXED8_FLOAT_MAX {
            self.stats.overflow();
            return Fixed8::MAX;
        }
        if value < FIXED8_FLOAT_MIN {
            self.stats.underflow();
            return Fixed8::MIN;
        }
        Fixed8((value * FIXED8_SCALE) as i16)
    }

    /// Convert `src` into `dest` element-wise. Extra elements in the longer
    /// slice are left untouched.
    pub fn from_f32_slice(&self, dest: &mut [Fixed16], src: &[f32]) {
        for (d, &s) in dest.iter_mut().zip(src) {
            *d = self.from_f32(s);
        }
    }

    pub fn to_f32_slice(&self, dest: &mut [f32], src: &[Fixed16]) {
        let mut converted = 0u64;
        for (d, s) in dest.iter_mut().zip(src) {
            *d = s.to_f32();
            converted += 1;
        }
        self.stats.add_operations(converted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    fn fx(v: f32) -> Fixed16 {
        Fixed16::from_bits((v * FIXED16_SCALE) as i32)
    }

    #[test]
    fn test_constants() {
        assert_eq!(Fixed16::ONE.to_bits(), 65536);
        assert_eq!(Fixed16::MAX.to_bits(), 0x7FFF_FFFF);
        assert_eq!(Fixed16::MIN.to_bits(), i32::MIN);
        assert!((Fixed16::PI.to_f32() - std::f32::consts::PI).abs() < 1e-4);
        assert!((Fixed16::TWO_PI.to_f32() - std::f32::consts::TAU).abs() < 1e-4);
        assert_eq!(Fixed16::from_int(-3).to_f32(), -3.0);
    }

    #[test]
    fn test_add_exact_in_range() {
        let math = FixedMath::new();
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..1000 {
            let a = rng.random_range(-(1i32 << 29)..(1i32 << 29));
            let b = rng.random_range(-(1i32 << 29)..(1i32 << 29));
            let sum = math.add(Fixed16::from_bits(a), Fixed16::from_bits(b));
            assert_eq!(sum.to_bits(), a + b);
        }
        assert_eq!(math.stats().overflows, 0);
        assert_eq!(math.stats().underflows, 0);
    }

    #[test]
    fn test_add_saturates_at_boundary() {
        let math = FixedMath::new();
        let one_bit = Fixed16::from_bits(1);

        // Landing exactly on the boundary is not a saturation
        let exact = math.add(Fixed16::from_bits(i32::MAX - 1), one_bit);
        assert_eq!(exact, Fixed16::MAX);
        assert_eq!(math.stats().overflows, 0);

        assert_eq!(math.add(Fixed16::MAX, one_bit), Fixed16::MAX);
        assert_eq!(math.stats().overflows, 1);

        assert_eq!(math.sub(Fixed16::MIN, one_bit), Fixed16::MIN);
        assert_eq!(math.stats().underflows, 1);
    }

    #[test]
    fn test_mul_and_div() {
        let math = FixedMath::new();
        assert_eq!(math.mul(fx(1.5), fx(2.0)), fx(3.0));
        assert_eq!(math.mul(fx(-0.5), fx(4.0)), fx(-2.0));
        assert_eq!(math.div(fx(3.0), fx(2.0)), fx(1.5));
        assert_eq!(math.div(fx(-1.0), fx(4.0)), fx(-0.25));

        assert_eq!(math.mul(fx(30000.0), fx(30000.0)), Fixed16::MAX);
        assert_eq!(math.mul(fx(-30000.0), fx(30000.0)), Fixed16::MIN);
        assert_eq!(math.stats().overflows, 1);
        assert_eq!(math.stats().underflows, 1);
    }

    #[test]
    fn test_div_by_zero_for_any_dividend() {
        let math = FixedMath::new();
        let mut rng = Pcg32::seed_from_u64(42);
        let mut expected_overflows = 0;
        for _ in 0..500 {
            let a = Fixed16::from_bits(rng.random());
            let result = math.div(a, Fixed16::ZERO);
            expected_overflows += 1;
            if a.to_bits() >= 0 {
                assert_eq!(result, Fixed16::MAX);
            } else {
                assert_eq!(result, Fixed16::MIN);
            }
            assert_eq!(math.stats().overflows, expected_overflows);
        }
        assert_eq!(math.div(Fixed16::ZERO, Fixed16::ZERO), Fixed16::MAX);
    }

    #[test]
    fn test_div_min_by_negative_one_saturates() {
        let math = FixedMath::new();
        assert_eq!(math.div(Fixed16::MIN, fx(-1.0)), Fixed16::MAX);
        assert_eq!(math.stats().overflows, 1);
    }

    #[test]
    fn test_mad() {
        let math = FixedMath::new();
        assert_eq!(math.mad(fx(2.0), fx(3.0), fx(1.0)), fx(7.0));

        // Saturated product short-circuits the add
        assert_eq!(math.mad(fx(30000.0), fx(30000.0), fx(-1.0)), Fixed16::MAX);
        // Product in range, sum overflows
        assert_eq!(math.mad(fx(30000.0), fx(1.0), fx(30000.0)), Fixed16::MAX);
        assert_eq!(math.stats().overflows, 2);

        let v = math.vec3_mad(
            [fx(1.0), fx(2.0), fx(3.0)],
            [fx(2.0), fx(2.0), fx(2.0)],
            [fx(0.5), fx(0.5), fx(0.5)],
        );
        assert_eq!(v, [fx(2.5), fx(4.5), fx(6.5)]);
    }

    #[test]
    fn test_clamp_reversed_bounds() {
        let math = FixedMath::new();
        let mut rng = Pcg32::seed_from_u64(3);
        for _ in 0..1000 {
            let v = Fixed16::from_bits(rng.random());
            let lo = Fixed16::from_bits(rng.random());
            let hi = Fixed16::from_bits(rng.random());
            assert_eq!(math.clamp(v, lo, hi), math.clamp(v, hi, lo));
        }
        assert_eq!(math.clamp(fx(5.0), fx(2.0), fx(-2.0)), fx(2.0));
        assert_eq!(math.clamp(fx(-5.0), fx(2.0), fx(-2.0)), fx(-2.0));
    }

    #[test]
    fn test_from_f32_clamps() {
        let math = FixedMath::new();
        assert_eq!(math.from_f32(1.25), fx(1.25));
        assert_eq!(math.from_f32(40000.0), Fixed16::MAX);
        assert_eq!(math.from_f32(-40000.0), Fixed16::MIN);
        assert_eq!(math.from_f32(f32::INFINITY), Fixed16::MAX);
        assert_eq!(math.from_f32(f32::NAN), Fixed16::ZERO);

        let stats = math.stats();
        assert_eq!(stats.overflows, 2);
        assert_eq!(stats.underflows, 1);
        assert_eq!(stats.operations, 5);

        // Boundary inputs are still in range
        assert_eq!(math.from_f32(-32768.0), Fixed16::MIN);
        assert_eq!(math.stats().underflows, 1);
    }

    #[test]
    fn test_fixed8_conversion() {
        let math = FixedMath::new();
        assert_eq!(math.float_to_fixed8(1.0), Fixed8::ONE);
        assert_eq!(math.float_to_fixed8(-0.5).to_f32(), -0.5);
        assert_eq!(math.float_to_fixed8(200.0), Fixed8::MAX);
        assert_eq!(math.float_to_fixed8(-200.0), Fixed8::MIN);
        assert_eq!(math.stats().overflows, 1);
        assert_eq!(math.stats().underflows, 1);
    }

    #[test]
    fn test_slice_conversion_counts_each_element() {
        let math = FixedMath::new();
        let src = [0.5f32, -1.0, 2.0];
        let mut fixed = [Fixed16::ZERO; 3];
        math.from_f32_slice(&mut fixed, &src);
        let mut back = [0.0f32; 3];
        math.to_f32_slice(&mut back, &fixed);
        assert_eq!(back, src);
        assert_eq!(math.stats().operations, 6);
    }

    #[test]
    fn test_operation_counter_does_not_change_results() {
        let math = FixedMath::new();
        let first = math.mul(fx(1.75), fx(-3.0));
        math.reset_stats();
        let second = math.mul(fx(1.75), fx(-3.0));
        assert_eq!(first, second);
        assert_eq!(math.stats().operations, 1);
    }

    #[test]
    fn test_stats_handle_is_shared() {
        let math = FixedMath::new();
        let handle = math.stats_handle();
        math.add(Fixed16::MAX, Fixed16::ONE);
        let reader = std::thread::spawn(move || handle.snapshot());
        let snapshot = reader.join().unwrap();
        assert_eq!(snapshot.overflows, 1);
        assert_eq!(snapshot.operations, 1);
    }
}

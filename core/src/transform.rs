//! Model-view-projection transforms over splat batches
//!
//! Two interchangeable paths transform positions in place: a float path on
//! `glam` and a saturating fixed-point path on [`FixedMath`]. The fixed path
//! also provides the perspective divide and viewport mapping used by
//! coprocessor-side rasterization.

use std::fmt;
use std::str::FromStr;

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};
use splatstorm_shared::{Fixed16, FixedMath, PackedSplat};

/// Arithmetic used for the per-splat MVP multiply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformPath {
    #[default]
    Float,
    Fixed,
}

impl TransformPath {
    pub fn name(self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Fixed => "fixed",
        }
    }
}

impl fmt::Display for TransformPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransformPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" => Ok(Self::Float),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown transform path '{other}'")),
        }
    }
}

/// Transform every position in `batch` by `mvp` using `path`.
pub fn transform_batch(
    path: TransformPath,
    batch: &mut [PackedSplat],
    mvp: &Mat4,
    math: &FixedMath,
) {
    match path {
        TransformPath::Float => transform_batch_float(batch, mvp),
        TransformPath::Fixed => {
            let matrix = FixedMat4::from_mat4(mvp, math);
            transform_batch_fixed(batch, &matrix, math);
        }
    }
}

pub fn transform_batch_float(batch: &mut [PackedSplat], mvp: &Mat4) {
    for splat in batch {
        splat.position = (*mvp * Vec4::from_array(splat.position)).to_array();
    }
}

// ============================================================================
// Fixed-Point Path
// ============================================================================

/// Row-major Q16.16 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMat4 {
    rows: [[Fixed16; 4]; 4],
}

impl FixedMat4 {
    pub const IDENTITY: Self = Self {
        rows: [
            [Fixed16::ONE, Fixed16::ZERO, Fixed16::ZERO, Fixed16::ZERO],
            [Fixed16::ZERO, Fixed16::ONE, Fixed16::ZERO, Fixed16::ZERO],
            [Fixed16::ZERO, Fixed16::ZERO, Fixed16::ONE, Fixed16::ZERO],
            [Fixed16::ZERO, Fixed16::ZERO, Fixed16::ZERO, Fixed16::ONE],
        ],
    };

    /// Convert a glam matrix; out-of-range entries saturate.
    pub fn from_mat4(mvp: &Mat4, math: &FixedMath) -> Self {
        let mut rows = [[Fixed16::ZERO; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            math.from_f32_slice(row, &mvp.row(r).to_array());
        }
        Self { rows }
    }

    pub fn rows(&self) -> &[[Fixed16; 4]; 4] {
        &self.rows
    }

    /// `M * p` as a chain of multiply-adds per row
    pub fn transform(&self, p: [Fixed16; 4], math: &FixedMath) -> [Fixed16; 4] {
        self.rows.map(|row| {
            let mut acc = math.mul(row[0], p[0]);
            for c in 1..4 {
                acc = math.mad(row[c], p[c], acc);
            }
            acc
        })
    }
}

pub fn transform_batch_fixed(batch: &mut [PackedSplat], matrix: &FixedMat4, math: &FixedMath) {
    let mut point = [Fixed16::ZERO; 4];
    for splat in batch {
        math.from_f32_slice(&mut point, &splat.position);
        let out = matrix.transform(point, math);
        math.to_f32_slice(&mut splat.position, &out);
    }
}

/// Clip space to NDC. A zero `w` yields the origin with `w = 1` and counts an
/// overflow.
pub fn perspective_divide(clip: [Fixed16; 4], math: &FixedMath) -> [Fixed16; 4] {
    let w = clip[3];
    if w == Fixed16::ZERO {
        math.record_overflow();
        return [Fixed16::ZERO, Fixed16::ZERO, Fixed16::ZERO, Fixed16::ONE];
    }
    [
        math.div(clip[0], w),
        math.div(clip[1], w),
        math.div(clip[2], w),
        Fixed16::ONE,
    ]
}

/// Pixel rectangle NDC maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: Fixed16,
    pub y: Fixed16,
    pub width: Fixed16,
    pub height: Fixed16,
}

impl Viewport {
    pub fn new(x: i16, y: i16, width: i16, height: i16) -> Self {
        Self {
            x: Fixed16::from_int(x),
            y: Fixed16::from_int(y),
            width: Fixed16::from_int(width),
            height: Fixed16::from_int(height),
        }
    }
}

/// NDC `[-1, 1]` to viewport pixels with y pointing down. `z` and `w` pass
/// through.
pub fn screen_transform(ndc: [Fixed16; 4], viewport: &Viewport, math: &FixedMath) -> [Fixed16; 4] {
    let two = Fixed16::from_int(2);
    let half_w = math.div(viewport.width, two);
    let half_h = math.div(viewport.height, two);

    let x = math.mad(math.add(ndc[0], Fixed16::ONE), half_w, viewport.x);
    let y = math.mad(math.sub(Fixed16::ONE, ndc[1]), half_h, viewport.y);
    [x, y, ndc[2], ndc[3]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use splatstorm_shared::Splat;

    fn splat_at(x: f32, y: f32, z: f32) -> PackedSplat {
        PackedSplat::from_splat(&Splat {
            position: [x, y, z],
            ..Default::default()
        })
    }

    fn fx(v: f32) -> Fixed16 {
        FixedMath::new().from_f32(v)
    }

    #[test]
    fn test_float_translation() {
        let mvp = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let mut batch = vec![splat_at(0.0, 0.0, 0.0), splat_at(1.0, 1.0, 1.0)];
        transform_batch_float(&mut batch, &mvp);
        assert_eq!(batch[0].position, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(batch[1].position, [2.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_fixed_path_matches_float() {
        let math = FixedMath::new();
        let mvp = Mat4::from_scale(Vec3::new(2.0, 0.5, -1.0))
            * Mat4::from_translation(Vec3::new(-3.0, 4.0, 10.0));
        let src = vec![splat_at(1.5, -2.25, 7.0), splat_at(-100.0, 50.0, 0.125)];

        let mut float = src.clone();
        transform_batch(TransformPath::Float, &mut float, &mvp, &math);
        let mut fixed = src;
        transform_batch(TransformPath::Fixed, &mut fixed, &mvp, &math);

        for (a, b) in float.iter().zip(&fixed) {
            for c in 0..4 {
                assert!(
                    (a.position[c] - b.position[c]).abs() < 1e-3,
                    "{:?} vs {:?}",
                    a.position,
                    b.position
                );
            }
        }
        assert_eq!(math.stats().overflows, 0);
        assert!(math.stats().operations > 0);
    }

    #[test]
    fn test_fixed_identity() {
        let math = FixedMath::new();
        assert_eq!(FixedMat4::from_mat4(&Mat4::IDENTITY, &math), FixedMat4::IDENTITY);
        let p = [fx(3.0), fx(-4.5), fx(0.25), Fixed16::ONE];
        assert_eq!(FixedMat4::IDENTITY.transform(p, &math), p);
    }

    #[test]
    fn test_fixed_path_saturates() {
        let math = FixedMath::new();
        let mvp = Mat4::from_scale(Vec3::splat(1000.0));
        let mut batch = vec![splat_at(1000.0, 0.0, 0.0)];
        transform_batch(TransformPath::Fixed, &mut batch, &mvp, &math);
        assert_eq!(batch[0].position[0], Fixed16::MAX.to_f32());
        assert!(math.stats().overflows > 0);
    }

    #[test]
    fn test_perspective_divide() {
        let math = FixedMath::new();
        let ndc = perspective_divide([fx(2.0), fx(-4.0), fx(1.0), fx(2.0)], &math);
        assert_eq!(ndc, [fx(1.0), fx(-2.0), fx(0.5), Fixed16::ONE]);
        assert_eq!(math.stats().overflows, 0);

        let ndc = perspective_divide([fx(2.0), fx(2.0), fx(2.0), Fixed16::ZERO], &math);
        assert_eq!(
            ndc,
            [Fixed16::ZERO, Fixed16::ZERO, Fixed16::ZERO, Fixed16::ONE]
        );
        assert_eq!(math.stats().overflows, 1);
    }

    #[test]
    fn test_screen_transform() {
        let math = FixedMath::new();
        let viewport = Viewport::new(10, 20, 640, 480);

        let top_left = screen_transform([fx(-1.0), fx(1.0), fx(0.5), fx(1.0)], &viewport, &math);
        assert_eq!(top_left[0], Fixed16::from_int(10));
        assert_eq!(top_left[1], Fixed16::from_int(20));
        assert_eq!(top_left[2], fx(0.5));

        let center = screen_transform([Fixed16::ZERO; 4], &viewport, &math);
        assert_eq!(center[0], Fixed16::from_int(330));
        assert_eq!(center[1], Fixed16::from_int(260));
    }

    #[test]
    fn test_path_parsing() {
        assert_eq!("FIXED".parse::<TransformPath>(), Ok(TransformPath::Fixed));
        assert!("double".parse::<TransformPath>().is_err());
    }
}

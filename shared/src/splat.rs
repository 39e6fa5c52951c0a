//! Splat primitives and the 64-byte transfer layout
//!
//! [`Splat`] is the authoring-side representation. [`PackedSplat`] is what the
//! pipeline sorts, transforms and hands to the coprocessor; its byte layout is
//! fixed because batch-transfer geometry depends on exact offsets.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::constants::CACHE_LINE;

// ============================================================================
// Color Packing
// ============================================================================

/// Convert f32 to unsigned normalized 8-bit integer (unorm8)
#[inline]
pub fn f32_to_unorm8(value: f32) -> u8 {
    let clamped = value.clamp(0.0, 1.0);
    (clamped * 255.0) as u8
}

/// Pack RGBA [0.0, 1.0] floats into a u32 (R in the low byte)
#[inline]
pub fn pack_color_rgba8(rgba: [f32; 4]) -> u32 {
    u32::from_le_bytes([
        f32_to_unorm8(rgba[0]),
        f32_to_unorm8(rgba[1]),
        f32_to_unorm8(rgba[2]),
        f32_to_unorm8(rgba[3]),
    ])
}

/// Inverse of [`pack_color_rgba8`], up to 8-bit quantization
#[inline]
pub fn unpack_color_rgba8(packed: u32) -> [f32; 4] {
    let [r, g, b, a] = packed.to_le_bytes();
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}

// ============================================================================
// Splat
// ============================================================================

/// A renderable point primitive as produced by the scene layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Splat {
    pub position: [f32; 3],
    /// RGBA in [0.0, 1.0]
    pub color: [f32; 4],
    /// Anisotropic 2D extent
    pub scale: [f32; 2],
    /// Unit quaternion (x, y, z, w)
    pub rotation: [f32; 4],
}

impl Default for Splat {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            color: [1.0; 4],
            scale: [1.0; 2],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

// ============================================================================
// PackedSplat
// ============================================================================

/// Cache-line sized splat ready for batch transfer.
///
/// Memory layout (64 bytes, 64-byte aligned):
/// - 0..16: position (xyz + homogeneous w)
/// - 16..32: color (RGBA floats)
/// - 32..40: scale
/// - 40..56: rotation quaternion
/// - 56..60: packed RGBA8 color
/// - 60..64: padding
///
/// The first 32 bytes form the position/color view and the next 24 bytes the
/// scale/rotation view, see [`PackedSplat::views`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(C, align(64))]
pub struct PackedSplat {
    pub position: [f32; 4],
    pub color: [f32; 4],
    pub scale: [f32; 2],
    pub rotation: [f32; 4],
    pub color_packed: u32,
    _padding: u32,
}

// SAFETY: PackedSplat is #[repr(C)] with only f32/u32 fields that exactly fill
// its 64-byte size (checked below), so it has no padding bytes.
unsafe impl Zeroable for PackedSplat {}
unsafe impl Pod for PackedSplat {}

const _: () = assert!(std::mem::size_of::<PackedSplat>() == CACHE_LINE);
const _: () = assert!(std::mem::align_of::<PackedSplat>() == CACHE_LINE);

/// Named views over the leading words of a [`PackedSplat`].
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SplatViews {
    /// position xyzw followed by color rgba
    pub pos_color: [f32; 8],
    /// scale xy followed by rotation xyzw
    pub scale_rot: [f32; 6],
    pub color_packed: u32,
    padding: u32,
}

impl Default for PackedSplat {
    fn default() -> Self {
        Self::from_splat(&Splat::default())
    }
}

impl PackedSplat {
    pub fn from_splat(splat: &Splat) -> Self {
        let [x, y, z] = splat.position;
        Self {
            position: [x, y, z, 1.0],
            color: splat.color,
            scale: splat.scale,
            rotation: splat.rotation,
            color_packed: pack_color_rgba8(splat.color),
            _padding: 0,
        }
    }

    /// Drop the homogeneous coordinate and packed color
    pub fn to_splat(&self) -> Splat {
        let [x, y, z, _] = self.position;
        Splat {
            position: [x, y, z],
            color: self.color,
            scale: self.scale,
            rotation: self.rotation,
        }
    }

    /// View depth used for ordering
    #[inline]
    pub fn depth(&self) -> f32 {
        self.position[2]
    }

    pub fn views(&self) -> &SplatViews {
        bytemuck::cast_ref(self)
    }

    pub fn views_mut(&mut self) -> &mut SplatViews {
        bytemuck::cast_mut(self)
    }

    /// Recompute `color_packed` after editing `color`
    pub fn repack_color(&mut self) {
        self.color_packed = pack_color_rgba8(self.color);
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl From<Splat> for PackedSplat {
    fn from(splat: Splat) -> Self {
        Self::from_splat(&splat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, offset_of, size_of};

    #[test]
    fn test_packed_splat_layout() {
        assert_eq!(size_of::<PackedSplat>(), 64);
        assert_eq!(align_of::<PackedSplat>(), 64);
        assert_eq!(offset_of!(PackedSplat, position), 0);
        assert_eq!(offset_of!(PackedSplat, color), 16);
        assert_eq!(offset_of!(PackedSplat, scale), 32);
        assert_eq!(offset_of!(PackedSplat, rotation), 40);
        assert_eq!(offset_of!(PackedSplat, color_packed), 56);
        assert_eq!(size_of::<SplatViews>(), 64);
    }

    #[test]
    fn test_views_alias_fields() {
        let mut packed = PackedSplat::from_splat(&Splat {
            position: [1.0, 2.0, 3.0],
            color: [0.1, 0.2, 0.3, 0.4],
            scale: [5.0, 6.0],
            rotation: [0.0, 0.0, 0.0, 1.0],
        });

        let views = packed.views();
        assert_eq!(&views.pos_color[..4], &[1.0, 2.0, 3.0, 1.0]);
        assert_eq!(&views.pos_color[4..], &[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(views.scale_rot, [5.0, 6.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(views.color_packed, packed.color_packed);

        packed.views_mut().pos_color[2] = -7.0;
        assert_eq!(packed.depth(), -7.0);
    }

    #[test]
    fn test_color_packing() {
        assert_eq!(pack_color_rgba8([1.0, 0.0, 0.0, 1.0]), 0xFF0000FF);
        assert_eq!(pack_color_rgba8([2.0, -1.0, 0.0, 0.0]), 0x000000FF);
        let unpacked = unpack_color_rgba8(pack_color_rgba8([0.5, 0.25, 1.0, 0.0]));
        assert!((unpacked[0] - 0.5).abs() < 1.0 / 255.0);
        assert!((unpacked[1] - 0.25).abs() < 1.0 / 255.0);
        assert_eq!(unpacked[2], 1.0);
    }

    #[test]
    fn test_splat_round_trip_sets_w() {
        let splat = Splat {
            position: [4.0, 5.0, 6.0],
            ..Default::default()
        };
        let packed = PackedSplat::from(splat);
        assert_eq!(packed.position[3], 1.0);
        assert_eq!(packed.to_splat(), splat);
        assert_eq!(packed.as_bytes().len(), 64);
    }
}

//! Deterministic synthetic scenes

use std::f32::consts::TAU;

use glam::{Mat4, Quat, Vec3};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use splatstorm_shared::{PackedSplat, Splat};

/// Half extent of the cube splats are scattered in
pub const SCENE_RADIUS: f32 = 50.0;

/// `count` splats uniformly scattered in a cube, same output for the same seed.
pub fn generate(count: usize, seed: u64) -> Vec<PackedSplat> {
    let mut rng = Pcg32::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let position = [
                rng.random_range(-SCENE_RADIUS..SCENE_RADIUS),
                rng.random_range(-SCENE_RADIUS..SCENE_RADIUS),
                rng.random_range(-SCENE_RADIUS..SCENE_RADIUS),
            ];
            let color = [
                rng.random_range(0.0..1.0),
                rng.random_range(0.0..1.0),
                rng.random_range(0.0..1.0),
                rng.random_range(0.2..1.0),
            ];
            let scale = [rng.random_range(0.05..1.5), rng.random_range(0.05..1.5)];
            let rotation = Quat::from_axis_angle(
                Vec3::new(
                    rng.random_range(-1.0..1.0),
                    rng.random_range(-1.0..1.0),
                    rng.random_range(0.1..1.0),
                )
                .normalize(),
                rng.random_range(0.0..TAU),
            );
            PackedSplat::from_splat(&Splat {
                position,
                color,
                scale,
                rotation: rotation.to_array(),
            })
        })
        .collect()
}

/// View-projection for `frame`. A static camera looks down -Z; an orbiting
/// one circles the scene once every 360 frames.
pub fn camera(frame: u64, orbit: bool) -> Mat4 {
    let angle = if orbit {
        (frame % 360) as f32 / 360.0 * TAU
    } else {
        0.0
    };
    let distance = SCENE_RADIUS * 3.0;
    let eye = Vec3::new(angle.sin() * distance, SCENE_RADIUS * 0.5, angle.cos() * distance);
    let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
    let projection = Mat4::perspective_rh(60f32.to_radians(), 16.0 / 9.0, 0.1, distance * 2.0);
    projection * view
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        assert_eq!(generate(100, 7), generate(100, 7));
        assert_ne!(generate(100, 7), generate(100, 8));
    }

    #[test]
    fn test_generate_stays_in_bounds() {
        for splat in generate(500, 1) {
            for c in &splat.position[..3] {
                assert!(c.abs() <= SCENE_RADIUS);
            }
            assert_eq!(splat.position[3], 1.0);
        }
    }

    #[test]
    fn test_static_camera_does_not_move() {
        assert_eq!(camera(0, false), camera(99, false));
        assert_ne!(camera(0, true), camera(90, true));
    }
}

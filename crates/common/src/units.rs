//! Geometry helpers for cell shapes.

use std::f32::consts::PI;

/// Radius of a sphere with the given volume: `cbrt(3V / 4π)`.
pub fn sphere_radius(volume: f32) -> f32 {
    0.62035 * volume.max(0.0).powf(1.0 / 3.0)
}

pub fn sphere_volume(radius: f32) -> f32 {
    4.0 / 3.0 * PI * radius * radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_volume_are_inverse() {
        let r = sphere_radius(37.0);
        assert!((sphere_volume(r) - 37.0).abs() < 0.05);
    }

    #[test]
    fn negative_volume_clamps_to_zero() {
        assert_eq!(sphere_radius(-1.0), 0.0);
    }
}

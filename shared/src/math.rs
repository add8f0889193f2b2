//! Minimal 2D vector math used by the car simulation and the wire codec

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Sub};

/// A 2D vector in world or car-local space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    pub fn dot(&self, other: &Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Swaps between world and car-local frames for a body facing `angle`.
    ///
    /// The mapping is `(x sin a + y cos a, x cos a - y sin a)`, which is its
    /// own inverse, so the same call converts in both directions. The car's
    /// longitudinal axis is therefore `(sin a, cos a)` in world space.
    pub fn rotate_frame(&self, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * sin + self.y * cos, self.x * cos - self.y * sin)
    }

    /// World-space forward direction of a body facing `angle`.
    pub fn heading(angle: f32) -> Vec2 {
        Vec2::new(1.0, 0.0).rotate_frame(angle)
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Vec2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, scalar: f32) -> Vec2 {
        self.scale(scalar)
    }
}

/// Sign of `value` with zero mapped to zero.
pub fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

pub fn to_radians(degrees: f32) -> f32 {
    degrees * std::f32::consts::PI / 180.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_rotate_frame_is_involution() {
        let v = Vec2::new(3.0, -1.5);
        for angle in [0.0, 0.3, 1.2, -2.4, std::f32::consts::PI] {
            let back = v.rotate_frame(angle).rotate_frame(angle);
            assert_approx_eq!(back.x, v.x, 1e-5);
            assert_approx_eq!(back.y, v.y, 1e-5);
        }
    }

    #[test]
    fn test_heading_is_unit_length() {
        let heading = Vec2::heading(0.7);
        assert_approx_eq!(heading.magnitude(), 1.0, 1e-6);
        assert_approx_eq!(heading.x, 0.7f32.sin(), 1e-6);
        assert_approx_eq!(heading.y, 0.7f32.cos(), 1e-6);
    }

    #[test]
    fn test_sign_treats_zero_as_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(2.5), 1.0);
        assert_eq!(sign(-0.1), -1.0);
    }

    #[test]
    fn test_vector_operators() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(0.5, -1.0);
        assert_eq!(a + b, Vec2::new(1.5, 1.0));
        assert_eq!(a - b, Vec2::new(0.5, 3.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_approx_eq!(a.dot(&b), -1.5, 1e-6);
    }
}

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::GeometryError;
use super::point::Point3d;
use super::vector::Vec3;

/// Right-handed orthonormal placement shared by the elementary curves and
/// surfaces. `axis` is the normal of planes and circles and the symmetry
/// axis of surfaces of revolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub origin: Point3d,
    pub x_dir: Vec3,
    pub y_dir: Vec3,
    pub axis: Vec3,
}

impl Frame {
    /// Frame with the given main axis. `x_hint` is made orthogonal to the
    /// axis; without a usable hint any perpendicular direction is taken.
    pub fn new(origin: Point3d, axis: Vec3, x_hint: Option<Vec3>) -> Result<Self, GeometryError> {
        let axis = axis.normalized().ok_or(GeometryError::DegenerateDirection("axis"))?;
        let x_dir = x_hint
            .and_then(|x| x.reject_from(&axis).normalized())
            .or_else(|| axis.any_perpendicular())
            .ok_or(GeometryError::DegenerateDirection("x direction"))?;
        Ok(Self {
            origin,
            x_dir,
            y_dir: axis.cross(&x_dir),
            axis,
        })
    }

    /// World-aligned frame at `origin`.
    pub fn world(origin: Point3d) -> Self {
        Self {
            origin,
            x_dir: Vec3::X,
            y_dir: Vec3::Y,
            axis: Vec3::Z,
        }
    }

    /// `cos(u)·x_dir + sin(u)·y_dir`.
    pub fn radial(&self, u: f64) -> Vec3 {
        let (s, c) = u.sin_cos();
        self.x_dir * c + self.y_dir * s
    }

    /// Derivative of [`Self::radial`] with respect to `u`.
    pub fn tangential(&self, u: f64) -> Vec3 {
        let (s, c) = u.sin_cos();
        self.y_dir * c - self.x_dir * s
    }

    pub fn point_at(&self, x: f64, y: f64, z: f64) -> Point3d {
        self.origin + self.x_dir * x + self.y_dir * y + self.axis * z
    }

    /// Coordinates of `p` in this frame.
    pub fn to_local(&self, p: &Point3d) -> (f64, f64, f64) {
        let d = *p - self.origin;
        (d.dot(&self.x_dir), d.dot(&self.y_dir), d.dot(&self.axis))
    }
}

/// Angle folded into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    // rem_euclid rounds tiny negative angles up to exactly 2π.
    if a >= TAU { 0.0 } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_orthonormal() {
        let f = Frame::new(Point3d::new(1.0, 2.0, 3.0), Vec3::new(1.0, 1.0, 1.0), None).unwrap();
        for v in [f.x_dir, f.y_dir, f.axis] {
            assert!((v.length() - 1.0).abs() < 1e-12);
        }
        assert!(f.x_dir.dot(&f.y_dir).abs() < 1e-12);
        assert!((f.x_dir.cross(&f.y_dir) - f.axis).length() < 1e-12);
    }

    #[test]
    fn test_hint_is_projected() {
        let f = Frame::new(Point3d::ORIGIN, Vec3::Z, Some(Vec3::new(1.0, 0.0, 5.0))).unwrap();
        assert!((f.x_dir - Vec3::X).length() < 1e-12);
        assert!((f.y_dir - Vec3::Y).length() < 1e-12);
        // A hint along the axis is unusable.
        let g = Frame::new(Point3d::ORIGIN, Vec3::Z, Some(Vec3::Z)).unwrap();
        assert!(g.x_dir.dot(&Vec3::Z).abs() < 1e-12);
    }

    #[test]
    fn test_local_round_trip() {
        let f = Frame::new(Point3d::new(0.0, 1.0, 0.0), Vec3::X, None).unwrap();
        let p = f.point_at(0.5, -2.0, 3.0);
        let (x, y, z) = f.to_local(&p);
        assert!((x - 0.5).abs() < 1e-12 && (y + 2.0).abs() < 1e-12 && (z - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_angle() {
        assert_eq!(normalize_angle(-1e-18), 0.0);
        assert!((normalize_angle(-std::f64::consts::FRAC_PI_2) - 1.5 * std::f64::consts::PI).abs() < 1e-12);
        assert!((normalize_angle(7.0) - (7.0 - TAU)).abs() < 1e-12);
    }

    #[test]
    fn test_null_axis_rejected() {
        assert_eq!(
            Frame::new(Point3d::ORIGIN, Vec3::ZERO, None),
            Err(GeometryError::DegenerateDirection("axis"))
        );
    }
}

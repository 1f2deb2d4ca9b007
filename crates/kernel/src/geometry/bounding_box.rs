use serde::{Deserialize, Serialize};

use super::curves::{CurveEval, Line3d};
use super::point::Point3d;
use super::surfaces::SurfaceEval;
use super::vector::Vec3;

/// Samples per curve span when boxing a curve.
const CURVE_SAMPLES: usize = 64;
/// Samples per surface direction when boxing a surface.
const SURFACE_SAMPLES: usize = 24;
/// Extra relative enlargement covering the sag between samples.
const SAG_MARGIN: f64 = 1e-2;

/// Axis-aligned bounding box. A freshly created box is void and absorbs the
/// first point added to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3d,
    pub max: Point3d,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::void()
    }
}

impl BoundingBox {
    pub fn new(min: Point3d, max: Point3d) -> Self {
        Self { min, max }
    }

    pub fn void() -> Self {
        Self {
            min: Point3d::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3d::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn from_points(points: &[Point3d]) -> Self {
        let mut bb = Self::void();
        for p in points {
            bb.add_point(p);
        }
        bb
    }

    pub fn add_point(&mut self, p: &Point3d) {
        if !p.is_finite() {
            return;
        }
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn union(&self, other: &Self) -> Self {
        if self.is_void() {
            return *other;
        }
        if other.is_void() {
            return *self;
        }
        Self {
            min: Point3d::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3d::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn is_void(&self) -> bool {
        !(self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z)
    }

    pub fn contains_point(&self, p: &Point3d) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Point3d {
        self.min.midpoint(&self.max)
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn diagonal(&self) -> f64 {
        if self.is_void() { 0.0 } else { self.size().length() }
    }

    /// Enlarged by `margin` on every side. A void box stays void.
    pub fn expanded(&self, margin: f64) -> Self {
        if self.is_void() {
            return *self;
        }
        let m = Vec3::new(margin, margin, margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    pub fn corners(&self) -> [Point3d; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3d::new(lo.x, lo.y, lo.z),
            Point3d::new(hi.x, lo.y, lo.z),
            Point3d::new(lo.x, hi.y, lo.z),
            Point3d::new(hi.x, hi.y, lo.z),
            Point3d::new(lo.x, lo.y, hi.z),
            Point3d::new(hi.x, lo.y, hi.z),
            Point3d::new(lo.x, hi.y, hi.z),
            Point3d::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Box of a curve over the finite range `[t0, t1]` by dense sampling,
    /// enlarged by `tol` and by a fraction of its own size.
    pub fn of_curve<C: CurveEval + ?Sized>(curve: &C, t0: f64, t1: f64, tol: f64) -> Self {
        let mut bb = Self::void();
        for i in 0..=CURVE_SAMPLES {
            let t = t0 + (t1 - t0) * i as f64 / CURVE_SAMPLES as f64;
            bb.add_point(&curve.value(t));
        }
        for t in curve.sharp_parameters(t0, t1) {
            bb.add_point(&curve.value(t));
        }
        bb.expanded(tol + SAG_MARGIN * bb.diagonal())
    }

    /// Box of a surface patch over finite parameter ranges.
    pub fn of_surface<S: SurfaceEval + ?Sized>(surface: &S, u: (f64, f64), v: (f64, f64), tol: f64) -> Self {
        let mut bb = Self::void();
        for i in 0..=SURFACE_SAMPLES {
            let uu = u.0 + (u.1 - u.0) * i as f64 / SURFACE_SAMPLES as f64;
            for j in 0..=SURFACE_SAMPLES {
                let vv = v.0 + (v.1 - v.0) * j as f64 / SURFACE_SAMPLES as f64;
                bb.add_point(&surface.value(uu, vv));
            }
        }
        bb.expanded(tol + SAG_MARGIN * bb.diagonal())
    }
}

/// Parameter range of `line` covering the orthogonal projections of the
/// corners of `bb`. `None` for a void box.
pub fn line_parameter_range(line: &Line3d, bb: &BoundingBox) -> Option<(f64, f64)> {
    if bb.is_void() {
        return None;
    }
    let params = bb.corners().map(|c| line.parameter_of(&c));
    let lo = params.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = params.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((lo, hi))
}

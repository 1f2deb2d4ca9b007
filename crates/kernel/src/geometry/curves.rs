use cad_math::precision::INFINITE;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use super::frame::Frame;
use super::nurbs::NurbsCurve;
use super::point::Point3d;
use super::vector::Vec3;
use super::{GeometryError, check_positive};

/// Canonical curve kinds, as reported by [`CurveEval::curve_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    Line,
    Circle,
    Ellipse,
    Hyperbola,
    Parabola,
    Bezier,
    BSpline,
    Other,
}

/// Read-only evaluator interface consumed by the extrema algorithms.
pub trait CurveEval {
    fn value(&self, t: f64) -> Point3d;

    /// Point and first derivative.
    fn d1(&self, t: f64) -> (Point3d, Vec3);

    /// Point, first and second derivatives.
    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3);

    fn first_parameter(&self) -> f64;

    fn last_parameter(&self) -> f64;

    fn is_periodic(&self) -> bool {
        false
    }

    fn period(&self) -> Option<f64> {
        None
    }

    fn curve_type(&self) -> CurveType;

    /// Parameters in `(t0, t1)` where the curve is C⁰ but not C¹.
    fn sharp_parameters(&self, _t0: f64, _t1: f64) -> Vec<f64> {
        Vec::new()
    }
}

/// Analytic and parametric curve representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    Line(Line3d),
    Circle(Circle3d),
    Ellipse(Ellipse3d),
    Hyperbola(Hyperbola3d),
    Parabola(Parabola3d),
    BSpline(NurbsCurve),
}

/// An infinite line, unit-speed in `t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line3d {
    pub origin: Point3d,
    pub direction: Vec3,
}

impl Line3d {
    pub fn new(origin: Point3d, direction: Vec3) -> Result<Self, GeometryError> {
        let direction = direction
            .normalized()
            .ok_or(GeometryError::DegenerateDirection("line"))?;
        Ok(Self { origin, direction })
    }

    pub fn through(a: Point3d, b: Point3d) -> Result<Self, GeometryError> {
        Self::new(a, b - a)
    }

    /// Parameter of the orthogonal projection of `p`.
    pub fn parameter_of(&self, p: &Point3d) -> f64 {
        (*p - self.origin).dot(&self.direction)
    }
}

impl CurveEval for Line3d {
    fn value(&self, t: f64) -> Point3d {
        self.origin + self.direction * t
    }

    fn d1(&self, t: f64) -> (Point3d, Vec3) {
        (self.value(t), self.direction)
    }

    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3) {
        (self.value(t), self.direction, Vec3::ZERO)
    }

    fn first_parameter(&self) -> f64 {
        -INFINITE
    }

    fn last_parameter(&self) -> f64 {
        INFINITE
    }

    fn curve_type(&self) -> CurveType {
        CurveType::Line
    }
}

/// A circle in the `(x_dir, y_dir)` plane of its frame, centered at the
/// frame origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle3d {
    pub frame: Frame,
    pub radius: f64,
}

impl Circle3d {
    pub fn new(center: Point3d, normal: Vec3, radius: f64) -> Result<Self, GeometryError> {
        Self::with_frame(Frame::new(center, normal, None)?, radius)
    }

    pub fn with_frame(frame: Frame, radius: f64) -> Result<Self, GeometryError> {
        Ok(Self {
            frame,
            radius: check_positive("radius", radius)?,
        })
    }

    pub fn center(&self) -> Point3d {
        self.frame.origin
    }

    pub fn normal(&self) -> Vec3 {
        self.frame.axis
    }
}

impl CurveEval for Circle3d {
    fn value(&self, t: f64) -> Point3d {
        self.frame.origin + self.frame.radial(t) * self.radius
    }

    fn d1(&self, t: f64) -> (Point3d, Vec3) {
        (self.value(t), self.frame.tangential(t) * self.radius)
    }

    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3) {
        let radial = self.frame.radial(t) * self.radius;
        (self.frame.origin + radial, self.frame.tangential(t) * self.radius, -radial)
    }

    fn first_parameter(&self) -> f64 {
        0.0
    }

    fn last_parameter(&self) -> f64 {
        TAU
    }

    fn is_periodic(&self) -> bool {
        true
    }

    fn period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn curve_type(&self) -> CurveType {
        CurveType::Circle
    }
}

/// An ellipse with its major axis along `frame.x_dir`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipse3d {
    pub frame: Frame,
    pub major_radius: f64,
    pub minor_radius: f64,
}

impl Ellipse3d {
    pub fn new(frame: Frame, major_radius: f64, minor_radius: f64) -> Result<Self, GeometryError> {
        let major_radius = check_positive("major radius", major_radius)?;
        let minor_radius = check_positive("minor radius", minor_radius)?;
        if minor_radius > major_radius {
            return Err(GeometryError::InvalidDimension {
                name: "minor radius",
                value: minor_radius,
            });
        }
        Ok(Self {
            frame,
            major_radius,
            minor_radius,
        })
    }
}

impl CurveEval for Ellipse3d {
    fn value(&self, t: f64) -> Point3d {
        let (s, c) = t.sin_cos();
        self.frame.point_at(self.major_radius * c, self.minor_radius * s, 0.0)
    }

    fn d1(&self, t: f64) -> (Point3d, Vec3) {
        let (s, c) = t.sin_cos();
        let d = self.frame.x_dir * (-self.major_radius * s) + self.frame.y_dir * (self.minor_radius * c);
        (self.value(t), d)
    }

    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3) {
        let p = self.value(t);
        let (_, d) = self.d1(t);
        (p, d, self.frame.origin - p)
    }

    fn first_parameter(&self) -> f64 {
        0.0
    }

    fn last_parameter(&self) -> f64 {
        TAU
    }

    fn is_periodic(&self) -> bool {
        true
    }

    fn period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn curve_type(&self) -> CurveType {
        CurveType::Ellipse
    }
}

/// One branch of a hyperbola: `O + a·cosh(t)·X + b·sinh(t)·Y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperbola3d {
    pub frame: Frame,
    pub major_radius: f64,
    pub minor_radius: f64,
}

impl Hyperbola3d {
    pub fn new(frame: Frame, major_radius: f64, minor_radius: f64) -> Result<Self, GeometryError> {
        Ok(Self {
            frame,
            major_radius: check_positive("major radius", major_radius)?,
            minor_radius: check_positive("minor radius", minor_radius)?,
        })
    }
}

impl CurveEval for Hyperbola3d {
    fn value(&self, t: f64) -> Point3d {
        self.frame
            .point_at(self.major_radius * t.cosh(), self.minor_radius * t.sinh(), 0.0)
    }

    fn d1(&self, t: f64) -> (Point3d, Vec3) {
        let d = self.frame.x_dir * (self.major_radius * t.sinh()) + self.frame.y_dir * (self.minor_radius * t.cosh());
        (self.value(t), d)
    }

    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3) {
        let p = self.value(t);
        let (_, d) = self.d1(t);
        (p, d, p - self.frame.origin)
    }

    fn first_parameter(&self) -> f64 {
        -INFINITE
    }

    fn last_parameter(&self) -> f64 {
        INFINITE
    }

    fn curve_type(&self) -> CurveType {
        CurveType::Hyperbola
    }
}

/// A parabola opening along `frame.x_dir`: `O + t²/(4f)·X + t·Y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parabola3d {
    pub frame: Frame,
    pub focal: f64,
}

impl Parabola3d {
    pub fn new(frame: Frame, focal: f64) -> Result<Self, GeometryError> {
        Ok(Self {
            frame,
            focal: check_positive("focal length", focal)?,
        })
    }
}

impl CurveEval for Parabola3d {
    fn value(&self, t: f64) -> Point3d {
        self.frame.point_at(t * t / (4.0 * self.focal), t, 0.0)
    }

    fn d1(&self, t: f64) -> (Point3d, Vec3) {
        (self.value(t), self.frame.x_dir * (t / (2.0 * self.focal)) + self.frame.y_dir)
    }

    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3) {
        let (p, d) = self.d1(t);
        (p, d, self.frame.x_dir / (2.0 * self.focal))
    }

    fn first_parameter(&self) -> f64 {
        -INFINITE
    }

    fn last_parameter(&self) -> f64 {
        INFINITE
    }

    fn curve_type(&self) -> CurveType {
        CurveType::Parabola
    }
}

impl CurveEval for NurbsCurve {
    fn value(&self, t: f64) -> Point3d {
        self.evaluate(t)
    }

    fn d1(&self, t: f64) -> (Point3d, Vec3) {
        (self.evaluate(t), self.derivative(t))
    }

    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3) {
        (self.evaluate(t), self.derivative(t), self.second_derivative(t))
    }

    fn first_parameter(&self) -> f64 {
        self.domain().0
    }

    fn last_parameter(&self) -> f64 {
        self.domain().1
    }

    fn curve_type(&self) -> CurveType {
        CurveType::BSpline
    }

    fn sharp_parameters(&self, t0: f64, t1: f64) -> Vec<f64> {
        NurbsCurve::sharp_parameters(self, t0, t1)
    }
}

impl Curve {
    fn as_eval(&self) -> &dyn CurveEval {
        match self {
            Curve::Line(c) => c,
            Curve::Circle(c) => c,
            Curve::Ellipse(c) => c,
            Curve::Hyperbola(c) => c,
            Curve::Parabola(c) => c,
            Curve::BSpline(c) => c,
        }
    }
}

impl CurveEval for Curve {
    fn value(&self, t: f64) -> Point3d {
        self.as_eval().value(t)
    }

    fn d1(&self, t: f64) -> (Point3d, Vec3) {
        self.as_eval().d1(t)
    }

    fn d2(&self, t: f64) -> (Point3d, Vec3, Vec3) {
        self.as_eval().d2(t)
    }

    fn first_parameter(&self) -> f64 {
        self.as_eval().first_parameter()
    }

    fn last_parameter(&self) -> f64 {
        self.as_eval().last_parameter()
    }

    fn is_periodic(&self) -> bool {
        self.as_eval().is_periodic()
    }

    fn period(&self) -> Option<f64> {
        self.as_eval().period()
    }

    fn curve_type(&self) -> CurveType {
        self.as_eval().curve_type()
    }

    fn sharp_parameters(&self, t0: f64, t1: f64) -> Vec<f64> {
        self.as_eval().sharp_parameters(t0, t1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn xy_frame() -> Frame {
        Frame::world(Point3d::ORIGIN)
    }

    /// Central difference of `value` against the analytic `d1`.
    fn check_d1<C: CurveEval>(c: &C, t: f64) {
        let h = 1e-6;
        let fd = (c.value(t + h) - c.value(t - h)) / (2.0 * h);
        let (_, d) = c.d1(t);
        assert!((fd - d).length() < 1e-6, "{fd:?} vs {d:?}");
        let fd2 = (c.d1(t + h).1 - c.d1(t - h).1) / (2.0 * h);
        let (_, _, dd) = c.d2(t);
        assert!((fd2 - dd).length() < 1e-6, "{fd2:?} vs {dd:?}");
    }

    #[test]
    fn test_line_evaluate() {
        let l = Line3d::through(Point3d::ORIGIN, Point3d::new(3.0, 4.0, 0.0)).unwrap();
        let p = l.value(5.0);
        assert!((p.x - 3.0).abs() < 1e-12 && (p.y - 4.0).abs() < 1e-12);
        assert!((l.parameter_of(&Point3d::new(3.0, 4.0, 7.0)) - 5.0).abs() < 1e-12);
        assert!(Line3d::new(Point3d::ORIGIN, Vec3::ZERO).is_err());
    }

    #[test]
    fn test_circle_evaluate() {
        let c = Circle3d::with_frame(xy_frame(), 5.0).unwrap();
        assert!((c.value(0.0).x - 5.0).abs() < 1e-12);
        let p = c.value(FRAC_PI_2);
        assert!(p.x.abs() < 1e-12 && (p.y - 5.0).abs() < 1e-12);
        assert!(c.is_periodic() && c.period() == Some(TAU));
        check_d1(&c, 0.7);
        assert!(Circle3d::new(Point3d::ORIGIN, Vec3::Z, -1.0).is_err());
    }

    #[test]
    fn test_conic_derivatives() {
        let frame = Frame::new(Point3d::new(1.0, -1.0, 2.0), Vec3::new(0.0, 1.0, 1.0), Some(Vec3::X)).unwrap();
        check_d1(&Ellipse3d::new(frame, 3.0, 1.5).unwrap(), 2.1);
        check_d1(&Hyperbola3d::new(frame, 2.0, 1.0).unwrap(), 0.4);
        check_d1(&Parabola3d::new(frame, 0.75).unwrap(), -1.3);
    }

    #[test]
    fn test_ellipse_axes() {
        let e = Ellipse3d::new(xy_frame(), 4.0, 2.0).unwrap();
        assert!((e.value(0.0).x - 4.0).abs() < 1e-12);
        assert!((e.value(PI / 2.0).y - 2.0).abs() < 1e-12);
        assert!(Ellipse3d::new(xy_frame(), 1.0, 2.0).is_err());
    }

    #[test]
    fn test_hyperbola_and_parabola_are_unbounded() {
        let h = Curve::Hyperbola(Hyperbola3d::new(xy_frame(), 1.0, 1.0).unwrap());
        let p = Curve::Parabola(Parabola3d::new(xy_frame(), 1.0).unwrap());
        for c in [&h, &p] {
            assert_eq!(c.first_parameter(), -INFINITE);
            assert_eq!(c.last_parameter(), INFINITE);
            assert!(!c.is_periodic());
        }
        assert_eq!(h.curve_type(), CurveType::Hyperbola);
        // Vertex of x = t^2 / 4.
        let v = p.value(2.0);
        assert!((v.x - 1.0).abs() < 1e-12 && (v.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_enum_dispatch() {
        let nurbs = NurbsCurve::bspline(
            1,
            vec![Point3d::ORIGIN, Point3d::new(1.0, 1.0, 0.0), Point3d::new(2.0, 0.0, 0.0)],
            vec![0.0, 0.0, 0.5, 1.0, 1.0],
        )
        .unwrap();
        let c = Curve::BSpline(nurbs);
        assert_eq!(c.curve_type(), CurveType::BSpline);
        assert_eq!(c.first_parameter(), 0.0);
        assert_eq!(c.sharp_parameters(0.0, 1.0), vec![0.5]);
        let line = Curve::Line(Line3d::new(Point3d::ORIGIN, Vec3::X).unwrap());
        assert!(line.sharp_parameters(-10.0, 10.0).is_empty());
    }
}

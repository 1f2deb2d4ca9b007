use cad_math::precision::INFINITE;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};

use super::frame::{Frame, normalize_angle};
use super::nurbs::NurbsSurface;
use super::point::Point3d;
use super::vector::Vec3;
use super::{GeometryError, check_positive};

/// Canonical surface kinds, as reported by [`SurfaceEval::surface_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurfaceType {
    Plane,
    Cylinder,
    Cone,
    Sphere,
    Torus,
    Bezier,
    BSpline,
    Revolution,
    Extrusion,
    Offset,
    Other,
}

/// Point and partial derivatives up to order two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDerivatives {
    pub point: Point3d,
    pub du: Vec3,
    pub dv: Vec3,
    pub duu: Vec3,
    pub dvv: Vec3,
    pub duv: Vec3,
}

/// Read-only evaluator interface consumed by the extrema algorithms.
pub trait SurfaceEval {
    fn value(&self, u: f64, v: f64) -> Point3d;

    /// Point and first partial derivatives.
    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3);

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives;

    fn first_u_parameter(&self) -> f64;
    fn last_u_parameter(&self) -> f64;
    fn first_v_parameter(&self) -> f64;
    fn last_v_parameter(&self) -> f64;

    fn is_u_periodic(&self) -> bool {
        false
    }

    fn is_v_periodic(&self) -> bool {
        false
    }

    fn u_period(&self) -> Option<f64> {
        None
    }

    fn v_period(&self) -> Option<f64> {
        None
    }

    fn surface_type(&self) -> SurfaceType;
}

/// Analytic and parametric surface representations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Surface {
    Plane(Plane),
    Cylinder(Cylinder),
    Cone(Cone),
    Sphere(Sphere),
    Torus(Torus),
    BSpline(NurbsSurface),
}

/// An infinite plane: `O + u·X + v·Y`, normal `frame.axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub frame: Frame,
}

impl Plane {
    pub fn new(origin: Point3d, normal: Vec3) -> Result<Self, GeometryError> {
        Ok(Self {
            frame: Frame::new(origin, normal, None)?,
        })
    }

    pub fn with_frame(frame: Frame) -> Self {
        Self { frame }
    }

    /// The plane `z = height` with world axes.
    pub fn xy(height: f64) -> Self {
        Self::with_frame(Frame::world(Point3d::new(0.0, 0.0, height)))
    }

    pub fn normal(&self) -> Vec3 {
        self.frame.axis
    }

    /// Signed distance along the normal.
    pub fn signed_distance(&self, p: &Point3d) -> f64 {
        (*p - self.frame.origin).dot(&self.frame.axis)
    }

    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let (x, y, _) = self.frame.to_local(p);
        (x, y)
    }
}

impl SurfaceEval for Plane {
    fn value(&self, u: f64, v: f64) -> Point3d {
        self.frame.point_at(u, v, 0.0)
    }

    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3) {
        (self.value(u, v), self.frame.x_dir, self.frame.y_dir)
    }

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives {
        SurfaceDerivatives {
            point: self.value(u, v),
            du: self.frame.x_dir,
            dv: self.frame.y_dir,
            duu: Vec3::ZERO,
            dvv: Vec3::ZERO,
            duv: Vec3::ZERO,
        }
    }

    fn first_u_parameter(&self) -> f64 {
        -INFINITE
    }

    fn last_u_parameter(&self) -> f64 {
        INFINITE
    }

    fn first_v_parameter(&self) -> f64 {
        -INFINITE
    }

    fn last_v_parameter(&self) -> f64 {
        INFINITE
    }

    fn surface_type(&self) -> SurfaceType {
        SurfaceType::Plane
    }
}

/// Infinite circular cylinder: `O + R·radial(u) + v·axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cylinder {
    pub frame: Frame,
    pub radius: f64,
}

impl Cylinder {
    pub fn new(origin: Point3d, axis: Vec3, radius: f64) -> Result<Self, GeometryError> {
        Self::with_frame(Frame::new(origin, axis, None)?, radius)
    }

    pub fn with_frame(frame: Frame, radius: f64) -> Result<Self, GeometryError> {
        Ok(Self {
            frame,
            radius: check_positive("radius", radius)?,
        })
    }

    pub fn axis(&self) -> Vec3 {
        self.frame.axis
    }

    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let (x, y, z) = self.frame.to_local(p);
        (normalize_angle(y.atan2(x)), z)
    }
}

impl SurfaceEval for Cylinder {
    fn value(&self, u: f64, v: f64) -> Point3d {
        self.frame.origin + self.frame.radial(u) * self.radius + self.frame.axis * v
    }

    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3) {
        (self.value(u, v), self.frame.tangential(u) * self.radius, self.frame.axis)
    }

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives {
        SurfaceDerivatives {
            point: self.value(u, v),
            du: self.frame.tangential(u) * self.radius,
            dv: self.frame.axis,
            duu: -self.frame.radial(u) * self.radius,
            dvv: Vec3::ZERO,
            duv: Vec3::ZERO,
        }
    }

    fn first_u_parameter(&self) -> f64 {
        0.0
    }

    fn last_u_parameter(&self) -> f64 {
        TAU
    }

    fn first_v_parameter(&self) -> f64 {
        -INFINITE
    }

    fn last_v_parameter(&self) -> f64 {
        INFINITE
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn surface_type(&self) -> SurfaceType {
        SurfaceType::Cylinder
    }
}

/// Infinite cone: `O + (R + v·sin α)·radial(u) + v·cos α·axis`, `v` measured
/// along the generatrix from the reference circle of radius `R`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cone {
    pub frame: Frame,
    pub ref_radius: f64,
    pub half_angle: f64,
}

impl Cone {
    pub fn new(frame: Frame, ref_radius: f64, half_angle: f64) -> Result<Self, GeometryError> {
        if !(half_angle > 0.0 && half_angle < FRAC_PI_2) {
            return Err(GeometryError::InvalidDimension {
                name: "half angle",
                value: half_angle,
            });
        }
        if !(ref_radius >= 0.0 && ref_radius.is_finite()) {
            return Err(GeometryError::InvalidDimension {
                name: "reference radius",
                value: ref_radius,
            });
        }
        Ok(Self {
            frame,
            ref_radius,
            half_angle,
        })
    }

    pub fn apex(&self) -> Point3d {
        let (s, c) = self.half_angle.sin_cos();
        self.frame.origin + self.frame.axis * (-self.ref_radius / s * c)
    }

    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let (x, y, z) = self.frame.to_local(p);
        let (s, c) = self.half_angle.sin_cos();
        let rho = x.hypot(y);
        (normalize_angle(y.atan2(x)), (rho - self.ref_radius) * s + z * c)
    }

    fn radius_at(&self, v: f64) -> f64 {
        self.ref_radius + v * self.half_angle.sin()
    }
}

impl SurfaceEval for Cone {
    fn value(&self, u: f64, v: f64) -> Point3d {
        self.frame.origin + self.frame.radial(u) * self.radius_at(v) + self.frame.axis * (v * self.half_angle.cos())
    }

    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3) {
        let (s, c) = self.half_angle.sin_cos();
        (
            self.value(u, v),
            self.frame.tangential(u) * self.radius_at(v),
            self.frame.radial(u) * s + self.frame.axis * c,
        )
    }

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives {
        let (point, du, dv) = self.d1(u, v);
        SurfaceDerivatives {
            point,
            du,
            dv,
            duu: -self.frame.radial(u) * self.radius_at(v),
            dvv: Vec3::ZERO,
            duv: self.frame.tangential(u) * self.half_angle.sin(),
        }
    }

    fn first_u_parameter(&self) -> f64 {
        0.0
    }

    fn last_u_parameter(&self) -> f64 {
        TAU
    }

    fn first_v_parameter(&self) -> f64 {
        -INFINITE
    }

    fn last_v_parameter(&self) -> f64 {
        INFINITE
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn surface_type(&self) -> SurfaceType {
        SurfaceType::Cone
    }
}

/// Sphere: `C + R·cos v·radial(u) + R·sin v·axis`, `v` the latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub frame: Frame,
    pub radius: f64,
}

impl Sphere {
    /// Sphere with world-aligned axes.
    pub fn new(center: Point3d, radius: f64) -> Result<Self, GeometryError> {
        Self::with_frame(Frame::world(center), radius)
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

    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let (x, y, z) = self.frame.to_local(p);
        (normalize_angle(y.atan2(x)), z.atan2(x.hypot(y)))
    }
}

impl SurfaceEval for Sphere {
    fn value(&self, u: f64, v: f64) -> Point3d {
        let (sv, cv) = v.sin_cos();
        self.frame.origin + self.frame.radial(u) * (self.radius * cv) + self.frame.axis * (self.radius * sv)
    }

    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3) {
        let (sv, cv) = v.sin_cos();
        let r = self.radius;
        (
            self.value(u, v),
            self.frame.tangential(u) * (r * cv),
            self.frame.radial(u) * (-r * sv) + self.frame.axis * (r * cv),
        )
    }

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives {
        let (sv, cv) = v.sin_cos();
        let r = self.radius;
        let (point, du, dv) = self.d1(u, v);
        SurfaceDerivatives {
            point,
            du,
            dv,
            duu: self.frame.radial(u) * (-r * cv),
            dvv: self.frame.origin - point,
            duv: self.frame.tangential(u) * (-r * sv),
        }
    }

    fn first_u_parameter(&self) -> f64 {
        0.0
    }

    fn last_u_parameter(&self) -> f64 {
        TAU
    }

    fn first_v_parameter(&self) -> f64 {
        -FRAC_PI_2
    }

    fn last_v_parameter(&self) -> f64 {
        FRAC_PI_2
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn surface_type(&self) -> SurfaceType {
        SurfaceType::Sphere
    }
}

/// Torus: `C + (R + r·cos v)·radial(u) + r·sin v·axis`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Torus {
    pub frame: Frame,
    pub major_radius: f64,
    pub minor_radius: f64,
}

impl Torus {
    pub fn new(frame: Frame, major_radius: f64, minor_radius: f64) -> Result<Self, GeometryError> {
        Ok(Self {
            frame,
            major_radius: check_positive("major radius", major_radius)?,
            minor_radius: check_positive("minor radius", minor_radius)?,
        })
    }

    pub fn parameters_of(&self, p: &Point3d) -> (f64, f64) {
        let (x, y, z) = self.frame.to_local(p);
        let rho = x.hypot(y);
        (normalize_angle(y.atan2(x)), normalize_angle(z.atan2(rho - self.major_radius)))
    }
}

impl SurfaceEval for Torus {
    fn value(&self, u: f64, v: f64) -> Point3d {
        let (sv, cv) = v.sin_cos();
        let ring = self.major_radius + self.minor_radius * cv;
        self.frame.origin + self.frame.radial(u) * ring + self.frame.axis * (self.minor_radius * sv)
    }

    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3) {
        let (sv, cv) = v.sin_cos();
        let r = self.minor_radius;
        let ring = self.major_radius + r * cv;
        (
            self.value(u, v),
            self.frame.tangential(u) * ring,
            self.frame.radial(u) * (-r * sv) + self.frame.axis * (r * cv),
        )
    }

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives {
        let (sv, cv) = v.sin_cos();
        let r = self.minor_radius;
        let ring = self.major_radius + r * cv;
        let (point, du, dv) = self.d1(u, v);
        SurfaceDerivatives {
            point,
            du,
            dv,
            duu: self.frame.radial(u) * -ring,
            dvv: self.frame.radial(u) * (-r * cv) + self.frame.axis * (-r * sv),
            duv: self.frame.tangential(u) * (-r * sv),
        }
    }

    fn first_u_parameter(&self) -> f64 {
        0.0
    }

    fn last_u_parameter(&self) -> f64 {
        TAU
    }

    fn first_v_parameter(&self) -> f64 {
        0.0
    }

    fn last_v_parameter(&self) -> f64 {
        TAU
    }

    fn is_u_periodic(&self) -> bool {
        true
    }

    fn is_v_periodic(&self) -> bool {
        true
    }

    fn u_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn v_period(&self) -> Option<f64> {
        Some(TAU)
    }

    fn surface_type(&self) -> SurfaceType {
        SurfaceType::Torus
    }
}

impl SurfaceEval for NurbsSurface {
    fn value(&self, u: f64, v: f64) -> Point3d {
        self.evaluate(u, v)
    }

    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3) {
        let (du, dv) = self.partials(u, v);
        (self.evaluate(u, v), du, dv)
    }

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives {
        let (point, du, dv) = self.d1(u, v);
        let (duu, dvv, duv) = self.second_partials(u, v);
        SurfaceDerivatives {
            point,
            du,
            dv,
            duu,
            dvv,
            duv,
        }
    }

    fn first_u_parameter(&self) -> f64 {
        self.domain_u().0
    }

    fn last_u_parameter(&self) -> f64 {
        self.domain_u().1
    }

    fn first_v_parameter(&self) -> f64 {
        self.domain_v().0
    }

    fn last_v_parameter(&self) -> f64 {
        self.domain_v().1
    }

    fn surface_type(&self) -> SurfaceType {
        SurfaceType::BSpline
    }
}

impl Surface {
    fn as_eval(&self) -> &dyn SurfaceEval {
        match self {
            Surface::Plane(s) => s,
            Surface::Cylinder(s) => s,
            Surface::Cone(s) => s,
            Surface::Sphere(s) => s,
            Surface::Torus(s) => s,
            Surface::BSpline(s) => s,
        }
    }

    /// Closed-form inverse evaluation; `None` for free-form surfaces.
    pub fn parameters_of(&self, p: &Point3d) -> Option<(f64, f64)> {
        match self {
            Surface::Plane(s) => Some(s.parameters_of(p)),
            Surface::Cylinder(s) => Some(s.parameters_of(p)),
            Surface::Cone(s) => Some(s.parameters_of(p)),
            Surface::Sphere(s) => Some(s.parameters_of(p)),
            Surface::Torus(s) => Some(s.parameters_of(p)),
            Surface::BSpline(_) => None,
        }
    }
}

impl SurfaceEval for Surface {
    fn value(&self, u: f64, v: f64) -> Point3d {
        self.as_eval().value(u, v)
    }

    fn d1(&self, u: f64, v: f64) -> (Point3d, Vec3, Vec3) {
        self.as_eval().d1(u, v)
    }

    fn d2(&self, u: f64, v: f64) -> SurfaceDerivatives {
        self.as_eval().d2(u, v)
    }

    fn first_u_parameter(&self) -> f64 {
        self.as_eval().first_u_parameter()
    }

    fn last_u_parameter(&self) -> f64 {
        self.as_eval().last_u_parameter()
    }

    fn first_v_parameter(&self) -> f64 {
        self.as_eval().first_v_parameter()
    }

    fn last_v_parameter(&self) -> f64 {
        self.as_eval().last_v_parameter()
    }

    fn is_u_periodic(&self) -> bool {
        self.as_eval().is_u_periodic()
    }

    fn is_v_periodic(&self) -> bool {
        self.as_eval().is_v_periodic()
    }

    fn u_period(&self) -> Option<f64> {
        self.as_eval().u_period()
    }

    fn v_period(&self) -> Option<f64> {
        self.as_eval().v_period()
    }

    fn surface_type(&self) -> SurfaceType {
        self.as_eval().surface_type()
    }
}

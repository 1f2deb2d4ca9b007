use std::f64::consts::PI;
use tracing::{instrument, trace};

use super::{Collector, Interior, finish};
use crate::extrema::{Domain4D, ExtremaConfig, ExtremaResult, SearchMode};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Cylinder, Plane, SurfaceEval};

/// Extrema between a plane and a cylinder.
///
/// - axis parallel to the plane: a whole generator line is equidistant;
/// - axis normal to the plane: the contact circle lies in the plane;
/// - otherwise two generators cross the plane where the normal's projection
///   onto the cross-section is extremal.
///
/// An oblique cylinder runs off to infinity on both sides of the plane, so the
/// interior solve yields minima only. With a bounded domain the maximum comes
/// from the boundary pass, which pairs the farthest edge samples.
#[derive(Debug, Clone)]
pub struct PlaneCylinder {
    plane: Plane,
    cylinder: Cylinder,
    domain: Option<Domain4D>,
    swapped: bool,
    config: ExtremaConfig,
}

impl PlaneCylinder {
    pub fn new(plane: Plane, cylinder: Cylinder) -> Self {
        Self {
            plane,
            cylinder,
            domain: None,
            swapped: false,
            config: ExtremaConfig::default(),
        }
    }

    /// Cylinder given first: parameters come back in `(cylinder, plane)` order.
    pub fn new_reversed(cylinder: Cylinder, plane: Plane) -> Self {
        Self {
            swapped: true,
            ..Self::new(plane, cylinder)
        }
    }

    /// Domains in the caller's argument order.
    pub fn with_domain(mut self, domain: Domain4D) -> Self {
        self.domain = Some(if self.swapped { domain.swapped() } else { domain });
        self
    }

    pub fn with_config(mut self, config: ExtremaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn value1(&self, u: f64, v: f64) -> Point3d {
        if self.swapped { self.cylinder.value(u, v) } else { self.plane.value(u, v) }
    }

    pub fn value2(&self, u: f64, v: f64) -> Point3d {
        if self.swapped { self.plane.value(u, v) } else { self.cylinder.value(u, v) }
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    pub fn is_bounded(&self) -> bool {
        self.domain.is_some()
    }

    #[instrument(skip(self), level = "trace")]
    pub fn perform(&self, tol: f64, mode: SearchMode) -> ExtremaResult {
        finish(
            &self.plane,
            &self.cylinder,
            self.domain.as_ref(),
            self.config.boundary_samples,
            self.swapped,
            tol,
            mode,
            |out| self.solve(out, mode),
        )
    }

    fn solve(&self, out: &mut Collector<'_, Plane, Cylinder>, mode: SearchMode) -> Interior {
        let (plane, cyl) = (&self.plane, &self.cylinder);
        let n = plane.normal();
        let axis = cyl.axis();
        let r = cyl.radius;
        let cos = axis.dot(&n);
        let d0 = plane.signed_distance(&cyl.frame.origin);
        let angular = self.config.angular_tolerance;

        if cos.abs() < angular {
            // Axis parallel to the plane.
            let side = if d0 >= 0.0 { 1.0 } else { -1.0 };
            let gap = (d0.abs() - r).max(0.0);
            let on_cyl = if d0.abs() > r {
                cyl.frame.origin - n * (side * r)
            } else {
                // A point of the intersection line.
                let across = axis.cross(&n);
                cyl.frame.origin - n * d0 + across * (r * r - d0 * d0).sqrt()
            };
            let on_plane = on_cyl - n * plane.signed_distance(&on_cyl);
            out.add_points(
                plane.parameters_of(&on_plane),
                cyl.parameters_of(&on_cyl),
                &on_plane,
                &on_cyl,
                true,
            );
            trace!(gap, "cylinder axis parallel to plane");
            return Interior::Infinite(gap * gap);
        }

        // Height along the axis where a generator at angle `u` meets the plane.
        let crossing = |u: f64| -(d0 + r * n.dot(&cyl.frame.radial(u))) / cos;

        if cos.abs() > 1.0 - angular {
            let v = crossing(0.0);
            let p = cyl.value(0.0, v);
            out.add_points(plane.parameters_of(&p), (0.0, v), &p, &p, true);
            return Interior::Infinite(0.0);
        }

        if mode.wants_min() {
            let u_star = n.dot(&cyl.frame.y_dir).atan2(n.dot(&cyl.frame.x_dir));
            for u in [u_star, u_star + PI] {
                let v = crossing(u);
                let p = cyl.value(u, v);
                out.add_points(plane.parameters_of(&p), (u, v), &p, &p, true);
            }
        }
        Interior::Finite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::{Domain2D, Params, Status};
    use crate::geometry::vector::Vec3;
    use std::f64::consts::TAU;

    #[test]
    fn test_axis_parallel_apart() {
        let cyl = Cylinder::new(Point3d::new(0.0, 0.0, 5.0), Vec3::X, 2.0).unwrap();
        let r = PlaneCylinder::new(Plane::xy(0.0), cyl).perform(1e-7, SearchMode::MinMax);
        assert_eq!(r.status(), Status::InfiniteSolutions);
        assert!((r.infinite_square_distance().unwrap() - 9.0).abs() < 1e-12);
        let e = r.extremum(0).unwrap();
        assert!((e.point2.z - 3.0).abs() < 1e-12);
        assert!((e.point1.square_distance(&e.point2) - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_axis_parallel_crossing() {
        let cyl = Cylinder::new(Point3d::new(0.0, 0.0, 1.0), Vec3::Y, 2.0).unwrap();
        let r = PlaneCylinder::new(Plane::xy(0.0), cyl).perform(1e-7, SearchMode::MinMax);
        assert_eq!(r.infinite_square_distance().unwrap(), 0.0);
        let e = r.extremum(0).unwrap();
        assert!(e.point2.z.abs() < 1e-12);
    }

    #[test]
    fn test_axis_normal_to_plane() {
        let cyl = Cylinder::new(Point3d::new(1.0, 1.0, 4.0), Vec3::Z, 0.5).unwrap();
        let r = PlaneCylinder::new(Plane::xy(0.0), cyl).perform(1e-7, SearchMode::MinMax);
        assert_eq!(r.status(), Status::InfiniteSolutions);
        assert_eq!(r.infinite_square_distance().unwrap(), 0.0);
        let Params::Surface(_, v) = r.extremum(0).unwrap().params2 else { panic!() };
        assert!((v + 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_oblique_axis_two_minima() {
        let cyl = Cylinder::new(Point3d::new(0.0, 0.0, 3.0), Vec3::new(1.0, 0.0, 1.0), 1.0).unwrap();
        let r = PlaneCylinder::new(Plane::xy(0.0), cyl).perform(1e-7, SearchMode::MinMax);
        assert_eq!(r.status(), Status::Ok);
        assert_eq!(r.nb_ext(), 2);
        for e in r.extrema() {
            assert!(e.is_minimum);
            assert!(e.square_distance < 1e-20);
            assert!(e.point2.z.abs() < 1e-9, "{:?}", e.point2);
        }
    }

    #[test]
    fn test_oblique_bounded_domain_reports_edge_maximum() {
        let cyl = Cylinder::new(Point3d::new(0.0, 0.0, 3.0), Vec3::new(1.0, 0.0, 1.0), 1.0).unwrap();
        let domain = Domain4D::new(
            Domain2D::new(-5.0, 5.0, -5.0, 5.0),
            Domain2D::new(0.0, TAU, -2.0, 2.0),
        );
        let r = PlaneCylinder::new(Plane::xy(0.0), cyl)
            .with_domain(domain)
            .perform(1e-7, SearchMode::MinMax);
        assert_eq!(r.status(), Status::Ok);
        let max = r.extrema().iter().find(|e| !e.is_minimum).expect("edge maximum");
        assert!(r.extrema().iter().all(|e| e.square_distance <= max.square_distance));
        assert!((max.point1.square_distance(&max.point2) - max.square_distance).abs() < 1e-9);
        // Top rim of the segment is at least 3 + 2 / sqrt(2) above the plane.
        assert!(max.square_distance > 16.0);

        let unbounded = PlaneCylinder::new(Plane::xy(0.0), cyl).perform(1e-7, SearchMode::Max);
        assert_eq!(unbounded.status(), Status::NoSolution);
        assert_eq!(unbounded.nb_ext(), 0);
    }

    #[test]
    fn test_reversed_is_symmetric() {
        let plane = Plane::new(Point3d::new(0.0, 0.0, -1.0), Vec3::new(0.2, 0.1, 1.0)).unwrap();
        let cyl = Cylinder::new(Point3d::new(1.0, 0.0, 2.0), Vec3::new(1.0, 2.0, 0.5), 0.75).unwrap();
        let a = PlaneCylinder::new(plane, cyl).perform(1e-7, SearchMode::MinMax);
        let b = PlaneCylinder::new_reversed(cyl, plane).perform(1e-7, SearchMode::MinMax);
        assert!(b.is_done());
        assert_eq!(a.nb_ext(), b.nb_ext());
        for (x, y) in a.extrema().iter().zip(b.extrema()) {
            assert_eq!(x.square_distance, y.square_distance);
            assert_eq!(x.params1, y.params2);
            assert_eq!(x.params2, y.params1);
        }
    }

    #[test]
    fn test_bounded_parallel_cylinder_reaches_plane_patch() {
        // Cylinder segment hovering over a plane patch: the generator line is
        // over the patch, so the constant distance is realised.
        let cyl = Cylinder::new(Point3d::new(0.0, 0.0, 5.0), Vec3::X, 2.0).unwrap();
        let domain = Domain4D::new(
            Domain2D::new(-10.0, 10.0, -10.0, 10.0),
            Domain2D::new(0.0, TAU, -1.0, 1.0),
        );
        let r = PlaneCylinder::new(Plane::xy(0.0), cyl)
            .with_domain(domain)
            .perform(1e-7, SearchMode::Min);
        assert_eq!(r.status(), Status::InfiniteSolutions);
        assert!((r.infinite_square_distance().unwrap() - 9.0).abs() < 1e-12);
    }
}

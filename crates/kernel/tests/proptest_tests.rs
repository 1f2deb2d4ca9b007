//! Property-based tests for the extrema dispatchers using the `proptest` crate.

use approx::assert_abs_diff_eq;
use proptest::prelude::*;

use cad_kernel::extrema::{Domain2D, Params, SearchMode, Status};
use cad_kernel::geometry::{Circle3d, Curve, Cylinder, Line3d, Plane, Point3d, Sphere, Surface, SurfaceEval, Vec3};
use cad_kernel::{
    CurveSurfaceExtrema, ExtremaConfig, ExtremaCurveCurve, ExtremaCurveSurface, ExtremaPointCurve, ExtremaSurfaceSurface,
    Tolerance,
};
use cad_math::precision::INFINITE;
use std::f64::consts::TAU;

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_point() -> impl Strategy<Value = Point3d> {
    (-20.0f64..20.0, -20.0f64..20.0, -20.0f64..20.0).prop_map(|(x, y, z)| Point3d::new(x, y, z))
}

/// Direction with length well away from zero.
fn arb_direction() -> impl Strategy<Value = Vec3> {
    (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0)
        .prop_map(|(x, y, z)| Vec3::new(x, y, z))
        .prop_filter("direction too short", |v| v.length() > 0.2)
}

fn arb_radius() -> impl Strategy<Value = f64> {
    0.5f64..5.0
}

fn natural(s: &Surface) -> Domain2D {
    Domain2D::new(
        s.first_u_parameter(),
        s.last_u_parameter(),
        s.first_v_parameter(),
        s.last_v_parameter(),
    )
}

fn curve_surface(curve: &Curve, surface: &Surface, t0: f64, t1: f64) -> CurveSurfaceExtrema {
    let tolerance = Tolerance::default();
    let mut ext = ExtremaCurveSurface::new(tolerance.extrema_config());
    ext.initialize_with_tolerance(surface, &tolerance).unwrap();
    ext.perform(curve, t0, t1).unwrap()
}

/// No two extrema closer than the tolerance in every parameter at once.
fn assert_distinct(r: &CurveSurfaceExtrema, tol: f64) {
    let ex = r.extrema();
    for i in 0..ex.len() {
        for j in i + 1..ex.len() {
            let (ti, tj) = (ex[i].params1.curve().unwrap(), ex[j].params1.curve().unwrap());
            let (ui, vi) = ex[i].params2.surface().unwrap();
            let (uj, vj) = ex[j].params2.surface().unwrap();
            assert!(
                (ti - tj).abs() > tol || (ui - uj).abs() > tol || (vi - vj).abs() > tol,
                "extrema {i} and {j} coincide: {:?} / {:?}",
                ex[i],
                ex[j]
            );
        }
    }
}

// ---------------------------------------------------------------------------
// 1. Curve/surface results never hold two copies of the same solution
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn line_sphere_extrema_are_distinct(
        origin in arb_point(),
        dir in arb_direction(),
        center in arb_point(),
        r in arb_radius(),
    ) {
        let line = Curve::Line(Line3d::new(origin, dir).unwrap());
        let sphere = Surface::Sphere(Sphere::new(center, r).unwrap());
        let result = curve_surface(&line, &sphere, -1e3, 1e3);
        prop_assert!(result.is_done());
        assert_distinct(&result, Tolerance::default().parametric);
    }

    #[test]
    fn line_cylinder_extrema_are_distinct(
        origin in arb_point(),
        dir in arb_direction(),
        axis in arb_direction(),
        r in arb_radius(),
    ) {
        let line = Curve::Line(Line3d::new(origin, dir).unwrap());
        let cyl = Surface::Cylinder(Cylinder::new(Point3d::ORIGIN, axis, r).unwrap());
        let result = curve_surface(&line, &cyl, -1e3, 1e3);
        prop_assert!(result.is_done());
        if !result.is_parallel().unwrap() {
            assert_distinct(&result, Tolerance::default().parametric);
        }
    }

    #[test]
    fn circle_plane_extrema_are_distinct(
        center in arb_point(),
        normal in arb_direction(),
        r in arb_radius(),
        height in -10.0f64..10.0,
    ) {
        let circle = Curve::Circle(Circle3d::new(center, normal, r).unwrap());
        let plane = Surface::Plane(Plane::xy(height));
        let result = curve_surface(&circle, &plane, 0.0, std::f64::consts::TAU);
        prop_assert!(result.is_done());
        if !result.is_parallel().unwrap() {
            assert_distinct(&result, Tolerance::default().parametric);
            // Every reported pair sits at its own squared distance.
            for e in result.extrema() {
                prop_assert!((e.point1.square_distance(&e.point2) - e.square_distance).abs() < 1e-9);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 2. Plane/cylinder gives the same answer in either argument order
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn plane_cylinder_is_symmetric(
        plane_origin in arb_point(),
        normal in arb_direction(),
        cyl_origin in arb_point(),
        axis in arb_direction(),
        r in arb_radius(),
    ) {
        let plane = Surface::Plane(Plane::new(plane_origin, normal).unwrap());
        let cyl = Surface::Cylinder(Cylinder::new(cyl_origin, axis, r).unwrap());
        let ss = ExtremaSurfaceSurface::new(ExtremaConfig::default());
        let a = ss.perform(&plane, natural(&plane), &cyl, natural(&cyl), 1e-7, SearchMode::MinMax);
        let b = ss.perform(&cyl, natural(&cyl), &plane, natural(&plane), 1e-7, SearchMode::MinMax);

        prop_assert_eq!(a.status(), b.status());
        prop_assert_eq!(a.nb_ext(), b.nb_ext());
        if a.status() == Status::InfiniteSolutions {
            prop_assert_eq!(a.infinite_square_distance().unwrap(), b.infinite_square_distance().unwrap());
        }
        for (x, y) in a.extrema().iter().zip(b.extrema()) {
            prop_assert_eq!(x.square_distance, y.square_distance);
            prop_assert_eq!(x.params1, y.params2);
            prop_assert_eq!(x.params2, y.params1);
            prop_assert_eq!(x.point1, y.point2);
            prop_assert_eq!(x.point2, y.point1);
        }
    }
}

// ---------------------------------------------------------------------------
// 3. Separated spheres: extrema along the line of centers
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn separated_spheres_min_and_max(
        c1 in arb_point(),
        c2 in arb_point(),
        r1 in arb_radius(),
        r2 in arb_radius(),
    ) {
        let d = c1.distance_to(&c2);
        prop_assume!(d > r1 + r2 + 1e-3);
        let s1 = Surface::Sphere(Sphere::new(c1, r1).unwrap());
        let s2 = Surface::Sphere(Sphere::new(c2, r2).unwrap());
        let r = ExtremaSurfaceSurface::default().perform(&s1, natural(&s1), &s2, natural(&s2), 1e-7, SearchMode::MinMax);
        prop_assert_eq!(r.status(), Status::Ok);
        let min = r.extrema().iter().find(|e| e.is_minimum).unwrap();
        let max = r.extrema().iter().find(|e| !e.is_minimum).unwrap();
        let scale = (d + r1 + r2).powi(2);
        prop_assert!((min.square_distance - (d - r1 - r2).powi(2)).abs() < 1e-9 * scale);
        prop_assert!((max.square_distance - (d + r1 + r2).powi(2)).abs() < 1e-9 * scale);
    }
}

// ---------------------------------------------------------------------------
// 4. Point/circle and line/line distances match their closed forms
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn point_circle_min_and_max(
        center in arb_point(),
        normal in arb_direction(),
        radius in arb_radius(),
        p in arb_point(),
    ) {
        let axis = normal.normalized().unwrap();
        let w = p - center;
        let h = w.dot(&axis);
        let rho = w.reject_from(&axis).length();
        prop_assume!(rho > 1e-3);
        let circle = Curve::Circle(Circle3d::new(center, normal, radius).unwrap());
        let r = ExtremaPointCurve::new(&circle, (0.0, TAU), &ExtremaConfig::default())
            .unwrap()
            .perform(&p, 1e-9, SearchMode::MinMax);
        prop_assert_eq!(r.nb_ext(), 2);
        let scale = (rho + radius).powi(2) + h * h;
        let min = r.min_square_distance().unwrap();
        let max = r.max_square_distance().unwrap();
        prop_assert!((min - ((rho - radius).powi(2) + h * h)).abs() < 1e-9 * scale);
        prop_assert!((max - ((rho + radius).powi(2) + h * h)).abs() < 1e-9 * scale);
    }

    #[test]
    fn skew_lines_meet_common_perpendicular(
        o1 in arb_point(),
        d1 in arb_direction(),
        o2 in arb_point(),
        d2 in arb_direction(),
    ) {
        let (u1, u2) = (d1.normalized().unwrap(), d2.normalized().unwrap());
        let normal = u1.cross(&u2);
        prop_assume!(normal.length() > 0.1);
        let a = Curve::Line(Line3d::new(o1, d1).unwrap());
        let b = Curve::Line(Line3d::new(o2, d2).unwrap());
        let all = (-INFINITE, INFINITE);
        let r = ExtremaCurveCurve::new(&a, all, &b, all).unwrap().perform(1e-9, SearchMode::MinMax).unwrap();
        prop_assert_eq!(r.nb_ext(), 1);
        let e = r.extremum(0).unwrap();
        let exact = ((o1 - o2).dot(&normal) / normal.length()).powi(2);
        let scale = 1.0 + o1.square_distance(&o2);
        prop_assert!((e.square_distance - exact).abs() < 1e-9 * scale);
        // The connecting segment is orthogonal to both lines.
        let link = e.point2 - e.point1;
        prop_assert!(link.dot(&u1).abs() < 1e-7 * scale.sqrt());
        prop_assert!(link.dot(&u2).abs() < 1e-7 * scale.sqrt());
    }
}

// ---------------------------------------------------------------------------
// 5. End-to-end scenarios
// ---------------------------------------------------------------------------

#[test]
fn concentric_spheres_scenario() {
    let s1 = Surface::Sphere(Sphere::new(Point3d::ORIGIN, 1.0).unwrap());
    let s2 = Surface::Sphere(Sphere::new(Point3d::ORIGIN, 2.0).unwrap());
    let r = ExtremaSurfaceSurface::default().perform(&s1, natural(&s1), &s2, natural(&s2), 1e-7, SearchMode::MinMax);
    assert_eq!(r.status(), Status::InfiniteSolutions);
    assert_abs_diff_eq!(r.infinite_square_distance().unwrap(), 1.0, epsilon = 1e-12);
}

#[test]
fn parallel_planes_scenario() {
    let p1 = Surface::Plane(Plane::xy(0.0));
    let p2 = Surface::Plane(Plane::xy(5.0));
    let r = ExtremaSurfaceSurface::default().perform(&p1, natural(&p1), &p2, natural(&p2), 1e-7, SearchMode::MinMax);
    assert_eq!(r.status(), Status::InfiniteSolutions);
    assert_abs_diff_eq!(r.infinite_square_distance().unwrap(), 25.0, epsilon = 1e-12);
}

#[test]
fn plane_and_sphere_scenario() {
    let plane = Surface::Plane(Plane::xy(0.0));
    let sphere = Surface::Sphere(Sphere::new(Point3d::new(0.0, 0.0, 10.0), 3.0).unwrap());
    let r = ExtremaSurfaceSurface::default().perform(
        &plane,
        natural(&plane),
        &sphere,
        natural(&sphere),
        1e-7,
        SearchMode::MinMax,
    );
    assert_eq!(r.status(), Status::Ok);
    assert_eq!(r.nb_ext(), 2);
    let mut sq: Vec<f64> = r.extrema().iter().map(|e| e.square_distance).collect();
    sq.sort_by(f64::total_cmp);
    assert_abs_diff_eq!(sq[0], 49.0, epsilon = 1e-9);
    assert_abs_diff_eq!(sq[1], 169.0, epsilon = 1e-9);
    for e in r.extrema() {
        let Params::Surface(u, v) = e.params1 else { panic!("plane parameters expected") };
        assert_abs_diff_eq!(u, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(v, 0.0, epsilon = 1e-12);
    }
}

#[test]
fn line_grazing_sphere_end_to_end() {
    let line = Curve::Line(Line3d::new(Point3d::new(-10.0, 0.0, 4.0), Vec3::X).unwrap());
    let sphere = Surface::Sphere(Sphere::new(Point3d::ORIGIN, 3.0).unwrap());
    let r = curve_surface(&line, &sphere, -1e100, 1e100);
    assert_eq!(r.nb_ext().unwrap(), 2);
    assert_abs_diff_eq!(r.min_square_distance().unwrap(), 1.0, epsilon = 1e-12);
    let (on_line, on_sphere) = r.points(1).unwrap();
    assert_abs_diff_eq!(on_line.distance_to(&on_sphere).powi(2), r.square_distance(1).unwrap(), epsilon = 1e-9);
}

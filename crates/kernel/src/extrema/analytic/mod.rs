//! Closed-form extrema between canonical surface pairs.
//!
//! Each pair solves in a canonical argument order (plane first, then sphere
//! or cylinder) and swaps its output back when it was built the other way
//! round. An optional bounded domain restricts interior solutions and adds
//! the extrema found along the domain edges.

mod boundary;
mod plane_cylinder;
mod plane_plane;
mod plane_sphere;
mod sphere_sphere;

pub use plane_cylinder::PlaneCylinder;
pub use plane_plane::PlanePlane;
pub use plane_sphere::PlaneSphere;
pub use sphere_sphere::SphereSphere;

use std::f64::consts::TAU;
use tracing::debug;

use super::{Domain2D, Domain4D, Extremum, ExtremaResult, Params, SearchMode, normalize_periodic};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Cylinder, Plane, Sphere, SurfaceEval};

/// Below this distance from an axis or center the direction to a point is
/// undefined.
const AXIS_CONFUSION: f64 = 1e-12;

/// What the interior solve found before the domain is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Interior {
    /// Isolated extrema, possibly none.
    Finite,
    /// The distance is constant along a continuum of point pairs.
    Infinite(f64),
}

/// Accumulates extrema in canonical order, dropping duplicates.
pub(crate) struct Collector<'a, A, B> {
    first: &'a A,
    second: &'a B,
    tol: f64,
    extrema: Vec<Extremum>,
}

impl<'a, A: SurfaceEval, B: SurfaceEval> Collector<'a, A, B> {
    pub(crate) fn new(first: &'a A, second: &'a B, tol: f64) -> Self {
        Self {
            first,
            second,
            tol,
            extrema: Vec::new(),
        }
    }

    /// Adds an extremum unless one with the same distance and parameters
    /// (angles compared modulo 2π) is already present.
    pub(crate) fn add(&mut self, (u1, v1): (f64, f64), (u2, v2): (f64, f64), square_distance: f64, is_minimum: bool) {
        let u1 = fold_u(self.first, u1);
        let u2 = fold_u(self.second, u2);
        let tol = self.tol;
        let duplicate = self.extrema.iter().any(|e| {
            let (Params::Surface(eu1, ev1), Params::Surface(eu2, ev2)) = (e.params1, e.params2) else {
                return false;
            };
            (e.square_distance - square_distance).abs() < tol * tol
                && angle_close(eu1, u1, self.first.is_u_periodic(), tol)
                && angle_close(eu2, u2, self.second.is_u_periodic(), tol)
                && (ev1 - v1).abs() < tol
                && (ev2 - v2).abs() < tol
        });
        if duplicate {
            return;
        }
        self.extrema.push(Extremum {
            params1: Params::Surface(u1, v1),
            params2: Params::Surface(u2, v2),
            point1: self.first.value(u1, v1),
            point2: self.second.value(u2, v2),
            square_distance,
            is_minimum,
        });
    }

    /// Adds the pair `(p1, p2)` located by their parameters.
    pub(crate) fn add_points(
        &mut self,
        params1: (f64, f64),
        params2: (f64, f64),
        p1: &Point3d,
        p2: &Point3d,
        is_minimum: bool,
    ) {
        self.add(params1, params2, p1.square_distance(p2), is_minimum);
    }

    fn retain_inside(&mut self, domain: &Domain4D) {
        let (first, second, tol) = (self.first, self.second, self.tol);
        self.extrema.retain(|e| {
            let (Params::Surface(u1, v1), Params::Surface(u2, v2)) = (e.params1, e.params2) else {
                return false;
            };
            domain.first.contains(u1, v1, first.is_u_periodic(), tol)
                && domain.second.contains(u2, v2, second.is_u_periodic(), tol)
        });
    }

    fn into_extrema(self) -> Vec<Extremum> {
        self.extrema
    }
}

fn fold_u<S: SurfaceEval>(surface: &S, u: f64) -> f64 {
    if surface.is_u_periodic() {
        normalize_periodic(u, surface.first_u_parameter(), TAU)
    } else {
        u
    }
}

fn angle_close(a: f64, b: f64, periodic: bool, tol: f64) -> bool {
    let d = (a - b).abs();
    d < tol || (periodic && (d - TAU).abs() < tol)
}

/// Nearest and farthest points of a surface patch from a point, in closed
/// form. `None` where the answer is undefined or unbounded.
pub(crate) trait ClosedFormProjection: SurfaceEval {
    fn nearest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)>;
    fn farthest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)>;
}

impl ClosedFormProjection for Plane {
    fn nearest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)> {
        let (u, v) = self.parameters_of(p);
        Some((u.clamp(domain.u_min, domain.u_max), v.clamp(domain.v_min, domain.v_max)))
    }

    fn farthest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)> {
        if !domain.is_finite() {
            return None;
        }
        domain
            .corners()
            .into_iter()
            .max_by(|a, b| {
                let da = self.value(a.0, a.1).square_distance(p);
                let db = self.value(b.0, b.1).square_distance(p);
                da.total_cmp(&db)
            })
    }
}

impl ClosedFormProjection for Sphere {
    fn nearest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)> {
        if p.distance_to(&self.center()) < AXIS_CONFUSION {
            return None;
        }
        let (u, v) = self.parameters_of(p);
        Some((clamp_angle(u, domain.u_min, domain.u_max), v.clamp(domain.v_min, domain.v_max)))
    }

    fn farthest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)> {
        let c = self.center();
        if p.distance_to(&c) < AXIS_CONFUSION {
            return None;
        }
        let (u, v) = self.parameters_of(&(c - (*p - c)));
        Some((clamp_angle(u, domain.u_min, domain.u_max), v.clamp(domain.v_min, domain.v_max)))
    }
}

impl ClosedFormProjection for Cylinder {
    fn nearest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)> {
        let (x, y, z) = self.frame.to_local(p);
        if x.hypot(y) < AXIS_CONFUSION {
            return None;
        }
        Some((clamp_angle(y.atan2(x), domain.u_min, domain.u_max), z.clamp(domain.v_min, domain.v_max)))
    }

    fn farthest(&self, p: &Point3d, domain: &Domain2D) -> Option<(f64, f64)> {
        let (x, y, z) = self.frame.to_local(p);
        if x.hypot(y) < AXIS_CONFUSION || !domain.is_finite() {
            return None;
        }
        let u = y.atan2(x) + std::f64::consts::PI;
        Some((clamp_angle(u, domain.u_min, domain.u_max), z.clamp(domain.v_min, domain.v_max)))
    }
}

/// Angle folded into `[lo, lo + 2π)` and clamped to the nearer end of
/// `[lo, hi]` when it falls outside.
pub(crate) fn clamp_angle(u: f64, lo: f64, hi: f64) -> f64 {
    let folded = normalize_periodic(u, lo, TAU);
    if folded <= hi {
        return folded;
    }
    let past_hi = folded - hi;
    let before_lo = lo + TAU - folded;
    if past_hi <= before_lo { hi } else { lo }
}

/// Shared `perform` body: interior solve, domain filtering, boundary pass,
/// and the final swap back to the caller's argument order.
#[allow(clippy::too_many_arguments)]
pub(crate) fn finish<A, B>(
    first: &A,
    second: &B,
    domain: Option<&Domain4D>,
    boundary_samples: usize,
    swapped: bool,
    tol: f64,
    mode: SearchMode,
    solve: impl FnOnce(&mut Collector<'_, A, B>) -> Interior,
) -> ExtremaResult
where
    A: ClosedFormProjection,
    B: ClosedFormProjection,
{
    let mut collector = Collector::new(first, second, tol);
    let interior = solve(&mut collector);

    let result = match (interior, domain) {
        (Interior::Infinite(square_distance), None) => {
            ExtremaResult::infinite(square_distance, collector.into_extrema().into_iter().next())
        }
        (Interior::Finite, None) => ExtremaResult::finite(collector.into_extrema()),
        (interior, Some(domain)) => {
            collector.retain_inside(domain);
            let edges = boundary::edge_extrema(first, second, domain, boundary_samples, mode);
            let realized = match (interior, edges.min.as_ref()) {
                (Interior::Infinite(d), Some(best)) => {
                    (best.square_distance.sqrt() - d.sqrt()).abs() <= tol
                }
                _ => false,
            };
            if let (Interior::Infinite(d), true) = (interior, realized) {
                ExtremaResult::infinite(d, edges.min.map(|c| c.into_extremum(first, second)))
            } else {
                for c in [edges.min, edges.max].into_iter().flatten() {
                    collector.add(c.params1, c.params2, c.square_distance, c.is_minimum);
                }
                ExtremaResult::finite(collector.into_extrema())
            }
        }
    };
    debug!(status = ?result.status(), nb_ext = result.nb_ext(), swapped, "analytic surface pair");
    if swapped { result.swapped() } else { result }
}

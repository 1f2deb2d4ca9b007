//! Nearest point of a surface patch from a point.
//!
//! The patch is sampled once on a regular grid. Each query builds the
//! squared-distance table padded with infinity, so border nodes compete only
//! with real neighbours, and refines every local minimum with a damped
//! Newton iteration on the gradient of the squared distance.

use nalgebra::{Matrix2, Vector2};
use tracing::trace;

use super::{Domain2D, ExtremaConfig, ExtremaError};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::SurfaceEval;

/// Step halvings before a Newton iterate that increases the distance is
/// abandoned.
const MAX_DAMPING: usize = 8;

pub struct ExtremaPointSurface<'a, S: SurfaceEval + ?Sized> {
    surface: &'a S,
    domain: Domain2D,
    tol_u: f64,
    tol_v: f64,
    max_iterations: usize,
    us: Vec<f64>,
    vs: Vec<f64>,
    /// Row-major in `u`: node `(i, j)` at `i * vs.len() + j`.
    grid: Vec<Point3d>,
}

impl<'a, S: SurfaceEval + ?Sized> ExtremaPointSurface<'a, S> {
    pub fn new(
        surface: &'a S,
        domain: Domain2D,
        tol_u: f64,
        tol_v: f64,
        config: &ExtremaConfig,
    ) -> Result<Self, ExtremaError> {
        if !domain.is_finite() {
            return Err(ExtremaError::UnboundedDomain(format!(
                "point projection needs a finite patch, got {domain:?}"
            )));
        }
        let us = samples(domain.u_min, domain.u_max, config.nb_u);
        let vs = samples(domain.v_min, domain.v_max, config.nb_v);
        let grid = us
            .iter()
            .flat_map(|&u| vs.iter().map(move |&v| surface.value(u, v)))
            .collect();
        Ok(Self {
            surface,
            domain,
            tol_u,
            tol_v,
            max_iterations: config.max_newton_iterations,
            us,
            vs,
            grid,
        })
    }

    /// Parameters and squared distance of the nearest point of the patch.
    /// `None` only if no grid node evaluates to a finite point.
    pub fn nearest(&self, p: &Point3d) -> Option<(f64, f64, f64)> {
        let (nu, nv) = (self.us.len(), self.vs.len());
        let padded = |i: usize, j: usize| -> f64 {
            if i == 0 || j == 0 || i > nu || j > nv {
                return f64::INFINITY;
            }
            let d = self.grid[(i - 1) * nv + (j - 1)].square_distance(p);
            if d.is_nan() { f64::INFINITY } else { d }
        };

        let mut best: Option<(f64, f64, f64)> = None;
        let mut seeds = 0usize;
        for i in 1..=nu {
            for j in 1..=nv {
                let d = padded(i, j);
                if !d.is_finite() {
                    continue;
                }
                let is_local_min = (i - 1..=i + 1)
                    .flat_map(|a| (j - 1..=j + 1).map(move |b| (a, b)))
                    .filter(|&(a, b)| (a, b) != (i, j))
                    .all(|(a, b)| d <= padded(a, b));
                if !is_local_min {
                    continue;
                }
                seeds += 1;
                let refined = self.refine(p, self.us[i - 1], self.vs[j - 1], d);
                if best.is_none_or(|(_, _, b)| refined.2 < b) {
                    best = Some(refined);
                }
            }
        }
        trace!(seeds, ?best, "point/surface projection");
        best
    }

    /// Damped Newton on `((S - P)·Su, (S - P)·Sv) = 0`, clamped to the
    /// patch. Never returns a point farther than the seed.
    fn refine(&self, p: &Point3d, u0: f64, v0: f64, d0: f64) -> (f64, f64, f64) {
        let (mut u, mut v, mut d) = (u0, v0, d0);
        for _ in 0..self.max_iterations {
            let s = self.surface.d2(u, v);
            let w = s.point - *p;
            let gradient = Vector2::new(w.dot(&s.du), w.dot(&s.dv));
            let hessian = Matrix2::new(
                s.du.dot(&s.du) + w.dot(&s.duu),
                s.du.dot(&s.dv) + w.dot(&s.duv),
                s.du.dot(&s.dv) + w.dot(&s.duv),
                s.dv.dot(&s.dv) + w.dot(&s.dvv),
            );
            let Some(step) = hessian.lu().solve(&(-gradient)) else {
                break;
            };

            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_DAMPING {
                let nu = (u + scale * step.x).clamp(self.domain.u_min, self.domain.u_max);
                let nv = (v + scale * step.y).clamp(self.domain.v_min, self.domain.v_max);
                let nd = self.surface.value(nu, nv).square_distance(p);
                if nd <= d {
                    accepted = Some((nu, nv, nd));
                    break;
                }
                scale *= 0.5;
            }
            let Some((nu, nv, nd)) = accepted else {
                break;
            };
            let converged = (nu - u).abs() < self.tol_u && (nv - v).abs() < self.tol_v;
            (u, v, d) = (nu, nv, nd);
            if converged {
                break;
            }
        }
        (u, v, d)
    }
}

/// `n + 1` evenly spaced values covering `[lo, hi]`.
pub(super) fn samples(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let n = n.max(1);
    (0..=n).map(|i| lo + (hi - lo) * i as f64 / n as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::nurbs::NurbsSurface;
    use crate::geometry::surfaces::{Cylinder, Plane, Sphere};
    use crate::geometry::vector::Vec3;
    use std::f64::consts::{FRAC_PI_2, TAU};

    #[test]
    fn test_plane_projection_interior() {
        let plane = Plane::xy(0.0);
        let ps = ExtremaPointSurface::new(
            &plane,
            Domain2D::new(-10.0, 10.0, -10.0, 10.0),
            1e-9,
            1e-9,
            &ExtremaConfig::default(),
        )
        .unwrap();
        let (u, v, d) = ps.nearest(&Point3d::new(1.234, -5.678, 3.0)).unwrap();
        assert!((u - 1.234).abs() < 1e-7);
        assert!((v + 5.678).abs() < 1e-7);
        assert!((d - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_plane_projection_clamped_to_patch() {
        let plane = Plane::xy(0.0);
        let ps = ExtremaPointSurface::new(
            &plane,
            Domain2D::new(0.0, 1.0, 0.0, 1.0),
            1e-9,
            1e-9,
            &ExtremaConfig::default(),
        )
        .unwrap();
        let (u, v, d) = ps.nearest(&Point3d::new(3.0, 0.5, 4.0)).unwrap();
        assert_eq!(u, 1.0);
        assert!((v - 0.5).abs() < 1e-9);
        assert!((d - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_sphere_projection() {
        let s = Sphere::new(Point3d::ORIGIN, 2.0).unwrap();
        let ps = ExtremaPointSurface::new(
            &s,
            Domain2D::new(0.0, TAU, -FRAC_PI_2, FRAC_PI_2),
            1e-10,
            1e-10,
            &ExtremaConfig::default(),
        )
        .unwrap();
        let p = Point3d::new(3.0, 4.0, 5.0);
        let (_, _, d) = ps.nearest(&p).unwrap();
        let exact = (50.0f64.sqrt() - 2.0).powi(2);
        assert!((d - exact).abs() < 1e-8, "{d} vs {exact}");
    }

    #[test]
    fn test_cylinder_projection() {
        let c = Cylinder::new(Point3d::ORIGIN, Vec3::Z, 1.0).unwrap();
        let ps = ExtremaPointSurface::new(
            &c,
            Domain2D::new(0.0, TAU, -5.0, 5.0),
            1e-10,
            1e-10,
            &ExtremaConfig::default(),
        )
        .unwrap();
        let (u, v, d) = ps.nearest(&Point3d::new(0.0, -3.0, 2.0)).unwrap();
        assert!((u - 1.5 * std::f64::consts::PI).abs() < 1e-6);
        assert!((v - 2.0).abs() < 1e-6);
        assert!((d - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_bspline_patch_projection() {
        let patch = NurbsSurface::new(
            1,
            1,
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(0.0, 1.0, 0.0),
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(1.0, 1.0, 0.0),
            ],
            Vec::new(),
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            2,
            2,
        )
        .unwrap();
        let ps = ExtremaPointSurface::new(
            &patch,
            Domain2D::new(0.0, 1.0, 0.0, 1.0),
            1e-9,
            1e-9,
            &ExtremaConfig::default(),
        )
        .unwrap();
        let (u, v, d) = ps.nearest(&Point3d::new(0.3, 0.7, -2.0)).unwrap();
        assert!((u - 0.3).abs() < 1e-6 && (v - 0.7).abs() < 1e-6);
        assert!((d - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_unbounded_domain_rejected() {
        let plane = Plane::xy(0.0);
        let domain = Domain2D::new(-cad_math::precision::INFINITE, 0.0, 0.0, 1.0);
        let err = ExtremaPointSurface::new(&plane, domain, 1e-9, 1e-9, &ExtremaConfig::default());
        assert!(matches!(err, Err(ExtremaError::UnboundedDomain(_))));
    }
}

//! Surface/surface extrema.
//!
//! Canonical pairs are solved in closed form by [`super::analytic`]. Any
//! other pair is sampled on coarse grids; the closest (and farthest) node
//! pairs seed a four-unknown Newton iteration on the gradient of
//! `|S1(u1, v1) - S2(u2, v2)|²`.

use cad_math::precision::{PCONFUSION, is_infinite};
use cad_math::{Newton4d, Newton4dConfig, Status};
use nalgebra::{Matrix4, Vector4};
use tracing::{debug, instrument, trace, warn};

use super::analytic::{PlaneCylinder, PlanePlane, PlaneSphere, SphereSphere};
use super::ext_cs::clip_surface;
use super::{Domain2D, Domain4D, ExtremaConfig, ExtremaResult, Extremum, Params, SearchMode};
use crate::geometry::bounding_box::BoundingBox;
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Surface, SurfaceEval};

/// Seed pairs refined per extremum kind.
const SEEDS_PER_KIND: usize = 8;

/// Extrema between two surfaces over parameter domains.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtremaSurfaceSurface {
    config: ExtremaConfig,
}

impl ExtremaSurfaceSurface {
    pub fn new(config: ExtremaConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self, s1, s2), level = "debug")]
    pub fn perform(
        &self,
        s1: &Surface,
        d1: Domain2D,
        s2: &Surface,
        d2: Domain2D,
        tol: f64,
        mode: SearchMode,
    ) -> ExtremaResult {
        if let Some(result) = self.analytic(s1, d1, s2, d2, tol, mode) {
            return result;
        }
        self.generic(s1, d1, s2, d2, tol, mode)
    }

    fn analytic(
        &self,
        s1: &Surface,
        d1: Domain2D,
        s2: &Surface,
        d2: Domain2D,
        tol: f64,
        mode: SearchMode,
    ) -> Option<ExtremaResult> {
        let bounded = !is_natural(s1, &d1) || !is_natural(s2, &d2);
        let domain = Domain4D::new(d1, d2);
        macro_rules! solve {
            ($pair:expr) => {{
                let pair = $pair.with_config(self.config);
                let pair = if bounded { pair.with_domain(domain) } else { pair };
                pair.perform(tol, mode)
            }};
        }
        let result = match (s1, s2) {
            (Surface::Plane(a), Surface::Plane(b)) => solve!(PlanePlane::new(*a, *b)),
            (Surface::Plane(p), Surface::Sphere(s)) => solve!(PlaneSphere::new(*p, *s)),
            (Surface::Sphere(s), Surface::Plane(p)) => solve!(PlaneSphere::new_reversed(*s, *p)),
            (Surface::Plane(p), Surface::Cylinder(c)) => solve!(PlaneCylinder::new(*p, *c)),
            (Surface::Cylinder(c), Surface::Plane(p)) => solve!(PlaneCylinder::new_reversed(*c, *p)),
            (Surface::Sphere(a), Surface::Sphere(b)) => solve!(SphereSphere::new(*a, *b)),
            _ => return None,
        };
        debug!(bounded, status = ?result.status(), "analytic surface/surface extrema");
        Some(result)
    }

    fn generic(
        &self,
        s1: &Surface,
        d1: Domain2D,
        s2: &Surface,
        d2: Domain2D,
        tol: f64,
        mode: SearchMode,
    ) -> ExtremaResult {
        let (d1, d2) = match (d1.is_finite(), d2.is_finite()) {
            (true, true) => (d1, d2),
            (false, true) => match clip_against(s1, d1, s2, d2, tol) {
                Some(d) => (d, d2),
                None => return ExtremaResult::with_status(Status::NoSolution),
            },
            (true, false) => match clip_against(s2, d2, s1, d1, tol) {
                Some(d) => (d1, d),
                None => return ExtremaResult::with_status(Status::NoSolution),
            },
            (false, false) => {
                warn!("both surface domains unbounded, generic search not run");
                return ExtremaResult::with_status(Status::NoSolution);
            }
        };
        debug!(?d1, ?d2, "generic surface/surface search domains");

        let (nu, nv) = (self.config.nb_u / 2, self.config.nb_v / 2);
        let grid1 = Grid::sample(s1, &d1, nu, nv);
        let grid2 = Grid::sample(s2, &d2, nu, nv);

        let mut nearest = Vec::with_capacity(grid1.nodes.len());
        let mut farthest = Vec::with_capacity(grid1.nodes.len());
        for (i, (_, p)) in grid1.nodes.iter().enumerate() {
            let distances = grid2
                .nodes
                .iter()
                .enumerate()
                .map(|(j, (_, q))| (p.square_distance(q), i, j))
                .filter(|(d, _, _)| d.is_finite());
            let (lo, hi) = distances.fold((None, None), |(lo, hi): (Option<Seed>, Option<Seed>), s| {
                (
                    Some(lo.filter(|l| l.0 <= s.0).unwrap_or(s)),
                    Some(hi.filter(|h| h.0 >= s.0).unwrap_or(s)),
                )
            });
            nearest.extend(lo);
            farthest.extend(hi);
        }
        nearest.sort_by(|a, b| a.0.total_cmp(&b.0));
        farthest.sort_by(|a, b| b.0.total_cmp(&a.0));

        let newton = match Newton4d::new(Newton4dConfig {
            tolerance: tol,
            max_iterations: self.config.max_newton_iterations,
        })
        .with_bounds(
            Vector4::new(d1.u_min, d1.v_min, d2.u_min, d2.v_min),
            Vector4::new(d1.u_max, d1.v_max, d2.u_max, d2.v_max),
        ) {
            Ok(newton) => newton,
            Err(err) => {
                warn!(%err, "invalid surface domains");
                return ExtremaResult::with_status(Status::NoSolution);
            }
        };
        let gradient = |x: &Vector4<f64>| distance_gradient(s1, s2, x);

        let mut kinds = Vec::with_capacity(2);
        if mode.wants_min() {
            kinds.push((nearest, true));
        }
        if mode.wants_max() {
            kinds.push((farthest, false));
        }

        let mut extrema: Vec<Extremum> = Vec::new();
        for (seeds, is_minimum) in kinds {
            for &(d, i, j) in seeds.iter().take(SEEDS_PER_KIND) {
                let ((u1, v1), _) = grid1.nodes[i];
                let ((u2, v2), _) = grid2.nodes[j];
                let run = newton.perform(&gradient, &Vector4::new(u1, v1, u2, v2));
                trace!(seed = d, status = ?run.status(), residual = run.square_residual(), "surface/surface seed");
                if !run.is_done() {
                    continue;
                }
                let x = run.solution();
                let e = extremum(s1, s2, x, is_minimum);
                if !extrema.iter().any(|o| same_extremum(s1, s2, o, &e, tol)) {
                    extrema.push(e);
                }
            }
        }
        debug!(nb_ext = extrema.len(), "generic surface/surface extrema");
        ExtremaResult::finite(extrema)
    }
}

/// `(square distance, node on the first grid, node on the second grid)`.
type Seed = (f64, usize, usize);

struct Grid {
    nodes: Vec<((f64, f64), Point3d)>,
}

impl Grid {
    fn sample(surface: &Surface, d: &Domain2D, nu: usize, nv: usize) -> Self {
        let (nu, nv) = (nu.max(1), nv.max(1));
        let nodes = (0..=nu)
            .flat_map(|i| {
                let u = d.u_min + (d.u_max - d.u_min) * i as f64 / nu as f64;
                (0..=nv).map(move |j| {
                    let v = d.v_min + (d.v_max - d.v_min) * j as f64 / nv as f64;
                    ((u, v), surface.value(u, v))
                })
            })
            .collect();
        Self { nodes }
    }
}

/// Gradient system of `½|S1 - S2|²` in `(u1, v1, u2, v2)` and its Jacobian.
fn distance_gradient(s1: &Surface, s2: &Surface, x: &Vector4<f64>) -> (Vector4<f64>, Matrix4<f64>) {
    let a = s1.d2(x[0], x[1]);
    let b = s2.d2(x[2], x[3]);
    let w = a.point - b.point;
    let f = Vector4::new(w.dot(&a.du), w.dot(&a.dv), -w.dot(&b.du), -w.dot(&b.dv));
    #[rustfmt::skip]
    let j = Matrix4::new(
        a.du.dot(&a.du) + w.dot(&a.duu), a.dv.dot(&a.du) + w.dot(&a.duv), -b.du.dot(&a.du), -b.dv.dot(&a.du),
        a.du.dot(&a.dv) + w.dot(&a.duv), a.dv.dot(&a.dv) + w.dot(&a.dvv), -b.du.dot(&a.dv), -b.dv.dot(&a.dv),
        -a.du.dot(&b.du), -a.dv.dot(&b.du), b.du.dot(&b.du) - w.dot(&b.duu), b.dv.dot(&b.du) - w.dot(&b.duv),
        -a.du.dot(&b.dv), -a.dv.dot(&b.dv), b.du.dot(&b.dv) - w.dot(&b.duv), b.dv.dot(&b.dv) - w.dot(&b.dvv),
    );
    (f, j)
}

fn extremum(s1: &Surface, s2: &Surface, x: Vector4<f64>, is_minimum: bool) -> Extremum {
    let point1 = s1.value(x[0], x[1]);
    let point2 = s2.value(x[2], x[3]);
    Extremum {
        params1: Params::Surface(x[0], x[1]),
        params2: Params::Surface(x[2], x[3]),
        point1,
        point2,
        square_distance: point1.square_distance(&point2),
        is_minimum,
    }
}

fn same_extremum(s1: &Surface, s2: &Surface, a: &Extremum, b: &Extremum, tol: f64) -> bool {
    let (Params::Surface(au1, av1), Params::Surface(au2, av2)) = (a.params1, a.params2) else {
        return false;
    };
    let (Params::Surface(bu1, bv1), Params::Surface(bu2, bv2)) = (b.params1, b.params2) else {
        return false;
    };
    let close = |x: f64, y: f64, period: Option<f64>| {
        let d = (x - y).abs();
        d <= tol || period.is_some_and(|p| (d - p).abs() <= tol)
    };
    close(au1, bu1, s1.u_period())
        && close(av1, bv1, s1.v_period())
        && close(au2, bu2, s2.u_period())
        && close(av2, bv2, s2.v_period())
}

/// Finite part of `domain` on `surface` covering the other patch's bounding
/// box. `None` when the surface cannot be clipped or misses the box.
fn clip_against(surface: &Surface, domain: Domain2D, other: &Surface, other_domain: Domain2D, tol: f64) -> Option<Domain2D> {
    let bb = BoundingBox::of_surface(
        other,
        (other_domain.u_min, other_domain.u_max),
        (other_domain.v_min, other_domain.v_max),
        tol,
    );
    let clipped = clip_surface(surface, (domain.u_min, domain.u_max), (domain.v_min, domain.v_max), &bb);
    match clipped {
        Some(Some(((u0, u1), (v0, v1)))) => Some(Domain2D::new(u0, u1, v0, v1)),
        Some(None) => {
            debug!("clipped domain is empty");
            None
        }
        None => {
            warn!(surface_type = ?surface.surface_type(), "unbounded surface cannot be clipped");
            None
        }
    }
}

/// Whether `d` is the whole natural parameter domain of `s`.
fn is_natural(s: &Surface, d: &Domain2D) -> bool {
    let same = |a: f64, b: f64| {
        (a - b).abs() <= PCONFUSION || (is_infinite(a) && is_infinite(b) && a.signum() == b.signum())
    };
    same(d.u_min, s.first_u_parameter())
        && same(d.u_max, s.last_u_parameter())
        && same(d.v_min, s.first_v_parameter())
        && same(d.v_max, s.last_v_parameter())
}

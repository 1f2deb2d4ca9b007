//! Curve/surface extrema dispatcher.
//!
//! A small table maps `(curve type, surface type)` to a closed-form solver.
//! Pairs without one go through the generic multi-start search over a finite
//! parameter box; infinite ranges are clipped with bounding boxes first.
//! Curves with corners additionally contribute the projections of their
//! sharp points.

use cad_math::precision::is_infinite;
use cad_math::{MathError, PolynomialRoots, TrigCoefficients, TrigonometricRoots};
use tracing::{debug, instrument, warn};

use super::ext_ps::ExtremaPointSurface;
use super::gen_ext_cs::GenExtCurveSurface;
use super::{Domain2D, ExtremaConfig, ExtremaError, Extremum, Params, SearchMode, normalize_periodic};
use crate::geometry::bounding_box::{BoundingBox, line_parameter_range};
use crate::geometry::curves::{Curve, CurveEval, CurveType};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Surface, SurfaceEval, SurfaceType};
use crate::Tolerance;

/// Relative step of the finite-difference test telling minima from maxima.
const CLASSIFY_STEP: f64 = 1e-5;
/// Doubling steps when clipping an unbounded curve range.
const MAX_CLIP_DOUBLINGS: usize = 64;

/// Closed-form solver for one curve/surface type pair. `None` falls back to
/// the generic search.
type AnalyticHandler = fn(&Query<'_>) -> Option<Analytic>;

const ANALYTIC_HANDLERS: [(CurveType, SurfaceType, AnalyticHandler); 6] = [
    (CurveType::Line, SurfaceType::Sphere, line_sphere),
    (CurveType::Line, SurfaceType::Cylinder, line_cylinder),
    (CurveType::Line, SurfaceType::Plane, line_plane),
    (CurveType::Circle, SurfaceType::Cylinder, circle_cylinder),
    (CurveType::Circle, SurfaceType::Plane, circle_plane),
    (CurveType::Hyperbola, SurfaceType::Plane, hyperbola_plane),
];

fn analytic_handler(curve: CurveType, surface: SurfaceType) -> Option<AnalyticHandler> {
    ANALYTIC_HANDLERS
        .iter()
        .find(|(c, s, _)| *c == curve && *s == surface)
        .map(|&(_, _, handler)| handler)
}

/// Extrema of one `perform` call.
///
/// Indices are 1-based. A parallel result has a constant distance and
/// exactly one representative extremum, so `square_distance(1)`,
/// `extremum(1)` and `points(1)` all succeed on it and every other index
/// fails.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CurveSurfaceExtrema {
    done: bool,
    parallel_square_distance: Option<f64>,
    extrema: Vec<Extremum>,
}

impl CurveSurfaceExtrema {
    fn not_done() -> Self {
        Self::default()
    }

    fn check_done(&self) -> Result<(), ExtremaError> {
        if self.done { Ok(()) } else { Err(ExtremaError::NotDone) }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_parallel(&self) -> Result<bool, ExtremaError> {
        self.check_done()?;
        Ok(self.parallel_square_distance.is_some())
    }

    pub fn nb_ext(&self) -> Result<usize, ExtremaError> {
        self.check_done()?;
        Ok(self.extrema.len())
    }

    pub fn square_distance(&self, n: usize) -> Result<f64, ExtremaError> {
        self.check_done()?;
        match self.parallel_square_distance {
            Some(d) if n == 1 => Ok(d),
            Some(_) => Err(ExtremaError::InfiniteSolutions),
            None => Ok(self.extremum(n)?.square_distance),
        }
    }

    pub fn extremum(&self, n: usize) -> Result<&Extremum, ExtremaError> {
        self.check_done()?;
        n.checked_sub(1)
            .and_then(|i| self.extrema.get(i))
            .ok_or(ExtremaError::IndexOutOfRange {
                index: n,
                len: self.extrema.len(),
            })
    }

    /// Point on the curve and point on the surface of extremum `n`.
    pub fn points(&self, n: usize) -> Result<(Point3d, Point3d), ExtremaError> {
        let e = self.extremum(n)?;
        Ok((e.point1, e.point2))
    }

    pub fn extrema(&self) -> &[Extremum] {
        &self.extrema
    }

    /// Smallest squared distance, the constant one when parallel.
    pub fn min_square_distance(&self) -> Option<f64> {
        if !self.done {
            return None;
        }
        self.parallel_square_distance.or_else(|| {
            self.extrema
                .iter()
                .map(|e| e.square_distance)
                .min_by(f64::total_cmp)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SurfaceSetup {
    surface: Surface,
    u_range: (f64, f64),
    v_range: (f64, f64),
    tol_c: f64,
    tol_s: f64,
}

/// Extrema between a curve and a surface held across several curves.
#[derive(Debug, Clone, Default)]
pub struct ExtremaCurveSurface {
    config: ExtremaConfig,
    setup: Option<SurfaceSetup>,
}

impl ExtremaCurveSurface {
    pub fn new(config: ExtremaConfig) -> Self {
        Self { config, setup: None }
    }

    /// Fix the surface, its parameter ranges and the curve/surface
    /// parameter tolerances.
    pub fn initialize(
        &mut self,
        surface: &Surface,
        u_range: (f64, f64),
        v_range: (f64, f64),
        tol_c: f64,
        tol_s: f64,
    ) -> Result<(), ExtremaError> {
        for (lower, upper) in [u_range, v_range] {
            if !(lower <= upper) {
                return Err(MathError::InvalidBounds { lower, upper }.into());
            }
        }
        self.setup = Some(SurfaceSetup {
            surface: surface.clone(),
            u_range,
            v_range,
            tol_c,
            tol_s,
        });
        Ok(())
    }

    /// [`Self::initialize`] over the surface's natural parameter ranges.
    pub fn initialize_natural(&mut self, surface: &Surface, tol_c: f64, tol_s: f64) -> Result<(), ExtremaError> {
        self.initialize(
            surface,
            (surface.first_u_parameter(), surface.last_u_parameter()),
            (surface.first_v_parameter(), surface.last_v_parameter()),
            tol_c,
            tol_s,
        )
    }

    /// Natural ranges, both parameter tolerances taken from `tolerance`.
    pub fn initialize_with_tolerance(&mut self, surface: &Surface, tolerance: &Tolerance) -> Result<(), ExtremaError> {
        self.initialize_natural(surface, tolerance.parametric, tolerance.parametric)
    }

    pub fn is_initialized(&self) -> bool {
        self.setup.is_some()
    }

    #[instrument(skip(self, curve), level = "debug")]
    pub fn perform(&self, curve: &Curve, t0: f64, t1: f64) -> Result<CurveSurfaceExtrema, ExtremaError> {
        let setup = self.setup.as_ref().ok_or(ExtremaError::NotInitialized)?;
        if !(t0 <= t1) {
            return Err(MathError::InvalidBounds { lower: t0, upper: t1 }.into());
        }
        let query = Query {
            curve,
            t_range: (t0, t1),
            setup,
            angular: self.config.angular_tolerance,
        };

        let (curve_type, surface_type) = (curve.curve_type(), setup.surface.surface_type());
        if let Some(handler) = analytic_handler(curve_type, surface_type) {
            match handler(&query).and_then(|outcome| query.collect_analytic(outcome)) {
                Some(result) => {
                    debug!(
                        ?curve_type,
                        ?surface_type,
                        nb_ext = result.extrema.len(),
                        parallel = result.parallel_square_distance.is_some(),
                        "analytic curve/surface extrema"
                    );
                    return Ok(result);
                }
                None => debug!(?curve_type, ?surface_type, "analytic solver declined, using generic search"),
            }
        }
        Ok(self.generic(&query))
    }

    fn generic(&self, q: &Query<'_>) -> CurveSurfaceExtrema {
        let (t_range, u_range, v_range) = match q.search_box() {
            SearchBox::Finite { t, u, v } => (t, u, v),
            SearchBox::Empty => {
                debug!("clipped curve range misses the surface");
                return CurveSurfaceExtrema {
                    done: true,
                    ..Default::default()
                };
            }
            SearchBox::Unbounded => {
                warn!("curve and surface both unbounded, generic search not run");
                return CurveSurfaceExtrema::not_done();
            }
        };
        debug!(?t_range, ?u_range, ?v_range, "generic curve/surface search box");

        let curve = q.curve;
        let surface = &q.setup.surface;
        let nb_t = if curve.is_periodic() || curve.curve_type() == CurveType::BSpline {
            self.config.nb_t_refined
        } else {
            self.config.nb_t
        };
        let search = GenExtCurveSurface::new(&self.config, nb_t, q.setup.tol_c, q.setup.tol_s).perform(
            curve,
            t_range,
            surface,
            u_range,
            v_range,
            SearchMode::MinMax,
        );
        if !search.is_done() {
            return CurveSurfaceExtrema::not_done();
        }

        let mut extrema = Vec::new();
        for s in search.solutions() {
            if let Some(e) = q.extremum(s.t, s.u, s.v, s.is_minimum) {
                q.push_unique(&mut extrema, e);
            }
        }

        let sharp = curve.sharp_parameters(t_range.0, t_range.1);
        if !sharp.is_empty() {
            let domain = Domain2D::new(u_range.0, u_range.1, v_range.0, v_range.1);
            match ExtremaPointSurface::new(surface, domain, q.setup.tol_s, q.setup.tol_s, &self.config) {
                Ok(projector) => {
                    let extras = q.sharp_point_extrema(&projector, &sharp, &extrema);
                    extrema.extend(extras);
                }
                Err(err) => debug!(%err, "sharp points not projected"),
            }
        }
        CurveSurfaceExtrema {
            done: true,
            parallel_square_distance: None,
            extrema,
        }
    }
}

/// Candidate stationary point from a closed-form solver.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    t: f64,
    u: f64,
    v: f64,
    is_minimum: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Analytic {
    Solutions(Vec<Candidate>),
    /// The distance is constant along the whole curve.
    Parallel {
        square_distance: f64,
        representative: Option<Candidate>,
    },
}

enum SearchBox {
    Finite { t: (f64, f64), u: (f64, f64), v: (f64, f64) },
    Empty,
    Unbounded,
}

struct Query<'a> {
    curve: &'a Curve,
    t_range: (f64, f64),
    setup: &'a SurfaceSetup,
    angular: f64,
}

impl Query<'_> {
    /// `None` when a parallel outcome has no representative inside the
    /// ranges; the generic search then handles the bounded patch.
    fn collect_analytic(&self, outcome: Analytic) -> Option<CurveSurfaceExtrema> {
        let result = match outcome {
            Analytic::Parallel {
                square_distance,
                representative,
            } => {
                let c = representative?;
                let e = self.extremum(c.t, c.u, c.v, c.is_minimum)?;
                CurveSurfaceExtrema {
                    done: true,
                    parallel_square_distance: Some(square_distance),
                    extrema: vec![e],
                }
            }
            Analytic::Solutions(candidates) => {
                let mut extrema = Vec::new();
                for c in candidates {
                    if let Some(e) = self.extremum(c.t, c.u, c.v, c.is_minimum) {
                        self.push_unique(&mut extrema, e);
                    }
                }
                CurveSurfaceExtrema {
                    done: true,
                    parallel_square_distance: None,
                    extrema,
                }
            }
        };
        Some(result)
    }

    /// Extremum at normalized parameters, `None` outside the ranges.
    fn extremum(&self, t: f64, u: f64, v: f64, is_minimum: bool) -> Option<Extremum> {
        let s = self.setup;
        let surface = &s.surface;
        let t = fold_into(t, self.t_range, self.curve.period(), s.tol_c)?;
        let u = fold_into(u, s.u_range, surface.u_period(), s.tol_s)?;
        let v = fold_into(v, s.v_range, surface.v_period(), s.tol_s)?;
        let point1 = self.curve.value(t);
        let point2 = surface.value(u, v);
        Some(Extremum {
            params1: Params::Curve(t),
            params2: Params::Surface(u, v),
            point1,
            point2,
            square_distance: point1.square_distance(&point2),
            is_minimum,
        })
    }

    fn is_duplicate(&self, list: &[Extremum], e: &Extremum) -> bool {
        let (Params::Curve(t), Params::Surface(u, v)) = (e.params1, e.params2) else {
            return false;
        };
        let s = self.setup;
        list.iter().any(|o| {
            let (Params::Curve(ot), Params::Surface(ou, ov)) = (o.params1, o.params2) else {
                return false;
            };
            close(t, ot, s.tol_c, self.curve.period())
                && close(u, ou, s.tol_s, s.surface.u_period())
                && close(v, ov, s.tol_s, s.surface.v_period())
        })
    }

    fn push_unique(&self, list: &mut Vec<Extremum>, e: Extremum) {
        if !self.is_duplicate(list, &e) {
            list.push(e);
        }
    }

    /// Nearest-point projections of the sharp points not already found.
    /// More than two are reduced to the nearest and the farthest.
    fn sharp_point_extrema<S: SurfaceEval + ?Sized>(
        &self,
        projector: &ExtremaPointSurface<'_, S>,
        sharp: &[f64],
        found: &[Extremum],
    ) -> Vec<Extremum> {
        let mut extras: Vec<Extremum> = Vec::new();
        for &t in sharp {
            let Some((u, v, _)) = projector.nearest(&self.curve.value(t)) else {
                continue;
            };
            let Some(e) = self.extremum(t, u, v, true) else {
                continue;
            };
            if !self.is_duplicate(found, &e) && !self.is_duplicate(&extras, &e) {
                extras.push(e);
            }
        }
        if extras.len() > 2 {
            let by_distance = |a: &&Extremum, b: &&Extremum| a.square_distance.total_cmp(&b.square_distance);
            let nearest = extras.iter().min_by(by_distance).copied();
            let farthest = extras.iter().max_by(by_distance).copied();
            extras = nearest.into_iter().chain(farthest).collect();
        }
        debug!(nb_sharp = sharp.len(), kept = extras.len(), "sharp point projections");
        extras
    }

    fn search_box(&self) -> SearchBox {
        let s = self.setup;
        let (t0, t1) = self.t_range;
        let curve_finite = !is_infinite(t0) && !is_infinite(t1);
        let surface_finite = Domain2D::new(s.u_range.0, s.u_range.1, s.v_range.0, s.v_range.1).is_finite();
        match (curve_finite, surface_finite) {
            (true, true) => SearchBox::Finite {
                t: self.t_range,
                u: s.u_range,
                v: s.v_range,
            },
            (false, true) => {
                let bb = BoundingBox::of_surface(&s.surface, s.u_range, s.v_range, s.tol_s);
                match clip_curve(self.curve, self.t_range, &bb) {
                    Some(t) => SearchBox::Finite {
                        t,
                        u: s.u_range,
                        v: s.v_range,
                    },
                    None => SearchBox::Empty,
                }
            }
            (true, false) => {
                let bb = BoundingBox::of_curve(self.curve, t0, t1, s.tol_c);
                match clip_surface(&s.surface, s.u_range, s.v_range, &bb) {
                    Some(Some((u, v))) => SearchBox::Finite { t: self.t_range, u, v },
                    Some(None) => SearchBox::Empty,
                    None => SearchBox::Unbounded,
                }
            }
            (false, false) => SearchBox::Unbounded,
        }
    }

    /// A finite curve parameter inside the range, for representatives.
    fn anchor(&self) -> f64 {
        let (t0, t1) = self.t_range;
        0.0f64.clamp(t0, t1)
    }
}

/// `x` folded into the periodic window starting at `lo` and checked against
/// `[lo - tol, hi + tol]`.
pub(super) fn fold_into(x: f64, (lo, hi): (f64, f64), period: Option<f64>, tol: f64) -> Option<f64> {
    let x = match period {
        Some(p) if !is_infinite(lo) => {
            let folded = normalize_periodic(x, lo, p);
            if folded > hi + tol && folded - p >= lo - tol { folded - p } else { folded }
        }
        _ => x,
    };
    (x >= lo - tol && x <= hi + tol).then_some(x)
}

pub(super) fn close(a: f64, b: f64, tol: f64, period: Option<f64>) -> bool {
    let d = (a - b).abs();
    d <= tol || period.is_some_and(|p| (d - p).abs() <= tol)
}

/// Whether a stationary point of `f` at `t` is a local minimum.
pub(super) fn is_local_min(f: impl Fn(f64) -> f64, t: f64) -> bool {
    let h = CLASSIFY_STEP * t.abs().max(1.0);
    let ft = f(t);
    ft <= f(t - h) && ft <= f(t + h)
}

/// Finite sub-range of an unbounded curve range covering `bb`. `None` when
/// the range misses the box.
fn clip_curve(curve: &Curve, (t0, t1): (f64, f64), bb: &BoundingBox) -> Option<(f64, f64)> {
    if let Curve::Line(line) = curve {
        let (lo, hi) = line_parameter_range(line, bb)?;
        let (lo, hi) = (lo.max(t0), hi.min(t1));
        return (lo <= hi).then_some((lo, hi));
    }

    let anchor = if !is_infinite(t0) {
        t0
    } else if !is_infinite(t1) {
        t1
    } else {
        0.0
    };
    let outer = bb.expanded(bb.diagonal());
    let center = bb.center();
    let leave = |sign: f64| -> f64 {
        let mut step = 1.0;
        let mut previous = curve.value(anchor).distance_to(&center);
        for _ in 0..MAX_CLIP_DOUBLINGS {
            let p = curve.value(anchor + sign * step);
            let distance = p.distance_to(&center);
            if !outer.contains_point(&p) && distance > previous {
                break;
            }
            previous = distance;
            step *= 2.0;
        }
        anchor + sign * step
    };
    let lo = if is_infinite(t0) { leave(-1.0) } else { t0 };
    let hi = if is_infinite(t1) { leave(1.0) } else { t1 };
    Some((lo, hi))
}

/// Finite parameter ranges of an unbounded surface covering `bb`.
/// `None` when the surface type cannot be clipped, `Some(None)` when the
/// clipped ranges are empty.
#[allow(clippy::type_complexity)]
pub(crate) fn clip_surface(
    surface: &Surface,
    u_range: (f64, f64),
    v_range: (f64, f64),
    bb: &BoundingBox,
) -> Option<Option<((f64, f64), (f64, f64))>> {
    if bb.is_void() {
        return None;
    }
    let corners = bb.corners();
    let span = |values: &mut dyn Iterator<Item = f64>| {
        values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| (lo.min(x), hi.max(x)))
    };
    let (u_box, v_box) = match surface {
        Surface::Plane(plane) => {
            let params = corners.map(|c| plane.parameters_of(&c));
            (span(&mut params.iter().map(|p| p.0)), span(&mut params.iter().map(|p| p.1)))
        }
        Surface::Cylinder(cyl) => {
            let z = span(&mut corners.iter().map(|c| cyl.frame.to_local(c).2));
            (u_range, z)
        }
        Surface::Cone(cone) => {
            let (s, c) = cone.half_angle.sin_cos();
            let local = corners.map(|p| cone.frame.to_local(&p));
            let z = span(&mut local.iter().map(|l| l.2));
            let rho = local.iter().fold(0.0f64, |m, l| m.max(l.0.hypot(l.1)));
            let r = cone.ref_radius;
            (u_range, ((-rho - r) * s + z.0 * c, (rho - r) * s + z.1 * c))
        }
        Surface::Sphere(_) | Surface::Torus(_) | Surface::BSpline(_) => return None,
    };
    let u = (u_range.0.max(u_box.0), u_range.1.min(u_box.1));
    let v = (v_range.0.max(v_box.0), v_range.1.min(v_box.1));
    Some((u.0 <= u.1 && v.0 <= v.1).then_some((u, v)))
}

fn line_sphere(q: &Query<'_>) -> Option<Analytic> {
    let (Curve::Line(line), Surface::Sphere(sphere)) = (q.curve, &q.setup.surface) else {
        return None;
    };
    let center = sphere.center();
    let r = sphere.radius;
    let t_foot = line.parameter_of(&center);
    let offset = line.value(t_foot) - center;
    let h = offset.length();

    let mut out = Vec::with_capacity(2);
    if r - h > q.setup.tol_s {
        let half = (r * r - h * h).sqrt();
        for t in [t_foot - half, t_foot + half] {
            let (u, v) = sphere.parameters_of(&line.value(t));
            out.push(Candidate { t, u, v, is_minimum: true });
        }
    } else {
        let dir = offset.normalized().or_else(|| line.direction.any_perpendicular())?;
        for (side, is_minimum) in [(1.0, true), (-1.0, false)] {
            let (u, v) = sphere.parameters_of(&(center + dir * (side * r)));
            out.push(Candidate {
                t: t_foot,
                u,
                v,
                is_minimum,
            });
        }
    }
    Some(Analytic::Solutions(out))
}

fn line_cylinder(q: &Query<'_>) -> Option<Analytic> {
    let (Curve::Line(line), Surface::Cylinder(cyl)) = (q.curve, &q.setup.surface) else {
        return None;
    };
    let axis = cyl.axis();
    let d = line.direction;
    let r = cyl.radius;
    let w0 = line.origin - cyl.frame.origin;

    if d.is_parallel_to(&axis, q.angular) {
        let gap = w0.reject_from(&axis).length() - r;
        let t = q.anchor();
        let (u, v) = cyl.parameters_of(&line.value(t));
        return Some(Analytic::Parallel {
            square_distance: gap * gap,
            representative: Some(Candidate { t, u, v, is_minimum: true }),
        });
    }

    // Closest approach between the line and the axis.
    let b = d.dot(&axis);
    let (dw, aw) = (d.dot(&w0), axis.dot(&w0));
    let denom = 1.0 - b * b;
    let s = (b * aw - dw) / denom;
    let z = (aw - b * dw) / denom;
    let on_line = line.value(s);
    let on_axis = cyl.frame.origin + axis * z;
    let between = on_line - on_axis;
    let h = between.length();

    let mut out = Vec::with_capacity(2);
    if h - r > q.setup.tol_s {
        let dir = between / h;
        for (side, is_minimum) in [(1.0, true), (-1.0, false)] {
            let (u, v) = cyl.parameters_of(&(on_axis + dir * (side * r)));
            out.push(Candidate { t: s, u, v, is_minimum });
        }
    } else {
        let d_perp = d.reject_from(&axis);
        let w_perp = w0.reject_from(&axis);
        let roots = PolynomialRoots::quadratic(
            d_perp.length_squared(),
            2.0 * w_perp.dot(&d_perp),
            w_perp.length_squared() - r * r,
        )
        .ok()?;
        for &t in roots.roots() {
            let (u, v) = cyl.parameters_of(&line.value(t));
            out.push(Candidate { t, u, v, is_minimum: true });
        }
    }
    Some(Analytic::Solutions(out))
}

fn line_plane(q: &Query<'_>) -> Option<Analytic> {
    let (Curve::Line(line), Surface::Plane(plane)) = (q.curve, &q.setup.surface) else {
        return None;
    };
    let n = plane.normal();
    let dn = line.direction.dot(&n);
    if dn.abs() < q.angular {
        let t = q.anchor();
        let p = line.value(t);
        let (u, v) = plane.parameters_of(&p);
        let d = plane.signed_distance(&p);
        return Some(Analytic::Parallel {
            square_distance: d * d,
            representative: Some(Candidate { t, u, v, is_minimum: true }),
        });
    }
    let t = -plane.signed_distance(&line.origin) / dn;
    let (u, v) = plane.parameters_of(&line.value(t));
    Some(Analytic::Solutions(vec![Candidate { t, u, v, is_minimum: true }]))
}

fn circle_cylinder(q: &Query<'_>) -> Option<Analytic> {
    let (Curve::Circle(circle), Surface::Cylinder(cyl)) = (q.curve, &q.setup.surface) else {
        return None;
    };
    let axis = cyl.axis();
    let (r, big_r) = (circle.radius, cyl.radius);
    // Squared distance to the axis: |w + cos t·x + sin t·y|².
    let w = (circle.center() - cyl.frame.origin).reject_from(&axis);
    let x = (circle.frame.x_dir * r).reject_from(&axis);
    let y = (circle.frame.y_dir * r).reject_from(&axis);
    let a = x.length_squared() - y.length_squared();
    let b = x.dot(&y);
    let c = 2.0 * w.dot(&x);
    let d = 2.0 * w.dot(&y);
    let e = w.length_squared() + y.length_squared() - big_r * big_r;
    let (t0, t1) = q.t_range;

    let axis_distance = |t: f64| (circle.value(t) - cyl.frame.origin).reject_from(&axis).length();
    let stationary = TrigonometricRoots::new(TrigCoefficients::new(4.0 * b, -a, d, -c, -2.0 * b), t0, t1);
    if stationary.infinite_roots() {
        let t = t0;
        let gap = axis_distance(t) - big_r;
        let (u, v) = cyl.parameters_of(&circle.value(t));
        return Some(Analytic::Parallel {
            square_distance: gap * gap,
            representative: Some(Candidate { t, u, v, is_minimum: true }),
        });
    }
    let crossings = TrigonometricRoots::new(TrigCoefficients::new(a, b, c, d, e), t0, t1);
    if !stationary.is_done() || !crossings.is_done() {
        return None;
    }

    let distance = |t: f64| {
        let gap = axis_distance(t) - big_r;
        gap * gap
    };
    let out = stationary
        .roots()
        .iter()
        .chain(crossings.roots())
        .filter(|&&t| axis_distance(t) > q.setup.tol_s)
        .map(|&t| {
            let (u, v) = cyl.parameters_of(&circle.value(t));
            Candidate {
                t,
                u,
                v,
                is_minimum: is_local_min(&distance, t),
            }
        })
        .collect();
    Some(Analytic::Solutions(out))
}

fn circle_plane(q: &Query<'_>) -> Option<Analytic> {
    let (Curve::Circle(circle), Surface::Plane(plane)) = (q.curve, &q.setup.surface) else {
        return None;
    };
    let n = plane.normal();
    let (nx, ny) = (n.dot(&circle.frame.x_dir), n.dot(&circle.frame.y_dir));
    let d0 = plane.signed_distance(&circle.center());
    let (t0, t1) = q.t_range;

    if nx.hypot(ny) < q.angular {
        let t = t0;
        let (u, v) = plane.parameters_of(&circle.value(t));
        return Some(Analytic::Parallel {
            square_distance: d0 * d0,
            representative: Some(Candidate { t, u, v, is_minimum: true }),
        });
    }

    let r = circle.radius;
    let stationary = TrigonometricRoots::new(TrigCoefficients::new(0.0, 0.0, r * ny, -r * nx, 0.0), t0, t1);
    let crossings = TrigonometricRoots::new(TrigCoefficients::new(0.0, 0.0, r * nx, r * ny, d0), t0, t1);
    if !stationary.is_done() || !crossings.is_done() {
        return None;
    }
    let distance = |t: f64| {
        let d = plane.signed_distance(&circle.value(t));
        d * d
    };
    let out = stationary
        .roots()
        .iter()
        .chain(crossings.roots())
        .map(|&t| {
            let (u, v) = plane.parameters_of(&circle.value(t));
            Candidate {
                t,
                u,
                v,
                is_minimum: is_local_min(&distance, t),
            }
        })
        .collect();
    Some(Analytic::Solutions(out))
}

fn hyperbola_plane(q: &Query<'_>) -> Option<Analytic> {
    let (Curve::Hyperbola(hyperbola), Surface::Plane(plane)) = (q.curve, &q.setup.surface) else {
        return None;
    };
    let n = plane.normal();
    let frame = &hyperbola.frame;
    let (nx, ny) = (n.dot(&frame.x_dir), n.dot(&frame.y_dir));
    let d0 = plane.signed_distance(&frame.origin);

    if nx.hypot(ny) < q.angular {
        let t = q.anchor();
        let (u, v) = plane.parameters_of(&hyperbola.value(t));
        return Some(Analytic::Parallel {
            square_distance: d0 * d0,
            representative: Some(Candidate { t, u, v, is_minimum: true }),
        });
    }

    // d(t) = d0 + A cosh t + B sinh t, a quadratic in s = e^t.
    let big_a = hyperbola.major_radius * nx;
    let big_b = hyperbola.minor_radius * ny;
    let stationary = PolynomialRoots::quadratic(big_a + big_b, 0.0, big_b - big_a).ok()?;
    let crossings = PolynomialRoots::quadratic(big_a + big_b, 2.0 * d0, big_a - big_b).ok()?;
    if stationary.infinite_roots() || crossings.infinite_roots() {
        return None;
    }

    let distance = |t: f64| {
        let d = plane.signed_distance(&hyperbola.value(t));
        d * d
    };
    let out = stationary
        .roots()
        .iter()
        .chain(crossings.roots())
        .filter(|&&s| s > 0.0)
        .map(|&s| {
            let t = s.ln();
            let (u, v) = plane.parameters_of(&hyperbola.value(t));
            Candidate {
                t,
                u,
                v,
                is_minimum: is_local_min(&distance, t),
            }
        })
        .collect();
    Some(Analytic::Solutions(out))
}

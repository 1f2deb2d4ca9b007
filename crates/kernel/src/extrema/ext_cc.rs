//! Curve/curve extrema.
//!
//! Line/line and line/circle pairs are solved in closed form. Other pairs are
//! searched on the finite parameter box of the two curves: local minima of the
//! sampled squared distance seed a damped Newton iteration on its gradient.
//! Only stationary points whose parameters lie inside both ranges are
//! reported, and the numeric search reports minima only.

use cad_math::MathError;
use cad_math::precision::is_infinite;
use cad_math::{TrigCoefficients, TrigonometricRoots};
use nalgebra::{Matrix2, Vector2};
use tracing::{debug, instrument, trace, warn};

use super::ext_cs::{close, fold_into, is_local_min};
use super::ext_ps::samples;
use super::{ExtremaConfig, ExtremaError, ExtremaResult, Extremum, Params, SearchMode, Status};
use crate::geometry::curves::{Circle3d, Curve, CurveEval, CurveType, Line3d};
use crate::geometry::point::Point3d;

const MAX_DAMPING: usize = 8;
/// Refined seeds closer than this in both parameters are one extremum.
const MERGE_TOLERANCE: f64 = 1e-7;

pub struct ExtremaCurveCurve<'a> {
    curve1: &'a Curve,
    curve2: &'a Curve,
    range1: (f64, f64),
    range2: (f64, f64),
    config: ExtremaConfig,
}

impl<'a> ExtremaCurveCurve<'a> {
    pub fn new(
        curve1: &'a Curve,
        range1: (f64, f64),
        curve2: &'a Curve,
        range2: (f64, f64),
    ) -> Result<Self, ExtremaError> {
        for (lower, upper) in [range1, range2] {
            if lower.is_nan() || upper.is_nan() || lower > upper {
                return Err(MathError::InvalidBounds { lower, upper }.into());
            }
        }
        Ok(Self {
            curve1,
            curve2,
            range1,
            range2,
            config: ExtremaConfig::default(),
        })
    }

    /// Both curves over their natural parameter ranges.
    pub fn on_curves(curve1: &'a Curve, curve2: &'a Curve) -> Result<Self, ExtremaError> {
        Self::new(
            curve1,
            (curve1.first_parameter(), curve1.last_parameter()),
            curve2,
            (curve2.first_parameter(), curve2.last_parameter()),
        )
    }

    pub fn with_config(mut self, config: ExtremaConfig) -> Self {
        self.config = config;
        self
    }

    /// Extrema with `params1` on the first curve and `params2` on the second.
    /// Fails only when a pair without a closed form has an unbounded range.
    #[instrument(skip(self), level = "trace")]
    pub fn perform(&self, tol: f64, mode: SearchMode) -> Result<ExtremaResult, ExtremaError> {
        let result = match (self.curve1, self.curve2) {
            (Curve::Line(a), Curve::Line(b)) => self.line_line(a, b, tol, mode),
            (Curve::Line(line), Curve::Circle(circle)) => {
                line_circle(line, self.range1, circle, self.range2, tol, mode)
            }
            (Curve::Circle(circle), Curve::Line(line)) => {
                line_circle(line, self.range2, circle, self.range1, tol, mode).swapped()
            }
            _ => self.sampled(tol, mode)?,
        };
        debug!(
            first = ?self.curve1.curve_type(),
            second = ?self.curve2.curve_type(),
            status = ?result.status(),
            nb_ext = result.nb_ext(),
            "curve/curve extrema"
        );
        Ok(result)
    }

    fn line_line(&self, a: &Line3d, b: &Line3d, tol: f64, mode: SearchMode) -> ExtremaResult {
        let (ra, rb) = (self.range1, self.range2);
        let w0 = a.origin - b.origin;
        let cos = a.direction.dot(&b.direction);
        // Parameter on `b` of the foot of `a.origin`.
        let e = b.direction.dot(&w0);

        if 1.0 - cos.abs() < self.config.angular_tolerance {
            let square_distance = w0.reject_from(&a.direction).length_squared();
            let (from, to) = (e + cos * ra.0, e + cos * ra.1);
            let (lo, hi) = (from.min(to).max(rb.0), from.max(to).min(rb.1));
            if lo <= hi + tol {
                let t2 = if !is_infinite(lo) {
                    lo
                } else if !is_infinite(hi) {
                    hi
                } else {
                    e
                };
                let t1 = a.parameter_of(&b.value(t2));
                trace!(square_distance, "parallel lines");
                return ExtremaResult::infinite(square_distance, Some(pair(a, t1, b, t2, true)));
            }
            // The ranges do not face each other: nearest ends.
            if !mode.wants_min() {
                return ExtremaResult::finite(Vec::new());
            }
            let t2 = if hi < rb.0 { rb.0 } else { rb.1 };
            let t1 = a.parameter_of(&b.value(t2)).clamp(ra.0, ra.1);
            return ExtremaResult::finite(vec![pair(a, t1, b, t2, true)]);
        }

        if !mode.wants_min() {
            return ExtremaResult::finite(Vec::new());
        }
        let d = a.direction.dot(&w0);
        let denom = 1.0 - cos * cos;
        let t1 = (cos * e - d) / denom;
        let t2 = (e - cos * d) / denom;
        if !inside(t1, ra, tol) || !inside(t2, rb, tol) {
            return ExtremaResult::finite(Vec::new());
        }
        ExtremaResult::finite(vec![pair(a, t1, b, t2, true)])
    }

    fn sampled(&self, tol: f64, mode: SearchMode) -> Result<ExtremaResult, ExtremaError> {
        for (curve, (t0, t1)) in [(self.curve1, self.range1), (self.curve2, self.range2)] {
            if is_infinite(t0) || is_infinite(t1) {
                return Err(ExtremaError::UnboundedDomain(format!(
                    "{:?} needs a finite parameter range, got [{t0}, {t1}]",
                    curve.curve_type()
                )));
            }
        }
        if !mode.wants_min() {
            trace!("numeric curve/curve search has no maxima");
            return Ok(ExtremaResult::finite(Vec::new()));
        }

        let s1 = samples(self.range1.0, self.range1.1, self.nb_samples(self.curve1));
        let s2 = samples(self.range2.0, self.range2.1, self.nb_samples(self.curve2));
        let p1: Vec<Point3d> = s1.iter().map(|&t| self.curve1.value(t)).collect();
        let p2: Vec<Point3d> = s2.iter().map(|&t| self.curve2.value(t)).collect();
        let (n1, n2) = (s1.len(), s2.len());
        let padded = |i: usize, j: usize| -> f64 {
            if i == 0 || j == 0 || i > n1 || j > n2 {
                return f64::INFINITY;
            }
            let d = p1[i - 1].square_distance(&p2[j - 1]);
            if d.is_nan() { f64::INFINITY } else { d }
        };

        let merge = tol.max(MERGE_TOLERANCE);
        let (period1, period2) = (self.curve1.period(), self.curve2.period());
        let mut out: Vec<Extremum> = Vec::new();
        for i in 1..=n1 {
            for j in 1..=n2 {
                let d = padded(i, j);
                if !d.is_finite() {
                    continue;
                }
                let lowest = (i - 1..=i + 1)
                    .flat_map(|a| (j - 1..=j + 1).map(move |b| (a, b)))
                    .filter(|&(a, b)| (a, b) != (i, j))
                    .all(|(a, b)| d <= padded(a, b));
                if !lowest {
                    continue;
                }
                let Some((t1, t2)) = self.refine(s1[i - 1], s2[j - 1], d, tol) else {
                    continue;
                };
                let (Some(t1), Some(t2)) = (
                    fold_into(t1, self.range1, period1, tol),
                    fold_into(t2, self.range2, period2, tol),
                ) else {
                    continue;
                };
                let duplicate = out.iter().any(|e| {
                    let (Params::Curve(u1), Params::Curve(u2)) = (e.params1, e.params2) else {
                        return false;
                    };
                    close(u1, t1, merge, period1) && close(u2, t2, merge, period2)
                });
                if !duplicate {
                    out.push(pair(self.curve1, t1, self.curve2, t2, true));
                }
            }
        }
        trace!(n1, n2, nb_ext = out.len(), "sampled curve/curve extrema");
        Ok(ExtremaResult::finite(out))
    }

    /// Damped Newton on `((C1 - C2)·C1', -(C1 - C2)·C2') = 0`. `None` when
    /// the iteration stalls on the box boundary or does not converge.
    fn refine(&self, seed1: f64, seed2: f64, d0: f64, tol: f64) -> Option<(f64, f64)> {
        let wraps1 = wraps(self.curve1, self.range1, tol);
        let wraps2 = wraps(self.curve2, self.range2, tol);
        let (mut t1, mut t2, mut d) = (seed1, seed2, d0);
        for _ in 0..self.config.max_newton_iterations {
            let (c1, d1, dd1) = self.curve1.d2(t1);
            let (c2, d2, dd2) = self.curve2.d2(t2);
            let w = c1 - c2;
            let gradient = Vector2::new(w.dot(&d1), -w.dot(&d2));
            let coupling = -d1.dot(&d2);
            let hessian = Matrix2::new(
                d1.dot(&d1) + w.dot(&dd1),
                coupling,
                coupling,
                d2.dot(&d2) - w.dot(&dd2),
            );
            let step = hessian.lu().solve(&(-gradient))?;
            if step.x.abs() < tol && step.y.abs() < tol {
                return Some((t1, t2));
            }

            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_DAMPING {
                let n1 = t1 + scale * step.x;
                let n2 = t2 + scale * step.y;
                let n1 = if wraps1 { n1 } else { n1.clamp(self.range1.0, self.range1.1) };
                let n2 = if wraps2 { n2 } else { n2.clamp(self.range2.0, self.range2.1) };
                let nd = self.curve1.value(n1).square_distance(&self.curve2.value(n2));
                if nd <= d {
                    accepted = Some((n1, n2, nd));
                    break;
                }
                scale *= 0.5;
            }
            let (n1, n2, nd) = accepted?;
            if n1 == t1 && n2 == t2 {
                return None;
            }
            (t1, t2, d) = (n1, n2, nd);
        }
        None
    }

    fn nb_samples(&self, curve: &Curve) -> usize {
        if curve.is_periodic() || curve.curve_type() == CurveType::BSpline {
            self.config.nb_t_refined
        } else {
            self.config.nb_t
        }
    }
}

/// Stationary points of the distance from a circle to a line, in
/// `(line, circle)` order.
///
/// For the circle point `Q(u)` the nearest line point is its projection, so
/// the extrema are the roots of the derivative of
/// `|Q(u) - P|² - ((Q(u) - P)·D)²`, a trigonometric equation in `u`.
fn line_circle(
    line: &Line3d,
    line_range: (f64, f64),
    circle: &Circle3d,
    circle_range: (f64, f64),
    tol: f64,
    mode: SearchMode,
) -> ExtremaResult {
    let frame = &circle.frame;
    let r = circle.radius;
    let dir = line.direction;
    let v = circle.center() - line.origin;
    let (vx, vy, vd) = (v.dot(&frame.x_dir), v.dot(&frame.y_dir), v.dot(&dir));
    let (dx, dy) = (frame.x_dir.dot(&dir), frame.y_dir.dot(&dir));
    let coefficients = TrigCoefficients::new(
        -2.0 * r * dx * dy,
        0.5 * r * (dx * dx - dy * dy),
        vy - vd * dy,
        vd * dx - vx,
        r * dx * dy,
    );
    let roots = TrigonometricRoots::new(coefficients, circle_range.0, circle_range.1);

    if roots.infinite_roots() {
        // The line is the circle axis.
        let u = if is_infinite(circle_range.0) { 0.0 } else { circle_range.0 };
        let t = line.parameter_of(&circle.value(u));
        if !inside(t, line_range, tol) {
            return ExtremaResult::finite(Vec::new());
        }
        trace!(radius = r, "line along circle axis");
        return ExtremaResult::infinite(r * r, Some(pair(line, t, circle, u, true)));
    }
    if !roots.is_done() {
        warn!(?coefficients, "line/circle stationary equation failed");
        return ExtremaResult::with_status(Status::NumericalError);
    }

    let to_line = |u: f64| {
        let q = circle.value(u);
        q.square_distance(&line.value(line.parameter_of(&q)))
    };
    let mut out: Vec<Extremum> = Vec::new();
    for &root in roots.roots() {
        let Some(u) = fold_into(root, circle_range, circle.period(), tol) else {
            continue;
        };
        let t = line.parameter_of(&circle.value(u));
        if !inside(t, line_range, tol) {
            continue;
        }
        let is_minimum = is_local_min(&to_line, u);
        let wanted = if is_minimum { mode.wants_min() } else { mode.wants_max() };
        let duplicate = out
            .iter()
            .any(|e| matches!(e.params2, Params::Curve(w) if close(w, u, tol, circle.period())));
        if wanted && !duplicate {
            out.push(pair(line, t, circle, u, is_minimum));
        }
    }
    ExtremaResult::finite(out)
}

fn pair<A: CurveEval + ?Sized, B: CurveEval + ?Sized>(a: &A, t1: f64, b: &B, t2: f64, is_minimum: bool) -> Extremum {
    let (point1, point2) = (a.value(t1), b.value(t2));
    Extremum {
        params1: Params::Curve(t1),
        params2: Params::Curve(t2),
        point1,
        point2,
        square_distance: point1.square_distance(&point2),
        is_minimum,
    }
}

fn inside(t: f64, (lo, hi): (f64, f64), tol: f64) -> bool {
    t >= lo - tol && t <= hi + tol
}

/// The range covers a whole period of the curve.
fn wraps(curve: &Curve, (lo, hi): (f64, f64), tol: f64) -> bool {
    curve.period().is_some_and(|period| hi - lo >= period - tol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::curves::{Ellipse3d, Hyperbola3d};
    use crate::geometry::frame::Frame;
    use crate::geometry::vector::Vec3;
    use approx::assert_relative_eq;
    use cad_math::precision::INFINITE;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    const TOL: f64 = 1e-9;
    const ALL: (f64, f64) = (-INFINITE, INFINITE);

    fn line(origin: Point3d, direction: Vec3) -> Curve {
        Curve::Line(Line3d::new(origin, direction).unwrap())
    }

    fn circle(center: Point3d, radius: f64) -> Curve {
        Curve::Circle(Circle3d::with_frame(Frame::world(center), radius).unwrap())
    }

    #[test]
    fn test_skew_lines_common_perpendicular() {
        let a = line(Point3d::new(2.0, 0.0, 0.0), Vec3::X);
        let b = line(Point3d::new(0.0, -1.0, 5.0), Vec3::Y);
        let r = ExtremaCurveCurve::new(&a, ALL, &b, ALL).unwrap().perform(TOL, SearchMode::MinMax).unwrap();
        assert_eq!(r.status(), Status::Ok);
        assert_eq!(r.nb_ext(), 1);
        let e = r.extremum(0).unwrap();
        assert!(e.is_minimum);
        assert_relative_eq!(e.square_distance, 25.0, epsilon = 1e-12);
        assert_relative_eq!(e.params1.curve().unwrap(), -2.0, epsilon = 1e-12);
        assert_relative_eq!(e.params2.curve().unwrap(), 1.0, epsilon = 1e-12);

        let max = ExtremaCurveCurve::new(&a, ALL, &b, ALL).unwrap().perform(TOL, SearchMode::Max).unwrap();
        assert_eq!(max.status(), Status::NoSolution);
    }

    #[test]
    fn test_skew_segments_missing_perpendicular() {
        let a = line(Point3d::ORIGIN, Vec3::X);
        let b = line(Point3d::new(0.0, 0.0, 5.0), Vec3::Y);
        let r = ExtremaCurveCurve::new(&a, (1.0, 2.0), &b, ALL)
            .unwrap()
            .perform(TOL, SearchMode::Min)
            .unwrap();
        assert_eq!(r.status(), Status::NoSolution);
    }

    #[test]
    fn test_parallel_lines_are_infinite() {
        let a = line(Point3d::ORIGIN, Vec3::X);
        let b = line(Point3d::new(0.0, 3.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let r = ExtremaCurveCurve::new(&a, ALL, &b, (-2.0, 7.0))
            .unwrap()
            .perform(TOL, SearchMode::MinMax)
            .unwrap();
        assert!(r.is_infinite());
        assert_relative_eq!(r.infinite_square_distance().unwrap(), 9.0, epsilon = 1e-12);
        let e = r.extremum(0).unwrap();
        assert_relative_eq!(e.square_distance, 9.0, epsilon = 1e-12);
        assert_relative_eq!(e.params2.curve().unwrap(), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_segments_apart() {
        let a = line(Point3d::ORIGIN, Vec3::X);
        let b = line(Point3d::new(0.0, 3.0, 0.0), Vec3::X);
        let r = ExtremaCurveCurve::new(&a, (0.0, 1.0), &b, (5.0, 6.0))
            .unwrap()
            .perform(TOL, SearchMode::Min)
            .unwrap();
        assert_eq!(r.status(), Status::Ok);
        let e = r.extremum(0).unwrap();
        assert_eq!(e.params1, Params::Curve(1.0));
        assert_eq!(e.params2, Params::Curve(5.0));
        assert_relative_eq!(e.square_distance, 25.0, epsilon = 1e-12);
    }

    #[test]
    fn test_line_beside_circle() {
        let l = line(Point3d::new(5.0, 0.0, -1.0), Vec3::Y);
        let c = circle(Point3d::ORIGIN, 2.0);
        let r = ExtremaCurveCurve::new(&l, ALL, &c, (0.0, TAU))
            .unwrap()
            .perform(TOL, SearchMode::MinMax)
            .unwrap();
        assert_eq!(r.nb_ext(), 2, "{:?}", r.extrema());
        let min = r.extrema().iter().find(|e| e.is_minimum).unwrap();
        let max = r.extrema().iter().find(|e| !e.is_minimum).unwrap();
        assert_relative_eq!(min.square_distance, 10.0, epsilon = 1e-9);
        assert_relative_eq!(min.point2.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(min.params1.curve().unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(max.square_distance, 50.0, epsilon = 1e-9);
        assert_relative_eq!(max.params2.curve().unwrap(), PI, epsilon = 1e-9);

        let only_min = ExtremaCurveCurve::new(&l, ALL, &c, (0.0, TAU))
            .unwrap()
            .perform(TOL, SearchMode::Min)
            .unwrap();
        assert_eq!(only_min.nb_ext(), 1);
    }

    #[test]
    fn test_circle_then_line_swaps_parameters() {
        let l = line(Point3d::new(5.0, 0.0, -1.0), Vec3::Y);
        let c = circle(Point3d::ORIGIN, 2.0);
        let r = ExtremaCurveCurve::new(&c, (0.0, TAU), &l, ALL)
            .unwrap()
            .perform(TOL, SearchMode::Min)
            .unwrap();
        assert_eq!(r.nb_ext(), 1);
        let e = r.extremum(0).unwrap();
        assert_relative_eq!(e.params1.curve().unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(e.point1.x, 2.0, epsilon = 1e-9);
        assert_relative_eq!(e.point2.x, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_line_on_circle_axis() {
        let l = line(Point3d::new(1.0, 1.0, 3.0), Vec3::Z);
        let c = circle(Point3d::new(1.0, 1.0, 0.0), 2.0);
        let r = ExtremaCurveCurve::new(&l, ALL, &c, (0.0, TAU))
            .unwrap()
            .perform(TOL, SearchMode::MinMax)
            .unwrap();
        assert!(r.is_infinite());
        assert_eq!(r.infinite_square_distance().unwrap(), 4.0);
        assert_relative_eq!(r.square_distance(0).unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_two_circles_numeric() {
        let a = circle(Point3d::ORIGIN, 1.0);
        let b = circle(Point3d::new(5.0, 0.0, 0.0), 1.0);
        let r = ExtremaCurveCurve::on_curves(&a, &b).unwrap().perform(TOL, SearchMode::MinMax).unwrap();
        assert_eq!(r.nb_ext(), 1, "{:?}", r.extrema());
        let e = r.extremum(0).unwrap();
        assert!(e.is_minimum);
        assert_relative_eq!(e.square_distance, 9.0, epsilon = 1e-9);
        // The seam of the first circle may come back on either side.
        let t1 = e.params1.curve().unwrap();
        assert!(t1.abs() < 1e-7 || (t1 - TAU).abs() < 1e-7, "{t1}");
        assert_relative_eq!(e.params2.curve().unwrap(), PI, epsilon = 1e-7);

        let max = ExtremaCurveCurve::on_curves(&a, &b).unwrap().perform(TOL, SearchMode::Max).unwrap();
        assert_eq!(max.status(), Status::NoSolution);
    }

    #[test]
    fn test_segment_over_ellipse_numeric() {
        let segment = line(Point3d::new(0.0, 3.0, 0.0), Vec3::X);
        let ellipse = Curve::Ellipse(Ellipse3d::new(Frame::world(Point3d::ORIGIN), 4.0, 2.0).unwrap());
        let r = ExtremaCurveCurve::new(&segment, (-5.0, 5.0), &ellipse, (0.0, TAU))
            .unwrap()
            .perform(TOL, SearchMode::Min)
            .unwrap();
        assert_eq!(r.nb_ext(), 1, "{:?}", r.extrema());
        let e = r.extremum(0).unwrap();
        assert_relative_eq!(e.square_distance, 1.0, epsilon = 1e-9);
        assert!(e.params1.curve().unwrap().abs() < 1e-7);
        assert_relative_eq!(e.params2.curve().unwrap(), FRAC_PI_2, epsilon = 1e-7);
    }

    #[test]
    fn test_unbounded_numeric_pair_rejected() {
        let ellipse = Curve::Ellipse(Ellipse3d::new(Frame::world(Point3d::ORIGIN), 4.0, 2.0).unwrap());
        let hyperbola =
            Curve::Hyperbola(Hyperbola3d::new(Frame::world(Point3d::new(0.0, 0.0, 1.0)), 1.0, 1.0).unwrap());
        let err = ExtremaCurveCurve::on_curves(&ellipse, &hyperbola)
            .unwrap()
            .perform(TOL, SearchMode::Min);
        assert!(matches!(err, Err(ExtremaError::UnboundedDomain(_))));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let a = line(Point3d::ORIGIN, Vec3::X);
        assert!(matches!(
            ExtremaCurveCurve::new(&a, (0.0, 1.0), &a, (3.0, 2.0)),
            Err(ExtremaError::Math(MathError::InvalidBounds { .. }))
        ));
    }
}

//! Extrema of the distance from a point to a curve.
//!
//! Lines and circles are solved in closed form. Other curves are sampled once
//! over a finite parameter range; every query seeds a damped Newton iteration
//! on `(C(t) - P)·C'(t) = 0` from each local extremum of the sampled
//! distance, padded with infinity at the range ends.

use cad_math::MathError;
use cad_math::precision::is_infinite;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, instrument, trace};

use super::ext_cs::{close, fold_into};
use super::ext_ps::samples;
use super::{ExtremaConfig, ExtremaError, SearchMode, Status};
use crate::geometry::curves::{Curve, CurveEval, CurveType, Line3d};
use crate::geometry::point::Point3d;

const MAX_DAMPING: usize = 8;
/// Refined seeds closer than this in parameter are one extremum.
const MERGE_TOLERANCE: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointCurveExtremum {
    pub parameter: f64,
    pub point: Point3d,
    pub square_distance: f64,
    pub is_minimum: bool,
}

/// Outcome of a point/curve query, indexed from zero.
///
/// A point on the axis of a circle is equidistant from the whole circle: the
/// result is `InfiniteSolutions` with one representative extremum.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointCurveExtrema {
    status: Status,
    extrema: Vec<PointCurveExtremum>,
    infinite_square_distance: Option<f64>,
}

impl PointCurveExtrema {
    fn finite(extrema: Vec<PointCurveExtremum>) -> Self {
        let status = if extrema.is_empty() { Status::NoSolution } else { Status::Ok };
        Self {
            status,
            extrema,
            infinite_square_distance: None,
        }
    }

    fn infinite(square_distance: f64, representative: PointCurveExtremum) -> Self {
        Self {
            status: Status::InfiniteSolutions,
            extrema: vec![representative],
            infinite_square_distance: Some(square_distance),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_done(&self) -> bool {
        matches!(self.status, Status::Ok | Status::InfiniteSolutions)
    }

    pub fn is_infinite(&self) -> bool {
        self.status.is_infinite()
    }

    pub fn nb_ext(&self) -> usize {
        self.extrema.len()
    }

    pub fn extrema(&self) -> &[PointCurveExtremum] {
        &self.extrema
    }

    pub fn extremum(&self, index: usize) -> Result<&PointCurveExtremum, ExtremaError> {
        self.extrema.get(index).ok_or(ExtremaError::IndexOutOfRange {
            index,
            len: self.extrema.len(),
        })
    }

    pub fn square_distance(&self, index: usize) -> Result<f64, ExtremaError> {
        Ok(self.extremum(index)?.square_distance)
    }

    pub fn infinite_square_distance(&self) -> Result<f64, ExtremaError> {
        match (self.status, self.infinite_square_distance) {
            (Status::InfiniteSolutions, Some(d)) => Ok(d),
            _ => Err(ExtremaError::NotDone),
        }
    }

    pub fn min_square_distance(&self) -> Option<f64> {
        self.extrema.iter().map(|e| e.square_distance).min_by(f64::total_cmp)
    }

    pub fn max_square_distance(&self) -> Option<f64> {
        self.extrema.iter().map(|e| e.square_distance).max_by(f64::total_cmp)
    }
}

/// Point/curve extrema over a fixed parameter range.
pub struct ExtremaPointCurve<'a> {
    curve: &'a Curve,
    range: (f64, f64),
    max_iterations: usize,
    /// Sampled parameters of the numeric path, sharp parameters included.
    ts: Vec<f64>,
    grid: Vec<Point3d>,
    sharp: Vec<f64>,
}

impl<'a> ExtremaPointCurve<'a> {
    /// Lines and circles accept any range; other curves need a finite one.
    pub fn new(curve: &'a Curve, range: (f64, f64), config: &ExtremaConfig) -> Result<Self, ExtremaError> {
        let (t0, t1) = range;
        if t0.is_nan() || t1.is_nan() || t0 > t1 {
            return Err(MathError::InvalidBounds { lower: t0, upper: t1 }.into());
        }
        let (ts, sharp) = match curve {
            Curve::Line(_) | Curve::Circle(_) => (Vec::new(), Vec::new()),
            _ if is_infinite(t0) || is_infinite(t1) => {
                return Err(ExtremaError::UnboundedDomain(format!(
                    "{:?} needs a finite parameter range, got [{t0}, {t1}]",
                    curve.curve_type()
                )));
            }
            _ => {
                let nb_t = if curve.is_periodic() || curve.curve_type() == CurveType::BSpline {
                    config.nb_t_refined
                } else {
                    config.nb_t
                };
                let sharp = curve.sharp_parameters(t0, t1);
                let mut ts = samples(t0, t1, nb_t);
                ts.extend(&sharp);
                ts.sort_by(f64::total_cmp);
                (ts, sharp)
            }
        };
        let grid = ts.iter().map(|&t| curve.value(t)).collect();
        Ok(Self {
            curve,
            range,
            max_iterations: config.max_newton_iterations,
            ts,
            grid,
            sharp,
        })
    }

    /// Query over the curve's natural parameter range.
    pub fn on_curve(curve: &'a Curve, config: &ExtremaConfig) -> Result<Self, ExtremaError> {
        Self::new(curve, (curve.first_parameter(), curve.last_parameter()), config)
    }

    /// Stationary points of the distance inside the range.
    #[instrument(skip(self), level = "trace")]
    pub fn perform(&self, p: &Point3d, tol: f64, mode: SearchMode) -> PointCurveExtrema {
        self.search(p, tol, mode, false)
    }

    /// [`Self::perform`] plus the finite range ends, classified as extrema
    /// of the distance restricted to the range.
    #[instrument(skip(self), level = "trace")]
    pub fn perform_with_endpoints(&self, p: &Point3d, tol: f64, mode: SearchMode) -> PointCurveExtrema {
        self.search(p, tol, mode, true)
    }

    fn search(&self, p: &Point3d, tol: f64, mode: SearchMode, endpoints: bool) -> PointCurveExtrema {
        let mut found = match self.curve {
            Curve::Line(line) => self.on_line(line, p, tol),
            Curve::Circle(circle) => {
                let (x, y, z) = circle.frame.to_local(p);
                if x.hypot(y) <= tol {
                    let square_distance = circle.radius * circle.radius + z * z;
                    trace!(square_distance, "point on circle axis");
                    return PointCurveExtrema::infinite(square_distance, self.extremum(p, self.anchor(), true));
                }
                self.on_circle(p, y.atan2(x), tol)
            }
            _ => self.sampled(p, tol, mode),
        };
        found.retain(|e| if e.is_minimum { mode.wants_min() } else { mode.wants_max() });

        if endpoints && !self.wraps(tol) {
            for (t, lower) in self.finite_ends() {
                if found.iter().any(|e| close(e.parameter, t, tol, None)) {
                    continue;
                }
                let (c, d1) = self.curve.d1(t);
                let slope = (c - *p).dot(&d1);
                let is_minimum = if lower { slope >= 0.0 } else { slope <= 0.0 };
                if (is_minimum && mode.wants_min()) || (!is_minimum && mode.wants_max()) {
                    found.push(self.extremum(p, t, is_minimum));
                }
            }
        }
        debug!(curve = ?self.curve.curve_type(), nb_ext = found.len(), endpoints, "point/curve extrema");
        PointCurveExtrema::finite(found)
    }

    fn on_line(&self, line: &Line3d, p: &Point3d, tol: f64) -> Vec<PointCurveExtremum> {
        let t = line.parameter_of(p);
        let (t0, t1) = self.range;
        if t < t0 - tol || t > t1 + tol {
            return Vec::new();
        }
        vec![self.extremum(p, t, true)]
    }

    /// Nearest at the polar angle `u` of the point, farthest opposite.
    fn on_circle(&self, p: &Point3d, u: f64, tol: f64) -> Vec<PointCurveExtremum> {
        [(u, true), (u + PI, false)]
            .into_iter()
            .filter_map(|(u, is_minimum)| {
                let t = fold_into(u, self.range, self.curve.period(), tol)?;
                Some(self.extremum(p, t, is_minimum))
            })
            .collect()
    }

    fn sampled(&self, p: &Point3d, tol: f64, mode: SearchMode) -> Vec<PointCurveExtremum> {
        let n = self.ts.len();
        let wraps = self.wraps(tol);
        let merge = tol.max(MERGE_TOLERANCE);
        let mut found: Vec<PointCurveExtremum> = Vec::new();

        let kinds = [(true, mode.wants_min()), (false, mode.wants_max())];
        for (is_minimum, wanted) in kinds {
            if !wanted {
                continue;
            }
            let fill = if is_minimum { f64::INFINITY } else { f64::NEG_INFINITY };
            let padded = |i: usize| -> f64 {
                if i == 0 || i > n {
                    return fill;
                }
                let d = self.grid[i - 1].square_distance(p);
                if d.is_nan() { fill } else { d }
            };
            for i in 1..=n {
                let d = padded(i);
                if !d.is_finite() {
                    continue;
                }
                let extremal = if is_minimum {
                    d <= padded(i - 1) && d <= padded(i + 1)
                } else {
                    d >= padded(i - 1) && d >= padded(i + 1)
                };
                if !extremal {
                    continue;
                }
                let seed = self.ts[i - 1];
                let Some(t) = self
                    .refine(p, seed, d, is_minimum, tol, wraps)
                    .or_else(|| self.sharp.contains(&seed).then_some(seed))
                else {
                    continue;
                };
                let Some(t) = fold_into(t, self.range, self.curve.period(), tol) else {
                    continue;
                };
                let duplicate = found
                    .iter()
                    .any(|e| e.is_minimum == is_minimum && close(e.parameter, t, merge, self.curve.period()));
                if !duplicate {
                    found.push(self.extremum(p, t, is_minimum));
                }
            }
        }
        trace!(samples = n, nb_ext = found.len(), "sampled point/curve extrema");
        found
    }

    /// Damped Newton on `(C - P)·C' = 0`, descending for minima and
    /// ascending for maxima. `None` when the iteration stalls against a range
    /// end or does not converge.
    fn refine(&self, p: &Point3d, seed: f64, d0: f64, is_minimum: bool, tol: f64, wraps: bool) -> Option<f64> {
        let (lo, hi) = self.range;
        let (mut t, mut d) = (seed, d0);
        for _ in 0..self.max_iterations {
            let (c, d1, d2) = self.curve.d2(t);
            let w = c - *p;
            let g = w.dot(&d1);
            let h = (d1.dot(&d1) + w.dot(&d2)).abs();
            let step = if is_minimum { -g / h } else { g / h };
            if !step.is_finite() {
                return None;
            }
            if step.abs() < tol {
                return Some(t);
            }

            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_DAMPING {
                let nt = t + scale * step;
                let nt = if wraps { nt } else { nt.clamp(lo, hi) };
                let nd = self.curve.value(nt).square_distance(p);
                let better = if is_minimum { nd <= d } else { nd >= d };
                if better {
                    accepted = Some((nt, nd));
                    break;
                }
                scale *= 0.5;
            }
            let (nt, nd) = accepted?;
            if nt == t {
                // Clamped in place: the step points out of the range.
                return None;
            }
            (t, d) = (nt, nd);
        }
        None
    }

    fn extremum(&self, p: &Point3d, t: f64, is_minimum: bool) -> PointCurveExtremum {
        let point = self.curve.value(t);
        PointCurveExtremum {
            parameter: t,
            point,
            square_distance: point.square_distance(p),
            is_minimum,
        }
    }

    fn anchor(&self) -> f64 {
        let (t0, t1) = self.range;
        if !is_infinite(t0) {
            t0
        } else if !is_infinite(t1) {
            t1
        } else {
            0.0
        }
    }

    /// The range covers a whole period, so its ends are the same point.
    fn wraps(&self, tol: f64) -> bool {
        self.curve
            .period()
            .is_some_and(|period| self.range.1 - self.range.0 >= period - tol)
    }

    /// Finite range ends, flagged `true` for the lower one.
    fn finite_ends(&self) -> Vec<(f64, bool)> {
        let (t0, t1) = self.range;
        let mut ends = Vec::with_capacity(2);
        if !is_infinite(t0) {
            ends.push((t0, true));
        }
        if !is_infinite(t1) && t1 > t0 {
            ends.push((t1, false));
        }
        ends
    }
}

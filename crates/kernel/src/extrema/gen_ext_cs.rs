//! Multi-start search for the stationary points of `|C(t) - S(u, v)|²`.
//!
//! The box `[t0, t1] × [u0, u1] × [v0, v1]` is sampled on a regular grid.
//! Every node that is a strict local minimum or maximum of the squared
//! distance among its six axis neighbours seeds a Newton iteration on the
//! gradient. A periodic parameter sampled over its full period wraps around
//! instead of ending at the box faces.

use nalgebra::{Matrix3, Vector3};
use tracing::{debug, trace};

use super::{ExtremaConfig, SearchMode};
use crate::geometry::curves::CurveEval;
use crate::geometry::surfaces::SurfaceEval;

/// Largest Newton step as a fraction of the parameter range.
const MAX_STEP_FRACTION: f64 = 0.25;

/// One converged stationary point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationaryPoint {
    pub t: f64,
    pub u: f64,
    pub v: f64,
    pub square_distance: f64,
    pub is_minimum: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenExtResult {
    done: bool,
    solutions: Vec<StationaryPoint>,
}

impl GenExtResult {
    /// False when no grid node could be evaluated.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn solutions(&self) -> &[StationaryPoint] {
        &self.solutions
    }
}

/// One sampled parameter axis.
#[derive(Debug, Clone)]
struct Axis {
    lo: f64,
    hi: f64,
    wraps: bool,
    values: Vec<f64>,
}

impl Axis {
    fn new(lo: f64, hi: f64, intervals: usize, period: Option<f64>) -> Self {
        let n = intervals.max(1);
        let wraps = period.is_some_and(|p| (hi - lo - p).abs() <= 1e-9 * p);
        let count = if wraps { n } else { n + 1 };
        let values = (0..count).map(|i| lo + (hi - lo) * i as f64 / n as f64).collect();
        Self { lo, hi, wraps, values }
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    /// Indices of the two neighbours of `i`; `None` past a non-wrapping end.
    fn neighbours(&self, i: usize) -> [Option<usize>; 2] {
        let n = self.len();
        if n < 2 {
            return [None, None];
        }
        if self.wraps {
            [Some((i + n - 1) % n), Some((i + 1) % n)]
        } else {
            [i.checked_sub(1), (i + 1 < n).then_some(i + 1)]
        }
    }

    /// Clamp a non-wrapping coordinate into the box. Wrapping coordinates
    /// are left free and folded once the iteration ends.
    fn clamp(&self, x: f64) -> f64 {
        if self.wraps { x } else { x.clamp(self.lo, self.hi) }
    }

    fn fold(&self, x: f64) -> f64 {
        if self.wraps {
            super::normalize_periodic(x, self.lo, self.hi - self.lo)
        } else {
            x
        }
    }

    fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

/// Generic curve/surface extrema search over finite parameter boxes.
#[derive(Debug, Clone, Copy)]
pub struct GenExtCurveSurface {
    nb_t: usize,
    nb_u: usize,
    nb_v: usize,
    max_iterations: usize,
    tol_c: f64,
    tol_s: f64,
}

impl GenExtCurveSurface {
    /// `nb_t` overrides the config's curve density.
    pub fn new(config: &ExtremaConfig, nb_t: usize, tol_c: f64, tol_s: f64) -> Self {
        Self {
            nb_t,
            nb_u: config.nb_u,
            nb_v: config.nb_v,
            max_iterations: config.max_newton_iterations,
            tol_c,
            tol_s,
        }
    }

    pub fn perform<C, S>(
        &self,
        curve: &C,
        (t0, t1): (f64, f64),
        surface: &S,
        (u0, u1): (f64, f64),
        (v0, v1): (f64, f64),
        mode: SearchMode,
    ) -> GenExtResult
    where
        C: CurveEval + ?Sized,
        S: SurfaceEval + ?Sized,
    {
        let axes = [
            Axis::new(t0, t1, self.nb_t, curve.period()),
            Axis::new(u0, u1, self.nb_u, surface.u_period()),
            Axis::new(v0, v1, self.nb_v, surface.v_period()),
        ];
        let [at, au, av] = &axes;
        let (nt, nu, nv) = (at.len(), au.len(), av.len());
        let index = |i: usize, j: usize, k: usize| (i * nu + j) * nv + k;

        let curve_points: Vec<_> = at.values.iter().map(|&t| curve.value(t)).collect();
        let surface_points: Vec<_> = au
            .values
            .iter()
            .flat_map(|&u| av.values.iter().map(move |&v| surface.value(u, v)))
            .collect();
        let mut table = Vec::with_capacity(nt * nu * nv);
        for c in &curve_points {
            table.extend(surface_points.iter().map(|s| c.square_distance(s)));
        }
        if table.iter().all(|d| !d.is_finite()) {
            return GenExtResult::default();
        }

        let mut seeds = Vec::new();
        for i in 0..nt {
            for j in 0..nu {
                for k in 0..nv {
                    let d = table[index(i, j, k)];
                    if !d.is_finite() {
                        continue;
                    }
                    let mut neighbours = Vec::with_capacity(6);
                    neighbours.extend(at.neighbours(i).into_iter().flatten().map(|a| table[index(a, j, k)]));
                    neighbours.extend(au.neighbours(j).into_iter().flatten().map(|b| table[index(i, b, k)]));
                    neighbours.extend(av.neighbours(k).into_iter().flatten().map(|c| table[index(i, j, c)]));
                    if neighbours.is_empty() {
                        continue;
                    }
                    if mode.wants_min() && neighbours.iter().all(|&n| d < n) {
                        seeds.push((i, j, k, true));
                    } else if mode.wants_max() && neighbours.iter().all(|&n| d > n) {
                        seeds.push((i, j, k, false));
                    }
                }
            }
        }

        let solutions: Vec<_> = seeds
            .iter()
            .filter_map(|&(i, j, k, is_minimum)| {
                let start = Vector3::new(at.values[i], au.values[j], av.values[k]);
                self.refine(curve, surface, &axes, start, is_minimum)
            })
            .collect();
        debug!(
            grid = nt * nu * nv,
            seeds = seeds.len(),
            solutions = solutions.len(),
            "generic curve/surface search"
        );
        GenExtResult { done: true, solutions }
    }

    /// Newton on `G = ((C - S)·C', -(C - S)·Su, -(C - S)·Sv) = 0`.
    /// Converges only on a small step whose target lies inside the box.
    fn refine<C, S>(
        &self,
        curve: &C,
        surface: &S,
        axes: &[Axis; 3],
        start: Vector3<f64>,
        is_minimum: bool,
    ) -> Option<StationaryPoint>
    where
        C: CurveEval + ?Sized,
        S: SurfaceEval + ?Sized,
    {
        let tolerances = [self.tol_c, self.tol_s, self.tol_s];
        let mut x = start;
        for iteration in 0..self.max_iterations {
            let (c, dc, d2c) = curve.d2(x[0]);
            let s = surface.d2(x[1], x[2]);
            let w = c - s.point;
            let g = Vector3::new(w.dot(&dc), -w.dot(&s.du), -w.dot(&s.dv));
            let h = Matrix3::new(
                dc.dot(&dc) + w.dot(&d2c),
                -dc.dot(&s.du),
                -dc.dot(&s.dv),
                -dc.dot(&s.du),
                s.du.dot(&s.du) - w.dot(&s.duu),
                s.du.dot(&s.dv) - w.dot(&s.duv),
                -dc.dot(&s.dv),
                s.du.dot(&s.dv) - w.dot(&s.duv),
                s.dv.dot(&s.dv) - w.dot(&s.dvv),
            );
            let mut step = h.lu().solve(&(-g))?;
            for (n, axis) in axes.iter().enumerate() {
                let limit = MAX_STEP_FRACTION * axis.width().max(f64::MIN_POSITIVE);
                step[n] = step[n].clamp(-limit, limit);
            }
            if !step.iter().all(|s| s.is_finite()) {
                return None;
            }

            let target = x + step;
            let clamped = Vector3::from_fn(|n, _| axes[n].clamp(target[n]));
            let inside = (0..3).all(|n| (clamped[n] - target[n]).abs() <= tolerances[n]);
            let small = (0..3).all(|n| step[n].abs() < tolerances[n]);
            x = clamped;
            if small && inside {
                let (t, u, v) = (axes[0].fold(x[0]), axes[1].fold(x[1]), axes[2].fold(x[2]));
                let square_distance = curve.value(t).square_distance(&surface.value(u, v));
                trace!(iteration, t, u, v, square_distance, "stationary point");
                return Some(StationaryPoint {
                    t,
                    u,
                    v,
                    square_distance,
                    is_minimum,
                });
            }
        }
        None
    }
}

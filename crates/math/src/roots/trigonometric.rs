//! Roots of `a cos²θ + 2b cosθ sinθ + c cosθ + d sinθ + e = 0`.
//!
//! The general case goes through the substitution `t = tan(θ/2)`, which maps
//! the equation onto a quartic in `t`. θ = π is the pole of the substitution
//! and is tested on the original coefficients. Every root is then polished by
//! Newton on the trigonometric residual.

use std::f64::consts::{PI, TAU};

use tracing::{trace, warn};

use super::polynomial::{PolynomialRoots, evaluate};
use crate::error::{MathError, MathResult};
use crate::precision::is_infinite;
use crate::status::Status;

const EPS: f64 = 1.5e-12;
/// Rescale attempts before a spurious double root is reported as an error.
pub const MAX_RESCALE_RETRIES: usize = 10;
const RESCALE_FACTOR: f64 = 1e-4;
/// Quartic roots closer than this in `t` count as one double root.
const COINCIDENT_ROOTS: f64 = 1e-8;
/// A double root where the quartic slope exceeds this is spurious.
const SPURIOUS_SLOPE: f64 = 1e-6;
/// Widest finite window, in periods, that is unrolled root by root.
pub const MAX_PERIODS: f64 = 4096.0;
const MAX_NEWTON_ITERATIONS: usize = 10;
/// Refinement may move a root by at most this fraction of the interval.
const MAX_REFINE_SHIFT: f64 = 0.01;
const BOUND_MARGIN: f64 = 1e-10;
const MERGE_TOLERANCE: f64 = 1e-9;

/// Coefficients `(a, b, c, d, e)` of the trigonometric equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrigCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
}

impl TrigCoefficients {
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64) -> Self {
        Self { a, b, c, d, e }
    }

    pub fn residual(&self, theta: f64) -> f64 {
        let (s, c) = theta.sin_cos();
        self.a * c * c + 2.0 * self.b * c * s + self.c * c + self.d * s + self.e
    }

    /// Residual and its derivative with respect to θ.
    pub fn residual_with_derivative(&self, theta: f64) -> (f64, f64) {
        let (s, c) = theta.sin_cos();
        let r = self.a * c * c + 2.0 * self.b * c * s + self.c * c + self.d * s + self.e;
        let dr = -2.0 * self.a * c * s + 2.0 * self.b * (c * c - s * s) - self.c * s + self.d * c;
        (r, dr)
    }

    fn quartic(&self) -> [f64; 5] {
        let Self { a, b, c, d, e } = *self;
        [
            a - c + e,
            -4.0 * b + 2.0 * d,
            -2.0 * a + 2.0 * e,
            4.0 * b + 2.0 * d,
            a + c + e,
        ]
    }
}

/// Result of a trigonometric root search.
#[derive(Debug, Clone, PartialEq)]
pub struct TrigonometricRoots {
    status: Status,
    roots: Vec<f64>,
    rescales: usize,
}

impl TrigonometricRoots {
    /// Solve on `[inf_bound, sup_bound]`. An infinite bound on either side
    /// means one full period `[0, 2π)`. A finite window spanning more than
    /// [`MAX_PERIODS`] periods is refused with `Status::NumericalError`.
    pub fn new(coefficients: TrigCoefficients, inf_bound: f64, sup_bound: f64) -> Self {
        let (lo, hi) = if is_infinite(inf_bound) || is_infinite(sup_bound) {
            (0.0, TAU)
        } else if inf_bound <= sup_bound {
            (inf_bound, sup_bound)
        } else {
            (sup_bound, inf_bound)
        };
        let full_period = is_infinite(inf_bound) || is_infinite(sup_bound);

        let TrigCoefficients { a, b, c, d, e } = coefficients;
        if [a, b, c, d, e].iter().all(|k| k.abs() <= EPS) {
            return Self {
                status: Status::InfiniteSolutions,
                roots: Vec::new(),
                rescales: 0,
            };
        }
        if (hi - lo) / TAU > MAX_PERIODS {
            warn!(lo, hi, "trigonometric window spans too many periods");
            return Self {
                status: Status::NumericalError,
                roots: Vec::new(),
                rescales: 0,
            };
        }

        let (base, rescales) = match base_angles(&coefficients) {
            Some(found) => found,
            None => {
                warn!(?coefficients, "spurious double root persists after rescaling");
                return Self {
                    status: Status::NumericalError,
                    roots: Vec::new(),
                    rescales: MAX_RESCALE_RETRIES,
                };
            }
        };

        let width = hi - lo;
        let mut roots = Vec::new();
        for theta0 in base {
            let first = ((lo - theta0) / TAU).floor() as i64;
            let last = ((hi - theta0) / TAU).ceil() as i64;
            for k in first..=last {
                let theta = theta0 + k as f64 * TAU;
                if theta < lo - BOUND_MARGIN || theta > hi + BOUND_MARGIN {
                    continue;
                }
                if full_period && theta >= hi - BOUND_MARGIN {
                    // [0, 2π) window: 2π duplicates 0.
                    continue;
                }
                let refined = refine(&coefficients, theta, width).clamp(lo, hi);
                roots.push(refined);
            }
        }

        roots.sort_by(f64::total_cmp);
        roots.dedup_by(|next, kept| (*next - *kept).abs() <= MERGE_TOLERANCE);
        if full_period
            && roots.len() > 1
            && roots.first().zip(roots.last()).is_some_and(|(f, l)| f + TAU - l <= MERGE_TOLERANCE)
        {
            roots.pop();
        }
        trace!(nb_roots = roots.len(), lo, hi, "trigonometric roots");

        let status = if roots.is_empty() { Status::NoSolution } else { Status::Ok };
        Self { status, roots, rescales }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// False when the rescale-retry budget was exhausted or the window was
    /// too wide.
    pub fn is_done(&self) -> bool {
        self.status != Status::NumericalError
    }

    /// The equation is identically zero.
    pub fn infinite_roots(&self) -> bool {
        self.status == Status::InfiniteSolutions
    }

    pub fn nb_solutions(&self) -> MathResult<usize> {
        match self.status {
            Status::NumericalError => Err(MathError::NotDone),
            Status::InfiniteSolutions => Err(MathError::InfiniteSolutions),
            _ => Ok(self.roots.len()),
        }
    }

    /// Root `index` (0-based), ascending.
    pub fn value(&self, index: usize) -> MathResult<f64> {
        let len = self.nb_solutions()?;
        self.roots
            .get(index)
            .copied()
            .ok_or(MathError::IndexOutOfRange { index, len })
    }

    pub fn roots(&self) -> &[f64] {
        &self.roots
    }

    /// Quartic rescalings needed before the roots were accepted.
    pub fn nb_rescales(&self) -> usize {
        self.rescales
    }
}

/// Roots in one period, unrefined, with the number of quartic rescalings.
/// `None` when the quartic keeps producing a spurious double root.
fn base_angles(k: &TrigCoefficients) -> Option<(Vec<f64>, usize)> {
    let TrigCoefficients { a, b, c, d, e } = *k;

    // First degree: c cosθ + d sinθ + e = 0.
    if a.abs() <= EPS && b.abs() <= EPS {
        if c.abs() <= EPS && d.abs() <= EPS {
            return Some((Vec::new(), 0));
        }
        let r = c.hypot(d);
        let ratio = -e / r;
        if ratio.abs() > 1.0 + EPS {
            return Some((Vec::new(), 0));
        }
        let phi = d.atan2(c);
        let alpha = ratio.clamp(-1.0, 1.0).acos();
        return Some((vec![phi + alpha, phi - alpha], 0));
    }

    // No sine term: quadratic in cosθ.
    if b.abs() <= EPS && d.abs() <= EPS {
        let roots = PolynomialRoots::quadratic(a, c, e).ok()?;
        let mut angles = Vec::new();
        for &x in roots.roots() {
            if x.abs() <= 1.0 + EPS {
                let t = x.clamp(-1.0, 1.0).acos();
                angles.push(t);
                angles.push(-t);
            }
        }
        return Some((angles, 0));
    }

    let (roots, rescales) = rescaled_quartic_roots(k.quartic(), |q| {
        PolynomialRoots::new(q).ok().map(|r| r.roots().to_vec())
    })?;
    let mut angles: Vec<f64> = roots.iter().map(|t| 2.0 * t.atan()).collect();
    if k.residual(PI).abs() <= EPS {
        angles.push(PI);
    }
    Some((angles, rescales))
}

/// Solve the quartic, scaling every coefficient by [`RESCALE_FACTOR`] while
/// the solution shows a spurious double root. Returns the roots and the
/// number of rescalings.
fn rescaled_quartic_roots(
    mut quartic: [f64; 5],
    solve: impl Fn(&[f64; 5]) -> Option<Vec<f64>>,
) -> Option<(Vec<f64>, usize)> {
    for rescales in 0..=MAX_RESCALE_RETRIES {
        let roots = solve(&quartic)?;
        if !has_spurious_double_root(&quartic, &roots) {
            return Some((roots, rescales));
        }
        trace!(rescales, "rescaling quartic coefficients");
        quartic.iter_mut().for_each(|q| *q *= RESCALE_FACTOR);
    }
    None
}

/// Two roots within [`COINCIDENT_ROOTS`] of each other while the quartic
/// slope between them exceeds [`SPURIOUS_SLOPE`]: a true double root has a
/// vanishing slope.
fn has_spurious_double_root(quartic: &[f64; 5], roots: &[f64]) -> bool {
    let mut sorted = roots.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.windows(2).any(|w| {
        if (w[1] - w[0]).abs() > COINCIDENT_ROOTS {
            return false;
        }
        let (_, slope) = evaluate(quartic, 0.5 * (w[0] + w[1]));
        slope.abs() > SPURIOUS_SLOPE
    })
}

fn refine(k: &TrigCoefficients, theta0: f64, width: f64) -> f64 {
    let r0 = k.residual(theta0);
    let mut theta = theta0;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (value, slope) = k.residual_with_derivative(theta);
        if value == 0.0 || slope.abs() <= f64::EPSILON {
            break;
        }
        let step = value / slope;
        theta -= step;
        if step.abs() <= f64::EPSILON * theta.abs().max(1.0) {
            break;
        }
    }
    let r = k.residual(theta);
    if (theta - theta0).abs() <= MAX_REFINE_SHIFT * width && r.abs() <= r0.abs() {
        theta
    } else {
        theta0
    }
}

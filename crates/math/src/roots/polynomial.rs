//! Real roots of polynomials of degree at most four.
//!
//! Degree 1 and 2 use closed forms. Higher degrees are isolated between the
//! real roots of the derivative: on each monotonic piece a sign change brackets
//! exactly one root, which a safeguarded Newton iteration resolves to full
//! precision.

use crate::error::{MathError, MathResult};

/// Leading coefficients below this fraction of the largest one are dropped.
const LEADING_ZERO: f64 = 1e-14;
/// Relative residual under which a critical point counts as a root.
const CRITICAL_ZERO: f64 = 1e-12;
const MAX_POLISH_ITERATIONS: usize = 200;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolynomialRoots {
    infinite: bool,
    roots: Vec<f64>,
}

impl PolynomialRoots {
    /// Coefficients are given highest degree first.
    pub fn new(coefficients: &[f64]) -> MathResult<Self> {
        if coefficients.is_empty() || coefficients.len() > 5 {
            return Err(MathError::InvalidParameter {
                name: "coefficients",
                reason: format!("expected 1 to 5 coefficients, got {}", coefficients.len()),
            });
        }
        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(MathError::InvalidParameter {
                name: "coefficients",
                reason: "non-finite coefficient".into(),
            });
        }

        let largest = coefficients.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
        if largest == 0.0 {
            return Ok(Self {
                infinite: true,
                roots: Vec::new(),
            });
        }
        let first = coefficients
            .iter()
            .position(|c| c.abs() > LEADING_ZERO * largest)
            .unwrap_or(coefficients.len() - 1);
        let trimmed = &coefficients[first..];

        let mut roots = real_roots(trimmed);
        roots.sort_by(f64::total_cmp);
        roots.dedup_by(|next, kept| (*next - *kept).abs() <= 1e-12 * kept.abs().max(1.0));
        Ok(Self {
            infinite: false,
            roots,
        })
    }

    pub fn quartic(a: f64, b: f64, c: f64, d: f64, e: f64) -> MathResult<Self> {
        Self::new(&[a, b, c, d, e])
    }

    pub fn cubic(a: f64, b: f64, c: f64, d: f64) -> MathResult<Self> {
        Self::new(&[a, b, c, d])
    }

    pub fn quadratic(a: f64, b: f64, c: f64) -> MathResult<Self> {
        Self::new(&[a, b, c])
    }

    /// Always true once constructed; kept for parity with the other solvers.
    pub fn is_done(&self) -> bool {
        true
    }

    /// Every coefficient was zero.
    pub fn infinite_roots(&self) -> bool {
        self.infinite
    }

    pub fn nb_solutions(&self) -> MathResult<usize> {
        if self.infinite {
            return Err(MathError::InfiniteSolutions);
        }
        Ok(self.roots.len())
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
}

/// Horner evaluation of value and derivative.
pub fn evaluate(coefficients: &[f64], x: f64) -> (f64, f64) {
    let mut p = 0.0;
    let mut dp = 0.0;
    for &c in coefficients {
        dp = dp * x + p;
        p = p * x + c;
    }
    (p, dp)
}

/// `sum |c_i| |x|^(n-i)`, the scale against which a residual is judged.
fn magnitude(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |m, c| m * x.abs() + c.abs())
}

fn derivative(coefficients: &[f64]) -> Vec<f64> {
    let n = coefficients.len() - 1;
    coefficients[..n]
        .iter()
        .enumerate()
        .map(|(i, c)| c * (n - i) as f64)
        .collect()
}

/// Leading coefficient must be non-zero.
fn real_roots(coefficients: &[f64]) -> Vec<f64> {
    match coefficients.len() {
        0 | 1 => Vec::new(),
        2 => vec![-coefficients[1] / coefficients[0]],
        3 => quadratic_roots(coefficients[0], coefficients[1], coefficients[2]),
        _ => isolated_roots(coefficients),
    }
}

fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let disc = b * b - 4.0 * a * c;
    let coefficients = [a, b, c];
    if disc < 0.0 {
        let vertex = -b / (2.0 * a);
        let (p, _) = evaluate(&coefficients, vertex);
        return if p.abs() <= CRITICAL_ZERO * magnitude(&coefficients, vertex) {
            vec![vertex]
        } else {
            Vec::new()
        };
    }
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    let q = if q == 0.0 { -0.5 * disc.sqrt() } else { q };
    let mut roots = vec![q / a];
    if q != 0.0 {
        roots.push(c / q);
    }
    roots
        .into_iter()
        .map(|r| polish(&coefficients, r))
        .collect()
}

fn isolated_roots(coefficients: &[f64]) -> Vec<f64> {
    let lead = coefficients[0];
    let bound = 1.0
        + coefficients[1..]
            .iter()
            .fold(0.0_f64, |m, c| m.max((c / lead).abs()));

    let mut critical = real_roots(&derivative(coefficients));
    critical.retain(|c| c.abs() < bound);
    critical.sort_by(f64::total_cmp);

    let is_zero = |x: f64| {
        let (p, _) = evaluate(coefficients, x);
        p.abs() <= CRITICAL_ZERO * magnitude(coefficients, x)
    };

    let mut roots: Vec<f64> = critical.iter().copied().filter(|&c| is_zero(c)).collect();

    let mut knots = Vec::with_capacity(critical.len() + 2);
    knots.push(-bound);
    knots.extend(critical);
    knots.push(bound);

    for pair in knots.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if is_zero(lo) || is_zero(hi) {
            continue;
        }
        let (plo, _) = evaluate(coefficients, lo);
        let (phi, _) = evaluate(coefficients, hi);
        if plo * phi < 0.0 {
            roots.push(bracketed_newton(coefficients, lo, hi, plo));
        }
    }
    roots
}

/// Newton iteration kept inside `[lo, hi]`, bisecting when a step escapes.
fn bracketed_newton(coefficients: &[f64], mut lo: f64, mut hi: f64, plo: f64) -> f64 {
    let lo_negative = plo < 0.0;
    let mut x = 0.5 * (lo + hi);
    for _ in 0..MAX_POLISH_ITERATIONS {
        let (p, dp) = evaluate(coefficients, x);
        if p == 0.0 {
            return x;
        }
        if (p < 0.0) == lo_negative {
            lo = x;
        } else {
            hi = x;
        }
        let newton = x - p / dp;
        let next = if dp != 0.0 && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
        if (next - x).abs() <= f64::EPSILON * x.abs().max(1e-300) || hi - lo <= f64::EPSILON * x.abs() {
            return next;
        }
        x = next;
    }
    x
}

/// A few Newton steps, kept only while the residual decreases.
fn polish(coefficients: &[f64], mut x: f64) -> f64 {
    let (mut p, mut dp) = evaluate(coefficients, x);
    for _ in 0..4 {
        if p == 0.0 || dp == 0.0 {
            break;
        }
        let next = x - p / dp;
        let (pn, dpn) = evaluate(coefficients, next);
        if pn.abs() >= p.abs() {
            break;
        }
        (x, p, dp) = (next, pn, dpn);
    }
    x
}

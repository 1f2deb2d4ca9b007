//! Derivative-free root search: secant steps from a guess, switching to a
//! bracketed Brent/Dekker iteration once a sign change has been seen.

use tracing::trace;

use super::{RootResult, ordered_bounds};
use crate::function::Function;
use crate::precision::INFINITE;

/// Configuration for [`FunctionRoot`].
#[derive(Debug, Clone, Copy)]
pub struct RootConfig {
    /// Accepted residual `|f(x)|`, also the location tolerance.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RootConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

/// Safeguarded single-root finder that does not need derivatives.
#[derive(Debug, Clone, Copy)]
pub struct FunctionRoot {
    config: RootConfig,
    lower: f64,
    upper: f64,
}

impl FunctionRoot {
    pub fn new(config: RootConfig) -> Self {
        Self {
            config,
            lower: -INFINITE,
            upper: INFINITE,
        }
    }

    /// Restrict the search to `[lower, upper]`. Every trial point is clamped.
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        (self.lower, self.upper) = ordered_bounds(lower, upper);
        self
    }

    fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }

    fn pinned(&self, x: f64) -> bool {
        x <= self.lower || x >= self.upper
    }

    pub fn perform<F: Function + ?Sized>(&self, f: &F, guess: f64) -> RootResult {
        let tol = self.config.tolerance;
        let mut x0 = self.clamp(guess);
        let Some(mut f0) = f.value(x0) else {
            return RootResult::failed(x0, f64::NAN, 0);
        };
        if f0.abs() <= tol {
            return RootResult::converged(x0, f0, None, 0);
        }

        let offset = (1e-3 * (1.0 + x0.abs())).max(10.0 * tol);
        let mut x1 = self.clamp(x0 + offset);
        if x1 == x0 {
            x1 = self.clamp(x0 - offset);
        }
        if x1 == x0 {
            // Degenerate interval reduced to a point that is not a root.
            return RootResult::failed(x0, f0, 0);
        }
        let Some(mut f1) = f.value(x1) else {
            return RootResult::failed(x1, f64::NAN, 0);
        };

        for iteration in 1..=self.config.max_iterations {
            if f1.abs() <= tol {
                return RootResult::converged(x1, f1, None, iteration);
            }
            if f0 * f1 < 0.0 {
                return self.bracketed(f, (x0, f0), (x1, f1), iteration);
            }

            let last_step = x1 - x0;
            let denom = f1 - f0;
            let mut step = if denom != 0.0 {
                -f1 * last_step / denom
            } else {
                last_step
            };
            if !step.is_finite() {
                step = last_step;
            }
            let max_step = 100.0 * last_step.abs().max(offset);
            step = step.clamp(-max_step, max_step);

            let x2 = self.clamp(x1 + step);
            let Some(f2) = f.value(x2) else {
                return RootResult::failed(x1, f1, iteration);
            };
            trace!(iteration, x = x2, f = f2, "secant step");

            if (x2 - x1).abs() <= tol {
                if f2.abs() <= tol || (!self.pinned(x2) && f2.abs() <= f1.abs()) {
                    return RootResult::converged(x2, f2, None, iteration);
                }
                return RootResult::failed(x2, f2, iteration);
            }

            (x0, f0) = (x1, f1);
            (x1, f1) = (x2, f2);
        }

        RootResult::failed(x1, f1, self.config.max_iterations)
    }

    /// Solve on `[lower, upper]` when `f` is known to change sign there.
    /// Returns not done when the end values share a sign.
    pub fn solve_bracketed<F: Function + ?Sized>(&self, f: &F, lower: f64, upper: f64) -> RootResult {
        let (lower, upper) = ordered_bounds(lower, upper);
        let (Some(fl), Some(fu)) = (f.value(lower), f.value(upper)) else {
            return RootResult::failed(lower, f64::NAN, 0);
        };
        let tol = self.config.tolerance;
        if fl.abs() <= tol {
            return RootResult::converged(lower, fl, None, 0);
        }
        if fu.abs() <= tol {
            return RootResult::converged(upper, fu, None, 0);
        }
        if fl * fu > 0.0 {
            return RootResult::failed(lower, fl, 0);
        }
        self.with_bounds(lower, upper)
            .bracketed(f, (lower, fl), (upper, fu), 1)
    }

    /// Brent/Dekker iteration on a sign-changing bracket.
    fn bracketed<F: Function + ?Sized>(
        &self,
        f: &F,
        (xa, fa): (f64, f64),
        (xb, fb): (f64, f64),
        first_iteration: usize,
    ) -> RootResult {
        let tol = self.config.tolerance;
        let (mut a, mut fa, mut b, mut fb) = (xa, fa, xb, fb);
        let (mut c, mut fc) = (b, fb);
        let mut d = b - a;
        let mut e = d;

        for iteration in first_iteration..=self.config.max_iterations {
            if fb * fc > 0.0 {
                c = a;
                fc = fa;
                d = b - a;
                e = d;
            }
            if fc.abs() < fb.abs() {
                a = b;
                b = c;
                c = a;
                fa = fb;
                fb = fc;
                fc = fa;
            }
            let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tol;
            let xm = 0.5 * (c - b);
            if fb.abs() <= tol || xm.abs() <= tol1 {
                return RootResult::converged(b, fb, None, iteration);
            }

            if e.abs() >= tol1 && fa.abs() > fb.abs() {
                let s = fb / fa;
                let (mut p, mut q);
                if a == c {
                    p = 2.0 * xm * s;
                    q = 1.0 - s;
                } else {
                    let qa = fa / fc;
                    let r = fb / fc;
                    p = s * (2.0 * xm * qa * (qa - r) - (b - a) * (r - 1.0));
                    q = (qa - 1.0) * (r - 1.0) * (s - 1.0);
                }
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * xm * q - (tol1 * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = xm;
                    e = d;
                }
            } else {
                d = xm;
                e = d;
            }

            a = b;
            fa = fb;
            b += if d.abs() > tol1 { d } else { tol1.copysign(xm) };
            b = self.clamp(b);
            match f.value(b) {
                Some(v) => fb = v,
                None => return RootResult::failed(a, fa, iteration),
            }
        }

        RootResult::failed(b, fb, self.config.max_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver() -> FunctionRoot {
        FunctionRoot::new(RootConfig {
            tolerance: 1e-9,
            max_iterations: 100,
        })
        .with_bounds(-10.0, 10.0)
    }

    #[test]
    fn test_square_root_of_four_from_several_guesses() {
        let f = |x: f64| x * x - 4.0;
        for (guess, expected) in [(3.0, 2.0), (2.1, 2.0), (-3.0, -2.0)] {
            let r = solver().perform(&f, guess);
            assert!(r.is_done(), "guess {guess} did not converge");
            let root = r.root().unwrap();
            assert!((root - expected).abs() < 1e-6, "guess {guess} -> {root}");
        }
    }

    #[test]
    fn test_guess_already_a_root() {
        let f = |x: f64| x - 1.5;
        let r = solver().perform(&f, 1.5);
        assert!(r.is_done());
        assert_eq!(r.nb_iterations(), 0);
    }

    #[test]
    fn test_guess_outside_bounds_is_clamped() {
        let f = |x: f64| x.powi(3) - 8.0;
        let r = FunctionRoot::new(RootConfig::default())
            .with_bounds(0.0, 5.0)
            .perform(&f, 50.0);
        assert!(r.is_done());
        assert!((r.root().unwrap() - 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_bounds_excluding_root_terminate_not_done() {
        let f = |x: f64| x - 20.0;
        let config = RootConfig {
            tolerance: 1e-10,
            max_iterations: 30,
        };
        let r = FunctionRoot::new(config).with_bounds(0.0, 5.0).perform(&f, 1.0);
        assert!(!r.is_done());
        assert!(r.nb_iterations() <= 30);
    }

    #[test]
    fn test_no_root_exhausts_budget() {
        let f = |x: f64| x * x + 1.0;
        let config = RootConfig {
            tolerance: 1e-12,
            max_iterations: 25,
        };
        let r = FunctionRoot::new(config).with_bounds(-3.0, 3.0).perform(&f, 0.7);
        assert!(!r.is_done());
    }

    #[test]
    fn test_solve_bracketed_rejects_same_sign_ends() {
        let f = |x: f64| x * x - 4.0;
        let root = FunctionRoot::new(RootConfig::default());
        assert!(!root.solve_bracketed(&f, 3.0, 5.0).is_done());
        let r = root.solve_bracketed(&f, 5.0, 0.0);
        assert!((r.root().unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_transcendental_root() {
        let f = |x: f64| x.cos() - x;
        let r = FunctionRoot::new(RootConfig::default()).perform(&f, 0.0);
        assert!(r.is_done());
        assert!((r.root().unwrap() - 0.739_085_133_215_160_7).abs() < 1e-9);
    }
}

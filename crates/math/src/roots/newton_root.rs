//! Newton iteration safeguarded by bracket tracking and bisection.

use tracing::trace;

use super::{RootResult, ordered_bounds};
use crate::function::FunctionWithDerivative;
use crate::precision::INFINITE;

/// Configuration for [`NewtonFunctionRoot`].
#[derive(Debug, Clone, Copy)]
pub struct NewtonRootConfig {
    /// Step size below which the iteration has converged.
    pub eps_x: f64,
    /// Residual below which the iteration has converged.
    pub eps_f: f64,
    pub max_iterations: usize,
}

impl Default for NewtonRootConfig {
    fn default() -> Self {
        Self {
            eps_x: 1e-10,
            eps_f: 1e-10,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NewtonFunctionRoot {
    config: NewtonRootConfig,
    lower: f64,
    upper: f64,
}

/// Points seen so far with a negative and a positive value.
#[derive(Debug, Default, Clone, Copy)]
struct Bracket {
    negative: Option<f64>,
    positive: Option<f64>,
}

impl Bracket {
    fn record(&mut self, x: f64, fx: f64) {
        if fx < 0.0 {
            self.negative = Some(x);
        } else if fx > 0.0 {
            self.positive = Some(x);
        }
    }

    fn interval(&self) -> Option<(f64, f64)> {
        let (n, p) = (self.negative?, self.positive?);
        Some(ordered_bounds(n, p))
    }
}

impl NewtonFunctionRoot {
    pub fn new(config: NewtonRootConfig) -> Self {
        Self {
            config,
            lower: -INFINITE,
            upper: INFINITE,
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        (self.lower, self.upper) = ordered_bounds(lower, upper);
        self
    }

    fn clamp(&self, x: f64) -> f64 {
        x.clamp(self.lower, self.upper)
    }

    pub fn perform<F: FunctionWithDerivative + ?Sized>(&self, f: &F, guess: f64) -> RootResult {
        let NewtonRootConfig {
            eps_x,
            eps_f,
            max_iterations,
        } = self.config;

        let mut x = self.clamp(guess);
        let Some((mut fx, mut dfx)) = f.values(x) else {
            return RootResult::failed(x, f64::NAN, 0);
        };
        if fx.abs() <= eps_f {
            return RootResult::converged(x, fx, Some(dfx), 0);
        }

        let mut bracket = Bracket::default();
        bracket.record(x, fx);

        for iteration in 1..=max_iterations {
            let newton = (dfx.abs() > f64::EPSILON * fx.abs().max(1.0))
                .then(|| x - fx / dfx)
                .filter(|c| c.is_finite());
            let inside = |c: f64| match bracket.interval() {
                Some((a, b)) => c > a && c < b,
                None => true,
            };

            let (candidate, is_newton) = match newton {
                Some(c) if inside(c) => (self.clamp(c), true),
                _ => match bracket.interval() {
                    Some((a, b)) => (0.5 * (a + b), false),
                    None => match self.side_step(f, x) {
                        Some(c) => (c, false),
                        None => return RootResult::failed(x, fx, iteration),
                    },
                },
            };

            if candidate == x {
                // Clamped onto the point we already hold; nothing can improve.
                return RootResult::failed(x, fx, iteration);
            }

            let step = candidate - x;
            x = candidate;
            (fx, dfx) = match f.values(x) {
                Some(v) => v,
                None => return RootResult::failed(x, f64::NAN, iteration),
            };
            bracket.record(x, fx);
            trace!(iteration, x, f = fx, newton = is_newton, "newton step");

            if fx.abs() <= eps_f || (is_newton && step.abs() <= eps_x) {
                return RootResult::converged(x, fx, Some(dfx), iteration);
            }
            if bracket.interval().is_some_and(|(a, b)| b - a <= eps_x) {
                return RootResult::converged(x, fx, Some(dfx), iteration);
            }
        }

        RootResult::failed(x, fx, max_iterations)
    }

    /// Step of `0.1 (1 + |x|)` towards whichever side lowers `|f|`.
    fn side_step<F: FunctionWithDerivative + ?Sized>(&self, f: &F, x: f64) -> Option<f64> {
        let h = 0.1 * (1.0 + x.abs());
        let right = self.clamp(x + h);
        let left = self.clamp(x - h);
        let score = |p: f64| {
            if p == x {
                f64::INFINITY
            } else {
                f.value(p).map_or(f64::INFINITY, f64::abs)
            }
        };
        let (sr, sl) = (score(right), score(left));
        match (sr.is_finite(), sl.is_finite()) {
            (false, false) => None,
            _ if sr <= sl => Some(right),
            _ => Some(left),
        }
    }
}

//! Every root of `f(x) = k` on a closed interval, found by sampling and
//! refining each sign change.

use tracing::debug;

use super::function_root::{FunctionRoot, RootConfig};
use crate::error::{MathError, MathResult};
use crate::function::{Function, FunctionWithDerivative};

/// Configuration for [`FunctionRoots`].
#[derive(Debug, Clone, Copy)]
pub struct FunctionRootsConfig {
    /// Requested sample count; at least 20 samples are always taken.
    pub nb_sample: usize,
    pub eps_x: f64,
    /// Residual accepted for endpoint and tangential roots.
    pub eps_f: f64,
    /// Below this on every sample the function is considered null.
    pub eps_null: f64,
    /// Level `k` in `f(x) = k`.
    pub level: f64,
}

impl Default for FunctionRootsConfig {
    fn default() -> Self {
        Self {
            nb_sample: 10,
            eps_x: 1e-10,
            eps_f: 1e-10,
            eps_null: 1e-10,
            level: 0.0,
        }
    }
}

/// Result of an all-roots scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionRoots {
    done: bool,
    all_null: bool,
    roots: Vec<f64>,
}

struct Shifted<'a, F: ?Sized> {
    f: &'a F,
    level: f64,
}

impl<F: Function + ?Sized> Function for Shifted<'_, F> {
    fn value(&self, x: f64) -> Option<f64> {
        Some(self.f.value(x)? - self.level)
    }
}

struct DerivativeOf<'a, F: ?Sized>(&'a F);

impl<F: FunctionWithDerivative + ?Sized> Function for DerivativeOf<'_, F> {
    fn value(&self, x: f64) -> Option<f64> {
        self.0.derivative(x)
    }
}

impl FunctionRoots {
    pub fn new<F: FunctionWithDerivative + ?Sized>(
        f: &F,
        a: f64,
        b: f64,
        config: FunctionRootsConfig,
    ) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let g = Shifted { f, level: config.level };
        let n = (2 * config.nb_sample).max(20);
        let h = (b - a) / n as f64;

        let mut xs = Vec::with_capacity(n + 1);
        let mut gs = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let x = if i == n { b } else { a + i as f64 * h };
            match g.value(x) {
                Some(v) => {
                    xs.push(x);
                    gs.push(v);
                }
                None => return Self::default(),
            }
        }

        if gs.iter().all(|v| v.abs() <= config.eps_null) {
            return Self {
                done: true,
                all_null: true,
                roots: Vec::new(),
            };
        }

        let solver = FunctionRoot::new(RootConfig {
            tolerance: config.eps_x.min(config.eps_f),
            max_iterations: 100,
        });
        let mut roots = Vec::new();

        for i in 0..=n {
            let gi = gs[i];
            let at_end = i == 0 || i == n;
            if gi == 0.0 || (at_end && gi.abs() <= config.eps_f) {
                roots.push(xs[i]);
            }
            if i < n && gi * gs[i + 1] < 0.0 {
                let r = solver.solve_bracketed(&g, xs[i], xs[i + 1]);
                if let Ok(x) = r.root() {
                    roots.push(x);
                }
            }
            // Tangential contact: |g| dips without a sign change.
            if !at_end
                && gi != 0.0
                && gi.abs() < gs[i - 1].abs()
                && gi.abs() < gs[i + 1].abs()
                && gi * gs[i - 1] > 0.0
                && gi * gs[i + 1] > 0.0
            {
                let df = DerivativeOf(f);
                let r = solver.solve_bracketed(&df, xs[i - 1], xs[i + 1]);
                if let Ok(x) = r.root() {
                    if g.value(x).is_some_and(|v| v.abs() <= config.eps_f) {
                        roots.push(x);
                    }
                }
            }
        }

        roots.sort_by(f64::total_cmp);
        let merge = config.eps_x.max(1e-10 * (a.abs() + b.abs()));
        roots.dedup_by(|next, kept| (*next - *kept).abs() <= merge);
        debug!(nb_roots = roots.len(), samples = n + 1, "function roots scan");

        Self {
            done: true,
            all_null: false,
            roots,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// True when the function is null on the whole interval.
    pub fn all_null(&self) -> bool {
        self.all_null
    }

    pub fn nb_solutions(&self) -> MathResult<usize> {
        if !self.done {
            return Err(MathError::NotDone);
        }
        if self.all_null {
            return Err(MathError::InfiniteSolutions);
        }
        Ok(self.roots.len())
    }

    /// Root `index` (0-based), roots sorted ascending.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Differentiable;

    #[test]
    fn test_all_sine_roots_on_interval() {
        let f = Differentiable::new(f64::sin, f64::cos);
        let r = FunctionRoots::new(&f, -0.5, 10.0, FunctionRootsConfig::default());
        assert!(r.is_done());
        assert_eq!(r.nb_solutions().unwrap(), 4);
        let pi = std::f64::consts::PI;
        for (i, expected) in [0.0, pi, 2.0 * pi, 3.0 * pi].into_iter().enumerate() {
            assert!((r.value(i).unwrap() - expected).abs() < 1e-8);
        }
    }

    #[test]
    fn test_tangential_root_found() {
        // (x - 1)^2 touches zero without changing sign.
        let f = Differentiable::new(|x: f64| (x - 1.0).powi(2), |x: f64| 2.0 * (x - 1.0));
        let config = FunctionRootsConfig {
            eps_f: 1e-8,
            ..Default::default()
        };
        let r = FunctionRoots::new(&f, 0.03, 2.1, config);
        assert_eq!(r.nb_solutions().unwrap(), 1);
        assert!((r.value(0).unwrap() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_level_shift() {
        let f = Differentiable::new(|x: f64| x * x, |x: f64| 2.0 * x);
        let config = FunctionRootsConfig {
            level: 4.0,
            ..Default::default()
        };
        let r = FunctionRoots::new(&f, -3.0, 3.0, config);
        assert_eq!(r.roots().len(), 2);
        assert!((r.value(0).unwrap() + 2.0).abs() < 1e-9);
        assert!((r.value(1).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_null_function_reports_all_null() {
        let f = Differentiable::new(|_x: f64| 0.0, |_x: f64| 0.0);
        let r = FunctionRoots::new(&f, 0.0, 1.0, FunctionRootsConfig::default());
        assert!(r.is_done());
        assert!(r.all_null());
        assert_eq!(r.nb_solutions(), Err(MathError::InfiniteSolutions));
    }

    #[test]
    fn test_out_of_range_index() {
        let f = Differentiable::new(|x: f64| x - 0.25, |_x: f64| 1.0);
        let r = FunctionRoots::new(&f, 0.0, 1.0, FunctionRootsConfig::default());
        assert_eq!(
            r.value(3),
            Err(MathError::IndexOutOfRange { index: 3, len: 1 })
        );
    }
}

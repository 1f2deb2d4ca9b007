//! Polak–Ribière nonlinear conjugate gradient with a Brent line search.

use nalgebra::DVector;
use tracing::{debug, trace};

use super::brent::{bracket_minimum, brent_minimize};
use crate::error::{MathError, MathResult};
use crate::function::MultipleVarFunctionWithGradient;

const LINE_TOLERANCE: f64 = 1e-8;
const LINE_MAX_ITERATIONS: usize = 200;
const BRACKET_MAX_STEPS: usize = 60;

/// Configuration for [`Frpr`].
#[derive(Debug, Clone, Copy)]
pub struct FrprConfig {
    /// Fractional tolerance on the function value between iterations.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Guards the relative test when the minimum value is zero; also the
    /// gradient norm treated as stationary.
    pub zeps: f64,
}

impl Default for FrprConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 200,
            zeps: 1e-12,
        }
    }
}

/// Result of a conjugate-gradient minimisation.
#[derive(Debug, Clone, PartialEq)]
pub struct FrprResult {
    done: bool,
    location: DVector<f64>,
    minimum: f64,
    gradient: DVector<f64>,
    iterations: usize,
    values: Vec<f64>,
}

impl FrprResult {
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn location(&self) -> MathResult<&DVector<f64>> {
        self.check_done()?;
        Ok(&self.location)
    }

    pub fn minimum(&self) -> MathResult<f64> {
        self.check_done()?;
        Ok(self.minimum)
    }

    pub fn gradient(&self) -> MathResult<&DVector<f64>> {
        self.check_done()?;
        Ok(&self.gradient)
    }

    pub fn nb_iterations(&self) -> usize {
        self.iterations
    }

    /// Objective at the start point and after every accepted step.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn check_done(&self) -> MathResult<()> {
        if self.done { Ok(()) } else { Err(MathError::NotDone) }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Frpr {
    config: FrprConfig,
}

impl Frpr {
    pub fn new(config: FrprConfig) -> Self {
        Self { config }
    }

    /// Minimise `f` from `start`. Only a start vector of the wrong length is
    /// an error; non-convergence is reported by `is_done() == false`.
    pub fn perform<F>(&self, f: &F, start: &DVector<f64>) -> MathResult<FrprResult>
    where
        F: MultipleVarFunctionWithGradient + ?Sized,
    {
        if start.len() != f.nb_variables() {
            return Err(MathError::DimensionMismatch {
                expected: f.nb_variables(),
                found: start.len(),
            });
        }
        let FrprConfig {
            tolerance,
            max_iterations,
            zeps,
        } = self.config;

        let mut p = start.clone();
        let failed = |p: DVector<f64>, fp: f64, iterations: usize, values: Vec<f64>| FrprResult {
            done: false,
            gradient: DVector::zeros(p.len()),
            location: p,
            minimum: fp,
            iterations,
            values,
        };
        let Some((mut fp, mut g)) = f.values(&p) else {
            return Ok(failed(p, f64::NAN, 0, Vec::new()));
        };
        let mut values = vec![fp];
        if g.norm() <= zeps {
            return Ok(FrprResult {
                done: true,
                location: p,
                minimum: fp,
                gradient: g,
                iterations: 0,
                values,
            });
        }
        let mut direction = -&g;

        for iteration in 1..=max_iterations {
            let step = 1.0 / direction.norm().max(1.0);
            let mut along = |alpha: f64| f.value(&(&p + &direction * alpha));
            let line = bracket_minimum(&mut along, 0.0, step, BRACKET_MAX_STEPS)
                .and_then(|bracket| brent_minimize(&mut along, bracket, LINE_TOLERANCE, LINE_MAX_ITERATIONS));
            let Some(line) = line else {
                debug!(iteration, "line search failed");
                return Ok(failed(p, fp, iteration, values));
            };

            p += &direction * line.x;
            let f_new = line.fx;
            trace!(iteration, value = f_new, alpha = line.x, "frpr step");

            let Some((fv, g_new)) = f.values(&p) else {
                return Ok(failed(p, f_new, iteration, values));
            };
            let converged = 2.0 * (f_new - fp).abs() <= tolerance * (f_new.abs() + fp.abs() + zeps);
            fp = fv;
            values.push(fp);
            if converged || g_new.norm() <= zeps {
                return Ok(FrprResult {
                    done: true,
                    location: p,
                    minimum: fp,
                    gradient: g_new,
                    iterations: iteration,
                    values,
                });
            }

            let gg = g.norm_squared();
            let beta = if gg == 0.0 {
                0.0
            } else {
                (g_new.dot(&(&g_new - &g)) / gg).max(0.0)
            };
            direction = -&g_new + &direction * beta;
            if direction.dot(&g_new) >= 0.0 {
                direction = -&g_new;
            }
            g = g_new;
        }

        Ok(failed(p, fp, max_iterations, values))
    }
}

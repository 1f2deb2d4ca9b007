//! Newton–Raphson for four equations in four unknowns.
//!
//! Everything lives on the stack: the Jacobian is solved by partial-pivot
//! elimination on a 4×5 augmented matrix, without any general `N×N`
//! machinery. A singular pivot switches the step to steepest descent on
//! `½‖F‖²`.

use nalgebra::{Matrix4, SMatrix, Vector4};
use tracing::{trace, warn};

use crate::error::{MathError, MathResult};
use crate::function::FunctionSet4;
use crate::precision::INFINITE;
use crate::status::Status;

/// Pivots below this magnitude make the Jacobian singular.
pub const SINGULAR_PIVOT: f64 = 1e-30;
/// Largest step as a fraction of the narrowest domain width.
const MAX_STEP_FRACTION: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct Newton4dConfig {
    /// Tolerance on `‖F‖`.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for Newton4dConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Newton4dResult {
    status: Status,
    solution: Vector4<f64>,
    square_residual: f64,
    iterations: usize,
}

impl Newton4dResult {
    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status.is_ok()
    }

    /// Last iterate. Available for every status so callers can inspect a
    /// failed run; check [`Self::status`] first.
    pub fn solution(&self) -> Vector4<f64> {
        self.solution
    }

    pub fn square_residual(&self) -> f64 {
        self.square_residual
    }

    pub fn nb_iterations(&self) -> usize {
        self.iterations
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Newton4d {
    config: Newton4dConfig,
    lower: Vector4<f64>,
    upper: Vector4<f64>,
}

impl Newton4d {
    pub fn new(config: Newton4dConfig) -> Self {
        Self {
            config,
            lower: Vector4::repeat(-INFINITE),
            upper: Vector4::repeat(INFINITE),
        }
    }

    pub fn with_bounds(mut self, lower: Vector4<f64>, upper: Vector4<f64>) -> MathResult<Self> {
        for i in 0..4 {
            if !(lower[i] <= upper[i]) {
                return Err(MathError::InvalidBounds {
                    lower: lower[i],
                    upper: upper[i],
                });
            }
        }
        self.lower = lower;
        self.upper = upper;
        Ok(self)
    }

    fn clamp(&self, x: &Vector4<f64>) -> Vector4<f64> {
        Vector4::from_fn(|i, _| x[i].clamp(self.lower[i], self.upper[i]))
    }

    pub fn perform<F: FunctionSet4 + ?Sized>(&self, f: &F, start: &Vector4<f64>) -> Newton4dResult {
        let Newton4dConfig {
            tolerance,
            max_iterations,
        } = self.config;
        let square_tolerance = tolerance * tolerance;
        let max_step = MAX_STEP_FRACTION * (self.upper - self.lower).min();

        let mut x = self.clamp(start);
        let mut descended = false;

        for iteration in 0..max_iterations {
            let Some((fx, jac)) = f.values(&x) else {
                return self.result(Status::NumericalError, x, f64::NAN, iteration);
            };
            let square_norm = fx.norm_squared();
            if square_norm < square_tolerance {
                return self.result(Status::Ok, x, square_norm, iteration);
            }

            let mut step = match solve_pivoted(&jac, &(-fx)) {
                Some(delta) => delta,
                None => {
                    // Singular: steepest descent scaled by ‖F‖/‖J‖.
                    let jtf = jac.transpose() * fx;
                    let jtf_norm = jtf.norm();
                    let jac_norm = jac.norm();
                    if jtf_norm <= SINGULAR_PIVOT || jac_norm <= SINGULAR_PIVOT {
                        return self.result(Status::Singular, x, square_norm, iteration);
                    }
                    if !descended {
                        warn!(iteration, "singular jacobian, falling back to steepest descent");
                        descended = true;
                    }
                    -jtf * (square_norm.sqrt() / jac_norm / jtf_norm)
                }
            };

            let step_norm = step.norm();
            if step_norm > max_step {
                step *= max_step / step_norm;
            }
            x = self.clamp(&(x + step));
            trace!(iteration, residual = square_norm, "newton4d step");
        }

        match f.values(&x) {
            Some((fx, _)) => {
                let square_norm = fx.norm_squared();
                let status = if square_norm < square_tolerance {
                    Status::Ok
                } else {
                    Status::MaxIterationsReached
                };
                self.result(status, x, square_norm, max_iterations)
            }
            None => self.result(Status::NumericalError, x, f64::NAN, max_iterations),
        }
    }

    fn result(&self, status: Status, solution: Vector4<f64>, square_residual: f64, iterations: usize) -> Newton4dResult {
        Newton4dResult {
            status,
            solution,
            square_residual,
            iterations,
        }
    }
}

/// Solve `a·x = b` by Gaussian elimination with partial pivoting on the
/// augmented 4×5 matrix. `None` when a pivot falls below [`SINGULAR_PIVOT`].
pub fn solve_pivoted(a: &Matrix4<f64>, b: &Vector4<f64>) -> Option<Vector4<f64>> {
    let mut m = SMatrix::<f64, 4, 5>::zeros();
    m.fixed_view_mut::<4, 4>(0, 0).copy_from(a);
    m.set_column(4, b);

    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&i, &j| m[(i, col)].abs().total_cmp(&m[(j, col)].abs()))?;
        if m[(pivot_row, col)].abs() < SINGULAR_PIVOT {
            return None;
        }
        m.swap_rows(col, pivot_row);
        let pivot = m[(col, col)];
        for row in col + 1..4 {
            let factor = m[(row, col)] / pivot;
            if factor != 0.0 {
                for k in col..5 {
                    m[(row, k)] -= factor * m[(col, k)];
                }
            }
        }
    }

    let mut x = Vector4::zeros();
    for row in (0..4).rev() {
        let mut sum = m[(row, 4)];
        for k in row + 1..4 {
            sum -= m[(row, k)] * x[k];
        }
        x[row] = sum / m[(row, row)];
    }
    Some(x)
}

//! One-dimensional root finding.

pub mod function_root;
pub mod function_roots;
pub mod newton_root;
pub mod polynomial;
pub mod trigonometric;

pub use function_root::{FunctionRoot, RootConfig};
pub use function_roots::{FunctionRoots, FunctionRootsConfig};
pub use newton_root::{NewtonFunctionRoot, NewtonRootConfig};
pub use polynomial::PolynomialRoots;
pub use trigonometric::{TrigCoefficients, TrigonometricRoots};

use crate::error::{MathError, MathResult};

/// Result of a single-root search.
///
/// `root` and `value` are meaningful only when the search is done; the
/// accessors enforce this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootResult {
    done: bool,
    root: f64,
    value: f64,
    derivative: Option<f64>,
    iterations: usize,
}

impl RootResult {
    pub(crate) fn converged(root: f64, value: f64, derivative: Option<f64>, iterations: usize) -> Self {
        Self {
            done: true,
            root,
            value,
            derivative,
            iterations,
        }
    }

    pub(crate) fn failed(last: f64, value: f64, iterations: usize) -> Self {
        Self {
            done: false,
            root: last,
            value,
            derivative: None,
            iterations,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn root(&self) -> MathResult<f64> {
        self.check_done()?;
        Ok(self.root)
    }

    /// Function value at the root.
    pub fn value(&self) -> MathResult<f64> {
        self.check_done()?;
        Ok(self.value)
    }

    /// Derivative at the root, when the solver evaluated one.
    pub fn derivative(&self) -> MathResult<Option<f64>> {
        self.check_done()?;
        Ok(self.derivative)
    }

    pub fn nb_iterations(&self) -> usize {
        self.iterations
    }

    fn check_done(&self) -> MathResult<()> {
        if self.done { Ok(()) } else { Err(MathError::NotDone) }
    }
}

/// Normalised `[lower, upper]` pair; reversed input is reordered.
pub(crate) fn ordered_bounds(lower: f64, upper: f64) -> (f64, f64) {
    if lower <= upper { (lower, upper) } else { (upper, lower) }
}

use thiserror::Error;

/// Misuse of a solver or of its result.
///
/// Ordinary non-convergence is never reported through this type; it shows up
/// as `is_done() == false` or as a [`crate::Status`] on the result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MathError {
    #[error("result queried but the computation is not done")]
    NotDone,
    #[error("index {index} out of range (number of values: {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid bounds: lower {lower} is greater than upper {upper}")]
    InvalidBounds { lower: f64, upper: f64 },
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("equation has infinitely many solutions")]
    InfiniteSolutions,
}

pub type MathResult<T> = Result<T, MathError>;

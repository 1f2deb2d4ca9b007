use serde::{Deserialize, Serialize};

/// Outcome of a solver run or of an extrema query.
///
/// `InfiniteSolutions` and `Singular` are legitimate results for valid input
/// (parallel planes, concentric spheres, flat Jacobians) and must be handled
/// by callers like any other status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    Ok,
    #[default]
    NoSolution,
    InfiniteSolutions,
    Singular,
    NumericalError,
    MaxIterationsReached,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }

    pub fn is_infinite(self) -> bool {
        self == Status::InfiniteSolutions
    }
}

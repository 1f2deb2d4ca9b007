//! Numerical building blocks for the geometry kernel: scalar and
//! trigonometric root finders, polynomial roots, local and global
//! minimisers, and a 4×4 Newton solver.

pub mod error;
pub mod function;
pub mod newton4d;
pub mod optimize;
pub mod precision;
pub mod roots;
pub mod status;

pub use error::{MathError, MathResult};
pub use function::{
    Differentiable, Function, FunctionSet4, FunctionWithDerivative, MultiVarFn, MultiVarGradFn,
    MultipleVarFunction, MultipleVarFunctionWithGradient,
};
pub use newton4d::{Newton4d, Newton4dConfig, Newton4dResult};
pub use optimize::{BullardGenerator, Frpr, FrprConfig, FrprResult, Pso, PsoConfig, PsoResult};
pub use roots::{
    FunctionRoot, FunctionRoots, FunctionRootsConfig, NewtonFunctionRoot, NewtonRootConfig,
    PolynomialRoots, RootConfig, RootResult, TrigCoefficients, TrigonometricRoots,
};
pub use status::Status;

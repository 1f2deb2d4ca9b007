//! Minimisation of scalar functions.

pub mod brent;
pub mod frpr;
pub mod pso;
pub mod rng;

pub use frpr::{Frpr, FrprConfig, FrprResult};
pub use pso::{Pso, PsoConfig, PsoResult};
pub use rng::BullardGenerator;

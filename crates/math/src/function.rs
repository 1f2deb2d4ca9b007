//! Function abstractions consumed by the solvers.
//!
//! Evaluations return `Option` so a function can refuse a point (outside its
//! natural domain, NaN, ...). Solvers map a refused evaluation to
//! `done == false` or [`crate::Status::NumericalError`].

use nalgebra::{DVector, Matrix4, Vector4};

/// A real function of one real variable.
pub trait Function {
    fn value(&self, x: f64) -> Option<f64>;
}

impl<F> Function for F
where
    F: Fn(f64) -> f64,
{
    fn value(&self, x: f64) -> Option<f64> {
        let y = self(x);
        y.is_finite().then_some(y)
    }
}

/// A real function of one real variable with its first derivative.
pub trait FunctionWithDerivative: Function {
    fn derivative(&self, x: f64) -> Option<f64>;

    /// Value and derivative in one call.
    fn values(&self, x: f64) -> Option<(f64, f64)> {
        Some((self.value(x)?, self.derivative(x)?))
    }
}

/// Pairs a function closure with its derivative closure.
#[derive(Debug, Clone, Copy)]
pub struct Differentiable<F, D> {
    pub f: F,
    pub df: D,
}

impl<F, D> Differentiable<F, D>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    pub fn new(f: F, df: D) -> Self {
        Self { f, df }
    }
}

impl<F, D> Function for Differentiable<F, D>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    fn value(&self, x: f64) -> Option<f64> {
        let y = (self.f)(x);
        y.is_finite().then_some(y)
    }
}

impl<F, D> FunctionWithDerivative for Differentiable<F, D>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    fn derivative(&self, x: f64) -> Option<f64> {
        let d = (self.df)(x);
        d.is_finite().then_some(d)
    }
}

/// A scalar function of N variables.
pub trait MultipleVarFunction {
    fn nb_variables(&self) -> usize;
    fn value(&self, x: &DVector<f64>) -> Option<f64>;
}

/// A scalar function of N variables with its gradient.
pub trait MultipleVarFunctionWithGradient: MultipleVarFunction {
    fn gradient(&self, x: &DVector<f64>) -> Option<DVector<f64>>;

    fn values(&self, x: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
        Some((self.value(x)?, self.gradient(x)?))
    }
}

/// Closure adapter for [`MultipleVarFunction`].
#[derive(Debug, Clone, Copy)]
pub struct MultiVarFn<F> {
    nb_variables: usize,
    f: F,
}

impl<F> MultiVarFn<F>
where
    F: Fn(&DVector<f64>) -> f64,
{
    pub fn new(nb_variables: usize, f: F) -> Self {
        Self { nb_variables, f }
    }
}

impl<F> MultipleVarFunction for MultiVarFn<F>
where
    F: Fn(&DVector<f64>) -> f64,
{
    fn nb_variables(&self) -> usize {
        self.nb_variables
    }

    fn value(&self, x: &DVector<f64>) -> Option<f64> {
        let y = (self.f)(x);
        y.is_finite().then_some(y)
    }
}

/// Closure adapter for [`MultipleVarFunctionWithGradient`].
#[derive(Debug, Clone, Copy)]
pub struct MultiVarGradFn<F, G> {
    nb_variables: usize,
    f: F,
    g: G,
}

impl<F, G> MultiVarGradFn<F, G>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    pub fn new(nb_variables: usize, f: F, g: G) -> Self {
        Self { nb_variables, f, g }
    }
}

impl<F, G> MultipleVarFunction for MultiVarGradFn<F, G>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    fn nb_variables(&self) -> usize {
        self.nb_variables
    }

    fn value(&self, x: &DVector<f64>) -> Option<f64> {
        let y = (self.f)(x);
        y.is_finite().then_some(y)
    }
}

impl<F, G> MultipleVarFunctionWithGradient for MultiVarGradFn<F, G>
where
    F: Fn(&DVector<f64>) -> f64,
    G: Fn(&DVector<f64>) -> DVector<f64>,
{
    fn gradient(&self, x: &DVector<f64>) -> Option<DVector<f64>> {
        let g = (self.g)(x);
        g.iter().all(|c| c.is_finite()).then_some(g)
    }
}

/// A system of four equations in four unknowns with analytic Jacobian.
pub trait FunctionSet4 {
    /// Residual vector `F(x)` and Jacobian `J(x)` (row `i` = gradient of `F_i`).
    fn values(&self, x: &Vector4<f64>) -> Option<(Vector4<f64>, Matrix4<f64>)>;
}

impl<F> FunctionSet4 for F
where
    F: Fn(&Vector4<f64>) -> (Vector4<f64>, Matrix4<f64>),
{
    fn values(&self, x: &Vector4<f64>) -> Option<(Vector4<f64>, Matrix4<f64>)> {
        let (f, j) = self(x);
        (f.iter().all(|c| c.is_finite()) && j.iter().all(|c| c.is_finite())).then_some((f, j))
    }
}

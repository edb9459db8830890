//! Adapters that expose crate objectives as `argmin` problems.
//!
//! We convert a *maximization* of a log-likelihood `ℓ(θ)` into a *minimization*
//! problem by defining the cost as `c(θ) = -ℓ(θ)`. Analytic gradients provided
//! by the user are negated accordingly and validated before they reach the
//! solver.
//!
//! [`ScalarAdapter`] covers the one-dimensional case used by root finders: the
//! wrapped closure returns the derivative of the cost, and the solver searches
//! for its zero.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        traits::LogLikelihood,
        types::{Cost, Grad, Theta},
        validation::validate_grad,
    },
};
use argmin::core::{CostFunction, Error, Gradient};

/// Bridges a user `LogLikelihood` to `argmin`'s `CostFunction` and `Gradient`.
///
/// - `CostFunction::cost` returns `-ℓ(θ)` (negative log-likelihood).
/// - `Gradient::gradient` returns `-∇ℓ(θ)` after dimension and finiteness checks.
#[derive(Debug, Clone)]
pub struct ArgMinAdapter<'a, F: LogLikelihood> {
    pub f: &'a F,
    pub data: &'a F::Data,
}

impl<'a, F: LogLikelihood> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate the cost `c(θ) = -ℓ(θ)`.
    ///
    /// # Errors
    /// - Propagates any `OptError` from the user's `value` via `?`.
    /// - Returns `NonFiniteCost` if the value is not finite.
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        let output = self.f.value(theta, self.data)?;
        if !output.is_finite() {
            return Err((OptError::NonFiniteCost { value: output }).into());
        }
        Ok(-output)
    }
}

impl<'a, F: LogLikelihood> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Evaluate the gradient of the cost at `θ`, i.e. `-∇ℓ(θ)`.
    ///
    /// # Errors
    /// - Propagates user errors from `grad`.
    /// - Returns validation errors if the gradient has wrong dimension or
    ///   non-finite entries.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        let g = self.f.grad(theta, self.data)?;
        validate_grad(&g, theta.len())?;
        Ok(-g)
    }
}

impl<'a, F: LogLikelihood> ArgMinAdapter<'a, F> {
    /// Construct a new adapter over a user `LogLikelihood` and its data.
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data }
    }
}

/// One-dimensional problem whose `cost` is the derivative of a scalar
/// objective.
///
/// Root finders such as `BrentRoot` minimize nothing; they locate a zero of
/// the function they are handed. Feeding them the derivative of a strictly
/// convex cost therefore returns its minimizer.
pub struct ScalarAdapter<D>
where
    D: Fn(f64) -> OptResult<f64>,
{
    derivative: D,
}

impl<D> ScalarAdapter<D>
where
    D: Fn(f64) -> OptResult<f64>,
{
    pub fn new(derivative: D) -> Self {
        Self { derivative }
    }

    /// Evaluate the derivative, rejecting non-finite values.
    ///
    /// # Errors
    /// - Propagates errors raised by the closure.
    /// - [`OptError::NonFiniteCost`] when the derivative is `NaN` or infinite.
    pub fn eval(&self, x: f64) -> OptResult<f64> {
        let d = (self.derivative)(x)?;
        if !d.is_finite() {
            return Err(OptError::NonFiniteCost { value: d });
        }
        Ok(d)
    }
}

impl<D> CostFunction for ScalarAdapter<D>
where
    D: Fn(f64) -> OptResult<f64>,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, Error> {
        Ok(self.eval(*x)?)
    }
}

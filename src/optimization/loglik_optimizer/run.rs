//! Execution helpers that run an `argmin` solver on a crate problem and
//! return crate-friendly outcomes ([`OptimOutcome`], [`RootOutcome`]).
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Grad, LogLikelihood, MLEOptions, OptimOutcome, Theta,
        adapter::{ArgMinAdapter, ScalarAdapter},
        traits::solver_converged,
        types::{DfpMoreThuente, Hessian, ScalarRoot},
        validation::validate_hessian,
    },
};
use argmin::core::{Executor, IterState, Solver, State};

/// Run an L-BFGS optimization for a log-likelihood problem.
///
/// Shared by both line-search variants. Wires up the user model via
/// [`ArgMinAdapter`], the initial parameter `theta0` and the optional
/// `max_iters`, then executes the solver and converts the result into
/// [`OptimOutcome`].
///
/// # Type Parameters
/// - `F`: log-likelihood type implementing [`LogLikelihood`].
/// - `S`: any `argmin` solver whose problem is `ArgMinAdapter<'a, F>` and whose
///   state is `IterState<Theta, Grad, (), (), (), f64>`.
///
/// # Errors
/// - Propagates any `argmin` runtime error (line-search failures, errors
///   raised by the objective) via `From<argmin::core::Error>`.
/// - Propagates validation errors encountered when constructing
///   [`OptimOutcome`].
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, IterState<Theta, Grad, (), (), (), f64>> + Send + 'static,
{
    let mut optimizer = Executor::new(problem, solver);
    optimizer = optimizer.configure(|state| state.param(theta0));
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    OptimOutcome::new(
        result.take_best_param(),
        -result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )
}

/// Run a DFP quasi-Newton optimization from `theta0` with a caller-supplied
/// initial inverse Hessian of the **cost**.
///
/// # Errors
/// - [`OptError::HessianDimMismatch`] / [`OptError::InvalidHessian`] when
///   `inv_hessian` does not match `theta0` or holds non-finite entries.
/// - Propagates solver and outcome validation errors as in [`run_lbfgs`].
pub fn run_dfp<'a, F>(
    theta0: Theta, inv_hessian: Hessian, opts: &MLEOptions, problem: ArgMinAdapter<'a, F>,
    solver: DfpMoreThuente,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
{
    validate_hessian(&inv_hessian, theta0.len())?;
    let mut optimizer = Executor::new(problem, solver)
        .configure(|state: IterState<Theta, Grad, (), Hessian, (), f64>| {
            state.param(theta0).inv_hessian(inv_hessian)
        });
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.take_gradient();
    OptimOutcome::new(
        result.take_best_param(),
        -result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )
}

/// Result of a scalar root search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootOutcome {
    pub root: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Locate a zero of the derivative wrapped by `problem` inside the bracket
/// that `solver` was built with.
///
/// # Errors
/// - Propagates `argmin` errors, including the bracket sign check performed
///   by `BrentRoot` on initialization.
/// - [`OptError::InvalidThetaHat`] when the reported root is not finite.
pub fn run_brent_root<D>(
    problem: ScalarAdapter<D>, solver: ScalarRoot, max_iter: Option<usize>,
) -> OptResult<RootOutcome>
where
    D: Fn(f64) -> OptResult<f64>,
{
    let mut optimizer: Executor<_, _, IterState<f64, (), (), (), (), f64>> =
        Executor::new(problem, solver);
    if let Some(max_iter) = max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }
    let mut result = optimizer.run()?.state().clone();
    let iterations = result.get_iter() as usize;
    let converged = solver_converged(result.get_termination_status());
    let root = result
        .take_best_param()
        .or_else(|| result.take_param())
        .ok_or(OptError::MissingThetaHat)?;
    if !root.is_finite() {
        return Err(OptError::InvalidThetaHat {
            index: 0,
            value: root,
            reason: "Root estimate must be finite.",
        });
    }
    Ok(RootOutcome { root, converged, iterations })
}

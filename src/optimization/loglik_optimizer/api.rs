//! High-level entry points for maximizing a user-provided `LogLikelihood`
//! and for one-dimensional root finding.
//!
//! - [`maximize`]: L-BFGS with Hager–Zhang or More–Thuente line search.
//! - [`maximize_dfp`]: DFP quasi-Newton seeded with an inverse Hessian.
//! - [`find_root`]: Brent's method on a bracketed derivative.
use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        OptimOutcome, Theta,
        adapter::{ArgMinAdapter, ScalarAdapter},
        builders::{
            build_brent_root, build_dfp, build_optimizer_hager_zhang, build_optimizer_more_thuente,
        },
        run::{RootOutcome, run_brent_root, run_dfp, run_lbfgs},
        traits::{LineSearcher, LogLikelihood, MLEOptions},
        types::Hessian,
    },
};

/// Maximize a log-likelihood `ℓ(θ)` using L-BFGS with the chosen line search.
///
/// # Behavior
/// - Validates the initial guess via `f.check(theta0, data)`.
/// - Wraps `(f, data)` in an `ArgMinAdapter` that exposes a *minimization*
///   problem `c(θ) = -ℓ(θ)` to `argmin`.
/// - Builds an L-BFGS solver with either **Hager–Zhang** or **More–Thuente**
///   line search based on `opts.line_searcher`.
///
/// # Errors
/// - Propagates any error from `f.check`.
/// - Propagates builder errors from `build_optimizer_*`.
/// - Propagates runtime errors from `run_lbfgs` (e.g., line search failures).
///
/// # Example
/// ```no_run
/// use ndarray::array;
/// use rust_irt::optimization::errors::OptResult;
/// use rust_irt::optimization::loglik_optimizer::{
///     Grad, LogLikelihood, MLEOptions, Theta, maximize,
/// };
///
/// struct MyLL;
/// impl LogLikelihood for MyLL {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(-theta.dot(theta))
///     }
///     fn grad(&self, theta: &Theta, _: &()) -> OptResult<Grad> {
///         Ok(theta.mapv(|t| -2.0 * t))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&MyLL, array![0.1, -0.2, 0.3], &(), &MLEOptions::default())?;
/// println!("θ̂ = {:?}", out.theta_hat);
/// # Ok::<(), rust_irt::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);
    match opts.line_searcher {
        LineSearcher::MoreThuente => {
            let solver = build_optimizer_more_thuente(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
        LineSearcher::HagerZhang => {
            let solver = build_optimizer_hager_zhang(opts)?;
            run_lbfgs(theta0, opts, problem, solver)
        }
    }
}

/// Maximize `ℓ(θ)` with DFP, starting from `theta0` and the inverse
/// `inv_hessian` of the cost Hessian `-∇²ℓ(θ₀)`.
///
/// # Errors
/// - Propagates any error from `f.check`, from the builder and from
///   [`run_dfp`].
pub fn maximize_dfp<F: LogLikelihood>(
    f: &F, theta0: Theta, inv_hessian: Hessian, data: &F::Data, opts: &MLEOptions,
) -> OptResult<OptimOutcome> {
    f.check(&theta0, data)?;
    let solver = build_dfp(opts)?;
    run_dfp(theta0, inv_hessian, opts, ArgMinAdapter::new(f, data), solver)
}

/// Find a zero of `derivative` on `[lower, upper]` with Brent's method.
///
/// The derivative must change sign on the bracket.
///
/// # Errors
/// - [`OptError::RootNotBracketed`](crate::optimization::errors::OptError::RootNotBracketed)
///   for an empty bracket; argmin errors when the endpoints share a sign.
pub fn find_root<D>(
    derivative: D, lower: f64, upper: f64, tol: f64, max_iter: Option<usize>,
) -> OptResult<RootOutcome>
where
    D: Fn(f64) -> OptResult<f64>,
{
    let solver = build_brent_root(lower, upper, tol)?;
    run_brent_root(ScalarAdapter::new(derivative), solver, max_iter)
}

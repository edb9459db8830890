//! loglik_optimizer::builders — solver construction helpers.
//!
//! Purpose
//! -------
//! Provide small, focused builders for the quasi-Newton and scalar solvers
//! used by item calibration. These helpers hide Argmin's generic wiring and
//! apply crate-level options (tolerances, memory size) so that higher-level
//! code can request a configured solver without touching Argmin types.
//!
//! Key behaviors
//! -------------
//! - Construct L-BFGS solvers with either Hager–Zhang or More–Thuente line
//!   search (polytomous items with more than one free intercept).
//! - Construct a DFP solver with More–Thuente line search (dichotomous
//!   slope/location items).
//! - Construct a Brent root finder over a scalar bracket (single free
//!   intercept).
//! - Leave initial parameters, inverse Hessians and iteration limits to the
//!   runner layer, keeping these builders side-effect free.
//!
//! Invariants & assumptions
//! ------------------------
//! - The L-BFGS memory (`m`) is either provided via `opts.lbfgs_mem` or
//!   defaults to [`DEFAULT_LBFGS_MEM`].
//! - Invalid tolerances rejected by Argmin surface as [`OptError`] via the
//!   crate's `From<Error>` implementation.
//!
//! Testing notes
//! -------------
//! - Unit tests cover construction with and without explicit memory and
//!   tolerance wiring. Full solves are exercised in `run` and by the
//!   item-model tests.
//!
//! [`OptError`]: crate::optimization::errors::OptError
use argmin::solver::quasinewton::LBFGS;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        traits::MLEOptions,
        types::{
            Cost, DEFAULT_LBFGS_MEM, DfpMoreThuente, Grad, HagerZhangLS, LbfgsHagerZhang,
            LbfgsMoreThuente, MoreThuenteLS, ScalarRoot, Theta,
        },
    },
};

/// Construct L-BFGS with Hager–Zhang line search.
///
/// Parameters
/// ----------
/// - `opts`: `&MLEOptions`
///   Consults `opts.lbfgs_mem` (defaults to [`DEFAULT_LBFGS_MEM`]) and the
///   optional gradient and cost-change tolerances.
///
/// Errors
/// ------
/// - `OptError` (via `From<argmin::core::Error>`) when Argmin rejects a
///   tolerance.
pub fn build_optimizer_hager_zhang(opts: &MLEOptions) -> OptResult<LbfgsHagerZhang> {
    let hager_zhang = HagerZhangLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsHagerZhang::new(hager_zhang, mem);
    configure_lbfgs(lbfgs, opts)
}

/// Construct L-BFGS with More–Thuente line search.
///
/// Same contract as [`build_optimizer_hager_zhang`].
pub fn build_optimizer_more_thuente(opts: &MLEOptions) -> OptResult<LbfgsMoreThuente> {
    let more_thuente = MoreThuenteLS::new();
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsMoreThuente::new(more_thuente, mem);
    configure_lbfgs(lbfgs, opts)
}

/// Apply optional tolerances to an L-BFGS solver, whatever its line search.
///
/// When a tolerance is `None`, Argmin's default remains in effect.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &MLEOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

/// build_dfp — construct DFP quasi-Newton with More–Thuente line search.
///
/// Purpose
/// -------
/// Build the solver used for two-parameter dichotomous items. DFP needs an
/// initial inverse Hessian, which is supplied by the runner
/// ([`run_dfp`](crate::optimization::loglik_optimizer::run::run_dfp)).
///
/// Parameters
/// ----------
/// - `opts`: `&MLEOptions`
///   Only `opts.tols.tol_grad` is consulted; DFP has no cost-change
///   criterion. `opts.line_searcher` is ignored.
///
/// Errors
/// ------
/// - `OptError` (via `From<argmin::core::Error>`) when Argmin rejects the
///   gradient tolerance.
pub fn build_dfp(opts: &MLEOptions) -> OptResult<DfpMoreThuente> {
    let mut solver = DfpMoreThuente::new(MoreThuenteLS::new());
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    Ok(solver)
}

/// Construct a Brent root finder on `[lower, upper]` with absolute
/// tolerance `tol`.
///
/// Errors
/// ------
/// - [`OptError::RootNotBracketed`] when the bracket is empty or not finite.
/// - [`OptError::InvalidTolGrad`] when `tol` is not finite and positive.
pub fn build_brent_root(lower: f64, upper: f64, tol: f64) -> OptResult<ScalarRoot> {
    if !(lower.is_finite() && upper.is_finite()) || lower >= upper {
        return Err(OptError::RootNotBracketed { lower, upper });
    }
    if !tol.is_finite() || tol <= 0.0 {
        return Err(OptError::InvalidTolGrad {
            tol,
            reason: "Root-finding tolerance must be finite and positive.",
        });
    }
    Ok(ScalarRoot::new(lower, upper, tol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::{LineSearcher, MLEOptions, Tolerances};

    #[test]
    // Purpose
    // -------
    // Both L-BFGS builders succeed with default and explicit memory.
    //
    // Given
    // -----
    // - Valid tolerances, `lbfgs_mem` = `None` and `Some(11)`.
    //
    // Expect
    // ------
    // - Every builder returns `Ok(_)`.
    fn lbfgs_builders_accept_default_and_explicit_memory() {
        // Arrange
        let tols =
            Tolerances::new(Some(1e-6), Some(1e-8), Some(50)).expect("Tolerances should be valid");
        let default_mem = MLEOptions::new(tols, LineSearcher::HagerZhang, None)
            .expect("MLEOptions should be valid");
        let explicit_mem = MLEOptions::new(tols, LineSearcher::MoreThuente, Some(11))
            .expect("MLEOptions should be valid");

        // Act / Assert
        assert!(build_optimizer_hager_zhang(&default_mem).is_ok());
        assert!(build_optimizer_hager_zhang(&explicit_mem).is_ok());
        assert!(build_optimizer_more_thuente(&default_mem).is_ok());
        assert!(build_optimizer_more_thuente(&explicit_mem).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // `configure_lbfgs` works with absent tolerances, relying on Argmin
    // defaults.
    fn configure_lbfgs_respects_absent_tolerances() {
        let raw = LBFGS::new(MoreThuenteLS::new(), DEFAULT_LBFGS_MEM);
        let tols = Tolerances::new(None, None, Some(50)).expect("Tolerances should be valid");
        let opts = MLEOptions::new(tols, LineSearcher::MoreThuente, None)
            .expect("MLEOptions should be valid");

        assert!(configure_lbfgs(raw, &opts).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // The DFP builder accepts a gradient tolerance and tolerates its absence.
    fn build_dfp_with_and_without_tolerance() {
        let with_tol = MLEOptions::default();
        let without_tol = MLEOptions {
            tols: Tolerances::new(None, None, Some(20)).expect("Tolerances should be valid"),
            ..MLEOptions::default()
        };

        assert!(build_dfp(&with_tol).is_ok());
        assert!(build_dfp(&without_tol).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Empty brackets and invalid tolerances are rejected before any
    // function evaluation.
    fn build_brent_root_validates_bracket_and_tolerance() {
        assert!(build_brent_root(-1.0, 1.0, 1e-10).is_ok());
        assert_eq!(
            build_brent_root(1.0, 1.0, 1e-10).err(),
            Some(OptError::RootNotBracketed { lower: 1.0, upper: 1.0 })
        );
        assert!(matches!(
            build_brent_root(-1.0, 1.0, 0.0),
            Err(OptError::InvalidTolGrad { .. })
        ));
    }
}

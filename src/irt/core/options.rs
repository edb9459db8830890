//! EM configuration: stopping rule, reference group, fixed items and the
//! per-item optimizer options.
//!
//! Purpose
//! -------
//! Bundle the knobs of an EM run into validated types so the driver can
//! assume a consistent configuration.
//!
//! Key behaviors
//! -------------
//! - [`StoppingRule`] names the two termination strategies: a fixed number
//!   of iterations without a convergence check, and a convergence-checked
//!   loop with an iteration budget.
//! - [`EmOptions::new`] validates the stopping rule; the fixed-item mask is
//!   checked against the item count when a fit starts.
//!
//! Conventions
//! -----------
//! - The maximum absolute item-parameter change is compared against
//!   `tol` with a strict `<`.
//! - `reference_group = None` estimates every group's distribution.
use crate::{
    irt::errors::{IrtError, IrtResult},
    optimization::loglik_optimizer::MLEOptions,
};

/// Iteration count of the single-group dichotomous fixed-iteration run.
pub const DICHOTOMOUS_FIXED_ITERATIONS: usize = 60;

/// Default budget of the convergence-checked rule.
pub const DEFAULT_MAX_ITER: usize = 100;

/// Budget of the convergence-checked rule for nominal response runs.
pub const NOMINAL_MAX_ITER: usize = 200;

/// Default tolerance on the maximum absolute item-parameter change.
pub const DEFAULT_TOL: f64 = 1e-4;

/// Termination strategy of the EM loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoppingRule {
    /// Run exactly `n` iterations; no convergence check.
    FixedIterations(usize),
    /// Stop when the maximum absolute item-parameter change drops below
    /// `tol`, or after `max_iter` iterations.
    Convergence { max_iter: usize, tol: f64 },
}

impl StoppingRule {
    /// The 60-iteration rule used for a single dichotomous group.
    pub fn fixed_dichotomous() -> Self {
        StoppingRule::FixedIterations(DICHOTOMOUS_FIXED_ITERATIONS)
    }

    /// Convergence rule with the nominal response budget
    /// ([`NOMINAL_MAX_ITER`]) and the default tolerance.
    pub fn nominal() -> Self {
        StoppingRule::Convergence { max_iter: NOMINAL_MAX_ITER, tol: DEFAULT_TOL }
    }

    /// Convergence rule with validated budget and tolerance.
    ///
    /// # Errors
    /// - `IrtError::InvalidOption` when `max_iter == 0` or `tol` is not
    ///   finite and positive.
    pub fn convergence(max_iter: usize, tol: f64) -> IrtResult<Self> {
        let rule = StoppingRule::Convergence { max_iter, tol };
        rule.validate()?;
        Ok(rule)
    }

    /// Iteration budget of the rule.
    pub fn max_iter(&self) -> usize {
        match *self {
            StoppingRule::FixedIterations(n) => n,
            StoppingRule::Convergence { max_iter, .. } => max_iter,
        }
    }

    /// Convergence tolerance, if the rule checks convergence.
    pub fn tolerance(&self) -> Option<f64> {
        match *self {
            StoppingRule::FixedIterations(_) => None,
            StoppingRule::Convergence { tol, .. } => Some(tol),
        }
    }

    fn validate(&self) -> IrtResult<()> {
        if self.max_iter() == 0 {
            return Err(IrtError::InvalidOption {
                name: "max_iter",
                value: 0.0,
                reason: "At least one iteration is required.",
            });
        }
        if let Some(tol) = self.tolerance() {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(IrtError::InvalidOption {
                    name: "tol",
                    value: tol,
                    reason: "Tolerance must be finite and positive.",
                });
            }
        }
        Ok(())
    }
}

impl Default for StoppingRule {
    fn default() -> Self {
        StoppingRule::Convergence { max_iter: DEFAULT_MAX_ITER, tol: DEFAULT_TOL }
    }
}

/// Options of one EM run.
///
/// Fields
/// ------
/// - `stopping`: [`StoppingRule`].
/// - `reference_group`: group pinned for identification, or `None`.
/// - `item_fixed`: per-item mask; fixed items keep their starting values.
///   Empty means no item is fixed.
/// - `mle_opts`: tolerances and line search for the per-item optimizers.
#[derive(Debug, Clone, PartialEq)]
pub struct EmOptions {
    pub stopping: StoppingRule,
    pub reference_group: Option<usize>,
    pub item_fixed: Vec<bool>,
    pub mle_opts: MLEOptions,
}

impl EmOptions {
    /// # Errors
    /// - `IrtError::InvalidOption` for an invalid stopping rule.
    pub fn new(
        stopping: StoppingRule, reference_group: Option<usize>, item_fixed: Vec<bool>,
        mle_opts: MLEOptions,
    ) -> IrtResult<Self> {
        stopping.validate()?;
        Ok(Self { stopping, reference_group, item_fixed, mle_opts })
    }

    /// `true` when `item` keeps its starting parameters.
    pub fn is_fixed(&self, item: usize) -> bool {
        self.item_fixed.get(item).copied().unwrap_or(false)
    }

    /// Check the option set against the data dimensions.
    ///
    /// # Errors
    /// - `IrtError::LengthMismatch` for a non-empty mask of the wrong length.
    /// - `IrtError::ReferenceGroupOutOfRange` for an invalid reference group.
    pub fn check_dims(&self, n_items: usize, n_groups: usize) -> IrtResult<()> {
        if !self.item_fixed.is_empty() && self.item_fixed.len() != n_items {
            return Err(IrtError::LengthMismatch {
                what: "fixed-item mask",
                expected: n_items,
                found: self.item_fixed.len(),
            });
        }
        if let Some(group) = self.reference_group {
            if group >= n_groups {
                return Err(IrtError::ReferenceGroupOutOfRange { group, n_groups });
            }
        }
        Ok(())
    }
}

impl Default for EmOptions {
    fn default() -> Self {
        Self {
            stopping: StoppingRule::default(),
            reference_group: Some(0),
            item_fixed: Vec::new(),
            mle_opts: MLEOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Both stopping rules expose their budget; only the convergence rule has
    // a tolerance.
    fn stopping_rules_report_budget_and_tolerance() {
        let fixed = StoppingRule::fixed_dichotomous();
        let conv = StoppingRule::convergence(250, 1e-5).unwrap();
        let nominal = StoppingRule::nominal();

        assert_eq!(fixed.max_iter(), 60);
        assert_eq!(fixed.tolerance(), None);
        assert_eq!(conv.max_iter(), 250);
        assert_eq!(conv.tolerance(), Some(1e-5));
        assert_eq!(nominal.max_iter(), 200);
        assert_eq!(nominal.tolerance(), Some(DEFAULT_TOL));
        assert_eq!(StoppingRule::default().max_iter(), 100);
    }

    #[test]
    // Purpose
    // -------
    // Zero budgets and non-positive tolerances are rejected.
    fn invalid_rules_are_rejected() {
        assert!(StoppingRule::convergence(0, 1e-4).is_err());
        assert!(StoppingRule::convergence(10, 0.0).is_err());
        assert!(
            EmOptions::new(StoppingRule::FixedIterations(0), None, vec![], MLEOptions::default())
                .is_err()
        );
    }

    #[test]
    // Purpose
    // -------
    // Dimension checks catch a wrong mask length and a bad reference group.
    fn check_dims_validates_mask_and_reference() {
        let opts = EmOptions { item_fixed: vec![true, false], ..EmOptions::default() };

        assert!(opts.check_dims(2, 1).is_ok());
        assert!(opts.is_fixed(0) && !opts.is_fixed(1));
        assert!(matches!(opts.check_dims(3, 1), Err(IrtError::LengthMismatch { .. })));
        let bad_ref = EmOptions { reference_group: Some(2), ..EmOptions::default() };
        assert_eq!(
            bad_ref.check_dims(1, 2),
            Err(IrtError::ReferenceGroupOutOfRange { group: 2, n_groups: 2 })
        );
    }
}

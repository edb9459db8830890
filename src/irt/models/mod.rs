//! irt::models — item model capability and its two variants.
//!
//! Purpose
//! -------
//! Abstract what the EM driver needs from an item response model behind a
//! single trait, [`ItemModel`], so the E-step, M-step, group update and
//! Oakes code are written once. The variant is chosen once per run by the
//! estimator's type parameter, not per item.
//!
//! Key behaviors
//! -------------
//! - [`ItemModel::trace`] gives the `grid × category` response probabilities
//!   of one item; the E-step multiplies the observed category's column into
//!   each person's posterior.
//! - [`ItemModel::optimize`] calibrates one item from its expected counts
//!   and returns new parameters without mutating the input.
//! - [`ItemModel::free_params`] / [`ItemModel::with_free_params`] expose the
//!   estimated parameters as a flat vector for convergence checks and the
//!   Oakes Jacobian.
//! - [`ItemModel::information`] returns the analytic observed information of
//!   the expected complete-data log-likelihood of one item.
//! - [`ModelPolicy`] carries the model-specific driver conventions
//!   (reference-group treatment and which failures stop the run).
//!
//! Variants
//! --------
//! - [`two_pl::TwoPl`]: dichotomous slope/location items.
//! - [`nominal::Nominal`]: polytomous items with fixed integer category
//!   weights and estimated intercepts.

pub mod nominal;
pub mod two_pl;

use crate::{
    irt::{
        core::{groups::ReferencePolicy, quadrature::QuadratureGrid},
        errors::IrtResult,
    },
    optimization::loglik_optimizer::MLEOptions,
};
use ndarray::{Array2, ArrayView2};

pub use self::nominal::{ExpTable, Nominal, NominalItem};
pub use self::two_pl::{TwoPl, TwoPlItem};

/// Driver conventions that differ between models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPolicy {
    /// Treatment of the reference group in the group update.
    pub reference: ReferencePolicy,
    /// Stop with `LikelihoodDecreased` when the marginal log-likelihood
    /// drops between iterations.
    pub check_likelihood: bool,
    /// Stop with `NumericalFailure` when any item optimizer exhausts its
    /// budget.
    pub abort_on_nonconvergence: bool,
    /// The reference group's sd is estimated and therefore a free parameter.
    pub reference_sd_free: bool,
}

/// Result of calibrating one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFit<I> {
    pub item: I,
    /// Largest absolute change among the item's free parameters.
    pub max_change: f64,
    /// `false` when the optimizer ran out of iterations.
    pub converged: bool,
}

/// Capability shared by the item response models.
pub trait ItemModel: Sync {
    /// Parameters of one item.
    type Item: Clone + Send + Sync + std::fmt::Debug + PartialEq;
    /// Per-iteration shared data derived from all items (for example an
    /// exponential lookup table).
    type Context: Sync;

    fn policy(&self) -> ModelPolicy;

    fn n_categories(&self, item: &Self::Item) -> usize;

    /// # Errors
    /// `IrtError::InvalidItem` when parameters are malformed.
    fn validate_item(&self, index: usize, item: &Self::Item) -> IrtResult<()>;

    /// Build the per-iteration context for the current items.
    fn context(&self, items: &[Self::Item], grid: &QuadratureGrid) -> Self::Context;

    /// Category probabilities on the grid, shape `grid × n_categories`.
    fn trace(&self, item: &Self::Item, grid: &QuadratureGrid, ctx: &Self::Context)
    -> Array2<f64>;

    /// Maximize the expected log-likelihood of one item given its counts.
    ///
    /// # Errors
    /// - `IrtError::NonFiniteItemObjective` when the objective or gradient
    ///   becomes non-finite.
    /// - `IrtError::ItemOptimization` for other optimizer failures.
    fn optimize(
        &self, index: usize, item: &Self::Item, counts: ArrayView2<'_, f64>,
        grid: &QuadratureGrid, opts: &MLEOptions,
    ) -> IrtResult<ItemFit<Self::Item>>;

    fn free_params(&self, item: &Self::Item) -> Vec<f64>;

    /// Copy of `item` with its free parameters replaced by `params`.
    fn with_free_params(&self, item: &Self::Item, params: &[f64]) -> Self::Item;

    /// Analytic `-∇²` of the item's expected log-likelihood at `item`, in
    /// the order of [`ItemModel::free_params`].
    fn information(
        &self, item: &Self::Item, counts: ArrayView2<'_, f64>, grid: &QuadratureGrid,
    ) -> Array2<f64>;
}

/// Largest absolute elementwise difference.
pub(crate) fn max_abs_change(old: &[f64], new: &[f64]) -> f64 {
    old.iter().zip(new).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max)
}

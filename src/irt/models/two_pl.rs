//! Two-parameter logistic (2PL) model for dichotomous items.
//!
//! Purpose
//! -------
//! Trace lines `P(X = 1 | θ) = 1 / (1 + exp(−a(θ − b)))` with slope `a` and
//! location `b`, and per-item calibration by DFP quasi-Newton on the
//! expected complete-data log-likelihood.
//!
//! Key behaviors
//! -------------
//! - The objective handed to the optimizer is the expected log-likelihood
//!   divided by the item's total expected count, evaluated through
//!   `ln σ(z) = −softplus(−z)` so it stays finite for finite parameters.
//! - DFP starts from the inverse of the analytic Hessian when it is
//!   positive definite and from the identity otherwise.
//! - An item whose starting gradient already meets the tolerance is
//!   returned unchanged.
//!
//! Invariants & assumptions
//! ------------------------
//! - Count matrices have two columns: category 0 (incorrect) and 1
//!   (correct).
//! - Slope and location are finite.
use crate::{
    irt::{
        core::{groups::ReferencePolicy, quadrature::QuadratureGrid},
        errors::{IrtError, IrtResult},
        models::{ItemFit, ItemModel, ModelPolicy, max_abs_change},
    },
    optimization::{
        errors::OptResult,
        loglik_optimizer::{
            Grad, LogLikelihood, MLEOptions, Theta, maximize_dfp,
            validation::{validate_grad, validate_theta_hat},
        },
        numerical_stability::{log_logistic, safe_logistic},
    },
};
use ndarray::{Array2, ArrayView2, array};

/// Parameters of a 2PL item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPlItem {
    pub slope: f64,
    pub location: f64,
}

impl TwoPlItem {
    pub fn new(slope: f64, location: f64) -> Self {
        Self { slope, location }
    }
}

/// Dichotomous two-parameter logistic model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TwoPl;

impl ItemModel for TwoPl {
    type Item = TwoPlItem;
    type Context = ();

    fn policy(&self) -> ModelPolicy {
        ModelPolicy {
            reference: ReferencePolicy::MeanAndSd,
            check_likelihood: false,
            abort_on_nonconvergence: false,
            reference_sd_free: false,
        }
    }

    fn n_categories(&self, _item: &TwoPlItem) -> usize {
        2
    }

    fn validate_item(&self, index: usize, item: &TwoPlItem) -> IrtResult<()> {
        if !item.slope.is_finite() || !item.location.is_finite() {
            return Err(IrtError::InvalidItem {
                item: index,
                reason: "Slope and location must be finite.",
            });
        }
        Ok(())
    }

    fn context(&self, _items: &[TwoPlItem], _grid: &QuadratureGrid) -> Self::Context {}

    fn trace(&self, item: &TwoPlItem, grid: &QuadratureGrid, _ctx: &()) -> Array2<f64> {
        let mut out = Array2::zeros((grid.len(), 2));
        for (t, &x) in grid.nodes().iter().enumerate() {
            let p = safe_logistic(item.slope * (x - item.location));
            out[[t, 0]] = 1.0 - p;
            out[[t, 1]] = p;
        }
        out
    }

    fn optimize(
        &self, index: usize, item: &TwoPlItem, counts: ArrayView2<'_, f64>,
        grid: &QuadratureGrid, opts: &MLEOptions,
    ) -> IrtResult<ItemFit<TwoPlItem>> {
        let unchanged = ItemFit { item: *item, max_change: 0.0, converged: true };
        let total = counts.sum();
        if total <= 0.0 {
            return Ok(unchanged);
        }
        let objective = TwoPlObjective { counts, total };
        let theta0 = array![item.slope, item.location];
        let g0 = objective
            .grad(&theta0, grid)
            .and_then(|g| validate_grad(&g, 2).map(|_| g))
            .map_err(|e| IrtError::from_item_optimizer(index, e))?;
        if let Some(tol) = opts.tols.tol_grad {
            if g0.dot(&g0).sqrt() <= tol {
                return Ok(unchanged);
            }
        }

        let info = self.information(item, counts, grid) / total;
        let inv_hessian = invert_pd_2x2(&info).unwrap_or_else(|| Array2::eye(2));
        let out = maximize_dfp(&objective, theta0, inv_hessian, grid, opts)
            .map_err(|e| IrtError::from_item_optimizer(index, e))?;

        let fitted = TwoPlItem { slope: out.theta_hat[0], location: out.theta_hat[1] };
        Ok(ItemFit {
            max_change: max_abs_change(&self.free_params(item), &self.free_params(&fitted)),
            item: fitted,
            converged: out.converged,
        })
    }

    fn free_params(&self, item: &TwoPlItem) -> Vec<f64> {
        vec![item.slope, item.location]
    }

    fn with_free_params(&self, _item: &TwoPlItem, params: &[f64]) -> TwoPlItem {
        TwoPlItem { slope: params[0], location: params[1] }
    }

    fn information(
        &self, item: &TwoPlItem, counts: ArrayView2<'_, f64>, grid: &QuadratureGrid,
    ) -> Array2<f64> {
        let (a, b) = (item.slope, item.location);
        let (mut i_aa, mut i_ab, mut i_bb) = (0.0, 0.0, 0.0);
        for (t, &x) in grid.nodes().iter().enumerate() {
            let (r0, r1) = (counts[[t, 0]], counts[[t, 1]]);
            let n = r0 + r1;
            let d = x - b;
            let p = safe_logistic(a * d);
            let w = n * p * (1.0 - p);
            i_aa += w * d * d;
            i_ab += (r1 - n * p) - a * w * d;
            i_bb += a * a * w;
        }
        array![[i_aa, i_ab], [i_ab, i_bb]]
    }
}

/// Expected log-likelihood of one 2PL item divided by its total count.
struct TwoPlObjective<'a> {
    counts: ArrayView2<'a, f64>,
    total: f64,
}

impl LogLikelihood for TwoPlObjective<'_> {
    type Data = QuadratureGrid;

    fn value(&self, theta: &Theta, grid: &QuadratureGrid) -> OptResult<f64> {
        let (a, b) = (theta[0], theta[1]);
        let mut ll = 0.0;
        for (t, &x) in grid.nodes().iter().enumerate() {
            let z = a * (x - b);
            ll += self.counts[[t, 1]] * log_logistic(z) + self.counts[[t, 0]] * log_logistic(-z);
        }
        Ok(ll / self.total)
    }

    fn grad(&self, theta: &Theta, grid: &QuadratureGrid) -> OptResult<Grad> {
        let (a, b) = (theta[0], theta[1]);
        let (mut g_a, mut resid) = (0.0, 0.0);
        for (t, &x) in grid.nodes().iter().enumerate() {
            let (r0, r1) = (self.counts[[t, 0]], self.counts[[t, 1]]);
            let e = r1 - (r0 + r1) * safe_logistic(a * (x - b));
            g_a += e * (x - b);
            resid += e;
        }
        Ok(array![g_a / self.total, -a * resid / self.total])
    }

    fn check(&self, theta: &Theta, _grid: &QuadratureGrid) -> OptResult<()> {
        validate_theta_hat(Some(theta.clone())).map(|_| ())
    }
}

/// Inverse of a symmetric 2×2 matrix when it is positive definite.
fn invert_pd_2x2(m: &Array2<f64>) -> Option<Array2<f64>> {
    let det = m[[0, 0]] * m[[1, 1]] - m[[0, 1]] * m[[1, 0]];
    if !(m[[0, 0]] > 0.0 && det > 0.0 && det.is_finite()) {
        return None;
    }
    Some(array![[m[[1, 1]] / det, -m[[0, 1]] / det], [-m[[1, 0]] / det, m[[0, 0]] / det]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;
    use ndarray::Array1;

    fn grid() -> QuadratureGrid {
        QuadratureGrid::linspace(-4.0, 4.0, 21).unwrap()
    }

    // Expected counts generated by a known item under a standard normal
    // population of size `n`.
    fn population_counts(item: TwoPlItem, n: f64) -> Array2<f64> {
        let grid = grid();
        let prior = crate::irt::core::quadrature::group_prior(0.0, 1.0, &grid).unwrap();
        let mut counts = TwoPl.trace(&item, &grid, &());
        for t in 0..grid.len() {
            counts[[t, 0]] *= n * prior[t];
            counts[[t, 1]] *= n * prior[t];
        }
        counts
    }

    #[test]
    // Purpose
    // -------
    // A zero slope gives probability one half at every node, whatever the
    // location.
    fn trace_with_zero_slope_is_one_half() {
        for &b in &[-3.0, 0.0, 2.5] {
            let trace = TwoPl.trace(&TwoPlItem::new(0.0, b), &grid(), &());
            assert!(trace.iter().all(|&p| p == 0.5));
        }
    }

    #[test]
    // Purpose
    // -------
    // The analytic gradient and information agree with finite differences.
    //
    // Given
    // -----
    // - Counts from item (1.3, -0.4) evaluated at a different point
    //   (0.8, 0.3).
    //
    // Expect
    // ------
    // - grad ≈ central difference of the value.
    // - information ≈ −total × central Hessian of the normalized value.
    fn gradient_and_information_match_finite_differences() {
        // Arrange
        let grid = grid();
        let counts = population_counts(TwoPlItem::new(1.3, -0.4), 500.0);
        let total = counts.sum();
        let objective = TwoPlObjective { counts: counts.view(), total };
        let theta: Array1<f64> = array![0.8, 0.3];

        // Act
        let analytic = objective.grad(&theta, &grid).unwrap();
        let numeric = theta.central_diff(&|x: &Array1<f64>| objective.value(x, &grid).unwrap());
        let info = TwoPl.information(&TwoPlItem::new(0.8, 0.3), counts.view(), &grid);
        let hess =
            theta.central_hessian(&|x: &Array1<f64>| objective.grad(x, &grid).unwrap());

        // Assert
        for i in 0..2 {
            assert_abs_diff_eq!(analytic[i], numeric[i], epsilon = 1e-6);
            for j in 0..2 {
                assert_abs_diff_eq!(info[[i, j]], -total * hess[[i, j]], epsilon = 1e-3);
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // Calibrating on exact population counts recovers the generating item.
    fn optimize_recovers_generating_item() {
        // Arrange
        let truth = TwoPlItem::new(1.3, -0.4);
        let counts = population_counts(truth, 1000.0);

        // Act
        let fit = TwoPl
            .optimize(0, &TwoPlItem::new(1.0, 0.0), counts.view(), &grid(), &MLEOptions::default())
            .unwrap();

        // Assert
        assert_abs_diff_eq!(fit.item.slope, 1.3, epsilon = 1e-5);
        assert_abs_diff_eq!(fit.item.location, -0.4, epsilon = 1e-5);
        assert!(fit.max_change > 0.3);
    }

    #[test]
    // Purpose
    // -------
    // An item without any expected responses is left untouched.
    fn optimize_skips_item_without_counts() {
        let counts = Array2::zeros((21, 2));
        let item = TwoPlItem::new(0.7, 0.1);

        let fit = TwoPl.optimize(0, &item, counts.view(), &grid(), &MLEOptions::default()).unwrap();

        assert_eq!(fit.item, item);
        assert_eq!(fit.max_change, 0.0);
    }

    #[test]
    // Purpose
    // -------
    // The 2×2 inverse is used only for positive definite input.
    fn invert_pd_2x2_rejects_indefinite_matrices() {
        let inv = invert_pd_2x2(&array![[2.0, 0.0], [0.0, 4.0]]).unwrap();
        assert_abs_diff_eq!(inv[[1, 1]], 0.25);
        assert!(invert_pd_2x2(&array![[1.0, 2.0], [2.0, 1.0]]).is_none());
    }
}

//! Nominal response model (NRM) for polytomous items.
//!
//! Purpose
//! -------
//! Category probabilities `P_k(θ) ∝ exp(w_k θ + c_k)` with fixed integer
//! category weights `w_k` and estimated intercepts `c_k`; category 0 is the
//! baseline with `w_0 = c_0 = 0`.
//!
//! Key behaviors
//! -------------
//! - [`ExpTable`] caches `exp(k θ_t)` for every weight `k` up to the largest
//!   weight of any item. It is rebuilt once per EM iteration and shared by
//!   every trace evaluation.
//! - Two-category items have a single free intercept. Their stationary
//!   point is found by bracketing the sign change of the analytic
//!   derivative and running Brent's method on it.
//!   When a category has no expected responses the derivative only
//!   vanishes once its probability underflows; the intercept then lands at
//!   the far bracket end and a warning is logged.
//! - Items with more categories are calibrated by L-BFGS over the `K − 1`
//!   free intercepts.
//! - Objectives are normalized by the item's total expected count and use
//!   a max-shifted log-sum-exp, so they stay finite for finite intercepts.
//!
//! Invariants & assumptions
//! ------------------------
//! - `weights.len() == intercepts.len() == K ≥ 2`, `weights[0] == 0`,
//!   `intercepts[0] == 0`.
//! - Weights are never re-estimated.
use crate::{
    irt::{
        core::{groups::ReferencePolicy, quadrature::QuadratureGrid},
        errors::{IrtError, IrtResult},
        models::{ItemFit, ItemModel, ModelPolicy, max_abs_change},
    },
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{
            Grad, LogLikelihood, MLEOptions, Theta, find_root, maximize,
            validation::{validate_grad, validate_theta_hat},
        },
    },
};
use ndarray::{Array1, Array2, ArrayView2};

/// Maximum number of bracket doublings before giving up on a sign change.
const MAX_BRACKET_EXPANSIONS: usize = 60;

/// Root tolerance used when the options carry no gradient tolerance.
const DEFAULT_ROOT_TOL: f64 = 1e-10;

/// Lookup table of `exp(k θ_t)` for `k = 0..=max_weight`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpTable {
    table: Array2<f64>,
}

impl ExpTable {
    pub fn new(max_weight: u32, grid: &QuadratureGrid) -> Self {
        let nodes = grid.nodes();
        let table = Array2::from_shape_fn((max_weight as usize + 1, grid.len()), |(k, t)| {
            (k as f64 * nodes[t]).exp()
        });
        Self { table }
    }

    pub fn max_weight(&self) -> u32 {
        (self.table.nrows() - 1) as u32
    }

    /// `exp(weight · θ_node)`.
    pub fn get(&self, weight: u32, node: usize) -> f64 {
        self.table[[weight as usize, node]]
    }
}

/// Parameters of a nominal item.
#[derive(Debug, Clone, PartialEq)]
pub struct NominalItem {
    pub weights: Vec<u32>,
    pub intercepts: Array1<f64>,
}

impl NominalItem {
    /// Build an item from the weights and intercepts of categories
    /// `1..K`; the baseline category is prepended.
    pub fn from_free(weights: &[u32], intercepts: &[f64]) -> Self {
        let mut w = Vec::with_capacity(weights.len() + 1);
        w.push(0);
        w.extend_from_slice(weights);
        let mut c = Vec::with_capacity(intercepts.len() + 1);
        c.push(0.0);
        c.extend_from_slice(intercepts);
        Self { weights: w, intercepts: Array1::from(c) }
    }

    pub fn n_categories(&self) -> usize {
        self.weights.len()
    }
}

/// Nominal response model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Nominal;

impl ItemModel for Nominal {
    type Item = NominalItem;
    type Context = ExpTable;

    fn policy(&self) -> ModelPolicy {
        ModelPolicy {
            reference: ReferencePolicy::MeanOnly,
            check_likelihood: true,
            abort_on_nonconvergence: true,
            reference_sd_free: true,
        }
    }

    fn n_categories(&self, item: &NominalItem) -> usize {
        item.n_categories()
    }

    fn validate_item(&self, index: usize, item: &NominalItem) -> IrtResult<()> {
        let invalid = |reason| Err(IrtError::InvalidItem { item: index, reason });
        if item.weights.len() < 2 {
            return invalid("At least two categories are required.");
        }
        if item.weights.len() != item.intercepts.len() {
            return invalid("Weights and intercepts must have the same length.");
        }
        if item.weights[0] != 0 || item.intercepts[0] != 0.0 {
            return invalid("Category 0 must have weight 0 and intercept 0.");
        }
        if item.intercepts.iter().any(|c| !c.is_finite()) {
            return invalid("Intercepts must be finite.");
        }
        Ok(())
    }

    fn context(&self, items: &[NominalItem], grid: &QuadratureGrid) -> ExpTable {
        let max_weight = items.iter().flat_map(|it| it.weights.iter().copied()).max().unwrap_or(0);
        ExpTable::new(max_weight, grid)
    }

    fn trace(&self, item: &NominalItem, grid: &QuadratureGrid, ctx: &ExpTable) -> Array2<f64> {
        let k = item.n_categories();
        let c_max = item.intercepts.fold(f64::NEG_INFINITY, |m, &c| m.max(c));
        let scale = item.intercepts.mapv(|c| (c - c_max).exp());
        let mut out = Array2::zeros((grid.len(), k));
        for t in 0..grid.len() {
            let mut row = out.row_mut(t);
            for j in 0..k {
                row[j] = ctx.get(item.weights[j], t) * scale[j];
            }
            let sum = row.sum();
            row /= sum;
        }
        out
    }

    fn optimize(
        &self, index: usize, item: &NominalItem, counts: ArrayView2<'_, f64>,
        grid: &QuadratureGrid, opts: &MLEOptions,
    ) -> IrtResult<ItemFit<NominalItem>> {
        let unchanged = ItemFit { item: item.clone(), max_change: 0.0, converged: true };
        let total = counts.sum();
        if total <= 0.0 {
            return Ok(unchanged);
        }
        let objective = NominalObjective { counts, weights: &item.weights, total };
        let theta0 = Array1::from(self.free_params(item));
        let g0 = objective
            .grad(&theta0, grid)
            .and_then(|g| validate_grad(&g, theta0.len()).map(|_| g))
            .map_err(|e| IrtError::from_item_optimizer(index, e))?;
        if let Some(tol) = opts.tols.tol_grad {
            if g0.dot(&g0).sqrt() <= tol {
                return Ok(unchanged);
            }
        }

        let (params, converged) = if theta0.len() == 1 {
            let out = solve_single_intercept(&objective, theta0[0], grid, opts)
                .map_err(|e| IrtError::from_item_optimizer(index, e))?;
            if out.saturated {
                log::warn!(
                    "item {index}: intercept {:.1} is where category 1 underflows; \
                     the category has no expected responses",
                    out.root
                );
            }
            (vec![out.root], out.converged)
        } else {
            let out = maximize(&objective, theta0, grid, opts)
                .map_err(|e| IrtError::from_item_optimizer(index, e))?;
            (out.theta_hat.to_vec(), out.converged)
        };

        let fitted = self.with_free_params(item, &params);
        Ok(ItemFit {
            max_change: max_abs_change(&self.free_params(item), &params),
            item: fitted,
            converged,
        })
    }

    fn free_params(&self, item: &NominalItem) -> Vec<f64> {
        item.intercepts.iter().skip(1).copied().collect()
    }

    fn with_free_params(&self, item: &NominalItem, params: &[f64]) -> NominalItem {
        let mut out = item.clone();
        for (j, &c) in params.iter().enumerate() {
            out.intercepts[j + 1] = c;
        }
        out
    }

    fn information(
        &self, item: &NominalItem, counts: ArrayView2<'_, f64>, grid: &QuadratureGrid,
    ) -> Array2<f64> {
        let m = item.n_categories() - 1;
        let mut info = Array2::zeros((m, m));
        for (t, &x) in grid.nodes().iter().enumerate() {
            let n = counts.row(t).sum();
            let p = category_probs(&item.weights, &item.intercepts, x);
            for k in 0..m {
                for l in 0..m {
                    let delta = if k == l { 1.0 } else { 0.0 };
                    info[[k, l]] += n * p[k + 1] * (delta - p[l + 1]);
                }
            }
        }
        info
    }
}

/// Softmax of `w_k x + c_k` with a max shift.
fn category_probs(weights: &[u32], intercepts: &Array1<f64>, x: f64) -> Array1<f64> {
    let logits = Array1::from_shape_fn(weights.len(), |k| weights[k] as f64 * x + intercepts[k]);
    let m = logits.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let mut p = logits.mapv(|s| (s - m).exp());
    let sum = p.sum();
    p /= sum;
    p
}

/// Root of the single-intercept derivative.
///
/// `saturated` is set when a bracket end sits where the derivative is
/// exactly zero, i.e. the category probability underflowed there.
#[derive(Debug, Clone, Copy, PartialEq)]
struct InterceptRoot {
    root: f64,
    converged: bool,
    saturated: bool,
}

/// Brent's method on the derivative of the normalized cost in the single
/// free intercept, after widening a bracket around `c0` until the
/// derivative changes sign.
fn solve_single_intercept(
    objective: &NominalObjective<'_, '_>, c0: f64, grid: &QuadratureGrid, opts: &MLEOptions,
) -> OptResult<InterceptRoot> {
    let derivative = |c: f64| -> OptResult<f64> {
        let g = objective.grad(&Array1::from(vec![c]), grid)?;
        Ok(-g[0])
    };
    let (mut lower, mut upper, mut step) = (c0 - 1.0, c0 + 1.0, 1.0);
    let mut bracketed = false;
    let mut saturated = false;
    for _ in 0..MAX_BRACKET_EXPANSIONS {
        let (d_lo, d_hi) = (derivative(lower)?, derivative(upper)?);
        if d_lo <= 0.0 && d_hi >= 0.0 {
            bracketed = true;
            saturated = d_lo == 0.0 || d_hi == 0.0;
            break;
        }
        if d_lo > 0.0 {
            lower -= step;
        }
        if d_hi < 0.0 {
            upper += step;
        }
        step *= 2.0;
    }
    if !bracketed {
        return Err(OptError::RootNotBracketed { lower, upper });
    }
    let tol = opts.tols.tol_grad.unwrap_or(DEFAULT_ROOT_TOL);
    let out = find_root(derivative, lower, upper, tol, opts.tols.max_iter)?;
    Ok(InterceptRoot { root: out.root, converged: out.converged, saturated })
}

/// Expected log-likelihood of one nominal item over its free intercepts,
/// divided by its total count.
struct NominalObjective<'a, 'w> {
    counts: ArrayView2<'a, f64>,
    weights: &'w [u32],
    total: f64,
}

impl NominalObjective<'_, '_> {
    fn intercepts(&self, theta: &Theta) -> Array1<f64> {
        let mut c = Array1::zeros(self.weights.len());
        c.slice_mut(ndarray::s![1..]).assign(theta);
        c
    }
}

impl LogLikelihood for NominalObjective<'_, '_> {
    type Data = QuadratureGrid;

    fn value(&self, theta: &Theta, grid: &QuadratureGrid) -> OptResult<f64> {
        let c = self.intercepts(theta);
        let mut ll = 0.0;
        for (t, &x) in grid.nodes().iter().enumerate() {
            let p = category_probs(self.weights, &c, x);
            for (k, &r) in self.counts.row(t).iter().enumerate() {
                if r > 0.0 {
                    ll += r * p[k].ln();
                }
            }
        }
        Ok(ll / self.total)
    }

    fn grad(&self, theta: &Theta, grid: &QuadratureGrid) -> OptResult<Grad> {
        let c = self.intercepts(theta);
        let mut g = Array1::zeros(theta.len());
        for (t, &x) in grid.nodes().iter().enumerate() {
            let row = self.counts.row(t);
            let n = row.sum();
            let p = category_probs(self.weights, &c, x);
            for k in 0..theta.len() {
                g[k] += row[k + 1] - n * p[k + 1];
            }
        }
        g /= self.total;
        Ok(g)
    }

    fn check(&self, theta: &Theta, _grid: &QuadratureGrid) -> OptResult<()> {
        validate_theta_hat(Some(theta.clone())).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irt::{
        core::quadrature::group_prior,
        models::two_pl::{TwoPl, TwoPlItem},
    };
    use approx::assert_abs_diff_eq;
    use finitediff::FiniteDiff;

    fn grid() -> QuadratureGrid {
        QuadratureGrid::linspace(-4.0, 4.0, 21).unwrap()
    }

    fn population_counts(item: &NominalItem, n: f64) -> Array2<f64> {
        let grid = grid();
        let prior = group_prior(0.0, 1.0, &grid).unwrap();
        let ctx = Nominal.context(std::slice::from_ref(item), &grid);
        let mut counts = Nominal.trace(item, &grid, &ctx);
        for (t, mut row) in counts.rows_mut().into_iter().enumerate() {
            row *= n * prior[t];
        }
        counts
    }

    #[test]
    // Purpose
    // -------
    // The lookup table holds exp(k θ_t) and reports its largest weight.
    fn exp_table_matches_direct_exponentials() {
        let grid = grid();
        let table = ExpTable::new(3, &grid);

        assert_eq!(table.max_weight(), 3);
        for t in 0..grid.len() {
            for k in 0..=3u32 {
                assert_abs_diff_eq!(
                    table.get(k, t),
                    (k as f64 * grid.nodes()[t]).exp(),
                    epsilon = 1e-12
                );
            }
        }
    }

    #[test]
    // Purpose
    // -------
    // A two-category item with unit weight traces the same curve as a 2PL
    // item with slope 1 and location −c.
    //
    // Given
    // -----
    // - Nominal weights (0, 1), intercepts (0, 0.7).
    //
    // Expect
    // ------
    // - Rows sum to one and match the 2PL trace with (1, −0.7).
    fn two_category_trace_matches_unit_slope_2pl() {
        // Arrange
        let grid = grid();
        let item = NominalItem::from_free(&[1], &[0.7]);
        let ctx = Nominal.context(std::slice::from_ref(&item), &grid);

        // Act
        let nrm = Nominal.trace(&item, &grid, &ctx);
        let twopl = TwoPl.trace(&TwoPlItem::new(1.0, -0.7), &grid, &());

        // Assert
        for t in 0..grid.len() {
            assert_abs_diff_eq!(nrm.row(t).sum(), 1.0, epsilon = 1e-14);
            assert_abs_diff_eq!(nrm[[t, 1]], twopl[[t, 1]], epsilon = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Gradient and information of a three-category item agree with finite
    // differences.
    fn gradient_and_information_match_finite_differences() {
        // Arrange
        let grid = grid();
        let truth = NominalItem::from_free(&[1, 2], &[0.4, -0.6]);
        let counts = population_counts(&truth, 400.0);
        let total = counts.sum();
        let objective = NominalObjective { counts: counts.view(), weights: &truth.weights, total };
        let theta = Array1::from(vec![0.1, 0.2]);

        // Act
        let analytic = objective.grad(&theta, &grid).unwrap();
        let numeric = theta.central_diff(&|x: &Array1<f64>| objective.value(x, &grid).unwrap());
        let at = NominalItem::from_free(&[1, 2], &[0.1, 0.2]);
        let info = Nominal.information(&at, counts.view(), &grid);
        let hess = theta.central_hessian(&|x: &Array1<f64>| objective.grad(x, &grid).unwrap());

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
    // Both calibration paths recover the generating intercepts from exact
    // population counts.
    //
    // Given
    // -----
    // - A two-category item (Brent path) and a three-category item (L-BFGS
    //   path), started away from the truth.
    //
    // Expect
    // ------
    // - Intercepts within 1e-5 of the truth.
    fn optimize_recovers_intercepts_on_both_paths() {
        // Arrange
        let grid = grid();
        let opts = MLEOptions::default();
        let two = NominalItem::from_free(&[1], &[-0.8]);
        let three = NominalItem::from_free(&[1, 2], &[0.4, -0.6]);

        // Act
        let fit2 = Nominal
            .optimize(
                0,
                &NominalItem::from_free(&[1], &[2.0]),
                population_counts(&two, 300.0).view(),
                &grid,
                &opts,
            )
            .unwrap();
        let fit3 = Nominal
            .optimize(
                1,
                &NominalItem::from_free(&[1, 2], &[0.0, 0.0]),
                population_counts(&three, 300.0).view(),
                &grid,
                &opts,
            )
            .unwrap();

        // Assert
        assert_abs_diff_eq!(fit2.item.intercepts[1], -0.8, epsilon = 1e-5);
        assert_abs_diff_eq!(fit2.max_change, 2.8, epsilon = 1e-5);
        assert_abs_diff_eq!(fit3.item.intercepts[1], 0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(fit3.item.intercepts[2], -0.6, epsilon = 1e-5);
        assert_eq!(fit3.item.weights, vec![0, 1, 2]);
    }

    #[test]
    // Purpose
    // -------
    // A two-category item whose second category is never observed is driven
    // to the underflow range and flagged instead of passing as a regular
    // estimate.
    //
    // Given
    // -----
    // - Expected counts with an all-zero column for category 1.
    //
    // Expect
    // ------
    // - The bracket search succeeds with a finite root beyond the point
    //   where `exp` underflows, and `saturated` is set.
    // - An observed category on the same path is not flagged.
    fn unobserved_category_is_flagged_as_saturated() {
        // Arrange
        let grid = grid();
        let opts = MLEOptions::default();
        let mut empty = population_counts(&NominalItem::from_free(&[1], &[0.0]), 50.0);
        empty.column_mut(1).fill(0.0);
        let observed = population_counts(&NominalItem::from_free(&[1], &[0.3]), 50.0);
        let weights = [0, 1];
        let flat = NominalObjective { counts: empty.view(), weights: &weights, total: empty.sum() };
        let regular =
            NominalObjective { counts: observed.view(), weights: &weights, total: observed.sum() };

        // Act
        let out = solve_single_intercept(&flat, 0.0, &grid, &opts).unwrap();
        let ok = solve_single_intercept(&regular, 0.0, &grid, &opts).unwrap();

        // Assert
        assert!(out.saturated);
        assert!(out.root.is_finite() && out.root < -700.0);
        assert!(!ok.saturated);
        assert_abs_diff_eq!(ok.root, 0.3, epsilon = 1e-5);
    }

    #[test]
    // Purpose
    // -------
    // Malformed items are rejected with the item index.
    fn validate_item_rejects_malformed_items() {
        let ok = NominalItem::from_free(&[1, 2], &[0.0, 0.0]);
        let mut bad_base = ok.clone();
        bad_base.weights[0] = 1;
        let short = NominalItem { weights: vec![0], intercepts: Array1::zeros(1) };

        assert!(Nominal.validate_item(0, &ok).is_ok());
        assert!(matches!(
            Nominal.validate_item(4, &bad_base),
            Err(IrtError::InvalidItem { item: 4, .. })
        ));
        assert!(Nominal.validate_item(0, &short).is_err());
    }
}

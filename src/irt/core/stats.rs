//! Sufficient statistics accumulated by one E-step.
//!
//! Purpose
//! -------
//! Carry everything the M-step and the group update need from the E-step:
//! per-item expected category counts on the grid, per-group posterior mass
//! on the grid, per-group summed posterior means and the marginal
//! log-likelihood.
//!
//! Key behaviors
//! -------------
//! - [`SufficientStats::zeros`] allocates a fresh accumulator; statistics are
//!   never carried across iterations.
//! - [`SufficientStats::add_person`] folds one person's posterior in.
//! - [`SufficientStats::merge`] combines two partial accumulators. It is
//!   associative and commutative up to floating-point summation order,
//!   which makes it the reduce step of the parallel E-step.
//!
//! Conventions
//! -----------
//! - `counts[i]` has shape `grid × categories(i)`.
//! - `group_mass` has shape `grid × groups`; column `g` summed over the grid
//!   equals the number of persons in `g`.
use ndarray::{Array1, Array2, ArrayView1, Zip};

#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    pub counts: Vec<Array2<f64>>,
    pub group_mass: Array2<f64>,
    pub sum_theta: Array1<f64>,
    pub log_likelihood: f64,
}

impl SufficientStats {
    /// Zeroed accumulator for items with `n_categories[i]` categories.
    pub fn zeros(n_categories: &[usize], n_nodes: usize, n_groups: usize) -> Self {
        Self {
            counts: n_categories.iter().map(|&k| Array2::zeros((n_nodes, k))).collect(),
            group_mass: Array2::zeros((n_nodes, n_groups)),
            sum_theta: Array1::zeros(n_groups),
            log_likelihood: 0.0,
        }
    }

    /// Add one person's normalized posterior.
    ///
    /// `log_mass` is the log of the unnormalized posterior mass, i.e. the
    /// person's marginal log-likelihood contribution.
    pub fn add_person(
        &mut self, posterior: ArrayView1<'_, f64>, group: usize, items: &[usize],
        categories: &[usize], theta_bar: f64, log_mass: f64,
    ) {
        for (&item, &category) in items.iter().zip(categories) {
            let mut col = self.counts[item].column_mut(category);
            col += &posterior;
        }
        let mut mass = self.group_mass.column_mut(group);
        mass += &posterior;
        self.sum_theta[group] += theta_bar;
        self.log_likelihood += log_mass;
    }

    /// Combine two partial accumulators of identical shape.
    pub fn merge(mut self, other: Self) -> Self {
        for (mine, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *mine += theirs;
        }
        self.group_mass += &other.group_mass;
        self.sum_theta += &other.sum_theta;
        self.log_likelihood += other.log_likelihood;
        self
    }

    /// Summed posterior second moment `Σ_p E[θ² | p]` per group.
    pub fn second_moments(&self, nodes: &Array1<f64>) -> Array1<f64> {
        let mut out = Array1::zeros(self.group_mass.ncols());
        for (g, col) in self.group_mass.columns().into_iter().enumerate() {
            out[g] = Zip::from(&col).and(nodes).fold(0.0, |acc, &w, &x| acc + w * x * x);
        }
        out
    }

    /// Total expected count for `item`.
    pub fn item_total(&self, item: usize) -> f64 {
        self.counts[item].sum()
    }
}

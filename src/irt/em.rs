//! EM driver for marginal maximum likelihood item calibration.
//!
//! Purpose
//! -------
//! Alternate E-step, M-step and group update until a stopping rule fires,
//! and report the last completed state with the reason the loop ended.
//!
//! Key behaviors
//! -------------
//! - [`em_cycle`] performs one full E + M + group update from a given state
//!   without touching it. The driver and the Oakes Jacobian share it.
//! - [`IrtEstimator::fit`] validates the inputs, iterates and caches an
//!   [`EmOutcome`] in `results`.
//! - After every completed cycle the stop checks run in a fixed order:
//!   (a) likelihood decrease (models whose policy asks for it),
//!   (b) item optimizer non-convergence (models whose policy aborts on it),
//!   (c) maximum parameter change below tolerance (convergence rule only),
//!   (d) iteration budget.
//! - A numerical error raised inside a cycle ends the run with
//!   [`StopReason::NumericalFailure`]; the returned state is the one the
//!   failing cycle started from.
//! - On halt, one more E-step at the final parameters supplies the reported
//!   marginal log-likelihood and posterior means.
//!
//! Invariants & assumptions
//! ------------------------
//! - Validation problems are returned as `Err` before any iteration;
//!   numerical problems during iteration are reported in the outcome.
//! - State is committed only at the end of a cycle.
use crate::irt::{
    core::{
        data::ResponseData,
        groups::{GroupDistribution, update_groups},
        options::EmOptions,
        quadrature::QuadratureGrid,
    },
    errors::{IrtError, IrtResult},
    estep::estep,
    models::ItemModel,
    mstep::mstep,
};
use ndarray::Array1;

/// Relative slack before a drop in the marginal log-likelihood counts as a
/// decrease.
const LIKELIHOOD_SLACK: f64 = 1e-10;

/// Why the EM loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Maximum absolute item-parameter change fell below the tolerance.
    Converged,
    /// The iteration budget was used up.
    MaxIterationsReached,
    /// The marginal log-likelihood decreased between iterations; carries
    /// `IrtError::LikelihoodRegression` with both values.
    LikelihoodDecreased(IrtError),
    /// A numerical or optimizer failure ended the run.
    NumericalFailure(IrtError),
}

impl StopReason {
    /// Integer status: 0 converged, 1 numerical or optimizer failure,
    /// 2 likelihood decreased, 4 iteration budget exhausted.
    pub fn code(&self) -> u32 {
        match self {
            StopReason::Converged => 0,
            StopReason::NumericalFailure(_) => 1,
            StopReason::LikelihoodDecreased(_) => 2,
            StopReason::MaxIterationsReached => 4,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, StopReason::Converged)
    }
}

/// Result of an EM run.
///
/// Fields
/// ------
/// - `items`, `groups`: last completed parameter state.
/// - `theta_bar`: posterior mean per person at `items`/`groups`.
/// - `log_likelihood`: marginal log-likelihood at the final parameters;
///   `None` when the final E-step itself failed.
/// - `iterations`: number of EM cycles started.
/// - `max_change`: maximum item-parameter change of the last completed
///   cycle.
/// - `nonconverged`: item optimizers that hit their budget in the last
///   completed cycle.
/// - `stop`: [`StopReason`].
#[derive(Debug, Clone, PartialEq)]
pub struct EmOutcome<I> {
    pub items: Vec<I>,
    pub groups: Vec<GroupDistribution>,
    pub theta_bar: Array1<f64>,
    pub log_likelihood: Option<f64>,
    pub iterations: usize,
    pub max_change: f64,
    pub nonconverged: usize,
    pub stop: StopReason,
}

/// State produced by one EM cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput<I> {
    pub items: Vec<I>,
    pub groups: Vec<GroupDistribution>,
    /// Posterior means from this cycle's E-step.
    pub theta_bar: Array1<f64>,
    /// Marginal log-likelihood at the state the cycle started from.
    pub log_likelihood: f64,
    pub max_change: f64,
    pub nonconverged: usize,
}

/// One E-step, M-step and group update starting from `items`/`groups`.
///
/// # Errors
/// Any numerical error raised by the three phases.
pub fn em_cycle<M: ItemModel>(
    model: &M, items: &[M::Item], groups: &[GroupDistribution], grid: &QuadratureGrid,
    data: &ResponseData, options: &EmOptions,
) -> IrtResult<CycleOutput<M::Item>> {
    let e = estep(model, items, groups, grid, data)?;
    let m = mstep(model, items, &e.stats, grid, options)?;
    let groups = update_groups(
        &e.stats,
        &data.group_sizes(),
        grid.nodes(),
        options.reference_group,
        model.policy().reference,
    )?;
    Ok(CycleOutput {
        items: m.items,
        groups,
        theta_bar: e.theta_bar,
        log_likelihood: e.stats.log_likelihood,
        max_change: m.max_change,
        nonconverged: m.nonconverged,
    })
}

/// EM estimator for one item model.
///
/// Fields
/// ------
/// - `model`: the [`ItemModel`] variant, chosen once per run.
/// - `grid`: quadrature grid.
/// - `options`: [`EmOptions`].
/// - `results`: populated by [`IrtEstimator::fit`].
#[derive(Debug, Clone)]
pub struct IrtEstimator<M: ItemModel> {
    pub model: M,
    pub grid: QuadratureGrid,
    pub options: EmOptions,
    pub results: Option<EmOutcome<M::Item>>,
}

impl<M: ItemModel> IrtEstimator<M> {
    pub fn new(model: M, grid: QuadratureGrid, options: EmOptions) -> Self {
        Self { model, grid, options, results: None }
    }

    /// Run EM from the starting `items` and `groups` and cache the outcome.
    ///
    /// # Errors
    /// Validation failures only:
    /// - `IrtError::LengthMismatch` when `items`/`groups` disagree with the
    ///   data dimensions or the fixed-item mask has the wrong length.
    /// - `IrtError::InvalidItem`, `IrtError::CategoryOutOfRange`,
    ///   `IrtError::InvalidSd`, `IrtError::ReferenceGroupOutOfRange`.
    ///
    /// Numerical failures are reported through `results.stop`.
    pub fn fit(
        &mut self, data: &ResponseData, items: Vec<M::Item>, groups: Vec<GroupDistribution>,
    ) -> IrtResult<()> {
        self.validate(data, &items, &groups)?;
        self.results = Some(self.run(data, items, groups));
        Ok(())
    }

    fn validate(
        &self, data: &ResponseData, items: &[M::Item], groups: &[GroupDistribution],
    ) -> IrtResult<()> {
        if items.len() != data.n_items() {
            return Err(IrtError::LengthMismatch {
                what: "item parameters",
                expected: data.n_items(),
                found: items.len(),
            });
        }
        if groups.len() != data.n_groups() {
            return Err(IrtError::LengthMismatch {
                what: "group distributions",
                expected: data.n_groups(),
                found: groups.len(),
            });
        }
        for (i, item) in items.iter().enumerate() {
            self.model.validate_item(i, item)?;
        }
        for (g, dist) in groups.iter().enumerate() {
            if !dist.mean.is_finite() || !dist.sd.is_finite() || dist.sd <= 0.0 {
                return Err(IrtError::InvalidSd { group: Some(g), mean: dist.mean, sd: dist.sd });
            }
        }
        data.validate_categories(|i| self.model.n_categories(&items[i]))?;
        self.options.check_dims(data.n_items(), data.n_groups())
    }

    fn run(
        &self, data: &ResponseData, mut items: Vec<M::Item>, mut groups: Vec<GroupDistribution>,
    ) -> EmOutcome<M::Item> {
        let policy = self.model.policy();
        let max_iter = self.options.stopping.max_iter();
        let tol = self.options.stopping.tolerance();
        let mut theta_bar =
            Array1::from_shape_fn(data.n_persons(), |p| groups[data.group_of(p)].mean);
        let mut previous_ll: Option<f64> = None;
        let mut max_change = f64::INFINITY;
        let mut nonconverged = 0;
        let mut iterations = 0;

        let stop = loop {
            iterations += 1;
            let cycle =
                match em_cycle(&self.model, &items, &groups, &self.grid, data, &self.options) {
                    Ok(cycle) => cycle,
                    Err(err) => {
                        log::warn!("EM iteration {iterations} failed: {err}");
                        break StopReason::NumericalFailure(err);
                    }
                };
            let current_ll = cycle.log_likelihood;
            items = cycle.items;
            groups = cycle.groups;
            theta_bar = cycle.theta_bar;
            max_change = cycle.max_change;
            nonconverged = cycle.nonconverged;
            log::debug!(
                "EM iteration {iterations}: loglik = {current_ll:.6}, \
                 max change = {max_change:.3e}, nonconverged items = {nonconverged}"
            );

            if policy.check_likelihood {
                if let Some(prev) = previous_ll {
                    if current_ll < prev - LIKELIHOOD_SLACK * prev.abs().max(1.0) {
                        let err =
                            IrtError::LikelihoodRegression { previous: prev, current: current_ll };
                        log::warn!("EM iteration {iterations}: {err}");
                        break StopReason::LikelihoodDecreased(err);
                    }
                }
            }
            previous_ll = Some(current_ll);
            if policy.abort_on_nonconvergence && nonconverged > 0 {
                let err = IrtError::OptimizerNonConvergence { items: nonconverged };
                log::warn!("EM iteration {iterations}: {err}");
                break StopReason::NumericalFailure(err);
            }
            if tol.is_some_and(|tol| max_change < tol) {
                break StopReason::Converged;
            }
            if iterations >= max_iter {
                break StopReason::MaxIterationsReached;
            }
        };

        let log_likelihood = match estep(&self.model, &items, &groups, &self.grid, data) {
            Ok(e) => {
                theta_bar = e.theta_bar;
                Some(e.stats.log_likelihood)
            }
            Err(err) => {
                log::warn!("final E-step failed: {err}");
                None
            }
        };
        log::info!(
            "EM stopped after {iterations} iterations (code {}): {stop:?}, \
             loglik = {log_likelihood:?}",
            stop.code()
        );
        EmOutcome {
            items,
            groups,
            theta_bar,
            log_likelihood,
            iterations,
            max_change,
            nonconverged,
            stop,
        }
    }
}

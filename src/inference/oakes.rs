//! inference::oakes — Jacobian of the EM map by central differences.
//!
//! Purpose
//! -------
//! Differentiate the EM parameter update `M(p) → p'` (one E-step, M-step and
//! group update) around a converged state. Oakes' identity turns this
//! Jacobian into the observed information of the marginal likelihood
//! without a closed-form second derivative.
//!
//! Key behaviors
//! -------------
//! - The free-parameter vector is laid out as: every non-fixed item's free
//!   parameters in item order, then the means of the non-reference groups,
//!   then the sds of the non-reference groups and, for models that
//!   estimate it, the reference group's sd. [`free_parameter_labels`]
//!   returns this layout.
//! - Column `j` is `(M(p + δ e_j) − M(p − δ e_j)) / (2δ)`. Each perturbation
//!   starts from a fresh copy of the converged state.
//! - Perturbations run one after another; the M-step inside each cycle is
//!   parallel over items.
//!
//! Invariants & assumptions
//! ------------------------
//! - The Jacobian is not symmetric in general.
//! - Inner item optimizers use a tighter gradient tolerance than the EM run
//!   so solution error stays small relative to `δ`.
use crate::{
    irt::{
        core::{
            data::ResponseData, groups::GroupDistribution, options::EmOptions,
            quadrature::QuadratureGrid,
        },
        em::em_cycle,
        errors::{IrtError, IrtResult},
        models::ItemModel,
    },
    optimization::loglik_optimizer::{LineSearcher, MLEOptions, Tolerances},
};
use ndarray::{Array1, Array2};

/// Default finite-difference step.
pub const DEFAULT_DELTA: f64 = 1e-5;

/// Options of the Oakes Jacobian.
///
/// Default: `delta = 1e-5`; inner optimizers with `tol_grad = 1e-10` and
/// `max_iter = 500`.
#[derive(Debug, Clone, PartialEq)]
pub struct OakesOptions {
    pub delta: f64,
    pub mle_opts: MLEOptions,
}

impl OakesOptions {
    /// # Errors
    /// - `IrtError::InvalidOption` when `delta` is not finite and positive.
    pub fn new(delta: f64, mle_opts: MLEOptions) -> IrtResult<Self> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(IrtError::InvalidOption {
                name: "delta",
                value: delta,
                reason: "Finite-difference step must be finite and positive.",
            });
        }
        Ok(Self { delta, mle_opts })
    }
}

impl Default for OakesOptions {
    fn default() -> Self {
        Self {
            delta: DEFAULT_DELTA,
            mle_opts: MLEOptions {
                tols: Tolerances { tol_grad: Some(1e-10), tol_cost: None, max_iter: Some(500) },
                line_searcher: LineSearcher::MoreThuente,
                lbfgs_mem: None,
            },
        }
    }
}

/// Identity of one free parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamLabel {
    /// `index`-th free parameter of `item` (2PL: 0 slope, 1 location; NRM:
    /// intercept of category `index + 1`).
    Item { item: usize, index: usize },
    GroupMean(usize),
    GroupSd(usize),
}

/// Jacobian of the EM map with its row/column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct OakesJacobian {
    pub jacobian: Array2<f64>,
    pub labels: Vec<ParamLabel>,
}

/// Free parameters of a state, in Jacobian order.
pub fn free_parameter_labels<M: ItemModel>(
    model: &M, items: &[M::Item], n_groups: usize, options: &EmOptions,
) -> Vec<ParamLabel> {
    let mut labels = Vec::new();
    for (i, item) in items.iter().enumerate() {
        if options.is_fixed(i) {
            continue;
        }
        let n = model.free_params(item).len();
        labels.extend((0..n).map(|index| ParamLabel::Item { item: i, index }));
    }
    let reference = options.reference_group;
    labels.extend((0..n_groups).filter(|&g| Some(g) != reference).map(ParamLabel::GroupMean));
    let sd_free = model.policy().reference_sd_free;
    labels.extend(
        (0..n_groups).filter(|&g| sd_free || Some(g) != reference).map(ParamLabel::GroupSd),
    );
    labels
}

fn pack<M: ItemModel>(
    model: &M, items: &[M::Item], groups: &[GroupDistribution], labels: &[ParamLabel],
) -> Array1<f64> {
    let item_params: Vec<Vec<f64>> = items.iter().map(|it| model.free_params(it)).collect();
    labels
        .iter()
        .map(|label| match *label {
            ParamLabel::Item { item, index } => item_params[item][index],
            ParamLabel::GroupMean(g) => groups[g].mean,
            ParamLabel::GroupSd(g) => groups[g].sd,
        })
        .collect()
}

/// Copy of the state with one labelled parameter shifted by `step`.
fn perturb<M: ItemModel>(
    model: &M, items: &[M::Item], groups: &[GroupDistribution], label: ParamLabel, step: f64,
) -> (Vec<M::Item>, Vec<GroupDistribution>) {
    let mut items = items.to_vec();
    let mut groups = groups.to_vec();
    match label {
        ParamLabel::Item { item, index } => {
            let mut params = model.free_params(&items[item]);
            params[index] += step;
            items[item] = model.with_free_params(&items[item], &params);
        }
        ParamLabel::GroupMean(g) => groups[g].mean += step,
        ParamLabel::GroupSd(g) => groups[g].sd += step,
    }
    (items, groups)
}

/// Central-difference Jacobian of one EM cycle at `items`/`groups`.
///
/// Parameters
/// ----------
/// - `model`, `grid`, `data`: as for the EM run.
/// - `items`, `groups`: converged state; not modified.
/// - `em_options`: reference group and fixed-item mask of the EM run; its
///   optimizer options are replaced by `oakes.mle_opts`.
/// - `oakes`: [`OakesOptions`].
///
/// Errors
/// ------
/// - `IrtError::LengthMismatch` for inconsistent state dimensions.
/// - Any numerical error raised by a perturbed cycle.
pub fn oakes_jacobian<M: ItemModel>(
    model: &M, items: &[M::Item], groups: &[GroupDistribution], grid: &QuadratureGrid,
    data: &ResponseData, em_options: &EmOptions, oakes: &OakesOptions,
) -> IrtResult<OakesJacobian> {
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
    em_options.check_dims(data.n_items(), data.n_groups())?;

    let options = EmOptions { mle_opts: oakes.mle_opts.clone(), ..em_options.clone() };
    let labels = free_parameter_labels(model, items, data.n_groups(), &options);
    let n = labels.len();
    let delta = oakes.delta;
    let mut jacobian = Array2::zeros((n, n));

    let mapped = |step: f64, label: ParamLabel| -> IrtResult<Array1<f64>> {
        let (items, groups) = perturb(model, items, groups, label, step);
        let cycle = em_cycle(model, &items, &groups, grid, data, &options)?;
        if cycle.nonconverged > 0 {
            let n = cycle.nonconverged;
            log::debug!("Oakes {label:?} {step:+e}: {n} items hit their budget");
        }
        Ok(pack(model, &cycle.items, &cycle.groups, &labels))
    };

    for (j, &label) in labels.iter().enumerate() {
        let plus = mapped(delta, label)?;
        let minus = mapped(-delta, label)?;
        let column = (plus - minus) / (2.0 * delta);
        log::debug!(
            "Oakes column {j} ({label:?}): max |∂M| = {:.3e}",
            column.iter().fold(0.0_f64, |m, v| m.max(v.abs()))
        );
        jacobian.column_mut(j).assign(&column);
    }
    Ok(OakesJacobian { jacobian, labels })
}

//! E-step: per-person posteriors on the grid and the sufficient statistics
//! they imply.
//!
//! Purpose
//! -------
//! For every person, multiply the group prior by the trace column of each
//! observed response, normalize, and fold the posterior into a
//! [`SufficientStats`] accumulator. Persons are independent given the
//! current parameters, so they are processed in parallel with rayon and
//! the partial accumulators are combined with [`SufficientStats::merge`].
//!
//! Key behaviors
//! -------------
//! - Trace matrices and group priors are computed once per call and shared
//!   read-only by all workers.
//! - Long response vectors are rescaled whenever the running maximum gets
//!   small; the log of each rescaling is added back to the person's
//!   marginal log-likelihood.
//! - A person whose unnormalized posterior mass is zero or non-finite
//!   aborts the E-step with `IrtError::DegeneratePosterior`.
//!
//! Conventions
//! -------------
//! - Posterior means `θ̄_p` are returned in person order regardless of the
//!   parallel schedule.
use crate::irt::{
    core::{
        data::ResponseData, groups::GroupDistribution, quadrature::QuadratureGrid,
        quadrature::group_priors, stats::SufficientStats,
    },
    errors::{IrtError, IrtResult},
    models::ItemModel,
};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

/// Running posterior maxima below this value trigger a rescale.
const RESCALE_THRESHOLD: f64 = 1e-200;

/// Statistics of one E-step plus the person posterior means.
#[derive(Debug, Clone, PartialEq)]
pub struct EStepOutput {
    pub stats: SufficientStats,
    pub theta_bar: Array1<f64>,
}

/// Normalized posterior of one person and its log marginal likelihood.
///
/// Parameters
/// ----------
/// - `person`: index used in the error.
/// - `prior`: the person's group prior on the grid.
/// - `traces`: per-item `grid × category` probabilities.
/// - `items`, `categories`: the person's observed responses.
///
/// Errors
/// ------
/// - `IrtError::DegeneratePosterior` when the product of prior and
///   likelihood has no positive finite mass.
pub fn person_posterior(
    person: usize, prior: ArrayView1<'_, f64>, traces: &[Array2<f64>], items: &[usize],
    categories: &[usize],
) -> IrtResult<(Array1<f64>, f64)> {
    let mut post = prior.to_owned();
    let mut log_scale = 0.0;
    for (&item, &category) in items.iter().zip(categories) {
        post *= &traces[item].column(category);
        let peak = post.fold(0.0_f64, |m, &v| m.max(v));
        if peak > 0.0 && peak < RESCALE_THRESHOLD {
            post /= peak;
            log_scale += peak.ln();
        }
    }
    let mass = post.sum();
    if !(mass > 0.0 && mass.is_finite()) {
        return Err(IrtError::DegeneratePosterior { person, mass });
    }
    post /= mass;
    Ok((post, mass.ln() + log_scale))
}

/// Run one E-step at the given item and group parameters.
///
/// # Errors
/// - `IrtError::InvalidSd` when a group distribution is invalid.
/// - `IrtError::DegeneratePosterior` for the first degenerate person found.
pub fn estep<M: ItemModel>(
    model: &M, items: &[M::Item], groups: &[GroupDistribution], grid: &QuadratureGrid,
    data: &ResponseData,
) -> IrtResult<EStepOutput> {
    let ctx = model.context(items, grid);
    let traces: Vec<Array2<f64>> = items.par_iter().map(|it| model.trace(it, grid, &ctx)).collect();
    let n_categories: Vec<usize> = items.iter().map(|it| model.n_categories(it)).collect();
    let params: Vec<(f64, f64)> = groups.iter().map(|g| (g.mean, g.sd)).collect();
    let priors = group_priors(&params, grid)?;
    let nodes = grid.nodes();

    let empty = || {
        (SufficientStats::zeros(&n_categories, grid.len(), data.n_groups()), Vec::new())
    };
    let (stats, means) = (0..data.n_persons())
        .into_par_iter()
        .try_fold(empty, |(mut stats, mut means), person| {
            let group = data.group_of(person);
            let (items, categories) = data.responses(person);
            let (post, log_mass) =
                person_posterior(person, priors.column(group), &traces, items, categories)?;
            let theta_bar = post.dot(nodes);
            stats.add_person(post.view(), group, items, categories, theta_bar, log_mass);
            means.push((person, theta_bar));
            Ok::<_, IrtError>((stats, means))
        })
        .try_reduce(empty, |(a, mut ma), (b, mb)| {
            ma.extend(mb);
            Ok((a.merge(b), ma))
        })?;

    let mut theta_bar = Array1::zeros(data.n_persons());
    for (person, value) in means {
        theta_bar[person] = value;
    }
    Ok(EStepOutput { stats, theta_bar })
}

/// Marginal log-likelihood `Σ_p ln Σ_t π_g(p)(t) Π_i P_i(x_pi | θ_t)`.
///
/// # Errors
/// Same as [`estep`].
pub fn marginal_log_likelihood<M: ItemModel>(
    model: &M, items: &[M::Item], groups: &[GroupDistribution], grid: &QuadratureGrid,
    data: &ResponseData,
) -> IrtResult<f64> {
    Ok(estep(model, items, groups, grid, data)?.stats.log_likelihood)
}

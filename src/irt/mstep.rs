//! M-step: independent per-item calibration from expected counts.
//!
//! Items share nothing once the E-step has produced their count matrices,
//! so they are optimized in parallel. Fixed items are copied through
//! untouched and contribute no change.
use crate::irt::{
    core::{options::EmOptions, quadrature::QuadratureGrid, stats::SufficientStats},
    errors::IrtResult,
    models::{ItemFit, ItemModel},
};
use rayon::prelude::*;

/// Result of one M-step.
#[derive(Debug, Clone, PartialEq)]
pub struct MStepOutcome<I> {
    pub items: Vec<I>,
    /// Largest absolute free-parameter change over all items.
    pub max_change: f64,
    /// Number of items whose optimizer ran out of iterations.
    pub nonconverged: usize,
}

/// Calibrate every non-fixed item against its expected counts.
///
/// # Errors
/// The error of the lowest-indexed failing item.
pub fn mstep<M: ItemModel>(
    model: &M, items: &[M::Item], stats: &SufficientStats, grid: &QuadratureGrid,
    options: &EmOptions,
) -> IrtResult<MStepOutcome<M::Item>> {
    let fits = items
        .par_iter()
        .enumerate()
        .map(|(i, item)| {
            if options.is_fixed(i) {
                return Ok(ItemFit { item: item.clone(), max_change: 0.0, converged: true });
            }
            model.optimize(i, item, stats.counts[i].view(), grid, &options.mle_opts)
        })
        .collect::<IrtResult<Vec<_>>>()?;

    let max_change = fits.iter().map(|f| f.max_change).fold(0.0, f64::max);
    let nonconverged = fits.iter().filter(|f| !f.converged).count();
    Ok(MStepOutcome { items: fits.into_iter().map(|f| f.item).collect(), max_change, nonconverged })
}

//! Latent-trait group distributions and their closed-form update.
//!
//! Purpose
//! -------
//! Recompute each group's normal mean and sd from the E-step's summed
//! posterior means and second moments, pinning the reference group for
//! identification.
//!
//! Key behaviors
//! -------------
//! - Non-reference groups: `mean = Σθ̄ / n`, `sd = sqrt(Σθ² / n − mean²)`.
//! - Reference group under [`ReferencePolicy::MeanAndSd`]: `(0, 1)`.
//! - Reference group under [`ReferencePolicy::MeanOnly`]: mean 0 and
//!   `sd = sqrt(Σθ² / n)`.
//! - A non-positive or non-finite variance is reported as
//!   `IrtError::DegenerateVariance`; it is never clamped.
use crate::irt::{
    core::stats::SufficientStats,
    errors::{IrtError, IrtResult},
};
use ndarray::Array1;

/// Normal latent-trait distribution of one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupDistribution {
    pub mean: f64,
    pub sd: f64,
}

impl GroupDistribution {
    pub fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd }
    }

    pub fn standard() -> Self {
        Self { mean: 0.0, sd: 1.0 }
    }
}

/// How the reference group anchors the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Mean and sd fixed at 0 and 1.
    MeanAndSd,
    /// Mean fixed at 0; sd estimated from the second moment.
    MeanOnly,
}

/// Closed-form group update.
///
/// Parameters
/// ----------
/// - `stats`: E-step statistics (`sum_theta` and `group_mass`).
/// - `sizes`: persons per group; all strictly positive.
/// - `nodes`: grid nodes used for the second moments.
/// - `reference`: index of the reference group, or `None` to estimate all.
/// - `policy`: treatment of the reference group.
///
/// Errors
/// ------
/// - `IrtError::DegenerateVariance` for the first group whose variance is not
///   strictly positive and finite.
pub fn update_groups(
    stats: &SufficientStats, sizes: &[usize], nodes: &Array1<f64>, reference: Option<usize>,
    policy: ReferencePolicy,
) -> IrtResult<Vec<GroupDistribution>> {
    let second = stats.second_moments(nodes);
    let mut out = Vec::with_capacity(sizes.len());
    for (g, &n) in sizes.iter().enumerate() {
        let n = n as f64;
        let is_reference = reference == Some(g);
        let (mean, variance) = match (is_reference, policy) {
            (true, ReferencePolicy::MeanAndSd) => {
                out.push(GroupDistribution::standard());
                continue;
            }
            (true, ReferencePolicy::MeanOnly) => (0.0, second[g] / n),
            (false, _) => {
                let mean = stats.sum_theta[g] / n;
                (mean, second[g] / n - mean * mean)
            }
        };
        if !(variance > 0.0 && variance.is_finite()) {
            return Err(IrtError::DegenerateVariance { group: g, variance });
        }
        out.push(GroupDistribution { mean, sd: variance.sqrt() });
    }
    Ok(out)
}

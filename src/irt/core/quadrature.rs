//! Quadrature grid and per-group normal priors over it.
//!
//! Purpose
//! -------
//! Discretize the latent trait on a fixed, equally spaced grid and turn a
//! group's `Normal(mean, sd)` distribution into a probability mass function
//! over that grid by the midpoint rule.
//!
//! Key behaviors
//! -------------
//! - [`QuadratureGrid::new`] validates a user grid; [`QuadratureGrid::linspace`]
//!   builds one.
//! - [`group_prior`] integrates the normal density over `[node − h, node + h]`
//!   with `h` half the grid step, then renormalizes so the mass sums to one
//!   (tail mass beyond the grid is redistributed).
//!
//! Invariants & assumptions
//! ------------------------
//! - At least two nodes, strictly increasing and equally spaced (relative
//!   tolerance `1e-8` of the step).
//! - Priors are only defined for finite means and finite, positive sds.
use crate::irt::errors::{IrtError, IrtResult};
use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};

const SPACING_RTOL: f64 = 1e-8;

/// Equally spaced latent-trait nodes shared by all items, groups and persons.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureGrid {
    nodes: Array1<f64>,
    half_step: f64,
}

impl QuadratureGrid {
    /// Validate and wrap a grid.
    ///
    /// # Errors
    /// - `IrtError::InvalidGrid` when there are fewer than two nodes, a node
    ///   is non-finite, or the spacing is not constant and positive.
    pub fn new(nodes: Array1<f64>) -> IrtResult<Self> {
        if nodes.len() < 2 {
            return Err(IrtError::InvalidGrid { reason: "At least two nodes are required." });
        }
        if nodes.iter().any(|x| !x.is_finite()) {
            return Err(IrtError::InvalidGrid { reason: "Nodes must be finite." });
        }
        let step = nodes[1] - nodes[0];
        if step <= 0.0 {
            return Err(IrtError::InvalidGrid { reason: "Nodes must be strictly increasing." });
        }
        for w in nodes.windows(2) {
            let d = w[1] - w[0];
            if (d - step).abs() > SPACING_RTOL * step.max(1.0) {
                return Err(IrtError::InvalidGrid { reason: "Nodes must be equally spaced." });
            }
        }
        Ok(Self { nodes, half_step: step / 2.0 })
    }

    /// `n` equally spaced nodes from `lower` to `upper` inclusive.
    ///
    /// # Errors
    /// Same as [`QuadratureGrid::new`].
    pub fn linspace(lower: f64, upper: f64, n: usize) -> IrtResult<Self> {
        Self::new(Array1::linspace(lower, upper, n))
    }

    pub fn nodes(&self) -> &Array1<f64> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn half_step(&self) -> f64 {
        self.half_step
    }
}

/// Probability mass of `Normal(mean, sd)` on each grid node.
///
/// Parameters
/// ----------
/// - `mean`, `sd`: `f64`
///   Group distribution; `sd` must be finite and strictly positive.
/// - `grid`: `&QuadratureGrid`
///
/// Returns
/// -------
/// `IrtResult<Array1<f64>>`
///   Non-negative weights of length `grid.len()` summing to one.
///
/// Errors
/// ------
/// - `IrtError::InvalidSd` for a non-finite mean or an sd that is not finite
///   and positive.
/// - `IrtError::InvalidGrid` if the distribution puts no representable mass
///   on the grid.
pub fn group_prior(mean: f64, sd: f64, grid: &QuadratureGrid) -> IrtResult<Array1<f64>> {
    let invalid = || IrtError::InvalidSd { group: None, mean, sd };
    if !mean.is_finite() || !sd.is_finite() || sd <= 0.0 {
        return Err(invalid());
    }
    let normal = Normal::new(mean, sd).map_err(|_| invalid())?;
    let h = grid.half_step();
    let mut mass = grid.nodes().mapv(|x| normal.cdf(x + h) - normal.cdf(x - h));
    let total = mass.sum();
    if !(total > 0.0 && total.is_finite()) {
        return Err(IrtError::InvalidGrid { reason: "Prior places no mass on the grid." });
    }
    mass /= total;
    Ok(mass)
}

/// Priors for every group as a `grid × group` matrix.
///
/// # Errors
/// Same as [`group_prior`], with the offending group attached to
/// `IrtError::InvalidSd`.
pub fn group_priors(params: &[(f64, f64)], grid: &QuadratureGrid) -> IrtResult<Array2<f64>> {
    let mut out = Array2::zeros((grid.len(), params.len()));
    for (g, &(mean, sd)) in params.iter().enumerate() {
        let prior = group_prior(mean, sd, grid).map_err(|e| match e {
            IrtError::InvalidSd { mean, sd, .. } => {
                IrtError::InvalidSd { group: Some(g), mean, sd }
            }
            other => other,
        })?;
        out.column_mut(g).assign(&prior);
    }
    Ok(out)
}

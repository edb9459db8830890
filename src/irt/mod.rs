//! irt — marginal maximum likelihood EM for item response models.
//!
//! Purpose
//! -------
//! Estimate item parameters and normal latent-trait group distributions from
//! sparse categorical responses with the Bock–Aitkin EM algorithm on a
//! fixed quadrature grid.
//!
//! Key behaviors
//! -------------
//! - [`core`]: validated response store, quadrature grid and normal group
//!   priors, sufficient statistics, group update and options.
//! - [`models`]: the [`ItemModel`] capability with the 2PL and nominal
//!   response variants.
//! - [`estep`]: parallel per-person posteriors reduced into sufficient
//!   statistics.
//! - [`mstep`]: parallel per-item calibration from expected counts.
//! - [`em`]: the driver, [`IrtEstimator`], with named stopping rules and
//!   stop reasons.
//! - [`errors`]: [`IrtError`] and its [`ErrorKind`] classification.
//!
//! Conventions
//! -----------
//! - Persons, items, categories and groups are 0-based.
//! - The latent trait is discretized once; grids never change during a run.
//!
//! Downstream usage
//! ----------------
//! - Build a [`ResponseData`] and a [`QuadratureGrid`], pick a model and an
//!   [`EmOptions`], then call [`IrtEstimator::fit`] with starting values.
//! - Feed the converged state to [`crate::inference`] for the Oakes
//!   Jacobian or standard errors.

pub mod core;
pub mod em;
pub mod errors;
pub mod estep;
pub mod models;
pub mod mstep;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::core::{
    EmOptions, GroupDistribution, QuadratureGrid, ReferencePolicy, ResponseData, StoppingRule,
    SufficientStats,
};
pub use self::em::{EmOutcome, IrtEstimator, StopReason, em_cycle};
pub use self::errors::{ErrorKind, IrtError, IrtResult};
pub use self::estep::{EStepOutput, estep, marginal_log_likelihood};
pub use self::models::{ItemModel, Nominal, NominalItem, TwoPl, TwoPlItem};
pub use self::mstep::{MStepOutcome, mstep};

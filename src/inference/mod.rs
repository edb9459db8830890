//! inference — post-estimation uncertainty for fitted IRT models.
//!
//! Purpose
//! -------
//! Provide the tools that run after EM has converged: the Jacobian of the
//! EM map by central differences (Oakes' method), analytic item
//! information, and standard errors from an information matrix.
//!
//! Key behaviors
//! -------------
//! - [`oakes_jacobian`] perturbs every free parameter by ±δ on a fresh copy
//!   of the converged state, runs one EM cycle for each, and assembles the
//!   columns `(M(p + δ) − M(p − δ)) / (2δ)` together with a
//!   [`ParamLabel`] per row.
//! - [`item_information`] stacks the analytic item information blocks at
//!   the E-step counts of the supplied state.
//! - [`standard_errors`] inverts a symmetric information matrix with an
//!   eigen-truncated pseudoinverse.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are the parameter state returned by
//!   [`IrtEstimator`](crate::irt::em::IrtEstimator); nothing here mutates it.
//! - The Oakes Jacobian is not symmetric and is returned as computed.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the parameter layout, perturbation bookkeeping,
//!   block structure and pseudoinverse truncation.
//! - The δ-halving stability check lives in the integration tests.

pub mod hessian;
pub mod oakes;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::hessian::{item_information, standard_errors};
pub use self::oakes::{
    OakesJacobian, OakesOptions, ParamLabel, free_parameter_labels, oakes_jacobian,
};

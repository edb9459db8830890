//! rust_irt — EM estimation for 2PL and nominal response IRT models.
//!
//! Purpose
//! -------
//! Fit dichotomous two-parameter logistic and polytomous nominal response
//! models to sparse response data from one or more groups by marginal
//! maximum likelihood, and recover the information needed for standard
//! errors.
//!
//! Key behaviors
//! -------------
//! - [`irt`]: data, quadrature, item models, E-step, M-step, group update
//!   and the EM driver.
//! - [`inference`]: Oakes Jacobian of the EM map, item information and
//!   standard errors.
//! - [`optimization`]: argmin-backed maximizers and root finding used by
//!   the item calibrations, plus numerically stable transforms.
//!
//! Invariants & assumptions
//! ------------------------
//! - Input validation happens before any iteration and is reported as
//!   `Err`; numerical failures while iterating are reported as a stop reason
//!   together with the last completed state.
//! - The library logs through the `log` facade and installs no logger.
//!
//! Testing notes
//! -------------
//! - Unit tests live next to the code in each module.
//! - `tests/integration_em_pipeline.rs` runs end-to-end fits on small
//!   synthetic datasets for both models and checks the Oakes Jacobian.

pub mod inference;
pub mod irt;
pub mod optimization;

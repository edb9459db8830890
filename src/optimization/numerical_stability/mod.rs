//! numerical_stability — overflow-safe scalar transforms and shared tolerances.
//!
//! Purpose
//! -------
//! Collect the numerically stable scalar transforms used by item trace
//! lines and item objectives, and the eigenvalue cutoff shared by the
//! information-matrix code.
//!
//! Conventions
//! -----------
//! - Pure functions on `f64`; no logging, I/O or global state, so they are
//!   safe inside the E-step and M-step inner loops.
//! - Inputs are assumed finite; domain validation happens upstream.
//!
//! Testing notes
//! -------------
//! - Unit tests in [`transformations`] compare against naïve formulas on
//!   safe grids and check tail behavior.

pub mod transformations;

pub use self::transformations::{EIGEN_EPS, log_logistic, safe_logistic, safe_softplus};

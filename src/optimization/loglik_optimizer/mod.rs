//! loglik_optimizer — argmin-powered optimizers for item calibration.
//!
//! Purpose
//! -------
//! Provide a thin, Argmin-backed optimization layer for **maximizing
//! log-likelihoods** `ℓ(θ)`. Item models implement a single trait,
//! [`LogLikelihood`], and call one of the entry points in [`api`].
//!
//! Key behaviors
//! -------------
//! - Convert log-likelihoods `ℓ(θ)` into Argmin-compatible cost functions
//!   `c(θ) = -ℓ(θ)` via [`adapter::ArgMinAdapter`].
//! - Offer three entry points: [`maximize`] (L-BFGS), [`maximize_dfp`]
//!   (DFP seeded with an inverse Hessian) and [`find_root`] (Brent's method
//!   on a bracketed scalar derivative).
//! - Centralize optimizer configuration ([`Tolerances`], [`MLEOptions`]) and
//!   validation logic ([`validation`]) so downstream code can assume sane,
//!   finite inputs.
//!
//! Invariants & assumptions
//! ------------------------
//! - Implementors supply analytic gradients; there is no finite-difference
//!   fallback.
//! - [`LogLikelihood::value`] and [`LogLikelihood::grad`] treat invalid
//!   inputs as recoverable [`OptError`](crate::optimization::errors::OptError)
//!   values, not panics.
//!
//! Conventions
//! -----------
//! - Cost is always `c(θ) = -ℓ(θ)` internally; [`OptimOutcome::value`] is
//!   expressed in terms of `ℓ`.
//! - Inverse Hessians handed to [`maximize_dfp`] are for the cost, i.e. the
//!   inverse of `-∇²ℓ`.
//!
//! Testing notes
//! -------------
//! - Unit tests in submodules cover sign conventions in [`adapter`], solver
//!   construction in [`builders`], full solves on toy quadratics in [`run`],
//!   and configuration invariants in [`traits`] and [`validation`].

pub mod adapter;
pub mod api;
pub mod builders;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::{find_root, maximize, maximize_dfp};
pub use self::run::RootOutcome;
pub use self::traits::{LineSearcher, LogLikelihood, MLEOptions, OptimOutcome, Tolerances};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Theta};

//! optimization — MLE stack, numerical helpers, and unified error surface.
//!
//! Purpose
//! -------
//! Provide the optimization layer used by item calibration: an Argmin-backed
//! log-likelihood optimizer, numerically stable transforms, and a single
//! error/result surface. Callers implement a log-likelihood, choose
//! tolerances, and obtain fitted parameters and diagnostics without touching
//! backend solver details.
//!
//! Key behaviors
//! -------------
//! - Expose high-level entry points for **maximizing log-likelihoods**
//!   `ℓ(θ)` and for scalar root finding (`loglik_optimizer`).
//! - Supply shared numerical primitives (`numerical_stability`).
//! - Normalize configuration issues, numerical failures, and backend solver
//!   errors into a single enum (`errors::OptError`) with a common result
//!   alias (`OptResult<T>`).
//!
//! Conventions
//! -----------
//! - All solvers conceptually maximize `ℓ(θ)` by minimizing `c(θ) = -ℓ(θ)`;
//!   user-facing outcomes are expressed in terms of `ℓ`.
//! - Public entry points that can fail return `OptResult<T>`; callers never
//!   see raw Argmin errors.
//! - This layer does not log; the EM driver reports progress.
//!
//! Downstream usage
//! ----------------
//! - Item models implement `LogLikelihood` for their per-item objectives and
//!   call `maximize`, `maximize_dfp` or `find_root`.
//! - The M-step maps `OptError` into `IrtError` at the item boundary.

pub mod errors;
pub mod loglik_optimizer;
pub mod numerical_stability;

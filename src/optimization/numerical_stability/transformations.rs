//! Numerical stability utilities.
//!
//! Provides safe implementations of the logistic family of transforms that
//! are prone to overflow/underflow in naïve form, plus the shared eigenvalue
//! cutoff used when pseudo-inverting information matrices.
//!
//! # Provided items
//! - [`EIGEN_EPS`]: eigenvalues at or below this value are treated as zero.
//! - [`safe_softplus(x)`]: stable `ln(1 + exp(x))`.
//! - [`safe_logistic(x)`]: stable `1 / (1 + exp(-x))`.
//! - [`log_logistic(x)`]: stable `ln(1 / (1 + exp(-x)))`.

/// Eigenvalue cutoff for symmetric pseudo-inverses.
pub const EIGEN_EPS: f64 = 1e-10;

/// Numerically stable softplus: `softplus(x) = ln(1 + exp(x))`.
///
/// - For sufficiently large `x`, `softplus(x) ≈ x`.
/// - Otherwise, it falls back to `ln1p(exp(x))`.
///
/// The cutoff (`x > 20.0`) keeps the calculation in a well-conditioned
/// regime for `f64`.
pub fn safe_softplus(x: f64) -> f64 {
    if x > 20.0 { x } else { x.exp().ln_1p() }
}

/// Numerically stable logistic function.
///
/// Evaluates `exp(x) / (1 + exp(x))` for negative inputs and
/// `1 / (1 + exp(-x))` otherwise, so the exponential never overflows.
/// Saturates to exactly `0.0` or `1.0` in the far tails.
pub fn safe_logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln σ(x) = -softplus(-x)`, finite for every finite `x`.
pub fn log_logistic(x: f64) -> f64 {
    -safe_softplus(-x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // Stable transforms agree with the naïve formulas on a safe grid.
    //
    // Given
    // -----
    // - x in {-10, -1.5, 0, 0.3, 7}.
    //
    // Expect
    // ------
    // - softplus, logistic and log-logistic match their textbook forms.
    fn stable_transforms_match_naive_formulas_on_safe_grid() {
        for &x in &[-10.0_f64, -1.5, 0.0, 0.3, 7.0] {
            let naive_logistic = 1.0 / (1.0 + (-x).exp());
            assert_relative_eq!(safe_softplus(x), (1.0 + x.exp()).ln(), max_relative = 1e-12);
            assert_relative_eq!(safe_logistic(x), naive_logistic, max_relative = 1e-12);
            assert_relative_eq!(log_logistic(x), naive_logistic.ln(), max_relative = 1e-12);
        }
    }

    #[test]
    // Purpose
    // -------
    // Tails stay finite: the logistic saturates and its log stays linear.
    fn tails_are_finite() {
        assert_eq!(safe_logistic(800.0), 1.0);
        assert_eq!(safe_logistic(-800.0), 0.0);
        assert_relative_eq!(log_logistic(-800.0), -800.0, max_relative = 1e-12);
        assert_eq!(log_logistic(800.0), 0.0);
    }
}

//! inference::hessian — item information and standard errors.
//!
//! Purpose
//! -------
//! Turn analytic item Hessians into an information matrix over the free item
//! parameters, and convert any symmetric information matrix into standard
//! errors through an eigen-based pseudoinverse.
//!
//! Key behaviors
//! -------------
//! - [`item_information`] runs one E-step at the supplied parameters and
//!   stacks each free item's analytic information block on the diagonal.
//!   Items are conditionally independent given the expected counts, so the
//!   off-diagonal item blocks are zero.
//! - [`standard_errors`] copies an `ndarray` matrix into a
//!   `nalgebra::DMatrix`, eigendecomposes it and returns the square roots of
//!   the diagonal of its Moore–Penrose pseudoinverse.
//!
//! Invariants & assumptions
//! ------------------------
//! - Information matrices are treated as symmetric.
//! - Eigenvalues at or below [`EIGEN_EPS`] are dropped from the
//!   pseudoinverse, which inflates standard errors along weakly identified
//!   directions instead of failing.
//!
//! Conventions
//! -----------
//! - Information is on the summed (not averaged) log-likelihood scale, so
//!   the standard errors are directly those of the estimates.
//! - Rows and columns follow the item part of
//!   [`free_parameter_labels`](crate::inference::oakes::free_parameter_labels).
use crate::{
    inference::oakes::{ParamLabel, free_parameter_labels},
    irt::{
        core::{
            data::ResponseData, groups::GroupDistribution, options::EmOptions,
            quadrature::QuadratureGrid,
        },
        errors::IrtResult,
        estep::estep,
        models::ItemModel,
    },
    optimization::numerical_stability::EIGEN_EPS,
};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, s};

/// Block-diagonal information of the free item parameters.
///
/// Parameters
/// ----------
/// - `model`, `grid`, `data`: as for the EM run.
/// - `items`, `groups`: parameter state, usually the EM estimates.
/// - `options`: supplies the fixed-item mask.
///
/// Returns
/// -------
/// `IrtResult<(Array2<f64>, Vec<ParamLabel>)>`
///   The `p × p` information matrix and the label of each row.
///
/// Errors
/// ------
/// - Any error raised by the E-step at the supplied parameters.
pub fn item_information<M: ItemModel>(
    model: &M, items: &[M::Item], groups: &[GroupDistribution], grid: &QuadratureGrid,
    data: &ResponseData, options: &EmOptions,
) -> IrtResult<(Array2<f64>, Vec<ParamLabel>)> {
    let stats = estep(model, items, groups, grid, data)?.stats;
    // No groups: only the item labels.
    let labels = free_parameter_labels(model, items, 0, options);
    let mut info = Array2::zeros((labels.len(), labels.len()));
    let mut offset = 0;
    for (i, item) in items.iter().enumerate() {
        if options.is_fixed(i) {
            continue;
        }
        let block = model.information(item, stats.counts[i].view(), grid);
        let n = block.nrows();
        info.slice_mut(s![offset..offset + n, offset..offset + n]).assign(&block);
        offset += n;
    }
    Ok((info, labels))
}

/// Standard errors `sqrt(diag(J⁺))` of a symmetric information matrix `J`.
pub fn standard_errors(info: &Array2<f64>) -> Array1<f64> {
    let mut info_nalg = DMatrix::<f64>::zeros(info.nrows(), info.ncols());
    fill_dmatrix(info, &mut info_nalg);
    solve_for_se(info_nalg, info.nrows())
}

// ---- Helper methods ----

/// Copy a square symmetric `ndarray` matrix into a preallocated `DMatrix`,
/// column by column.
fn fill_dmatrix(info: &Array2<f64>, info_nalg: &mut DMatrix<f64>) {
    let n = info.ncols();
    for j in 0..n {
        for i in j..n {
            info_nalg[(i, j)] = info[[i, j]];
            info_nalg[(j, i)] = info[[j, i]];
        }
    }
}

/// Classical standard errors from a symmetric information matrix.
///
/// Notes
/// -----
/// - With `J = Q Λ Qᵀ`, `Var(θ̂_i) = Σ_{k: λ_k > EIGEN_EPS} Q[i,k]² / λ_k`.
fn solve_for_se(info_nalg: DMatrix<f64>, n: usize) -> Array1<f64> {
    let eigen = info_nalg.symmetric_eigen();
    let q = eigen.eigenvectors;
    let mut se = Array1::<f64>::zeros(n);
    for i in 0..n {
        let var: f64 = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|(_, lambda)| **lambda > EIGEN_EPS)
            .map(|(k, &lambda)| q[(i, k)] * q[(i, k)] / lambda)
            .sum();
        se[i] = var.sqrt();
    }
    se
}

//! Errors for item response estimation (input validation, numerical failure
//! during EM, and optimizer failures surfaced from item calibration).
//!
//! This module defines [`IrtError`] and a coarse classification,
//! [`ErrorKind`], used by the EM driver to decide how a failure is reported.
//!
//! ## Conventions
//! - **Indices are 0-based** for items, persons, groups and categories.
//! - Validation errors are returned before any iteration starts; numerical
//!   errors raised while iterating end the run with
//!   `StopReason::NumericalFailure` and the last completed state.
use crate::optimization::errors::OptError;

/// Result alias for item response operations that may produce [`IrtError`].
pub type IrtResult<T> = Result<T, IrtError>;

/// Coarse failure taxonomy used for reporting and stop codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A probability or likelihood term became non-finite or vanished.
    NumericalOverflow,
    /// Item optimizers exhausted their iteration budget.
    OptimizerNonConvergence,
    /// The marginal log-likelihood decreased between iterations.
    LikelihoodRegression,
    /// A group's second moment fell below its squared mean.
    DegenerateVariance,
    /// Shapes, ranges or options are inconsistent.
    InvalidInput,
    /// Backend optimizer failure that is not a numerical overflow.
    Optimizer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrtError {
    // ---- Quadrature ----
    /// Grid must have at least two strictly increasing, equally spaced nodes.
    InvalidGrid { reason: &'static str },

    /// A normal prior needs a finite mean and a finite, positive sd.
    InvalidSd { group: Option<usize>, mean: f64, sd: f64 },

    // ---- Response data ----
    /// Parallel arrays have different lengths.
    LengthMismatch { what: &'static str, expected: usize, found: usize },

    /// Person offsets must start at 0, be non-decreasing and end at the
    /// number of responses.
    PersonRangeInvalid { person: usize, reason: &'static str },

    /// A response references an item that does not exist.
    ItemIndexOutOfRange { response: usize, item: usize, n_items: usize },

    /// A response category is not valid for its item.
    CategoryOutOfRange { response: usize, item: usize, category: usize, n_categories: usize },

    /// A person carries a group label that does not exist.
    GroupOutOfRange { person: usize, group: usize, n_groups: usize },

    /// A group has no persons, so its distribution cannot be updated.
    EmptyGroup { group: usize },

    /// The reference group index is not a valid group.
    ReferenceGroupOutOfRange { group: usize, n_groups: usize },

    // ---- Item parameters and options ----
    /// Item parameters are malformed.
    InvalidItem { item: usize, reason: &'static str },

    /// An option value is out of its valid range.
    InvalidOption { name: &'static str, value: f64, reason: &'static str },

    // ---- Numerical failure ----
    /// An item's objective, gradient or estimate became non-finite.
    NonFiniteItemObjective { item: usize, source: OptError },

    /// A person's unnormalized posterior mass is zero or non-finite.
    DegeneratePosterior { person: usize, mass: f64 },

    /// Computed variance of a group is negative or non-finite.
    DegenerateVariance { group: usize, variance: f64 },

    /// Item optimizers exhausted their budget on this iteration.
    OptimizerNonConvergence { items: usize },

    /// The marginal log-likelihood decreased.
    LikelihoodRegression { previous: f64, current: f64 },

    // ---- Optimizer ----
    /// The item optimizer failed for a reason other than non-finite values.
    ItemOptimization { item: usize, source: OptError },
}

impl IrtError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IrtError::NonFiniteItemObjective { .. } | IrtError::DegeneratePosterior { .. } => {
                ErrorKind::NumericalOverflow
            }
            IrtError::OptimizerNonConvergence { .. } => ErrorKind::OptimizerNonConvergence,
            IrtError::LikelihoodRegression { .. } => ErrorKind::LikelihoodRegression,
            IrtError::DegenerateVariance { .. } => ErrorKind::DegenerateVariance,
            IrtError::ItemOptimization { .. } => ErrorKind::Optimizer,
            _ => ErrorKind::InvalidInput,
        }
    }

    /// Map an optimizer error raised while calibrating `item`.
    ///
    /// Non-finite objectives, gradients or estimates become
    /// [`IrtError::NonFiniteItemObjective`]; everything else is wrapped in
    /// [`IrtError::ItemOptimization`].
    pub fn from_item_optimizer(item: usize, err: OptError) -> Self {
        if err.is_non_finite() {
            IrtError::NonFiniteItemObjective { item, source: err }
        } else {
            IrtError::ItemOptimization { item, source: err }
        }
    }
}

impl std::error::Error for IrtError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IrtError::ItemOptimization { source, .. }
            | IrtError::NonFiniteItemObjective { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl std::fmt::Display for IrtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Quadrature ----
            IrtError::InvalidGrid { reason } => write!(f, "Invalid quadrature grid: {reason}"),
            IrtError::InvalidSd { group: Some(g), mean, sd } => {
                write!(f, "Invalid normal prior for group {g}: mean {mean}, sd {sd}")
            }
            IrtError::InvalidSd { group: None, mean, sd } => {
                write!(f, "Invalid normal prior: mean {mean}, sd {sd}")
            }

            // ---- Response data ----
            IrtError::LengthMismatch { what, expected, found } => {
                write!(f, "Length mismatch for {what}: expected {expected}, found {found}")
            }
            IrtError::PersonRangeInvalid { person, reason } => {
                write!(f, "Invalid response range for person {person}: {reason}")
            }
            IrtError::ItemIndexOutOfRange { response, item, n_items } => {
                write!(f, "Response {response} references item {item}, but only {n_items} exist")
            }
            IrtError::CategoryOutOfRange { response, item, category, n_categories } => write!(
                f,
                "Response {response} has category {category} for item {item} with \
                 {n_categories} categories"
            ),
            IrtError::GroupOutOfRange { person, group, n_groups } => {
                write!(f, "Person {person} is in group {group}, but only {n_groups} exist")
            }
            IrtError::EmptyGroup { group } => write!(f, "Group {group} has no persons"),
            IrtError::ReferenceGroupOutOfRange { group, n_groups } => {
                write!(f, "Reference group {group} out of range for {n_groups} groups")
            }

            // ---- Item parameters and options ----
            IrtError::InvalidItem { item, reason } => write!(f, "Invalid item {item}: {reason}"),
            IrtError::InvalidOption { name, value, reason } => {
                write!(f, "Invalid option {name} = {value}: {reason}")
            }

            // ---- Numerical failure ----
            IrtError::NonFiniteItemObjective { item, source } => {
                write!(f, "Numerical overflow in objective of item {item}: {source}")
            }
            IrtError::DegeneratePosterior { person, mass } => {
                write!(f, "Posterior mass of person {person} is degenerate: {mass}")
            }
            IrtError::DegenerateVariance { group, variance } => {
                write!(f, "Negative variance {variance} for group {group}")
            }
            IrtError::OptimizerNonConvergence { items } => {
                write!(f, "Item optimizer did not converge for {items} item(s)")
            }
            IrtError::LikelihoodRegression { previous, current } => {
                write!(f, "Marginal log-likelihood decreased from {previous} to {current}")
            }

            // ---- Optimizer ----
            IrtError::ItemOptimization { item, source } => {
                write!(f, "Optimization of item {item} failed: {source}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Optimizer errors are split into numerical overflow versus other
    // backend failures at the item boundary.
    //
    // Given
    // -----
    // - A non-finite cost and a line-search style backend error.
    //
    // Expect
    // ------
    // - The first maps to `NonFiniteItemObjective` (NumericalOverflow), the
    //   second to `ItemOptimization` (Optimizer).
    fn from_item_optimizer_separates_overflow_from_backend_errors() {
        // Arrange
        let overflow = OptError::NonFiniteCost { value: f64::INFINITY };
        let backend = OptError::ConditionViolated { text: "line search".to_string() };

        // Act
        let a = IrtError::from_item_optimizer(3, overflow);
        let b = IrtError::from_item_optimizer(4, backend);

        // Assert
        assert_eq!(
            a,
            IrtError::NonFiniteItemObjective {
                item: 3,
                source: OptError::NonFiniteCost { value: f64::INFINITY }
            }
        );
        assert_eq!(a.kind(), ErrorKind::NumericalOverflow);
        assert_eq!(b.kind(), ErrorKind::Optimizer);
        assert!(std::error::Error::source(&b).is_some());
    }

    #[test]
    // Purpose
    // -------
    // Each failure lands in its own kind; everything raised by validation is
    // `InvalidInput`.
    fn kinds_separate_validation_from_iteration_failures() {
        assert_eq!(IrtError::EmptyGroup { group: 1 }.kind(), ErrorKind::InvalidInput);
        assert_eq!(
            IrtError::DegeneratePosterior { person: 0, mass: 0.0 }.kind(),
            ErrorKind::NumericalOverflow
        );
        assert_eq!(
            IrtError::LikelihoodRegression { previous: -10.0, current: -10.5 }.kind(),
            ErrorKind::LikelihoodRegression
        );
        assert_eq!(
            IrtError::DegenerateVariance { group: 0, variance: -1e-3 }.kind(),
            ErrorKind::DegenerateVariance
        );
    }
}

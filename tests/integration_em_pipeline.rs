//! Integration tests for the EM pipeline and post-estimation inference.
//!
//! Purpose
//! -------
//! - Validate end-to-end fits: from validated response data, through the EM
//!   driver for both item models, to the Oakes Jacobian and item-block
//!   standard errors.
//! - Exercise the failure path where a contradictory response makes a
//!   posterior vanish.
//!
//! Coverage
//! --------
//! - `irt::core`: `ResponseData::from_persons`, `QuadratureGrid::linspace`,
//!   `EmOptions` / `StoppingRule`.
//! - `irt::em::IrtEstimator` with `TwoPl` and `Nominal`.
//! - `inference`: `oakes_jacobian`, `item_information`, `standard_errors`.
//!
//! Exclusions
//! ----------
//! - Gradient, information and trace checks of single items; those live in
//!   the unit tests of `irt::models`.
//!
//! Data
//! ----
//! Abilities are normal quantiles rather than random draws, and a person
//! answers item `i` correctly when a Weyl sequence with an item-specific
//! irrational step falls below the model probability. Every dataset is
//! deterministic.
use rust_irt::{
    inference::{OakesOptions, ParamLabel, item_information, oakes_jacobian, standard_errors},
    irt::{
        EmOptions, ErrorKind, GroupDistribution, IrtError, IrtEstimator, Nominal, NominalItem,
        QuadratureGrid, ResponseData, StopReason, StoppingRule, TwoPl, TwoPlItem, em_cycle,
    },
};
use statrs::distribution::{ContinuousCDF, Normal};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn grid() -> QuadratureGrid {
    QuadratureGrid::linspace(-4.0, 4.0, 31).unwrap()
}

/// Grid fine enough that the discretized prior tracks the continuous sd
/// update closely, so the nominal run's likelihood check stays monotone.
fn fine_grid() -> QuadratureGrid {
    QuadratureGrid::linspace(-6.0, 6.0, 241).unwrap()
}

/// `n` evenly spaced quantiles of `N(mean, sd²)`.
fn abilities(n: usize, mean: f64, sd: f64) -> Vec<f64> {
    let normal = Normal::new(mean, sd).unwrap();
    (0..n).map(|k| normal.inverse_cdf((k as f64 + 0.5) / n as f64)).collect()
}

/// Low-discrepancy stand-in for a uniform draw of person `p` on item `i`.
fn uniform(p: usize, i: usize) -> f64 {
    const STEPS: [f64; 6] = [2.0, 3.0, 5.0, 7.0, 11.0, 13.0];
    let step = STEPS[i % STEPS.len()].sqrt().fract();
    (0.5 + p as f64 * step).fract()
}

/// Dichotomous responses of every person in `groups` to every item.
fn simulate_2pl(items: &[TwoPlItem], groups: &[Vec<f64>]) -> Vec<(usize, Vec<(usize, usize)>)> {
    let mut persons = Vec::new();
    let mut p = 0;
    for (g, thetas) in groups.iter().enumerate() {
        for &theta in thetas {
            let responses = items
                .iter()
                .enumerate()
                .map(|(i, it)| {
                    let prob = 1.0 / (1.0 + (-it.slope * (theta - it.location)).exp());
                    (i, usize::from(uniform(p, i) < prob))
                })
                .collect();
            persons.push((g, responses));
            p += 1;
        }
    }
    persons
}

#[test]
// Purpose
// -------
// A single-group dichotomous fit converges and orders the items by
// difficulty.
//
// Given
// -----
// - Two items and ten persons: item 0 answered correctly by 6, item 1 by 4,
//   with a positive association between the items.
//
// Expect
// ------
// - `StopReason::Converged`, positive slopes, and item 0 located below
//   item 1.
fn single_group_fit_converges_and_orders_difficulty() {
    // Arrange
    init_logging();
    let mut persons = Vec::new();
    persons.extend(std::iter::repeat_n((0, vec![(0, 1), (1, 1)]), 3));
    persons.extend(std::iter::repeat_n((0, vec![(0, 1), (1, 0)]), 3));
    persons.push((0, vec![(0, 0), (1, 1)]));
    persons.extend(std::iter::repeat_n((0, vec![(0, 0), (1, 0)]), 3));
    let data = ResponseData::from_persons(&persons, 2, 1).unwrap();
    let options = EmOptions {
        stopping: StoppingRule::convergence(2000, 1e-4).unwrap(),
        ..EmOptions::default()
    };
    let mut est = IrtEstimator::new(TwoPl, grid(), options);

    // Act
    est.fit(&data, vec![TwoPlItem::new(1.0, 0.0); 2], vec![GroupDistribution::standard()])
        .unwrap();

    // Assert
    let out = est.results.unwrap();
    assert_eq!(out.stop, StopReason::Converged, "stopped after {} iterations", out.iterations);
    assert_eq!(out.stop.code(), 0);
    assert!(out.items.iter().all(|it| it.slope > 0.0));
    assert!(out.items[0].location < out.items[1].location);
    assert!(out.log_likelihood.is_some_and(f64::is_finite));
    assert_eq!(out.theta_bar.len(), 10);
}

#[test]
// Purpose
// -------
// With a pinned reference group the reference distribution stays exactly
// standard while the focal group is estimated.
//
// Given
// -----
// - Six items; 200 persons from N(0, 1) and 200 from N(0.5, 1).
// - Reference group 0.
//
// Expect
// ------
// - Converged, group 0 exactly (0, 1), group 1 mean between 0.2 and 0.8.
// - Finite, positive item standard errors at the estimates.
fn two_group_fit_keeps_reference_standard() {
    // Arrange
    init_logging();
    let truth = [
        TwoPlItem::new(1.0, -1.0),
        TwoPlItem::new(1.2, -0.5),
        TwoPlItem::new(0.8, 0.0),
        TwoPlItem::new(1.5, 0.3),
        TwoPlItem::new(1.1, 0.8),
        TwoPlItem::new(0.9, 1.2),
    ];
    let persons =
        simulate_2pl(&truth, &[abilities(200, 0.0, 1.0), abilities(200, 0.5, 1.0)]);
    let data = ResponseData::from_persons(&persons, truth.len(), 2).unwrap();
    let options = EmOptions {
        stopping: StoppingRule::convergence(500, 1e-4).unwrap(),
        reference_group: Some(0),
        ..EmOptions::default()
    };
    let mut est = IrtEstimator::new(TwoPl, grid(), options.clone());
    let starts = vec![GroupDistribution::standard(); 2];

    // Act
    est.fit(&data, vec![TwoPlItem::new(1.0, 0.0); truth.len()], starts).unwrap();

    // Assert
    let out = est.results.as_ref().unwrap();
    assert_eq!(out.stop, StopReason::Converged);
    assert_eq!(out.groups[0].mean, 0.0);
    assert_eq!(out.groups[0].sd, 1.0);
    assert!(out.groups[1].mean > 0.2 && out.groups[1].mean < 0.8, "{:?}", out.groups[1]);
    let (info, labels) =
        item_information(&TwoPl, &out.items, &out.groups, &grid(), &data, &options).unwrap();
    let se = standard_errors(&info);
    assert_eq!(labels.len(), 12);
    assert!(se.iter().all(|v| v.is_finite() && *v > 0.0));
}

#[test]
// Purpose
// -------
// A response that no grid node can produce is reported as a numerical
// overflow instead of yielding NaN parameters.
//
// Given
// -----
// - Item 0 with slope 200 and location 10, answered correctly by a person.
//
// Expect
// ------
// - `StopReason::NumericalFailure` with kind `NumericalOverflow`, code 1.
// - All returned parameters finite.
fn impossible_response_reports_numerical_overflow() {
    // Arrange
    init_logging();
    let persons = vec![
        (0, vec![(0, 1), (1, 1)]),
        (0, vec![(0, 0), (1, 0)]),
        (0, vec![(0, 0), (1, 1)]),
    ];
    let data = ResponseData::from_persons(&persons, 2, 1).unwrap();
    let mut est = IrtEstimator::new(TwoPl, grid(), EmOptions::default());
    let items = vec![TwoPlItem::new(200.0, 10.0), TwoPlItem::new(1.0, 0.0)];

    // Act
    est.fit(&data, items, vec![GroupDistribution::standard()]).unwrap();

    // Assert
    let out = est.results.unwrap();
    assert_eq!(out.stop.code(), 1);
    match &out.stop {
        StopReason::NumericalFailure(err) => assert_eq!(err.kind(), ErrorKind::NumericalOverflow),
        other => panic!("unexpected stop {other:?}"),
    }
    assert!(out.items.iter().all(|it| it.slope.is_finite() && it.location.is_finite()));
    assert!(out.groups.iter().all(|g| g.mean.is_finite() && g.sd.is_finite()));
}

#[test]
// Purpose
// -------
// On dichotomous data the two-category nominal model and the 2PL agree:
// the nominal model has unit slope and an estimated sd `σ`, which maps to
// a 2PL with slope `σ` and location `−c / σ`.
//
// Given
// -----
// - Five unit-slope items, 500 persons from N(0, 1).
// - 241 nodes on [-6, 6]; the nominal run uses its 200-iteration budget.
//
// Expect
// ------
// - Both runs converge.
// - 2PL locations within 0.15 of `−c / σ`; `σ` within 0.2 of the mean
//   2PL slope.
fn two_category_nominal_matches_2pl_locations() {
    // Arrange
    init_logging();
    let truth: Vec<_> =
        [-1.0, -0.4, 0.0, 0.5, 1.0].iter().map(|&b| TwoPlItem::new(1.0, b)).collect();
    let persons = simulate_2pl(&truth, &[abilities(500, 0.0, 1.0)]);
    let data = ResponseData::from_persons(&persons, truth.len(), 1).unwrap();
    let options = EmOptions {
        stopping: StoppingRule::convergence(500, 1e-4).unwrap(),
        ..EmOptions::default()
    };
    let nominal_options = EmOptions { stopping: StoppingRule::nominal(), ..options.clone() };
    let mut two_pl = IrtEstimator::new(TwoPl, fine_grid(), options);
    let mut nominal = IrtEstimator::new(Nominal, fine_grid(), nominal_options);

    // Act
    two_pl
        .fit(&data, vec![TwoPlItem::new(1.0, 0.0); 5], vec![GroupDistribution::standard()])
        .unwrap();
    nominal
        .fit(
            &data,
            vec![NominalItem::from_free(&[1], &[0.0]); 5],
            vec![GroupDistribution::standard()],
        )
        .unwrap();

    // Assert
    let a = two_pl.results.unwrap();
    let b = nominal.results.unwrap();
    assert_eq!(a.stop, StopReason::Converged);
    assert_eq!(b.stop, StopReason::Converged);
    assert!(b.iterations < 200);
    assert_eq!(b.groups[0].mean, 0.0);
    let sigma = b.groups[0].sd;
    let mean_slope = a.items.iter().map(|it| it.slope).sum::<f64>() / 5.0;
    assert!((sigma - mean_slope).abs() < 0.2, "sigma {sigma}, mean slope {mean_slope}");
    for (it2, itn) in a.items.iter().zip(&b.items) {
        let implied = -itn.intercepts[1] / sigma;
        assert!(
            (it2.location - implied).abs() < 0.15,
            "2PL location {} vs nominal {implied}",
            it2.location
        );
    }
}

#[test]
// Purpose
// -------
// A nominal run on a coarse grid whose likelihood drops stops with
// `LikelihoodDecreased` and keeps the cycle that revealed the drop.
//
// Given
// -----
// - The five-item, 500-person data of the 2PL comparison on 31 nodes,
//   where the discretized prior and the continuous sd update disagree.
//
// Expect
// ------
// - Stop code 2 carrying `LikelihoodRegression` with `current < previous`.
// - The returned state equals one more cycle from the state a fixed run of
//   one iteration fewer ends at.
fn coarse_grid_nominal_run_stops_on_likelihood_decrease() {
    // Arrange
    init_logging();
    let truth: Vec<_> =
        [-1.0, -0.4, 0.0, 0.5, 1.0].iter().map(|&b| TwoPlItem::new(1.0, b)).collect();
    let persons = simulate_2pl(&truth, &[abilities(500, 0.0, 1.0)]);
    let data = ResponseData::from_persons(&persons, truth.len(), 1).unwrap();
    let start = vec![NominalItem::from_free(&[1], &[0.0]); 5];
    let options = EmOptions {
        stopping: StoppingRule::convergence(500, 1e-4).unwrap(),
        ..EmOptions::default()
    };
    let mut est = IrtEstimator::new(Nominal, grid(), options.clone());

    // Act
    est.fit(&data, start.clone(), vec![GroupDistribution::standard()]).unwrap();

    // Assert
    let out = est.results.unwrap();
    assert_eq!(out.stop.code(), 2);
    let StopReason::LikelihoodDecreased(err) = &out.stop else {
        panic!("unexpected stop {:?}", out.stop);
    };
    assert_eq!(err.kind(), ErrorKind::LikelihoodRegression);
    let IrtError::LikelihoodRegression { previous, current } = *err else {
        panic!("unexpected error {err:?}");
    };
    assert!(current < previous);
    assert!(out.iterations >= 2);

    let fixed =
        EmOptions { stopping: StoppingRule::FixedIterations(out.iterations - 1), ..options };
    let mut before = IrtEstimator::new(Nominal, grid(), fixed.clone());
    before.fit(&data, start, vec![GroupDistribution::standard()]).unwrap();
    let before = before.results.unwrap();
    assert_eq!(before.stop, StopReason::MaxIterationsReached);
    let next =
        em_cycle(&Nominal, &before.items, &before.groups, &grid(), &data, &fixed).unwrap();
    for (a, b) in out.items.iter().zip(&next.items) {
        assert!((a.intercepts[1] - b.intercepts[1]).abs() < 1e-6);
    }
    assert_eq!(out.groups[0].mean, 0.0);
    assert!((out.groups[0].sd - next.groups[0].sd).abs() < 1e-6);
}

#[test]
// Purpose
// -------
// Halving the finite-difference step barely moves the Oakes Jacobian.
//
// Given
// -----
// - A converged single-group 2PL fit on four items and 300 persons.
// - Oakes with δ = 1e-5 and δ = 5e-6.
//
// Expect
// ------
// - Square 8×8 Jacobians labelled by item parameters.
// - Entrywise differences below 1e-2; all entries finite.
fn oakes_jacobian_is_stable_under_step_halving() {
    // Arrange
    init_logging();
    let truth = [
        TwoPlItem::new(1.2, -0.8),
        TwoPlItem::new(0.9, -0.2),
        TwoPlItem::new(1.4, 0.3),
        TwoPlItem::new(1.0, 0.9),
    ];
    let persons = simulate_2pl(&truth, &[abilities(300, 0.0, 1.0)]);
    let data = ResponseData::from_persons(&persons, truth.len(), 1).unwrap();
    let options = EmOptions {
        stopping: StoppingRule::convergence(1000, 1e-6).unwrap(),
        ..EmOptions::default()
    };
    let mut est = IrtEstimator::new(TwoPl, grid(), options.clone());
    est.fit(&data, vec![TwoPlItem::new(1.0, 0.0); 4], vec![GroupDistribution::standard()])
        .unwrap();
    let out = est.results.unwrap();
    let full = OakesOptions::default();
    let half = OakesOptions::new(full.delta / 2.0, full.mle_opts.clone()).unwrap();

    // Act
    let j1 =
        oakes_jacobian(&TwoPl, &out.items, &out.groups, &grid(), &data, &options, &full).unwrap();
    let j2 =
        oakes_jacobian(&TwoPl, &out.items, &out.groups, &grid(), &data, &options, &half).unwrap();

    // Assert
    assert_eq!(j1.jacobian.dim(), (8, 8));
    assert_eq!(j1.labels, j2.labels);
    assert_eq!(j1.labels[7], ParamLabel::Item { item: 3, index: 1 });
    assert!(j1.jacobian.iter().all(|v| v.is_finite()));
    let max_diff = (&j1.jacobian - &j2.jacobian).iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    assert!(max_diff < 1e-2, "max |ΔJ| = {max_diff}");
}

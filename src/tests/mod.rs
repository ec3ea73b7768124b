//! Scenario-level solve tests (§8 of the specification) that exercise the
//! full `prepare` → `dual` → `primal` pipeline through [`crate::solve`].

use faer::{Col, Mat};

use crate::settings::{CholPivotingStrategy, UserSettings};
use crate::status::{DualLoopExitStatus, Status};
use crate::{DenseQpProblem, SolverHooks, solve};

#[test]
fn scenario_4_redundant_inequality_detected() {
    let h = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
    let c = Col::from_fn(2, |i| if i == 0 { -1.0 } else { -1.0 });
    let a = Mat::from_fn(3, 2, |i, j| {
        let rows = [[1.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        rows[i][j]
    });
    let b = Col::from_fn(3, |_| 2.0);
    let f = Mat::zeros(0, 2);
    let g = Col::zeros(0);
    let lw = Col::from_fn(2, |_| f64::NEG_INFINITY);
    let up = Col::from_fn(2, |_| f64::INFINITY);
    let problem = DenseQpProblem::new(h, c, a, b, f, g, lw, up);
    let settings = UserSettings::default();
    let mut hooks = SolverHooks::default();

    let out = solve(&problem, &settings, &mut hooks).unwrap();
    assert_eq!(out.status, Status::Optimal);
    assert!((out.x[0] - 1.0).abs() < 1e-6);
    assert!((out.x[1] - 1.0).abs() < 1e-6);
    assert!((problem.objective(&out.x) - (-1.0)).abs() < 1e-6);
}

#[test]
fn scenario_6_degenerate_pivot_needs_full_pivoting() {
    let h = Mat::from_fn(3, 3, |i, j| if i == j { if i == 2 { 1.0e-15 } else { 1.0 } } else { 0.0 });
    let c = Col::from_fn(3, |_| -1.0);
    let lw = Col::from_fn(3, |_| f64::NEG_INFINITY);
    let up = Col::from_fn(3, |_| f64::INFINITY);
    let problem = DenseQpProblem::boxed(h, c, lw, up);

    let no_pivot_settings = UserSettings {
        chol_pivoting_strategy: CholPivotingStrategy::NoPivoting,
        ..UserSettings::default()
    };
    let mut hooks = SolverHooks::default();
    let no_pivot_result = solve(&problem, &no_pivot_settings, &mut hooks);
    assert!(no_pivot_result.is_ok());

    let full_pivot_settings = UserSettings {
        chol_pivoting_strategy: CholPivotingStrategy::Full,
        ..UserSettings::default()
    };
    let mut hooks = SolverHooks::default();
    let out = solve(&problem, &full_pivot_settings, &mut hooks).unwrap();
    assert_eq!(out.status, Status::Optimal);
}

#[test]
fn dual_exit_status_round_trips_through_status() {
    assert_eq!(
        Status::from_exit_statuses(
            DualLoopExitStatus::AllDualPositive,
            crate::status::PrimalLoopExitStatus::AllPrimalPositive
        ),
        Status::Optimal
    );
}

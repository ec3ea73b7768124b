//! Top-level orchestration: wires the problem preparer and the dual/primal
//! loops into the public entry point.

use std::time::Instant;

use problemo::Problem;

use crate::E;
use crate::SolverHooks;
use crate::dual::{self, run_dual_loop};
use crate::prepare::prepare;
use crate::problem::DenseQpProblem;
use crate::settings::UserSettings;
use crate::status::{SolverOutput, Status, TimingIntervals};

/// Duality gap `|primal objective - dual objective|` at the recovered
/// `(x, y)`: the dual objective of the NNLS reformulation collapses to
/// `-(1/2) xᵀHx + cᵀx... ` is avoided here in favor of the direct KKT
/// quantity `cᵀx + (1/2)xᵀHx - (bᵀy)`, which is zero at an exact complementary
/// solution and matches the scale of the primal objective.
fn duality_gap(problem: &DenseQpProblem, canon_b: &faer::Col<E>, x: &faer::Col<E>, y: &faer::Col<E>) -> E {
    let primal_obj = problem.objective(x);
    let mut b_t_y = 0.0;
    for i in 0..canon_b.nrows() {
        b_t_y += canon_b[i] * y[i];
    }
    (primal_obj - (-b_t_y)).abs()
}

/// Solves `problem` under `settings`, reporting progress and honoring
/// cancellation through `hooks`.
///
/// Returns `Err(Problem)` only for structural input errors caught before any
/// iteration runs (dimension mismatches, a non-symmetric Hessian, an
/// unsupported `Sparse` configuration). Once iteration begins, the solver
/// always produces a populated [`SolverOutput`].
pub fn solve(
    problem: &DenseQpProblem,
    settings: &UserSettings,
    hooks: &mut SolverHooks,
) -> Result<SolverOutput, Problem> {
    let t_prepare_start = Instant::now();
    let canon = prepare(problem, settings)?;
    let t_chol = t_prepare_start.elapsed().as_secs_f64();

    let timing_intervals = TimingIntervals {
        t_chol,
        t_inv: 0.0,
        t_m: 0.0,
        t_dual: 0.0,
    };

    let t_dual_start = Instant::now();
    let result = run_dual_loop(&canon, settings, hooks)?;
    let t_dual = t_dual_start.elapsed().as_secs_f64();

    let timing_intervals = TimingIntervals {
        t_dual,
        ..timing_intervals
    };

    let status = Status::from_exit_statuses(result.status, result.primal_status);
    let max_violation = dual::max_violation(&canon, &result.x);
    let gap = duality_gap(problem, &canon.b_stacked, &result.x, &result.y);

    Ok(SolverOutput {
        status,
        dual_exit_status: result.status,
        primal_exit_status: result.primal_status,
        n_dual_iterations: result.n_iterations,
        max_violation,
        duality_gap: gap,
        timing_intervals,
        x: result.x,
        y: result.y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{DualLoopExitStatus, PrimalLoopExitStatus};
    use faer::{Col, Mat};

    fn hooks() -> SolverHooks {
        SolverHooks::default()
    }

    #[test]
    fn scenario_1_unconstrained_1d() {
        let h = Mat::from_fn(1, 1, |_, _| 2.0);
        let c = Col::from_fn(1, |_| -4.0);
        let lw = Col::from_fn(1, |_| f64::NEG_INFINITY);
        let up = Col::from_fn(1, |_| f64::INFINITY);
        let problem = DenseQpProblem::boxed(h, c, lw, up);
        let settings = UserSettings::default();
        let mut hooks = hooks();
        let out = solve(&problem, &settings, &mut hooks).unwrap();
        assert_eq!(out.status, Status::Optimal);
        assert!((out.x[0] - 2.0).abs() < 1e-6);
        assert!((problem.objective(&out.x) - (-4.0)).abs() < 1e-6);
    }

    #[test]
    fn scenario_2_bound_active_1d() {
        let h = Mat::from_fn(1, 1, |_, _| 2.0);
        let c = Col::from_fn(1, |_| -4.0);
        let lw = Col::from_fn(1, |_| f64::NEG_INFINITY);
        let up = Col::from_fn(1, |_| 1.0);
        let problem = DenseQpProblem::boxed(h, c, lw, up);
        let settings = UserSettings::default();
        let mut hooks = hooks();
        let out = solve(&problem, &settings, &mut hooks).unwrap();
        assert_eq!(out.status, Status::Optimal);
        assert!((out.x[0] - 1.0).abs() < 1e-6);
        assert!((problem.objective(&out.x) - (-3.0)).abs() < 1e-6);
    }

    #[test]
    fn scenario_3_equality_constrained_2d() {
        let h = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let c = Col::from_fn(2, |_| 0.0);
        let a = Mat::zeros(0, 2);
        let b = Col::zeros(0);
        let f = Mat::from_fn(1, 2, |_, _| 1.0);
        let g = Col::from_fn(1, |_| -1.0);
        let lw = Col::from_fn(2, |_| f64::NEG_INFINITY);
        let up = Col::from_fn(2, |_| f64::INFINITY);
        let problem = DenseQpProblem::new(h, c, a, b, f, g, lw, up);
        let settings = UserSettings::default();
        let mut hooks = hooks();
        let out = solve(&problem, &settings, &mut hooks).unwrap();
        assert_eq!(out.status, Status::Optimal);
        assert!((out.x[0] - (-0.5)).abs() < 1e-6);
        assert!((out.x[1] - (-0.5)).abs() < 1e-6);
    }

    #[test]
    fn scenario_5_infeasible_bounds() {
        let h = Mat::from_fn(1, 1, |_, _| 1.0);
        let c = Col::from_fn(1, |_| 0.0);
        let a = Mat::from_fn(2, 1, |i, _| if i == 0 { 1.0 } else { -1.0 });
        let b = Col::from_fn(2, |_| -1.0);
        let f = Mat::zeros(0, 1);
        let g = Col::zeros(0);
        let lw = Col::from_fn(1, |_| f64::NEG_INFINITY);
        let up = Col::from_fn(1, |_| f64::INFINITY);
        let problem = DenseQpProblem::new(h, c, a, b, f, g, lw, up);
        let settings = UserSettings::default();
        let mut hooks = hooks();
        let out = solve(&problem, &settings, &mut hooks).unwrap();
        assert_eq!(out.dual_exit_status, DualLoopExitStatus::Infeasibility);
        assert_eq!(out.status, Status::Infeasible);
        let _ = PrimalLoopExitStatus::DidntStart;
    }
}

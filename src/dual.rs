//! Outer dual active-set loop: grows the active set by one violated
//! constraint per iteration, delegating to the primal NNLS loop whenever a
//! trial solve needs its non-negativity restored.

use faer::Col;
use problemo::Problem;

use crate::E;
use crate::SolverHooks;
use crate::callback::{InitDump, IterationDump};
use crate::linalg::incremental::{CumulativeLinearSolver, CumulativeSolverKind, LinSolverOutput};
use crate::linalg::kernels;
use crate::prepare::CanonicalProblem;
use crate::primal::run_primal_loop;
use crate::settings::{GammaUpdateStrategyDual, UserSettings};
use crate::status::{DualLoopExitStatus, PrimalLoopExitStatus, TimingIntervals};

/// Outcome of running the dual active-set loop to completion.
pub struct DualLoopResult {
    pub status: DualLoopExitStatus,
    pub primal_status: PrimalLoopExitStatus,
    pub n_iterations: usize,
    pub x: Col<E>,
    pub y: Col<E>,
}

fn scatter(output: &LinSolverOutput, n_constraints: usize) -> Col<E> {
    let mut full = Col::<E>::zeros(n_constraints);
    for (k, &i) in output.indices.iter().enumerate() {
        full[i] = output.solution[k];
    }
    full
}

/// Scale factor `v = gamma + s_activeᵀ y` the NNLS normal-equation solve
/// leaves the trial multipliers in terms of: `y_trial` solves `(M Mᵀ +
/// s sᵀ) y = −γs` up to this scalar, so the true multiplier is `y_trial / v`.
/// `y` is the full (scattered) trial vector; `s[i]*y[i]` is zero off the
/// active set, so summing over every row is equivalent to summing over just
/// the active ones.
fn residual_scale(s: &Col<E>, y: &Col<E>, gamma: E) -> E {
    let mut acc = gamma;
    for i in 0..y.nrows() {
        acc += s[i] * y[i];
    }
    acc
}

/// Recovers the primal candidate `x = -CholInvᵀ (w + (Mᵀ y) / v)` from the
/// stationarity condition `Hx + c + A_stackedᵀ y = 0`, where `y = y_trial /
/// v` is the rescaled true multiplier (see [`residual_scale`]). Since `H⁻¹ =
/// CholInvᵀ CholInv` and `M = A_stacked CholInvᵀ`, `H⁻¹ A_stackedᵀ y` reduces
/// to `CholInvᵀ (Mᵀ y)`, and `H⁻¹ c` reduces to `CholInvᵀ w` with `w =
/// CholInv c` — both share the same left factor, so it's applied once at
/// the end.
#[allow(non_snake_case)]
fn recover_x(w: &Col<E>, chol_inv_t: &faer::Mat<E>, m: &faer::Mat<E>, y: &Col<E>, v: E) -> Col<E> {
    let m_t_y = kernels::mult_transp(m.as_ref(), y.as_ref());
    let mut scaled = Col::<E>::zeros(m_t_y.nrows());
    for i in 0..m_t_y.nrows() {
        scaled[i] = m_t_y[i] / v;
    }
    let bracket = w + &scaled;
    -(chol_inv_t * &bracket)
}

/// Residual `A_i x - b_i` for stacked constraint row `i`.
fn row_violation(canon: &CanonicalProblem, i: usize, x: &Col<E>) -> E {
    let mut acc = 0.0;
    for j in 0..canon.A_stacked.ncols() {
        acc += canon.A_stacked[(i, j)] * x[j];
    }
    acc - canon.b_stacked[i]
}

/// Largest constraint residual `max_i (A_i x - b_i)` over every stacked row,
/// reported on `SolverOutput::max_violation` to quantify the returned
/// solution.
pub fn max_violation(canon: &CanonicalProblem, x: &Col<E>) -> E {
    let mut worst = E::NEG_INFINITY;
    for i in 0..canon.n_constraints() {
        worst = worst.max(row_violation(canon, i, x));
    }
    worst
}

/// Runs the dual active-set loop to completion (or interruption), using an
/// LDLᵀ-backed incremental solver over the canonical problem data.
pub fn run_dual_loop(
    canon: &CanonicalProblem,
    settings: &UserSettings,
    hooks: &mut SolverHooks,
) -> Result<DualLoopResult, Problem> {
    let n_constraints = canon.n_constraints();
    let mut solver = CumulativeSolverKind::ldlt(&canon.M, &canon.s);
    let chol_inv_t = canon.CholInv.transpose().to_owned();
    let w = &canon.CholInv * &canon.c;

    let mut gamma = 1.0;
    let mut k = 0usize;
    let mut primal_status = PrimalLoopExitStatus::DidntStart;
    let mut y_full = Col::<E>::zeros(n_constraints);
    let mut x = recover_x(&w, &chol_inv_t, &canon.M, &y_full, gamma);

    hooks.terminator.initialize();
    hooks.callback.on_init(&InitDump {
        Chol: &canon.Chol,
        CholInv: &canon.CholInv,
        M: &canon.M,
        s: &canon.s,
        c: &canon.c,
        b: &canon.b_stacked,
        timings: TimingIntervals::default(),
    });

    let status = loop {
        if let Some(_status) = hooks.terminator.terminate() {
            break DualLoopExitStatus::Interrupted;
        }

        let initial_output = solver.solve(gamma)?;
        let (p_status, output) =
            run_primal_loop(&mut solver, &mut gamma, settings, n_constraints, initial_output)?;
        primal_status = p_status;

        if primal_status == PrimalLoopExitStatus::SingularMatrix {
            break DualLoopExitStatus::Unknown;
        }

        y_full = scatter(&output, n_constraints);
        let v = residual_scale(&canon.s, &y_full, gamma);
        if v <= 0.0 {
            break DualLoopExitStatus::Infeasibility;
        }
        x = recover_x(&w, &chol_inv_t, &canon.M, &y_full, v);

        let mut best_idx: Option<usize> = None;
        let mut best_violation = settings.orig_primal_fsb;
        for i in 0..n_constraints {
            if solver.is_active(i) {
                continue;
            }
            let r = row_violation(canon, i, &x);
            if r > best_violation {
                best_violation = r;
                best_idx = Some(i);
            }
        }

        hooks.callback.on_iteration(&IterationDump {
            iteration: k,
            active_set: &output.indices,
            primal: &x,
            dual: &y_full,
            newly_added: best_idx,
            singular: false,
        });

        match best_idx {
            None => break DualLoopExitStatus::AllDualPositive,
            Some(i_star) => {
                if solver.n_active() == n_constraints {
                    break DualLoopExitStatus::FullActiveSet;
                }
                solver.add(i_star);
                if settings.gamma_update_dual == GammaUpdateStrategyDual::IncrementBySComponent {
                    gamma += canon.s[i_star];
                }
                k += 1;
            }
        }

        if k >= settings.n_dual_iterations {
            break DualLoopExitStatus::Iterations;
        }
    };

    Ok(DualLoopResult {
        status,
        primal_status,
        n_iterations: k,
        x,
        y: y_full,
    })
}

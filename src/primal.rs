//! Inner primal NNLS loop: restores non-negativity of the active-set dual
//! multipliers by repeatedly dropping the most negative component.

use faer::Col;
use problemo::Problem;

use crate::E;
use crate::linalg::incremental::{CumulativeLinearSolver, CumulativeSolverKind, LinSolverOutput};
use crate::settings::{GammaUpdateStrategyPrimal, UserSettings};
use crate::status::PrimalLoopExitStatus;

/// Scatters `output.solution` (aligned with `output.indices`) into a
/// zero-filled vector of length `n_constraints`.
fn scatter(output: &LinSolverOutput, n_constraints: usize) -> Col<E> {
    let mut full = Col::<E>::zeros(n_constraints);
    for (k, &i) in output.indices.iter().enumerate() {
        full[i] = output.solution[k];
    }
    full
}

/// Runs the primal NNLS loop starting from `output` (the trial multipliers
/// just produced by the incremental solver). Returns the exit status and
/// the final linear-solver output once the active set no longer contains a
/// multiplier below `settings.nnls_primal_zero`.
pub fn run_primal_loop(
    solver: &mut CumulativeSolverKind,
    gamma: &mut E,
    settings: &UserSettings,
    n_constraints: usize,
    mut output: LinSolverOutput,
) -> Result<(PrimalLoopExitStatus, LinSolverOutput), Problem> {
    let mut iteration = 0usize;

    loop {
        if output.indices.is_empty() {
            let status = if iteration == 0 {
                PrimalLoopExitStatus::EmptyActiveSetOnZeroIteration
            } else {
                PrimalLoopExitStatus::EmptyActiveSet
            };
            return Ok((status, output));
        }

        let values: Vec<E> = (0..output.solution.nrows()).map(|i| output.solution[i]).collect();
        let (pos, min_val) = values
            .iter()
            .copied()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
            .expect("non-empty active set has at least one multiplier");

        if min_val >= settings.nnls_primal_zero {
            return Ok((PrimalLoopExitStatus::AllPrimalPositive, output));
        }

        let previous_full = scatter(&output, n_constraints);
        let drop_index = output.indices[pos];
        solver.delete(drop_index);

        if solver.n_active() == 0 {
            let status = if iteration == 0 {
                PrimalLoopExitStatus::EmptyActiveSetOnZeroIteration
            } else {
                PrimalLoopExitStatus::EmptyActiveSet
            };
            return Ok((
                status,
                LinSolverOutput {
                    solution: Col::zeros(0),
                    indices: Vec::new(),
                    n_d_negative: 0,
                },
            ));
        }

        output = solver.solve(*gamma)?;
        if output.n_d_negative > 0 {
            return Ok((PrimalLoopExitStatus::SingularMatrix, output));
        }

        if settings.gamma_update_primal == GammaUpdateStrategyPrimal::DecrementByDNorm {
            let current_full = scatter(&output, n_constraints);
            let mut norm_sq = 0.0;
            for i in 0..n_constraints {
                let d = current_full[i] - previous_full[i];
                norm_sq += d * d;
            }
            *gamma -= norm_sq.sqrt() * 1.0e-3;
        }

        iteration += 1;
        if iteration >= settings.n_primal_iterations {
            return Ok((PrimalLoopExitStatus::Iterations, output));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    fn m_s(n_rows: usize, n_cols: usize) -> (Mat<E>, Col<E>) {
        let m = Mat::<E>::from_fn(n_rows, n_cols, |i, j| ((i + 1) * (j + 1)) as E);
        let s = Col::<E>::from_fn(n_rows, |i| -((i + 1) as E));
        (m, s)
    }

    #[test]
    fn returns_all_primal_positive_when_already_nonnegative() {
        let (m, s) = m_s(2, 2);
        let mut solver = CumulativeSolverKind::ldlt(&m, &s);
        solver.add(0);
        solver.add(1);
        let mut gamma = 1.0;
        let settings = UserSettings::default();
        let out = solver.solve(gamma).unwrap();
        let (status, _) = run_primal_loop(&mut solver, &mut gamma, &settings, 2, out).unwrap();
        assert!(matches!(
            status,
            PrimalLoopExitStatus::AllPrimalPositive | PrimalLoopExitStatus::SingularMatrix
        ));
    }

    #[test]
    fn empty_active_set_on_zero_iteration_when_started_empty() {
        let (m, s) = m_s(2, 2);
        let mut solver = CumulativeSolverKind::ldlt(&m, &s);
        let mut gamma = 1.0;
        let settings = UserSettings::default();
        let empty_output = LinSolverOutput {
            solution: Col::zeros(0),
            indices: Vec::new(),
            n_d_negative: 0,
        };
        let (status, _) =
            run_primal_loop(&mut solver, &mut gamma, &settings, 2, empty_output).unwrap();
        assert_eq!(status, PrimalLoopExitStatus::EmptyActiveSetOnZeroIteration);
    }
}

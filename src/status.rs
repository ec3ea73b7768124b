//! Exit statuses and the solver's output envelope.

use faer::Col;
use serde::{Deserialize, Serialize};

use crate::E;

/// Outer dual active-set loop termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DualLoopExitStatus {
    #[default]
    Unknown,
    /// No violated constraint remains: the optimum was reached.
    AllDualPositive,
    /// The active set already contains every constraint.
    FullActiveSet,
    /// `n_dual_iterations` was exhausted.
    Iterations,
    /// Residuals could not be driven below tolerance with non-negative multipliers.
    Infeasibility,
    /// A terminator fired (time limit, interrupt, ...).
    Interrupted,
}

/// Inner primal NNLS loop termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PrimalLoopExitStatus {
    #[default]
    Unknown,
    /// The primal loop was never entered this dual iteration.
    DidntStart,
    /// Deleting the most-negative multiplier emptied the active set.
    EmptyActiveSet,
    /// As above, but on the very first primal iteration.
    EmptyActiveSetOnZeroIteration,
    /// All active inequality multipliers are non-negative.
    AllPrimalPositive,
    /// `n_primal_iterations` was exhausted.
    Iterations,
    /// The incremental linear solver reported a rank-deficient active set.
    SingularMatrix,
}

/// Coarse, user-facing solve status derived from the pair of exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    InProgress,
    Optimal,
    Infeasible,
    Unknown,
    IterationLimit,
    Interrupted,
}

impl Status {
    /// Folds the dual/primal exit statuses into a single user-facing status.
    pub fn from_exit_statuses(dual: DualLoopExitStatus, primal: PrimalLoopExitStatus) -> Self {
        match (dual, primal) {
            (DualLoopExitStatus::Interrupted, _) => Status::Interrupted,
            (DualLoopExitStatus::AllDualPositive, PrimalLoopExitStatus::SingularMatrix) => {
                Status::Unknown
            }
            (DualLoopExitStatus::AllDualPositive, _) => Status::Optimal,
            (DualLoopExitStatus::Infeasibility, _) => Status::Infeasible,
            (DualLoopExitStatus::Iterations, _) => Status::IterationLimit,
            (DualLoopExitStatus::FullActiveSet, _) => Status::Unknown,
            (DualLoopExitStatus::Unknown, _) => Status::Unknown,
        }
    }
}

/// Wall-clock timings recorded for the stages of a solve, in seconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimingIntervals {
    pub t_chol: f64,
    pub t_inv: f64,
    pub t_m: f64,
    pub t_dual: f64,
}

/// The result of a `solve()` call.
#[derive(Debug, Clone)]
pub struct SolverOutput {
    pub status: Status,
    pub dual_exit_status: DualLoopExitStatus,
    pub primal_exit_status: PrimalLoopExitStatus,
    pub n_dual_iterations: usize,
    pub max_violation: E,
    pub duality_gap: E,
    pub timing_intervals: TimingIntervals,
    /// Recovered primal solution.
    pub x: Col<E>,
    /// Recovered dual multipliers, one per stacked constraint row.
    pub y: Col<E>,
}

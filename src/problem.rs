//! The user-facing dense QP problem type.

use faer::{Col, Mat};

use crate::E;

/// A dense convex quadratic program in the form
///
/// ```text
/// minimize    (1/2) x^T H x + c^T x
/// subject to  A x <= b
///             F x  = g
///             lw <= x <= up
/// ```
///
/// `H` must be symmetric positive (semi-)definite. Entries of `lw`/`up` may
/// be `-inf`/`+inf` to denote an unbounded side.
#[allow(non_snake_case)]
#[derive(Debug, Clone)]
pub struct DenseQpProblem {
    H: Mat<E>,
    c: Col<E>,
    A: Mat<E>,
    b: Col<E>,
    F: Mat<E>,
    g: Col<E>,
    lw: Col<E>,
    up: Col<E>,
}

#[allow(non_snake_case)]
impl DenseQpProblem {
    /// Creates a new problem from its raw data. Does not validate dimensions;
    /// use [`crate::prepare::check_problem`] (or `UserSettings::check_problem`)
    /// to validate before solving.
    pub fn new(H: Mat<E>, c: Col<E>, A: Mat<E>, b: Col<E>, F: Mat<E>, g: Col<E>, lw: Col<E>, up: Col<E>) -> Self {
        Self {
            H,
            c,
            A,
            b,
            F,
            g,
            lw,
            up,
        }
    }

    /// Convenience constructor for a problem with no inequality or equality
    /// constraints, only box bounds.
    pub fn boxed(H: Mat<E>, c: Col<E>, lw: Col<E>, up: Col<E>) -> Self {
        let n = c.nrows();
        Self::new(H, c, Mat::zeros(0, n), Col::zeros(0), Mat::zeros(0, n), Col::zeros(0), lw, up)
    }

    /// Number of decision variables.
    pub fn n_vars(&self) -> usize {
        self.c.nrows()
    }

    /// Number of inequality constraint rows (`A x <= b`), not counting bounds.
    pub fn n_ineq(&self) -> usize {
        self.b.nrows()
    }

    /// Number of equality constraint rows (`F x = g`).
    pub fn n_eq(&self) -> usize {
        self.g.nrows()
    }

    pub fn hessian(&self) -> &Mat<E> {
        &self.H
    }

    pub fn linear_objective(&self) -> &Col<E> {
        &self.c
    }

    pub fn ineq_matrix(&self) -> &Mat<E> {
        &self.A
    }

    pub fn ineq_rhs(&self) -> &Col<E> {
        &self.b
    }

    pub fn eq_matrix(&self) -> &Mat<E> {
        &self.F
    }

    pub fn eq_rhs(&self) -> &Col<E> {
        &self.g
    }

    pub fn lower_bounds(&self) -> &Col<E> {
        &self.lw
    }

    pub fn upper_bounds(&self) -> &Col<E> {
        &self.up
    }

    /// The objective value `(1/2) x^T H x + c^T x` at `x`.
    pub fn objective(&self, x: &Col<E>) -> E {
        0.5 * (x.transpose() * &self.H * x) + self.c.transpose() * x
    }
}

//! Error taxonomies for the solver, surfaced through [`problemo::Problem`].

use derive_more::{Display, Error};

/// Errors raised by [`crate::prepare::check_problem`] before any iteration runs.
#[derive(Debug, Display, Error, PartialEq)]
pub enum SolverSetupError {
    #[display("sparse configuration requested but only DENSE is implemented")]
    SparseUnsupported,

    #[display("Hessian H must be square, got {rows}x{cols}")]
    HessianNotSquare { rows: usize, cols: usize },

    #[display("Hessian H is not symmetric (|H[{i}][{j}] - H[{j}][{i}]| exceeds tolerance)")]
    HessianNotSymmetric { i: usize, j: usize },

    #[display("Hessian H contains a non-finite entry at ({i}, {j})")]
    HessianNotFinite { i: usize, j: usize },

    #[display("constraint matrix A has {a_cols} columns but H has {n} rows/columns")]
    InequalityDimensionMismatch { a_cols: usize, n: usize },

    #[display("rhs vector b has {b_len} entries but A has {a_rows} rows")]
    InequalityRhsMismatch { a_rows: usize, b_len: usize },

    #[display("constraint matrix F has {f_cols} columns but H has {n} rows/columns")]
    EqualityDimensionMismatch { f_cols: usize, n: usize },

    #[display("rhs vector g has {g_len} entries but F has {f_rows} rows")]
    EqualityRhsMismatch { f_rows: usize, g_len: usize },

    #[display("bound vectors lw/up must have {n} entries, got {lw_len}/{up_len}")]
    BoundDimensionMismatch {
        n: usize,
        lw_len: usize,
        up_len: usize,
    },

    #[display("objective vector c has {c_len} entries but H has {n} rows/columns")]
    ObjectiveDimensionMismatch { c_len: usize, n: usize },

    #[display("lower bound {lw} exceeds upper bound {up} at index {index}")]
    InfeasibleBounds { index: usize, lw: f64, up: f64 },
}

/// Errors internal to the dense numeric kernels (`linalg::kernels`).
#[derive(Debug, Display, Error, PartialEq)]
pub enum KernelError {
    #[display("matrix dimensions incompatible for multiplication: {lhs_cols} != {rhs_rows}")]
    MultiplyDimensionMismatch { lhs_cols: usize, rhs_rows: usize },

    #[display("matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    #[display("diagonal entry {index} has magnitude {value} below pivot_zero")]
    ZeroPivot { index: usize, value: f64 },

    #[display("matrix is singular to working precision")]
    Singular,
}

/// Errors raised by the Cholesky factorization of the Hessian.
#[derive(Debug, Display, Error, PartialEq)]
pub enum CholeskyError {
    #[display("matrix is not symmetric positive definite: diagonal pivot {value} at index {index} fell below -CHOL_FACTOR_ZERO")]
    NotPositiveDefinite { index: usize, value: f64 },

    #[display("matrix must be square, got {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

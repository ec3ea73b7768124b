//! Converts a user-facing [`DenseQpProblem`] into the canonical NNLS data the
//! dual/primal loops operate on.

use faer::{Col, Mat};
use problemo::{Problem, common::IntoCommonProblem};

use crate::E;
use crate::error::SolverSetupError;
use crate::linalg::cholesky::{self, CholeskyInfo};
use crate::linalg::kernels;
use crate::problem::DenseQpProblem;
use crate::settings::{DbScalerStrategy, ProblemConfiguration, UserSettings};

/// Structural symmetry check tolerance for `check_problem`.
const SYMMETRY_TOL: E = 1.0e-10;

/// The immutable canonical data handed to the dual active-set loop.
#[allow(non_snake_case)]
pub struct CanonicalProblem {
    pub Chol: Mat<E>,
    pub CholInv: Mat<E>,
    pub M: Mat<E>,
    pub s: Col<E>,
    pub c: Col<E>,
    /// The stacked constraint matrix `A x <= b_stacked` before the NNLS
    /// transform, kept so the dual loop can evaluate `A_i x - b_i` directly
    /// against the recovered primal candidate (§4.4 step 4).
    pub A_stacked: Mat<E>,
    pub b_stacked: Col<E>,
    pub scalers: Col<E>,
    pub chol_info: CholeskyInfo,
    pub n_ineq: usize,
    pub n_eq: usize,
}

impl CanonicalProblem {
    /// Total number of stacked constraint rows `M`/`s` carry: inequalities,
    /// two bound rows per variable with a finite bound, and two rows per
    /// equality constraint.
    pub fn n_constraints(&self) -> usize {
        self.M.nrows()
    }
}

/// Validates dimensional and structural consistency of `problem` against
/// `settings`. Called from [`prepare`] when `settings.check_problem` is set,
/// and usable standalone by callers that want to validate ahead of time.
pub fn check_problem(problem: &DenseQpProblem, settings: &UserSettings) -> Result<(), Problem> {
    if settings.configuration == ProblemConfiguration::Sparse {
        return Err(SolverSetupError::SparseUnsupported.gloss());
    }

    let n = problem.n_vars();
    let h = problem.hessian();
    if h.nrows() != h.ncols() {
        return Err(SolverSetupError::HessianNotSquare {
            rows: h.nrows(),
            cols: h.ncols(),
        }
        .gloss());
    }
    for i in 0..n {
        for j in 0..n {
            if !h[(i, j)].is_finite() {
                return Err(SolverSetupError::HessianNotFinite { i, j }.gloss());
            }
            if (h[(i, j)] - h[(j, i)]).abs() > SYMMETRY_TOL {
                return Err(SolverSetupError::HessianNotSymmetric { i, j }.gloss());
            }
        }
    }

    if problem.linear_objective().nrows() != n {
        return Err(SolverSetupError::ObjectiveDimensionMismatch {
            c_len: problem.linear_objective().nrows(),
            n,
        }
        .gloss());
    }

    let a = problem.ineq_matrix();
    if a.nrows() > 0 && a.ncols() != n {
        return Err(SolverSetupError::InequalityDimensionMismatch { a_cols: a.ncols(), n }.gloss());
    }
    if a.nrows() != problem.ineq_rhs().nrows() {
        return Err(SolverSetupError::InequalityRhsMismatch {
            a_rows: a.nrows(),
            b_len: problem.ineq_rhs().nrows(),
        }
        .gloss());
    }

    let f = problem.eq_matrix();
    if f.nrows() > 0 && f.ncols() != n {
        return Err(SolverSetupError::EqualityDimensionMismatch { f_cols: f.ncols(), n }.gloss());
    }
    if f.nrows() != problem.eq_rhs().nrows() {
        return Err(SolverSetupError::EqualityRhsMismatch {
            f_rows: f.nrows(),
            g_len: problem.eq_rhs().nrows(),
        }
        .gloss());
    }

    if problem.lower_bounds().nrows() != n || problem.upper_bounds().nrows() != n {
        return Err(SolverSetupError::BoundDimensionMismatch {
            n,
            lw_len: problem.lower_bounds().nrows(),
            up_len: problem.upper_bounds().nrows(),
        }
        .gloss());
    }
    for i in 0..n {
        let lw = problem.lower_bounds()[i];
        let up = problem.upper_bounds()[i];
        if lw.is_finite() && up.is_finite() && lw > up {
            return Err(SolverSetupError::InfeasibleBounds { index: i, lw, up }.gloss());
        }
    }

    Ok(())
}

/// Stacks inequality rows, finite bound rows, and equality rows (as two
/// opposite-signed inequalities each) into one constraint matrix/rhs pair.
#[allow(non_snake_case)]
fn stack_constraints(problem: &DenseQpProblem) -> (Mat<E>, Col<E>) {
    let n = problem.n_vars();
    let a = problem.ineq_matrix();
    let b = problem.ineq_rhs();
    let f = problem.eq_matrix();
    let g = problem.eq_rhs();
    let lw = problem.lower_bounds();
    let up = problem.upper_bounds();

    let mut rows: Vec<Vec<E>> = Vec::new();
    let mut rhs: Vec<E> = Vec::new();

    for i in 0..a.nrows() {
        rows.push((0..n).map(|j| a[(i, j)]).collect());
        rhs.push(b[i]);
    }

    for j in 0..n {
        if up[j].is_finite() {
            let mut row = vec![0.0; n];
            row[j] = 1.0;
            rows.push(row);
            rhs.push(up[j]);
        }
        if lw[j].is_finite() {
            let mut row = vec![0.0; n];
            row[j] = -1.0;
            rows.push(row);
            rhs.push(-lw[j]);
        }
    }

    for i in 0..f.nrows() {
        let row: Vec<E> = (0..n).map(|j| f[(i, j)]).collect();
        rows.push(row.clone());
        rhs.push(g[i]);
        rows.push(row.iter().map(|v| -v).collect());
        rhs.push(-g[i]);
    }

    let m_rows = rows.len();
    let stacked = Mat::from_fn(m_rows, n, |i, j| rows[i][j]);
    let stacked_rhs = Col::from_fn(m_rows, |i| rhs[i]);
    (stacked, stacked_rhs)
}

/// Applies the configured [`DbScalerStrategy`] to the stacked constraint
/// matrix/rhs in place, returning the per-row scale factors applied.
fn apply_scaling(a: &mut Mat<E>, b: &mut Col<E>, strategy: DbScalerStrategy) -> Col<E> {
    let m = a.nrows();
    let mut scalers = Col::<E>::zeros(m);

    match strategy {
        DbScalerStrategy::ScaleFactor => {
            for i in 0..m {
                let mut norm_sq = 0.0;
                for j in 0..a.ncols() {
                    norm_sq += a[(i, j)] * a[(i, j)];
                }
                let norm = norm_sq.sqrt();
                let scale = if norm > kernels::PIVOT_ZERO { 1.0 / norm } else { 1.0 };
                scalers[i] = scale;
                for j in 0..a.ncols() {
                    a[(i, j)] *= scale;
                }
                b[i] *= scale;
            }
        }
        DbScalerStrategy::Balance => {
            let n = a.ncols();
            let mut row_scale = vec![1.0; m];
            let mut col_scale = vec![1.0; n];
            for _ in 0..20 {
                let mut max_change: E = 0.0;
                for i in 0..m {
                    let mut row_inf = 0.0_f64;
                    for j in 0..n {
                        row_inf = row_inf.max((a[(i, j)] * row_scale[i] * col_scale[j]).abs());
                    }
                    if row_inf > kernels::PIVOT_ZERO {
                        let update = 1.0 / row_inf;
                        max_change = max_change.max((update - 1.0).abs());
                        row_scale[i] *= update;
                    }
                }
                for j in 0..n {
                    let mut col_inf = 0.0_f64;
                    for i in 0..m {
                        col_inf = col_inf.max((a[(i, j)] * row_scale[i] * col_scale[j]).abs());
                    }
                    if col_inf > kernels::PIVOT_ZERO {
                        let update = 1.0 / col_inf;
                        max_change = max_change.max((update - 1.0).abs());
                        col_scale[j] *= update;
                    }
                }
                if max_change < 1.0e-10 {
                    break;
                }
            }
            for i in 0..m {
                for j in 0..n {
                    a[(i, j)] *= row_scale[i] * col_scale[j];
                }
                b[i] *= row_scale[i];
                scalers[i] = row_scale[i];
            }
        }
    }

    scalers
}

/// Runs the full problem-preparation pipeline of §4.6: optional validation,
/// constraint scaling, Cholesky factorization of `H`, constraint stacking,
/// and the NNLS transform `M = A_stacked CholInvᵀ`, `s = b_stacked +
/// M (CholInv c)`.
#[allow(non_snake_case)]
pub fn prepare(problem: &DenseQpProblem, settings: &UserSettings) -> Result<CanonicalProblem, Problem> {
    if settings.check_problem {
        check_problem(problem, settings)?;
    }

    let (mut a_stacked, mut b_stacked) = stack_constraints(problem);
    let scalers = apply_scaling(&mut a_stacked, &mut b_stacked, settings.db_scaler_strategy);

    let h = problem.hessian();
    let (chol, chol_info) = cholesky::factor_with_strategy(h, settings.chol_pivoting_strategy)?;
    let chol_inv = kernels::invert_triangle(chol.as_ref())?;

    // H = Chol Cholᵀ, so H^-1 = CholInvᵀ CholInv. The stationarity condition
    // x = -H^-1(c + A_stackedᵀ y) then expands to
    // x = -CholInvᵀ (CholInv c + (A_stacked CholInvᵀ)ᵀ y), so M is defined as
    // A_stacked * CholInvᵀ, one row per constraint transformed into the
    // whitened space.
    let chol_inv_t = chol_inv.transpose().to_owned();
    let m_mat = kernels::mult(a_stacked.as_ref(), chol_inv_t.as_ref())?;

    let w = &chol_inv * problem.linear_objective();
    let m_w = &m_mat * &w;
    let s = &b_stacked + &m_w;

    Ok(CanonicalProblem {
        Chol: chol,
        CholInv: chol_inv,
        M: m_mat,
        s,
        c: problem.linear_objective().clone(),
        A_stacked: a_stacked,
        b_stacked,
        scalers,
        chol_info,
        n_ineq: problem.n_ineq(),
        n_eq: problem.n_eq(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Col;

    fn identity_problem() -> DenseQpProblem {
        let h = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let c = Col::from_fn(2, |_| 0.0);
        let lw = Col::from_fn(2, |_| f64::NEG_INFINITY);
        let up = Col::from_fn(2, |_| f64::INFINITY);
        DenseQpProblem::boxed(h, c, lw, up)
    }

    #[test]
    fn check_problem_rejects_non_symmetric_hessian() {
        let mut problem = identity_problem();
        let h = Mat::from_fn(2, 2, |i, j| if i == 0 && j == 1 { 1.0 } else { 0.0 });
        problem = DenseQpProblem::boxed(h, problem.linear_objective().clone(), problem.lower_bounds().clone(), problem.upper_bounds().clone());
        let settings = UserSettings::default();
        assert!(check_problem(&problem, &settings).is_err());
    }

    #[test]
    fn check_problem_rejects_dimension_mismatch() {
        let h = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let c = Col::from_fn(2, |_| 0.0);
        let a = Mat::from_fn(1, 3, |_, _| 1.0);
        let b = Col::from_fn(1, |_| 1.0);
        let f = Mat::zeros(0, 2);
        let g = Col::zeros(0);
        let lw = Col::from_fn(2, |_| f64::NEG_INFINITY);
        let up = Col::from_fn(2, |_| f64::INFINITY);
        let problem = DenseQpProblem::new(h, c, a, b, f, g, lw, up);
        let settings = UserSettings::default();
        assert!(check_problem(&problem, &settings).is_err());
    }

    #[test]
    fn prepare_produces_canonical_data_for_unconstrained_problem() {
        let problem = identity_problem();
        let settings = UserSettings::default();
        let canon = prepare(&problem, &settings).unwrap();
        assert_eq!(canon.M.ncols(), 2);
        assert!(canon.chol_info.is_positive_definite());
    }
}

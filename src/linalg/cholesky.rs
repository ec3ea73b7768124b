//! Dense Cholesky factorization of the Hessian, with optional pivoting.
//!
//! Computes the standard lower-triangular factorization `M = L Lᵀ`; `Chol`
//! is `L`, `CholInv` is `L⁻¹`, so `M⁻¹ = CholInvᵀ CholInv` (§3 of the
//! specification this module implements).

use faer::Mat;
use problemo::{Problem, common::IntoCommonProblem};

use crate::E;
use crate::error::CholeskyError;
use crate::linalg::kernels;
use crate::settings::CholPivotingStrategy;

/// Diagonal entries at or below this magnitude (but still `>= -CHOL_FACTOR_ZERO`)
/// are clamped to zero rather than rejected.
pub const CHOL_FACTOR_ZERO: E = 1.0e-14;

/// Diagnostics produced alongside a Cholesky factor.
#[derive(Debug, Clone, Default)]
pub struct CholeskyInfo {
    /// `(index, value)` pairs for diagonal pivots that fell in `[-CHOL_FACTOR_ZERO, 0)`
    /// and were clamped to zero.
    pub negative_diag: Vec<(usize, E)>,
    /// The first diagonal pivot strictly less than `-CHOL_FACTOR_ZERO`, if any.
    /// Once set, factorization halted: the input is not SPD.
    pub negative_blocking: Option<(usize, E)>,
    /// Whether pivoting was exercised (always `false` for [`cholesky_factor_t`]).
    pub pivoting: bool,
}

impl CholeskyInfo {
    pub fn is_positive_definite(&self) -> bool {
        self.negative_blocking.is_none()
    }
}

/// Factors `m` (symmetric, assumed SPD) into `m = L Lᵀ` without pivoting.
///
/// Returns the lower-triangular `L` (stored as a full matrix with zeros
/// above the diagonal) and a [`CholeskyInfo`] describing any soft-negative
/// or blocking pivots encountered.
pub fn cholesky_factor_t(m: &Mat<E>) -> Result<(Mat<E>, CholeskyInfo), Problem> {
    let n = m.nrows();
    if m.ncols() != n {
        return Err(CholeskyError::NotSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        }
        .gloss());
    }

    let mut l = Mat::<E>::zeros(n, n);
    let mut info = CholeskyInfo::default();

    for j in 0..n {
        let mut sum = m[(j, j)];
        for k in 0..j {
            sum -= l[(j, k)] * l[(j, k)];
        }

        let diag = if sum < 0.0 {
            if sum < -CHOL_FACTOR_ZERO {
                info.negative_blocking = Some((j, sum));
                break;
            }
            info.negative_diag.push((j, sum));
            0.0
        } else {
            sum
        };

        let ljj = diag.sqrt();
        l[(j, j)] = ljj;
        if ljj < kernels::PIVOT_ZERO {
            continue;
        }

        for i in (j + 1)..n {
            let mut s = m[(i, j)];
            for k in 0..j {
                s -= l[(i, k)] * l[(j, k)];
            }
            l[(i, j)] = s / ljj;
        }
    }

    Ok((l, info))
}

/// Symmetric full-pivoting variant: at each step swaps both the row and
/// column of the largest remaining diagonal into place before eliminating.
/// Returns the permuted factor together with the permutation applied (so
/// that, for the original `m`, `Pᵀ m P = L Lᵀ` with `perm[i]` the original
/// index now occupying position `i`) and the number of strictly positive
/// pivots found.
pub fn cholesky_factor_t_full_pivoting(m: &Mat<E>) -> Result<(Mat<E>, Vec<usize>, usize), Problem> {
    let n = m.nrows();
    if m.ncols() != n {
        return Err(CholeskyError::NotSquare {
            rows: m.nrows(),
            cols: m.ncols(),
        }
        .gloss());
    }

    let mut work = m.clone();
    let mut perm: Vec<usize> = (0..n).collect();
    let mut positive_pivots = 0;

    for j in 0..n {
        let mut best = j;
        let mut best_val = work[(j, j)];
        for k in (j + 1)..n {
            if work[(k, k)] > best_val {
                best = k;
                best_val = work[(k, k)];
            }
        }
        if best != j {
            kernels::swap_columns(&mut work, j, best);
            let mut work_t = work.transpose().to_owned();
            kernels::swap_columns(&mut work_t, j, best);
            work = work_t.transpose().to_owned();
            perm.swap(j, best);
        }

        let diag = work[(j, j)];
        if diag <= CHOL_FACTOR_ZERO {
            break;
        }
        positive_pivots += 1;
        let ljj = diag.sqrt();

        for i in (j + 1)..n {
            work[(i, j)] /= ljj;
        }
        work[(j, j)] = ljj;
        for i in (j + 1)..n {
            let lij = work[(i, j)];
            for k in (j + 1)..=i {
                work[(i, k)] -= lij * work[(k, j)];
            }
        }
    }

    for j in 0..n {
        for i in 0..j {
            work[(i, j)] = 0.0;
        }
    }

    Ok((work, perm, positive_pivots))
}

/// Dispatches to [`cholesky_factor_t`] or [`cholesky_factor_t_full_pivoting`]
/// per the configured [`CholPivotingStrategy`].
///
/// `Partial` is implemented as a diagonal-magnitude reordering applied
/// before the unpivoted factorization runs (a column swap without the
/// matching row swap), matching the specification's description of it as
/// "a diagonal-magnitude swap without the symmetric row swap".
pub fn factor_with_strategy(
    m: &Mat<E>,
    strategy: CholPivotingStrategy,
) -> Result<(Mat<E>, CholeskyInfo), Problem> {
    match strategy {
        CholPivotingStrategy::NoPivoting => cholesky_factor_t(m),
        CholPivotingStrategy::Partial => {
            let n = m.nrows();
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| m[(b, b)].partial_cmp(&m[(a, a)]).unwrap());
            let reordered = kernels::permute_columns(m.as_ref(), &order);
            let (l, mut info) = cholesky_factor_t(&reordered)?;
            info.pivoting = true;
            Ok((l, info))
        }
        CholPivotingStrategy::Full => {
            let (l, _perm, positive_pivots) = cholesky_factor_t_full_pivoting(m)?;
            let info = CholeskyInfo {
                negative_diag: Vec::new(),
                negative_blocking: if positive_pivots < m.nrows() {
                    Some((positive_pivots, m[(positive_pivots, positive_pivots)]))
                } else {
                    None
                },
                pivoting: true,
            };
            Ok((l, info))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::kernels::mult;
    use rstest::rstest;

    fn spd(n: usize) -> Mat<E> {
        Mat::from_fn(n, n, |i, j| if i == j { (n + 2) as E } else { 1.0 })
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(4)]
    fn cholesky_reproduces_matrix(#[case] n: usize) {
        let m = spd(n);
        let (l, info) = cholesky_factor_t(&m).unwrap();
        assert!(info.is_positive_definite());
        let lt = l.transpose().to_owned();
        let prod = mult(l.as_ref(), lt.as_ref()).unwrap();
        let mut frob_err = 0.0;
        let mut frob_norm = 0.0;
        for i in 0..n {
            for j in 0..n {
                frob_err += (prod[(i, j)] - m[(i, j)]).powi(2);
                frob_norm += m[(i, j)].powi(2);
            }
        }
        assert!(frob_err.sqrt() < 1e-10 * frob_norm.sqrt().max(1.0));
    }

    #[test]
    fn negative_blocking_detects_non_spd() {
        let mut m = Mat::<E>::zeros(2, 2);
        m[(0, 0)] = 1.0;
        m[(1, 1)] = -1.0;
        let (_, info) = cholesky_factor_t(&m).unwrap();
        assert!(!info.is_positive_definite());
    }

    #[test]
    fn soft_negative_diagonal_is_clamped_not_rejected() {
        let mut m = spd(2);
        for i in 0..2 {
            for j in 0..2 {
                if i != j {
                    m[(i, j)] = 0.0;
                }
            }
        }
        m[(0, 0)] = 1.0;
        m[(1, 1)] = -CHOL_FACTOR_ZERO / 2.0;
        let (_, info) = cholesky_factor_t(&m).unwrap();
        assert!(info.is_positive_definite());
        assert_eq!(info.negative_diag.len(), 1);
    }

    #[test]
    fn degenerate_pivot_needs_full_pivoting() {
        let mut m = Mat::<E>::zeros(3, 3);
        m[(0, 0)] = 1.0;
        m[(1, 1)] = 1.0;
        m[(2, 2)] = 1e-15;

        let (_, info_none) = factor_with_strategy(&m, CholPivotingStrategy::NoPivoting).unwrap();
        assert!(info_none.is_positive_definite());

        let (_, info_full) = factor_with_strategy(&m, CholPivotingStrategy::Full).unwrap();
        assert_eq!(info_full.negative_blocking, None);
    }
}
